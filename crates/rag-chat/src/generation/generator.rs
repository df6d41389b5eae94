//! Answer generation over the final context

use std::sync::Arc;
use std::time::Duration;

use crate::error::{with_timeout, Error, Result};
use crate::providers::LlmProvider;
use crate::types::{ChatModel, Citation, RetrievedContext};

use super::citation::build_citations;
use super::language::{detect_answer_language, Language};
use super::prompt::PromptBuilder;

/// Model output plus the citations for the context it was given
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    pub citations: Vec<Citation>,
    pub language: Language,
}

/// Produces grounded answers with an LLM
pub struct AnswerGenerator {
    llm: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Answer `query` from `context`; citations follow context order
    pub async fn generate(
        &self,
        query: &str,
        context: &RetrievedContext,
        model: ChatModel,
    ) -> Result<GeneratedAnswer> {
        let language = detect_answer_language(query, context);
        let prompt = PromptBuilder::build_answer_prompt(query, &PromptBuilder::build_context(context), language);

        tracing::debug!(
            provider = self.llm.name(),
            model = %model,
            language = %language,
            chunks = context.len(),
            prompt_len = prompt.len(),
            "Generating answer"
        );

        let text = with_timeout("generation", self.timeout, self.llm.complete(&prompt, model, self.timeout))
            .await
            .map_err(|e| match e {
                Error::Timeout { .. } | Error::Generation(_) => e,
                other => Error::Generation(other.to_string()),
            })?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(Error::Generation(format!("{} returned an empty answer", model)));
        }

        Ok(GeneratedAnswer {
            text,
            citations: build_citations(context),
            language,
        })
    }

    /// Answer for a query whose collection holds no chunks
    pub fn empty_index_answer(&self, query: &str) -> GeneratedAnswer {
        let language = detect_answer_language(query, &RetrievedContext::default());
        GeneratedAnswer {
            text: PromptBuilder::empty_index_answer(language).to_string(),
            citations: Vec::new(),
            language,
        }
    }
}
