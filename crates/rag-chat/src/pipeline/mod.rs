//! Query pipeline
//!
//! A query moves through `Retrieving → Reranking → Compressing → Generating`
//! and ends in `Done` or `Failed`. Re-ranking and compression are optional and
//! non-fatal: when either fails the pipeline records a [`Degradation`] and
//! carries on with the context it already had.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{ModelDefaults, RagConfig};
use crate::error::{Error, ErrorKind, Result};
use crate::generation::{AnswerGenerator, GeneratedAnswer};
use crate::providers::{Providers, StoreHandle};
use crate::retrieval::{fit_to_budget, ContextCompressor, Reranker, Retriever};
use crate::types::{Answer, ChatModel, Degradation, EmbeddingModel, QueryRequest, RetrievedContext};

/// Where a query is in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Retrieving,
    Reranking,
    Compressing,
    Generating,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Retrieving => "retrieving",
            Self::Reranking => "reranking",
            Self::Compressing => "compressing",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }

    /// Terminal states accept no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    /// States a successful run of `request` passes through, in order
    pub fn plan(request: &QueryRequest) -> Vec<PipelineState> {
        let mut states = vec![Self::Retrieving];
        if request.rerank_method.is_enabled() {
            states.push(Self::Reranking);
        }
        if request.use_compression {
            states.push(Self::Compressing);
        }
        states.push(Self::Generating);
        states.push(Self::Done);
        states
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bookkeeping for one run
struct Run {
    id: uuid::Uuid,
    state: PipelineState,
    history: Vec<PipelineState>,
    degradations: Vec<Degradation>,
    started: Instant,
}

impl Run {
    fn new() -> Self {
        let id = uuid::Uuid::new_v4();
        tracing::debug!(run = %id, state = %PipelineState::Retrieving, "Pipeline started");
        Self {
            id,
            state: PipelineState::Retrieving,
            history: vec![PipelineState::Retrieving],
            degradations: Vec::new(),
            started: Instant::now(),
        }
    }

    fn enter(&mut self, next: PipelineState) {
        tracing::debug!(run = %self.id, from = %self.state, to = %next, "Pipeline transition");
        self.state = next;
        self.history.push(next);
    }

    fn degrade(&mut self, stage: PipelineState, error: &Error) {
        tracing::warn!(
            run = %self.id,
            stage = %stage,
            kind = error.kind().as_str(),
            error = %error,
            "Stage degraded, continuing"
        );
        self.degradations.push(Degradation {
            stage: stage.as_str().to_string(),
            kind: error.kind(),
            message: error.to_string(),
        });
    }

    fn fail(&mut self, error: Error) -> Error {
        let stage = self.state;
        self.enter(PipelineState::Failed);
        tracing::error!(run = %self.id, stage = %stage, error = %error, "Pipeline failed");
        error
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

/// A finished run: the answer plus the states it went through
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub answer: Answer,
    pub states: Vec<PipelineState>,
}

/// Query orchestrator
pub struct Pipeline {
    retriever: Retriever,
    reranker: Reranker,
    compressor: ContextCompressor,
    generator: AnswerGenerator,
    candidate_multiplier: usize,
    compression_model: ChatModel,
    defaults: ModelDefaults,
}

/// Models a run actually uses once request defaults are applied
#[derive(Debug, Clone, Copy)]
struct Models {
    chat: ChatModel,
    embedding: EmbeddingModel,
}

impl Pipeline {
    pub fn new(config: &RagConfig, providers: Arc<Providers>, store: StoreHandle) -> Self {
        let llm = Arc::clone(providers.llm());
        Self {
            retriever: Retriever::new(Arc::clone(&providers), store, config.embeddings.timeout()),
            reranker: Reranker::new(Arc::clone(&providers), config.rerank.timeout()),
            compressor: ContextCompressor::new(Arc::clone(&llm), &config.compression),
            generator: AnswerGenerator::new(llm, config.llm.timeout()),
            candidate_multiplier: config.rerank.candidate_multiplier.max(1),
            compression_model: config.compression.model,
            defaults: config.model_defaults(),
        }
    }

    /// Answer a query
    pub async fn run(&self, request: &QueryRequest) -> Result<Answer> {
        self.run_traced(request).await.map(|outcome| outcome.answer)
    }

    /// Answer a query and report the states visited
    pub async fn run_traced(&self, request: &QueryRequest) -> Result<PipelineOutcome> {
        request.validate()?;
        let k = request.chunk_count;
        let models = Models {
            chat: self.defaults.chat(request.chat_model),
            embedding: self.defaults.embedding(request.embedding_model),
        };
        let plan = PipelineState::plan(request);
        let reranking = plan.contains(&PipelineState::Reranking);
        let compressing = plan.contains(&PipelineState::Compressing);
        let mut run = Run::new();
        tracing::debug!(run = %run.id, plan = ?plan, "Pipeline planned");

        tracing::info!(
            run = %run.id,
            query = %request.query,
            embedding_model = %models.embedding,
            chat_model = %models.chat,
            k,
            rerank = %request.rerank_method,
            compression = request.use_compression,
            "Query"
        );

        // Over-fetch so the re-ranker has candidates to choose from
        let fetch_k = if reranking {
            k * self.candidate_multiplier
        } else {
            k
        };

        let mut context = match self
            .retriever
            .retrieve(&request.query, models.embedding, fetch_k)
            .await
        {
            Ok(context) => context,
            Err(e) if e.kind() == ErrorKind::EmptyIndex => {
                run.degrade(PipelineState::Retrieving, &e);
                let generated = self.generator.empty_index_answer(&request.query);
                run.enter(PipelineState::Done);
                return Ok(self.finish(run, request, models, generated, &RetrievedContext::default(), false));
            }
            Err(e) => return Err(run.fail(e)),
        };

        if reranking {
            run.enter(PipelineState::Reranking);
            context = match self
                .reranker
                .rerank(
                    &request.query,
                    context.clone(),
                    request.rerank_method,
                    models.chat,
                    k,
                )
                .await
            {
                Ok(ranked) => ranked,
                Err(e) => {
                    run.degrade(PipelineState::Reranking, &e);
                    Reranker::fallback(context, k)
                }
            };
        }
        context.truncate(k);

        let mut compression_used = false;
        if compressing {
            run.enter(PipelineState::Compressing);
            match self
                .compressor
                .compress(&request.query, &context, self.compression_model)
                .await
            {
                Ok(compressed) => {
                    compression_used = compressed.shortened;
                    context = compressed.context;
                }
                Err(e) => {
                    run.degrade(PipelineState::Compressing, &e);
                    fit_to_budget(&mut context, self.compressor.max_context_chars());
                }
            }
        }

        run.enter(PipelineState::Generating);
        let generated = match self
            .generator
            .generate(&request.query, &context, models.chat)
            .await
        {
            Ok(generated) => generated,
            Err(e) => return Err(run.fail(e)),
        };

        run.enter(PipelineState::Done);
        Ok(self.finish(run, request, models, generated, &context, compression_used))
    }

    fn finish(
        &self,
        run: Run,
        request: &QueryRequest,
        models: Models,
        generated: GeneratedAnswer,
        context: &RetrievedContext,
        compression_used: bool,
    ) -> PipelineOutcome {
        let processing_time_ms = run.elapsed_ms();
        tracing::info!(
            run = %run.id,
            chunks_used = context.len(),
            degradations = run.degradations.len(),
            language = %generated.language,
            processing_time_ms,
            "Query answered"
        );

        let answer = Answer {
            answer: generated.text,
            citations: generated.citations,
            model_used: models.chat,
            embedding_model_used: models.embedding,
            chunk_count: request.chunk_count,
            chunks_used: context.len(),
            rerank_method: request.rerank_method,
            compression_used,
            language_detected: generated.language.as_str().to_string(),
            degradations: run.degradations,
            processing_time_ms,
        };

        PipelineOutcome {
            answer,
            states: run.history,
        }
    }
}
