//! Fake providers and fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use rag_chat::config::RagConfig;
use rag_chat::error::{Error, Result};
use rag_chat::ingestion::DocumentRegistry;
use rag_chat::providers::{
    EmbeddingProvider, InMemoryVectorStore, LlmProvider, Providers, RerankProvider,
};
use rag_chat::types::{ChatModel, EmbeddingModel};
use rag_chat::RagService;

#[derive(Clone, Copy, PartialEq)]
enum Failure {
    Never,
    Always,
    QueriesOnly,
}

/// Bag-of-words hashing embedder; texts sharing words get similar vectors
pub struct FakeEmbedder {
    model: EmbeddingModel,
    failure: Failure,
    dims: Option<usize>,
    query_delay: Option<Duration>,
}

impl FakeEmbedder {
    pub fn new(model: EmbeddingModel) -> Self {
        Self {
            model,
            failure: Failure::Never,
            dims: None,
            query_delay: None,
        }
    }

    pub fn failing(model: EmbeddingModel) -> Self {
        Self {
            failure: Failure::Always,
            ..Self::new(model)
        }
    }

    /// Embeds documents but fails on search queries
    pub fn failing_queries(model: EmbeddingModel) -> Self {
        Self {
            failure: Failure::QueriesOnly,
            ..Self::new(model)
        }
    }

    /// Reports `model` but returns vectors of the wrong length
    pub fn wrong_dims(model: EmbeddingModel, dims: usize) -> Self {
        Self {
            dims: Some(dims),
            ..Self::new(model)
        }
    }

    /// Search queries take `delay` to embed; document batches stay instant
    pub fn with_query_delay(mut self, delay: Duration) -> Self {
        self.query_delay = Some(delay);
        self
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let dims = self.dims.unwrap_or_else(|| self.model.dimensions());
        let mut v = vec![0.0f32; dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.len() > 2)
        {
            let word = word.to_lowercase();
            let mut hash: u64 = 0xcbf29ce484222325;
            for byte in word.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(0x100000001b3);
            }
            v[(hash % dims as u64) as usize] += 1.0;
        }
        // Keep every vector non-zero
        v[0] += 0.01;
        v
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(delay) = self.query_delay {
            tokio::time::sleep(delay).await;
        }
        if self.failure != Failure::Never {
            return Err(Error::embedding("fake", "service unavailable"));
        }
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.failure == Failure::Always {
            return Err(Error::embedding("fake", "service unavailable"));
        }
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model(&self) -> EmbeddingModel {
        self.model
    }

    fn name(&self) -> &str {
        "fake"
    }
}

type Responder = dyn Fn(&str) -> Result<String> + Send + Sync;

/// LLM that routes each prompt kind to its own responder and records prompts
pub struct FakeLlm {
    answer: Box<Responder>,
    rerank: Box<Responder>,
    compress: Box<Responder>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new() -> Self {
        Self {
            answer: Box::new(|_| Ok("The refund window is 30 days [1].".to_string())),
            rerank: Box::new(|_| Ok("[]".to_string())),
            compress: Box::new(|_| Ok("NO_OUTPUT".to_string())),
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on_answer(mut self, f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        self.answer = Box::new(f);
        self
    }

    pub fn on_rerank(mut self, f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        self.rerank = Box::new(f);
        self
    }

    pub fn on_compress(mut self, f: impl Fn(&str) -> Result<String> + Send + Sync + 'static) -> Self {
        self.compress = Box::new(f);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn answer_prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .iter()
            .filter(|p| !is_rerank(p) && !is_compress(p))
            .cloned()
            .collect()
    }
}

fn is_rerank(prompt: &str) -> bool {
    prompt.starts_with("Rate how relevant each passage")
}

fn is_compress(prompt: &str) -> bool {
    prompt.starts_with("Given the following question and context")
}

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn complete(&self, prompt: &str, _model: ChatModel, _timeout: Duration) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if is_rerank(prompt) {
            (self.rerank)(prompt)
        } else if is_compress(prompt) {
            (self.compress)(prompt)
        } else {
            (self.answer)(prompt)
        }
    }

    fn name(&self) -> &str {
        "fake-llm"
    }
}

/// Cross-encoder stand-in
pub struct FakeReranker {
    fail: bool,
}

impl FakeReranker {
    pub fn working() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl RerankProvider for FakeReranker {
    /// Longer passages score higher
    async fn score(&self, _query: &str, texts: &[String]) -> Result<Vec<f32>> {
        if self.fail {
            return Err(Error::rerank("fake-rerank", "503 Service Unavailable"));
        }
        Ok(texts.iter().map(|t| t.len() as f32).collect())
    }

    fn name(&self) -> &str {
        "fake-rerank"
    }
}

/// In-memory configuration with compression applied to any chunk size
pub fn test_config() -> RagConfig {
    let mut config = RagConfig::default();
    config.vector_db.persist = false;
    config.compression.min_chunk_chars = 0;
    config.chunking.chunk_size = 200;
    config.chunking.chunk_overlap = 20;
    config
}

/// Providers with fake embedders for every model
pub fn fake_providers(llm: Arc<FakeLlm>) -> Providers {
    EmbeddingModel::ALL
        .into_iter()
        .fold(Providers::new(llm), |providers, model| {
            providers.with_embedder(Arc::new(FakeEmbedder::new(model)))
        })
}

pub fn service_with(providers: Providers) -> RagService {
    service_with_config(&test_config(), providers)
}

pub fn service_with_config(config: &RagConfig, providers: Providers) -> RagService {
    RagService::new(
        config,
        providers,
        Arc::new(InMemoryVectorStore::new()),
        DocumentRegistry::new(),
    )
    .expect("service builds")
}

/// A PDF whose page `n` holds `pages[n - 1]`
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content encodes"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf saves");
    bytes
}

/// A DOCX with one paragraph per entry
pub fn build_docx(paragraphs: &[&str]) -> Vec<u8> {
    use docx_rs::{Docx, Paragraph, Run};

    let docx = paragraphs.iter().fold(Docx::new(), |docx, text| {
        docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(*text)))
    });
    let mut cursor = std::io::Cursor::new(Vec::new());
    docx.build().pack(&mut cursor).expect("docx packs");
    cursor.into_inner()
}

pub fn txt(name: &str, text: &str) -> (String, Vec<u8>) {
    (name.to_string(), text.as_bytes().to_vec())
}
