//! Answer generation with language-aware prompts and citations

pub mod citation;
pub mod generator;
pub mod language;
pub mod prompt;

pub use citation::{build_citations, truncate_snippet};
pub use generator::{AnswerGenerator, GeneratedAnswer};
pub use language::{detect_answer_language, detect_language, Language};
pub use prompt::{PromptBuilder, NO_OUTPUT};
