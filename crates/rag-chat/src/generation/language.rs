//! Answer language detection (English or Vietnamese)

use serde::{Deserialize, Serialize};

use crate::types::RetrievedContext;

/// Languages the answer prompt is available in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    English,
    Vietnamese,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Vietnamese => "vietnamese",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Letters with diacritics only Vietnamese uses in this combination
const VIETNAMESE_CHARS: &str = "àáạảãâầấậẩẫăằắặẳẵèéẹẻẽêềếệểễìíịỉĩòóọỏõôồốộổỗơờớợởỡùúụủũưừứựửữỳýỵỷỹđ";

const VIETNAMESE_WORDS: &[&str] = &[
    "là", "của", "và", "trong", "có", "được", "với", "này", "cho", "từ", "một", "các", "người",
    "không", "tôi", "bạn", "gì", "như", "thế", "nào", "về", "khi", "đã", "sẽ", "để", "những", "sau",
    "theo", "cũng", "lại", "hay", "nhiều", "việc", "qua", "vào", "ra", "lên", "xuống", "trên",
    "dưới", "ngoài", "bên", "giữa", "cần", "phải", "nên", "sao", "đây", "đó", "kia", "bao", "mấy",
    "đâu", "ai", "cái", "con", "chiếc", "làm", "xem", "biết", "hiểu", "nói", "viết",
];

/// Question words and set phrases
const VIETNAMESE_PHRASES: &[&str] = &[
    "làm sao", "thế nào", "như thế nào", "ra sao", "là gì", "gì là", "cái gì", "ở đâu", "đâu là",
    "tại đâu", "khi nào", "lúc nào", "bao giờ", "tại sao", "vì sao", "sao lại", "có phải",
    "phải không", "đúng không",
];

/// Share of letters that must be Vietnamese-specific
const CHAR_RATIO: f32 = 0.05;
/// Share of words that must be common Vietnamese words
const WORD_RATIO: f32 = 0.10;

/// Detect whether `text` reads as Vietnamese; anything else is English
pub fn detect_language(text: &str) -> Language {
    let lower = text.to_lowercase();

    let letters = lower.chars().filter(|c| c.is_alphabetic()).count();
    if letters == 0 {
        return Language::English;
    }
    let marked = lower.chars().filter(|c| VIETNAMESE_CHARS.contains(*c)).count();
    if marked as f32 / letters as f32 > CHAR_RATIO {
        return Language::Vietnamese;
    }

    let normalized: String = lower
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();
    if words.is_empty() {
        return Language::English;
    }

    let common = words.iter().filter(|w| VIETNAMESE_WORDS.contains(*w)).count();
    if common as f32 / words.len() as f32 > WORD_RATIO {
        return Language::Vietnamese;
    }

    let padded = format!(" {} ", words.join(" "));
    if VIETNAMESE_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
    {
        return Language::Vietnamese;
    }

    Language::English
}

/// Language for the answer: the query's, unless the leading context chunks are Vietnamese
pub fn detect_answer_language(query: &str, context: &RetrievedContext) -> Language {
    let from_query = detect_language(query);
    if context.is_empty() {
        return from_query;
    }

    let sample = context
        .iter()
        .take(3)
        .map(|c| c.chunk.content.chars().take(200).collect::<String>())
        .collect::<Vec<_>>()
        .join(" ");

    match detect_language(&sample) {
        Language::Vietnamese => Language::Vietnamese,
        Language::English => from_query,
    }
}
