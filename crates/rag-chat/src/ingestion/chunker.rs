//! Text chunking with page and position tracking

use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, ChunkSource, Document};

use super::parser::{PageContent, ParsedDocument};

/// Text chunker with configurable size and overlap
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in bytes of UTF-8 text
    chunk_size: usize,
    /// Overlap between chunks
    overlap: usize,
    /// Minimum chunk size; smaller trailing fragments are dropped
    min_size: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            min_size: 20,
        }
    }

    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap).with_min_size(config.min_chunk_size)
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }

    /// Chunk a parsed document page by page, so every chunk keeps its page number
    pub fn chunk_document(&self, doc: &Document, parsed: &ParsedDocument) -> Vec<Chunk> {
        let mut chunks = Vec::new();

        for page in &parsed.pages {
            for (start, end) in self.chunk_spans(&page.content) {
                let text = page.content[start..end].trim();
                if text.is_empty() {
                    continue;
                }

                let source = self.create_source(doc, parsed, page, start);
                chunks.push(Chunk::new(
                    doc.id,
                    text.to_string(),
                    source,
                    page.char_offset + start,
                    page.char_offset + end,
                    chunks.len() as u32,
                ));
            }
        }

        chunks
    }

    /// Byte ranges of chunks within `text`.
    ///
    /// Ranges follow sentence boundaries; consecutive ranges overlap by up to
    /// `overlap` bytes, starting at a sentence or word boundary when possible.
    pub fn chunk_spans(&self, text: &str) -> Vec<(usize, usize)> {
        let mut spans = Vec::new();
        let mut start = 0usize;
        let mut end = 0usize;

        for (offset, unit) in self.split_units(text) {
            let unit_end = offset + unit.len();
            if end > start && unit_end - start > self.chunk_size {
                spans.push((start, end));
                let next = self.overlap_start(text, start, end);
                start = if next > start { next } else { end };
            }
            end = unit_end;
        }

        if end > start {
            spans.push((start, end));
        }

        // Drop short fragments unless they are all the text there is
        if spans.len() > 1 {
            spans.retain(|(s, e)| text[*s..*e].trim().len() >= self.min_size);
        }
        spans
    }

    /// Sentences, with any sentence longer than a chunk split at word boundaries
    fn split_units<'a>(&self, text: &'a str) -> Vec<(usize, &'a str)> {
        let mut units = Vec::new();
        for (offset, sentence) in text.split_sentence_bound_indices() {
            if sentence.len() <= self.chunk_size {
                units.push((offset, sentence));
                continue;
            }

            let mut piece_start = 0usize;
            let mut piece_end = 0usize;
            for (word_offset, word) in sentence.split_word_bound_indices() {
                let word_end = word_offset + word.len();
                if piece_end > piece_start && word_end - piece_start > self.chunk_size {
                    units.push((offset + piece_start, &sentence[piece_start..piece_end]));
                    piece_start = piece_end;
                }
                piece_end = word_end;
            }
            if piece_end > piece_start {
                units.push((offset + piece_start, &sentence[piece_start..piece_end]));
            }
        }
        units
    }

    /// Start of the overlap carried from the chunk `start..end` into the next one
    fn overlap_start(&self, text: &str, start: usize, end: usize) -> usize {
        if self.overlap == 0 {
            return end;
        }

        let mut candidate = end.saturating_sub(self.overlap).max(start);
        while candidate < end && !text.is_char_boundary(candidate) {
            candidate += 1;
        }

        let tail = &text[candidate..end];

        // Try to start at a sentence boundary
        if let Some(pos) = tail.find(". ") {
            return candidate + pos + 2;
        }

        // Fall back to word boundary
        if let Some(pos) = tail.find(' ') {
            return candidate + pos + 1;
        }

        candidate
    }

    /// Create source information for a chunk starting at `offset` within `page`
    fn create_source(
        &self,
        doc: &Document,
        parsed: &ParsedDocument,
        page: &PageContent,
        offset: usize,
    ) -> ChunkSource {
        ChunkSource {
            title: doc.title.clone(),
            path: doc.source.clone(),
            file_type: doc.file_type,
            page_number: page.page_number,
            page_estimated: page.estimated,
            paragraph_number: page.paragraph_at(offset),
            url: parsed.url.clone(),
            embedding_model: doc.embedding_model,
        }
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::parser::FileParser;
    use crate::types::{EmbeddingModel, FileType};

    fn document(parsed: &ParsedDocument) -> Document {
        Document::new(
            parsed.title.clone(),
            "policy.txt".to_string(),
            parsed.file_type,
            EmbeddingModel::default(),
            parsed.content_hash.clone(),
        )
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunker = TextChunker::new(500, 50);
        let spans = chunker.chunk_spans("Just one short line.");
        assert_eq!(spans, vec![(0, 20)]);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let sentence = "The refund window is thirty days from delivery. ";
        let text = sentence.repeat(40);
        let chunker = TextChunker::new(200, 50);
        let spans = chunker.chunk_spans(&text);

        assert!(spans.len() > 5);
        for pair in spans.windows(2) {
            let (s0, e0) = pair[0];
            let (s1, _) = pair[1];
            assert!(s1 > s0, "chunks advance");
            assert!(s1 <= e0, "consecutive chunks overlap or touch");
        }
        for (s, e) in &spans {
            assert!(e - s <= 200 + 50);
        }
        assert_eq!(spans.last().map(|s| s.1), Some(text.len()));
    }

    #[test]
    fn test_long_sentence_split_on_words() {
        let text = "word ".repeat(300);
        let chunker = TextChunker::new(100, 10);
        let spans = chunker.chunk_spans(&text);
        assert!(spans.len() >= 15);
        assert!(spans.iter().all(|(s, e)| e - s <= 110));
    }

    #[test]
    fn test_multibyte_text_does_not_panic() {
        let text = "Chính sách hoàn tiền áp dụng trong ba mươi ngày. ".repeat(30);
        let chunker = TextChunker::new(120, 30);
        let spans = chunker.chunk_spans(&text);
        for (s, e) in spans {
            assert!(text.is_char_boundary(s) && text.is_char_boundary(e));
        }
    }

    #[test]
    fn test_chunk_document_tracks_source() {
        let parsed = FileParser::parse("policy.txt", "Refunds are accepted within 30 days of delivery.".as_bytes()).unwrap();
        let doc = document(&parsed);
        let chunks = TextChunker::default().chunk_document(&doc, &parsed);

        assert_eq!(chunks.len(), 1);
        let chunk = &chunks[0];
        assert_eq!(chunk.document_id, doc.id);
        assert_eq!(chunk.chunk_index, 0);
        assert_eq!(chunk.source.file_type, FileType::Txt);
        assert_eq!(chunk.source.page_number, Some(1));
        assert_eq!(chunk.source.title, "policy.txt");
        assert!(chunk.embedding.is_empty());
    }

    #[test]
    fn test_chunk_indices_continue_across_pages() {
        let parsed = ParsedDocument::from_pages(
            FileType::Pdf,
            "handbook.pdf".to_string(),
            vec![
                PageContent {
                    page_number: Some(1),
                    estimated: false,
                    content: "First page talks about onboarding.".to_string(),
                    char_offset: 0,
                    paragraphs: Vec::new(),
                },
                PageContent {
                    page_number: Some(2),
                    estimated: false,
                    content: "Second page covers vacation policy.".to_string(),
                    char_offset: 0,
                    paragraphs: Vec::new(),
                },
            ],
            Some(2),
        );
        let doc = document(&parsed);
        let chunks = TextChunker::default().chunk_document(&doc, &parsed);

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chunk_index, 1);
        assert_eq!(chunks[1].source.page_number, Some(2));
        assert_eq!(&parsed.content[chunks[1].char_start..chunks[1].char_end], chunks[1].content);
    }
}
