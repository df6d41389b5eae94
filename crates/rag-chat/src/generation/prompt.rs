//! Prompt templates for answering, re-ranking and extraction

use crate::types::{ChunkSource, RetrievedContext};

use super::language::Language;

/// Reply the extraction prompt asks for when nothing in a passage is relevant
pub const NO_OUTPUT: &str = "NO_OUTPUT";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Numbered context blocks in the order the generator should see them
    pub fn build_context(context: &RetrievedContext) -> String {
        let mut out = String::new();

        for (i, scored) in context.iter().enumerate() {
            out.push_str(&format!(
                "[{}] {}\n\nContent:\n{}\n\n---\n\n",
                i + 1,
                Self::format_source_ref(&scored.chunk.source),
                scored.chunk.content
            ));
        }

        out
    }

    /// Format source reference for context
    pub fn format_source_ref(source: &ChunkSource) -> String {
        let mut parts = vec![source.format_citation()];

        if let Some(paragraph) = source.paragraph_number {
            parts.push(format!("Paragraph {}", paragraph));
        }
        if let Some(url) = &source.url {
            if *url != source.title {
                parts.push(url.clone());
            }
        }

        parts.join(", ")
    }

    /// Full answer prompt in the detected language
    pub fn build_answer_prompt(question: &str, context: &str, language: Language) -> String {
        match language {
            Language::English => format!(
                r#"You are an AI assistant that answers questions based on the provided context.
Always provide accurate answers based on the context and include source references when possible.

Context:
{context}
Question: {question}

Instructions:
1. Answer the question based on the provided context
2. Be accurate and concise
3. If the context doesn't contain enough information to answer the question fully, say so
4. Reference specific documents or pages when relevant, using the [n] numbers above
5. Respond in English

Answer:"#
            ),
            Language::Vietnamese => format!(
                r#"Bạn là một trợ lý AI hỗ trợ. Sử dụng ngữ cảnh được cung cấp để trả lời câu hỏi.
Nếu câu trả lời không có trong ngữ cảnh, hãy nói "Tôi không biết".
Luôn trả lời bằng tiếng Việt và tham khảo các nguồn cụ thể khi có thể.

Ngữ cảnh:
{context}
Câu hỏi:
{question}

Hướng dẫn:
1. Trả lời câu hỏi dựa trên ngữ cảnh được cung cấp
2. Hãy chính xác và ngắn gọn
3. Nếu ngữ cảnh không chứa đủ thông tin để trả lời đầy đủ câu hỏi, hãy nói rõ
4. Tham khảo các tài liệu hoặc trang cụ thể khi có liên quan, dùng số [n] ở trên
5. Trả lời bằng tiếng Việt

Trả lời:"#
            ),
        }
    }

    /// Answer returned without calling the model when the collection is empty
    pub fn empty_index_answer(language: Language) -> &'static str {
        match language {
            Language::English => {
                "No documents are available to answer this question. Upload documents with this embedding model first."
            }
            Language::Vietnamese => {
                "Không có tài liệu nào để trả lời câu hỏi này. Hãy tải tài liệu lên với mô hình nhúng này trước."
            }
        }
    }

    /// Ask for one 0-10 relevance score per passage, as a JSON array
    pub fn build_rerank_prompt(query: &str, passages: &[&str]) -> String {
        let mut listing = String::new();
        for (i, passage) in passages.iter().enumerate() {
            listing.push_str(&format!("Passage {}:\n{}\n\n", i + 1, passage));
        }

        format!(
            r#"Rate how relevant each passage is to the query on a scale from 0 (irrelevant) to 10 (directly answers it).

Query: {query}

{listing}Reply with only a JSON array of {count} numbers, one score per passage in the order given, for example [7, 2, 9].

Scores:"#,
            count = passages.len()
        )
    }

    /// Ask for the sentences of `passage` that help answer `query`, copied verbatim
    pub fn build_compression_prompt(query: &str, passage: &str) -> String {
        format!(
            r#"Given the following question and context, extract any part of the context *AS IS* that is relevant to answer the question. If none of the context is relevant return {NO_OUTPUT}.

Remember, *DO NOT* edit the extracted parts of the context.

> Question: {query}
> Context:
>>>
{passage}
>>>
Extracted relevant parts:"#
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, EmbeddingModel, FileType, ScoredChunk};
    use uuid::Uuid;

    fn scored(title: &str, page: Option<u32>, text: &str) -> ScoredChunk {
        let source = ChunkSource {
            title: title.to_string(),
            path: title.to_string(),
            file_type: FileType::Pdf,
            page_number: page,
            page_estimated: false,
            paragraph_number: None,
            url: None,
            embedding_model: EmbeddingModel::default(),
        };
        ScoredChunk::new(Chunk::new(Uuid::new_v4(), text.to_string(), source, 0, text.len(), 0), 0.9)
    }

    #[test]
    fn test_build_context_numbers_blocks_in_order() {
        let context = RetrievedContext::new(vec![
            scored("policy.pdf", Some(2), "Refunds within 30 days."),
            scored("faq.pdf", None, "Shipping is free."),
        ]);
        let text = PromptBuilder::build_context(&context);

        let first = text.find("[1] policy.pdf, Page 2").unwrap();
        let second = text.find("[2] faq.pdf").unwrap();
        assert!(first < second);
        assert!(text.contains("Refunds within 30 days."));
    }

    #[test]
    fn test_answer_prompt_language() {
        let en = PromptBuilder::build_answer_prompt("Q?", "ctx", Language::English);
        assert!(en.contains("Respond in English"));
        assert!(en.contains("Question: Q?"));

        let vi = PromptBuilder::build_answer_prompt("Q?", "ctx", Language::Vietnamese);
        assert!(vi.contains("Trả lời bằng tiếng Việt"));
    }

    #[test]
    fn test_rerank_prompt_lists_passages() {
        let prompt = PromptBuilder::build_rerank_prompt("refunds", &["a", "b", "c"]);
        assert!(prompt.contains("Passage 3:\nc"));
        assert!(prompt.contains("JSON array of 3 numbers"));
    }

    #[test]
    fn test_compression_prompt_mentions_sentinel() {
        let prompt = PromptBuilder::build_compression_prompt("refunds", "Some passage");
        assert!(prompt.contains(NO_OUTPUT));
        assert!(prompt.contains("Some passage"));
    }
}
