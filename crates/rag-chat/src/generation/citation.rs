//! Citation building from the final context

use crate::types::{Citation, RetrievedContext};

/// Longest snippet shown with a citation, in bytes before the ellipsis
pub const SNIPPET_LEN: usize = 200;

/// One citation per context chunk, in context order
pub fn build_citations(context: &RetrievedContext) -> Vec<Citation> {
    context
        .iter()
        .map(|scored| Citation::from_scored(scored, truncate_snippet(&scored.chunk.content, SNIPPET_LEN)))
        .collect()
}

/// Truncate snippet to a maximum length while preserving word boundaries
pub fn truncate_snippet(snippet: &str, max_len: usize) -> String {
    if snippet.len() <= max_len {
        return snippet.to_string();
    }

    let mut end = max_len;
    while end > 0 && !snippet.is_char_boundary(end) {
        end -= 1;
    }

    // Try to end at a word boundary
    if let Some(pos) = snippet[..end].rfind(' ') {
        return format!("{}...", &snippet[..pos]);
    }

    format!("{}...", &snippet[..end])
}
