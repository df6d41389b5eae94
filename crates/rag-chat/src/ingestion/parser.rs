//! Multi-format file parser

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::types::FileType;

/// DOCX has no layout information; pages are estimated at roughly 500 words each
pub const DOCX_CHARS_PER_PAGE: usize = 3000;

/// Fallback title for HTML files without a `<title>`
const UNTITLED_HTML: &str = "Untitled HTML Document";

/// Typographic characters folded to ASCII after glyph decoding
const ASCII_FOLDS: &[(char, &str)] = &[
    ('\u{2010}', "-"),
    ('\u{2011}', "-"),
    ('\u{2012}', "-"),
    ('\u{2013}', "-"),
    ('\u{2014}', "--"),
    ('\u{2018}', "'"),
    ('\u{2019}', "'"),
    ('\u{201A}', "'"),
    ('\u{201C}', "\""),
    ('\u{201D}', "\""),
    ('\u{201E}', "\""),
    ('\u{2022}', "* "),
    ('\u{2026}', "..."),
    ('\u{00A0}', " "),
    ('\u{2002}', " "),
    ('\u{2003}', " "),
    ('\u{2009}', " "),
    ('\u{2212}', "-"),
    ('\u{FB00}', "ff"),
    ('\u{FB01}', "fi"),
    ('\u{FB02}', "fl"),
    ('\u{FB03}', "ffi"),
    ('\u{FB04}', "ffl"),
];

/// Matches glyph names such as `uni2019`, `(uni2019)` or `<uni2019>` leaked by PDF fonts
fn glyph_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"[(<]?\buni([0-9A-F]{4})\b[)>]?").ok())
        .as_ref()
}

/// Clean up PDF text: decode leaked glyph names, fold typography, drop blank lines
pub(crate) fn cleanup_pdf_text(text: &str) -> String {
    let decoded = match glyph_pattern() {
        Some(pattern) => pattern.replace_all(text, |caps: &regex::Captures<'_>| {
            u32::from_str_radix(&caps[1], 16)
                .ok()
                .and_then(char::from_u32)
                .map(String::from)
                .unwrap_or_default()
        }),
        None => std::borrow::Cow::Borrowed(text),
    };

    let mut folded = String::with_capacity(decoded.len());
    for ch in decoded.chars() {
        match ASCII_FOLDS.iter().find(|(from, _)| *from == ch) {
            Some((_, to)) => folded.push_str(to),
            None if ch == '\0' => {}
            None => folded.push(ch),
        }
    }

    folded
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parsed document with extracted text and layout metadata
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// File type
    pub file_type: FileType,
    /// Title for citations
    pub title: String,
    /// Extracted text content (pages joined)
    pub content: String,
    /// SHA-256 of `content`, for deduplication
    pub content_hash: String,
    /// Total pages (if applicable)
    pub total_pages: Option<u32>,
    /// Page-level content in reading order
    pub pages: Vec<PageContent>,
    /// Origin URL for fetched pages
    pub url: Option<String>,
}

/// Text from one page, or from the whole document when it has no pages
#[derive(Debug, Clone)]
pub struct PageContent {
    /// Page number (1-indexed); `None` for web content
    pub page_number: Option<u32>,
    /// True when the number is derived from text length
    pub estimated: bool,
    /// Text content of the page
    pub content: String,
    /// Byte offset of this page in `ParsedDocument::content`
    pub char_offset: usize,
    /// Paragraph starts within `content`, for DOCX
    pub paragraphs: Vec<ParagraphMark>,
}

impl PageContent {
    fn single(page_number: Option<u32>, content: String) -> Self {
        Self {
            page_number,
            estimated: false,
            content,
            char_offset: 0,
            paragraphs: Vec::new(),
        }
    }

    /// Paragraph containing byte `offset` of this page
    pub fn paragraph_at(&self, offset: usize) -> Option<u32> {
        self.paragraphs
            .iter()
            .take_while(|p| p.offset <= offset)
            .last()
            .map(|p| p.number)
    }
}

/// Start of a paragraph within a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParagraphMark {
    /// Paragraph number in the document (1-indexed, empty paragraphs counted)
    pub number: u32,
    /// Byte offset within the page text
    pub offset: usize,
}

impl ParsedDocument {
    /// Assemble a document from its pages, computing offsets and the content hash
    pub(crate) fn from_pages(
        file_type: FileType,
        title: String,
        mut pages: Vec<PageContent>,
        total_pages: Option<u32>,
    ) -> Self {
        let mut content = String::new();
        for page in &mut pages {
            if !content.is_empty() {
                content.push_str("\n\n");
            }
            page.char_offset = content.len();
            content.push_str(&page.content);
        }

        Self {
            file_type,
            title,
            content_hash: hash_content(&content),
            content,
            total_pages,
            pages,
            url: None,
        }
    }

    /// True when no page carries any text
    pub fn is_empty(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// Multi-format file parser
pub struct FileParser;

impl FileParser {
    /// Parse a file based on its extension
    pub fn parse(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let file_type = FileType::from_filename(filename)?;

        let parsed = match file_type {
            FileType::Pdf => Self::parse_pdf(filename, data)?,
            FileType::Docx => Self::parse_docx(filename, data)?,
            FileType::Doc => Self::parse_doc(filename, data),
            FileType::Txt => Self::parse_text(filename, data),
            FileType::Html => Self::parse_html(data),
            FileType::Url => {
                return Err(Error::UnsupportedFormat(
                    "web pages are ingested by URL, not by upload".to_string(),
                ))
            }
        };

        if parsed.is_empty() {
            return Err(Error::EmptyDocument(filename.to_string()));
        }

        tracing::debug!(
            filename,
            file_type = ?parsed.file_type,
            pages = parsed.pages.len(),
            chars = parsed.content.len(),
            "Parsed file"
        );
        Ok(parsed)
    }

    /// Parse PDF page by page, falling back to whole-document extraction
    fn parse_pdf(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let title = file_title(filename);

        match lopdf::Document::load_mem(data) {
            Ok(doc) => {
                let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
                let total_pages = page_numbers.len() as u32;

                let mut pages = Vec::new();
                for number in &page_numbers {
                    match doc.extract_text(&[*number]) {
                        Ok(text) => {
                            let text = cleanup_pdf_text(&text);
                            if !text.is_empty() {
                                pages.push(PageContent::single(Some(*number), text));
                            }
                        }
                        Err(e) => {
                            tracing::debug!(filename, page = number, "Could not extract page text: {}", e);
                        }
                    }
                }

                if !pages.is_empty() {
                    return Ok(ParsedDocument::from_pages(
                        FileType::Pdf,
                        title,
                        pages,
                        Some(total_pages),
                    ));
                }

                tracing::warn!(filename, "Per-page extraction found no text, trying pdf-extract");
                let text = Self::extract_pdf_whole(filename, data)?;
                Ok(ParsedDocument::from_pages(
                    FileType::Pdf,
                    title,
                    vec![PageContent::single(Some(1), text)],
                    Some(total_pages.max(1)),
                ))
            }
            Err(e) => {
                tracing::warn!(filename, "lopdf could not load PDF ({}), trying pdf-extract", e);
                let text = Self::extract_pdf_whole(filename, data)?;
                Ok(ParsedDocument::from_pages(
                    FileType::Pdf,
                    title,
                    vec![PageContent::single(Some(1), text)],
                    Some(1),
                ))
            }
        }
    }

    fn extract_pdf_whole(filename: &str, data: &[u8]) -> Result<String> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::file_parse(filename, format!("PDF text extraction failed: {}", e)))?;
        let text = cleanup_pdf_text(&text);
        if text.is_empty() {
            return Err(Error::file_parse(
                filename,
                "PDF appears to be image-based or has no extractable text",
            ));
        }
        Ok(text)
    }

    /// Parse DOCX paragraphs, grouping them into estimated pages
    fn parse_docx(filename: &str, data: &[u8]) -> Result<ParsedDocument> {
        let doc = docx_rs::read_docx(data).map_err(|e| Error::file_parse(filename, e.to_string()))?;

        let mut paragraphs = Vec::new();
        for child in doc.document.children {
            if let docx_rs::DocumentChild::Paragraph(p) = child {
                let mut text = String::new();
                for child in p.children {
                    if let docx_rs::ParagraphChild::Run(run) = child {
                        for child in run.children {
                            if let docx_rs::RunChild::Text(t) = child {
                                text.push_str(&t.text);
                            }
                        }
                    }
                }
                paragraphs.push(text);
            }
        }

        let pages = paginate_paragraphs(&paragraphs, DOCX_CHARS_PER_PAGE);
        let total_pages = pages.last().and_then(|p| p.page_number);
        Ok(ParsedDocument::from_pages(
            FileType::Docx,
            file_title(filename),
            pages,
            total_pages,
        ))
    }

    /// Legacy .doc: keep whatever printable text survives a lossy decode
    fn parse_doc(filename: &str, data: &[u8]) -> ParsedDocument {
        let text: String = String::from_utf8_lossy(data)
            .chars()
            .filter(|c| *c != char::REPLACEMENT_CHARACTER && (!c.is_control() || c.is_whitespace()))
            .collect();

        ParsedDocument::from_pages(
            FileType::Doc,
            file_title(filename),
            vec![PageContent::single(Some(1), text)],
            Some(1),
        )
    }

    /// Parse plain text
    fn parse_text(filename: &str, data: &[u8]) -> ParsedDocument {
        let text = String::from_utf8_lossy(data).into_owned();

        ParsedDocument::from_pages(
            FileType::Txt,
            file_title(filename),
            vec![PageContent::single(Some(1), text)],
            Some(1),
        )
    }

    /// Parse an HTML file, dropping script and style content
    fn parse_html(data: &[u8]) -> ParsedDocument {
        let html = String::from_utf8_lossy(data);
        let document = Html::parse_document(&html);

        let title = page_title(&document).unwrap_or_else(|| UNTITLED_HTML.to_string());
        let text = visible_lines(document.root_element(), &["script", "style", "head"]).join("\n");

        ParsedDocument::from_pages(
            FileType::Html,
            title,
            vec![PageContent::single(None, text)],
            None,
        )
    }
}

/// Split paragraphs into pages of roughly `chars_per_page`, recording paragraph starts.
///
/// A paragraph lands on the page its first character falls on.
fn paginate_paragraphs(paragraphs: &[String], chars_per_page: usize) -> Vec<PageContent> {
    let mut pages: Vec<PageContent> = Vec::new();
    let mut doc_offset = 0usize;

    for (index, text) in paragraphs.iter().enumerate() {
        let number = index as u32 + 1;
        let page_number = (doc_offset / chars_per_page) as u32 + 1;
        doc_offset += text.chars().count() + 1;

        if text.trim().is_empty() {
            continue;
        }

        let page = match pages.last_mut() {
            Some(page) if page.page_number == Some(page_number) => page,
            _ => {
                pages.push(PageContent {
                    page_number: Some(page_number),
                    estimated: true,
                    content: String::new(),
                    char_offset: 0,
                    paragraphs: Vec::new(),
                });
                let last = pages.len() - 1;
                &mut pages[last]
            }
        };

        if !page.content.is_empty() {
            page.content.push('\n');
        }
        page.paragraphs.push(ParagraphMark {
            number,
            offset: page.content.len(),
        });
        page.content.push_str(text);
    }

    pages
}

/// Title for non-HTML files: the file name without directories
fn file_title(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename)
        .to_string()
}

/// Contents of the `<title>` element, if present and non-blank
pub(crate) fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    document
        .select(&selector)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

/// True if `element` or any ancestor is one of `tags`
pub(crate) fn is_inside(element: ElementRef<'_>, tags: &[&str]) -> bool {
    std::iter::once(*element)
        .chain(element.ancestors())
        .filter_map(|node| node.value().as_element())
        .any(|e| tags.contains(&e.name()))
}

/// Trimmed, non-empty text nodes under `root`, skipping anything inside `skip` tags
pub(crate) fn visible_lines(root: ElementRef<'_>, skip: &[&str]) -> Vec<String> {
    root.descendants()
        .filter_map(|node| {
            let text = node.value().as_text()?;
            let hidden = node
                .ancestors()
                .filter_map(|a| a.value().as_element())
                .any(|e| skip.contains(&e.name()));
            if hidden {
                return None;
            }
            let trimmed = text.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .collect()
}

/// Hash content for deduplication
pub(crate) fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleanup_decodes_glyph_names() {
        let cleaned = cleanup_pdf_text("Don(uni2019)t stop\n\n  fine\u{FB01}ne  \n");
        assert_eq!(cleaned, "Don't stop\nfinefine");
    }

    #[test]
    fn test_cleanup_leaves_ordinary_words() {
        assert_eq!(cleanup_pdf_text("unicafe universe"), "unicafe universe");
    }

    #[test]
    fn test_parse_text() {
        let parsed = FileParser::parse("notes.txt", b"Refunds are accepted within 30 days.").unwrap();
        assert_eq!(parsed.file_type, FileType::Txt);
        assert_eq!(parsed.title, "notes.txt");
        assert_eq!(parsed.pages.len(), 1);
        assert_eq!(parsed.pages[0].page_number, Some(1));
        assert_eq!(parsed.content_hash.len(), 64);
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let err = FileParser::parse("data.xyz", b"abc").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::UnsupportedFormat);
        assert!(err.to_string().contains(".xyz"));
    }

    #[test]
    fn test_blank_text_is_empty_document() {
        let err = FileParser::parse("blank.txt", b"   \n\t ").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::EmptyDocument);
    }

    #[test]
    fn test_html_drops_scripts_and_reads_title() {
        let html = br#"<html><head><title> Policy </title><style>p{}</style></head>
            <body><script>var x = 1;</script><p>Returns take 30 days.</p><p>Keep receipts.</p></body></html>"#;
        let parsed = FileParser::parse("policy.html", html).unwrap();
        assert_eq!(parsed.title, "Policy");
        assert_eq!(parsed.content, "Returns take 30 days.\nKeep receipts.");
        assert_eq!(parsed.pages[0].page_number, None);
    }

    #[test]
    fn test_html_without_title() {
        let parsed = FileParser::parse("a.htm", b"<p>Hello there world</p>").unwrap();
        assert_eq!(parsed.title, UNTITLED_HTML);
    }

    #[test]
    fn test_doc_keeps_printable_text() {
        let mut data = vec![0u8, 1, 2, 0xFF];
        data.extend_from_slice(b"Legacy word text");
        let parsed = FileParser::parse("old.doc", &data).unwrap();
        assert_eq!(parsed.content, "Legacy word text");
    }

    #[test]
    fn test_paginate_paragraphs_estimates_pages() {
        let paragraphs = vec![
            "a".repeat(2000),
            String::new(),
            "b".repeat(2000),
            "c".repeat(10),
        ];
        let pages = paginate_paragraphs(&paragraphs, 3000);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, Some(1));
        assert!(pages[0].estimated);
        // paragraph 3 starts at char 2002, still page 1
        assert_eq!(pages[0].paragraphs.len(), 2);
        assert_eq!(pages[0].paragraphs[1].number, 3);
        assert_eq!(pages[1].page_number, Some(2));
        assert_eq!(pages[1].paragraphs[0].number, 4);
        assert_eq!(pages[0].paragraph_at(0), Some(1));
        assert_eq!(pages[0].paragraph_at(2500), Some(3));
    }

    #[test]
    fn test_from_pages_offsets() {
        let parsed = ParsedDocument::from_pages(
            FileType::Pdf,
            "t".into(),
            vec![
                PageContent::single(Some(1), "one".into()),
                PageContent::single(Some(2), "two".into()),
            ],
            Some(2),
        );
        assert_eq!(parsed.content, "one\n\ntwo");
        assert_eq!(parsed.pages[1].char_offset, 5);
    }
}
