//! Text extraction for the supported file types

use crate::error::{Error, Result};
use crate::types::FileType;

/// Extracted text with content metadata
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    /// Extracted text content
    pub content: String,
    /// Character count of the extracted text
    pub character_count: u64,
    /// Whitespace-delimited word count
    pub word_count: u64,
    /// Page count for paginated formats
    pub page_count: Option<u32>,
}

/// File parser for the {txt, pdf} allow-list
pub struct FileParser;

impl FileParser {
    /// Extract text from raw file bytes
    pub fn parse(file_type: FileType, data: &[u8]) -> Result<ParsedDocument> {
        match file_type {
            FileType::Txt => Self::parse_text(data),
            FileType::Pdf => Self::parse_pdf(data),
        }
    }

    fn parse_text(data: &[u8]) -> Result<ParsedDocument> {
        let content = match std::str::from_utf8(data) {
            Ok(text) => text.to_string(),
            // Non-UTF-8 text files are accepted with replacement characters
            Err(_) => String::from_utf8_lossy(data).into_owned(),
        };

        Ok(Self::with_counts(content, None))
    }

    fn parse_pdf(data: &[u8]) -> Result<ParsedDocument> {
        let content = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::parse(format!("pdf extraction failed: {}", e)))?;

        // pdf-extract separates pages with form feeds
        let page_breaks = content.matches('\u{c}').count() as u32;
        let page_count = Some(page_breaks + 1);

        Ok(Self::with_counts(content, page_count))
    }

    fn with_counts(content: String, page_count: Option<u32>) -> ParsedDocument {
        let character_count = content.chars().count() as u64;
        let word_count = content.split_whitespace().count() as u64;
        ParsedDocument {
            content,
            character_count,
            word_count,
            page_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_parse_counts() {
        let parsed = FileParser::parse(FileType::Txt, b"hello wide world\nsecond line").unwrap();
        assert_eq!(parsed.character_count, 28);
        assert_eq!(parsed.word_count, 5);
        assert_eq!(parsed.page_count, None);
        assert_eq!(parsed.content, "hello wide world\nsecond line");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let parsed = FileParser::parse(FileType::Txt, &[0x68, 0x69, 0xff, 0x21]).unwrap();
        assert!(parsed.content.starts_with("hi"));
        assert!(parsed.content.ends_with('!'));
    }

    #[test]
    fn broken_pdf_is_a_parse_error() {
        let result = FileParser::parse(FileType::Pdf, b"not a pdf at all");
        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
