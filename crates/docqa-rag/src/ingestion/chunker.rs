//! Paragraph-first text chunking with exact character overlap

use unicode_segmentation::UnicodeSegmentation;

use crate::error::{Error, Result};

/// Text chunker with configurable size and overlap.
///
/// Splits paragraph-first, falling back to sentence, word, and finally hard
/// character boundaries, then assembles passages greedily while carrying the
/// last `overlap` characters of each passage as the prefix of the next.
///
/// Guarantees, all measured in characters:
/// - every passage length is in `[1, chunk_size]`
/// - consecutive passages share a suffix/prefix of exactly
///   `min(overlap, len(previous))`
/// - concatenating the non-overlapped parts reproduces the input modulo
///   inter-paragraph whitespace
#[derive(Debug, Clone)]
pub struct TextChunker {
    chunk_size: usize,
    overlap: usize,
}

/// A splitting unit: a paragraph, or a piece of one when it exceeds the cap.
struct Unit {
    text: String,
    /// First unit of a paragraph; separated from the previous unit by a blank line
    fresh: bool,
}

impl TextChunker {
    /// Create a new chunker. Requires `chunk_size > overlap`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::validation(format!(
                "chunk_size ({}) must be greater than chunk_overlap ({})",
                chunk_size, overlap
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    /// Split `text` into overlapping passages. Empty or whitespace-only input
    /// produces no passages.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        // Units are capped below chunk_size so that a passage starting with
        // the overlap carry still fits the chunk_size bound.
        let unit_cap = self.chunk_size - self.overlap;

        let mut units = Vec::new();
        for paragraph in text.split("\n\n") {
            let paragraph = paragraph.trim();
            if paragraph.is_empty() {
                continue;
            }
            let mut fresh = true;
            for piece in split_to_cap(paragraph, unit_cap) {
                units.push(Unit { text: piece, fresh });
                fresh = false;
            }
        }

        let mut passages: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut current_chars = 0usize;
        let mut carry_chars = 0usize;

        for unit in units {
            let unit_chars = char_len(&unit.text);
            // Blank line before a new paragraph, but never directly after the
            // overlap carry: the carry already glues the passages together.
            let wants_separator = unit.fresh && current_chars > carry_chars;
            let sep_chars = if wants_separator { 2 } else { 0 };

            if !current.is_empty() && current_chars + sep_chars + unit_chars > self.chunk_size {
                let carry = suffix_chars(&current, self.overlap);
                carry_chars = char_len(&carry);
                passages.push(std::mem::replace(&mut current, carry));
                current_chars = carry_chars;
                current.push_str(&unit.text);
                current_chars += unit_chars;
            } else {
                if wants_separator && !current.is_empty() {
                    current.push_str("\n\n");
                    current_chars += 2;
                }
                current.push_str(&unit.text);
                current_chars += unit_chars;
            }
        }

        if current_chars > carry_chars {
            passages.push(current);
        }

        passages
    }

    /// Configured maximum passage length
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Configured overlap
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

/// Split a paragraph into pieces of at most `cap` characters, preferring
/// sentence boundaries, then word boundaries, then hard character windows.
fn split_to_cap(paragraph: &str, cap: usize) -> Vec<String> {
    if char_len(paragraph) <= cap {
        return vec![paragraph.to_string()];
    }

    let mut pieces = Vec::new();
    for sentence in paragraph.split_sentence_bounds() {
        if char_len(sentence) <= cap {
            pieces.push(sentence.to_string());
            continue;
        }

        // Sentence exceeds the cap: accumulate word-bound segments.
        let mut piece = String::new();
        let mut piece_chars = 0usize;
        for word in sentence.split_word_bounds() {
            let word_chars = char_len(word);
            if word_chars > cap {
                if !piece.is_empty() {
                    pieces.push(std::mem::take(&mut piece));
                    piece_chars = 0;
                }
                pieces.extend(hard_split(word, cap));
                continue;
            }
            if piece_chars + word_chars > cap {
                pieces.push(std::mem::take(&mut piece));
                piece_chars = 0;
            }
            piece.push_str(word);
            piece_chars += word_chars;
        }
        if !piece.is_empty() {
            pieces.push(piece);
        }
    }

    pieces
}

/// Hard-split a string into windows of at most `cap` characters
fn hard_split(text: &str, cap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(cap)
        .map(|window| window.iter().collect())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s` (the whole string when shorter)
fn suffix_chars(s: &str, n: usize) -> String {
    let len = char_len(s);
    if len <= n {
        return s.to_string();
    }
    s.chars().skip(len - n).collect()
}
