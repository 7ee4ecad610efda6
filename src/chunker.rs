//! C3 — Text Chunker.
//!
//! Splits narrative chapter text into synthesis-sized [`TextChunk`]s that
//! respect sentence and clause boundaries, after a typographic
//! normalization pass and an optional metadata-line pre-clean
//! (SPEC_FULL §10.5, grounded on `TextCleaner`).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::book::Chapter;

const DEFAULT_MAX_CHARS: usize = 400;
const MIN_CATALOG_BLOCK_LEN: usize = 200;

static RE_HYPHEN_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\w+)-\s*\n\s*(\w+)").unwrap());
static RE_ISBN_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^.*ISBN[-:\s]*\d{10,13}.*$").unwrap());
static RE_CATALOG_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)(?:[A-Z][A-Za-z\s]{10,60}\s*){5,}").unwrap());

/// A single synthesis-sized fragment of narrative text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChunk {
    pub index: usize,
    pub text: String,
    pub chapter_index: usize,
}

/// Options controlling chunking behavior. `max_chars` is the only
/// audio-affecting knob here; the rest are cosmetic pre-clean toggles
/// (not part of [`crate::settings::Settings::fingerprint`] since they
/// only change which characters reach the synthesizer, not in a way the
/// fingerprint already doesn't cover via `chunk_max_chars`).
#[derive(Debug, Clone, Copy)]
pub struct ChunkOptions {
    pub max_chars: usize,
    pub fix_broken_words: bool,
    pub remove_metadata_lines: bool,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        ChunkOptions {
            max_chars: DEFAULT_MAX_CHARS,
            fix_broken_words: true,
            remove_metadata_lines: true,
        }
    }
}

/// Stateless text chunker.
#[derive(Debug, Default, Clone, Copy)]
pub struct Chunker;

impl Chunker {
    pub fn new() -> Self {
        Chunker
    }

    /// Chunk every chapter in order, assigning a single contiguous index
    /// space `0..N` across the whole book (§4.3). Returns the chunks
    /// plus, implicitly via [`TextChunk::chapter_index`], the
    /// chunk-to-chapter mapping the orchestrator needs for chapter
    /// metadata emission.
    pub fn chunk_book(&self, chapters: &[Chapter], options: ChunkOptions) -> Vec<TextChunk> {
        let mut chunks = Vec::new();
        let mut next_index = 0usize;
        for (chapter_index, chapter) in chapters.iter().enumerate() {
            let cleaned = self.preprocess(&chapter.content, options);
            for text in split_into_chunks(&cleaned, options.max_chars) {
                chunks.push(TextChunk {
                    index: next_index,
                    text,
                    chapter_index,
                });
                next_index += 1;
            }
        }
        chunks
    }

    /// Normalize typography, then optionally fix hyphenated line breaks
    /// and strip ISBN/catalog metadata lines (§4.3, SPEC_FULL §10.5).
    pub fn preprocess(&self, text: &str, options: ChunkOptions) -> String {
        let mut text = normalize_typography(text);
        if options.fix_broken_words {
            text = RE_HYPHEN_BREAK.replace_all(&text, "$1$2").into_owned();
        }
        if options.remove_metadata_lines {
            text = remove_metadata_lines(&text);
        }
        text
    }
}

/// Non-breaking space → space, en/em dash → hyphen, curly quotes →
/// straight quotes. Applied before chunking because it materially
/// affects synthesizer pronunciation (§4.3).
fn normalize_typography(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{00a0}' => ' ',
            '\u{2013}' | '\u{2014}' => '-',
            '\u{2018}' | '\u{2019}' | '\u{201a}' | '\u{201b}' => '\'',
            '\u{201c}' | '\u{201d}' | '\u{201e}' | '\u{201f}' => '"',
            other => other,
        })
        .collect()
}

fn remove_metadata_lines(text: &str) -> String {
    let text = RE_ISBN_LINE.replace_all(text, "");
    let mut result = text.into_owned();
    let matches: Vec<String> = RE_CATALOG_BLOCK
        .find_iter(&result)
        .map(|m| m.as_str().to_string())
        .filter(|s| s.len() > MIN_CATALOG_BLOCK_LEN)
        .collect();
    for block in matches {
        result = result.replacen(&block, "", 1);
    }
    result
}

/// Split `text` into chunks of at most `max_chars` characters, preferring
/// sentence terminators, then clause boundaries, then whitespace, in
/// that order (§4.3). Never emits an empty chunk and never splits inside
/// a word: a single word longer than `max_chars` is emitted whole as one
/// over-length chunk rather than cut mid-character.
fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let normalized = collapse_whitespace(text.trim());
    if normalized.is_empty() {
        return Vec::new();
    }

    let chars: Vec<char> = normalized.chars().collect();
    let mut chunks = Vec::new();
    let mut pos = 0usize;

    while pos < chars.len() {
        let remaining = chars.len() - pos;
        if remaining <= max_chars {
            let piece: String = chars[pos..].iter().collect();
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
            break;
        }

        let window_end = pos + max_chars;
        let split_at = find_sentence_boundary(&chars, pos, window_end)
            .or_else(|| find_clause_boundary(&chars, pos, window_end))
            .or_else(|| find_whitespace_boundary(&chars, pos, window_end))
            .unwrap_or_else(|| find_forward_whitespace(&chars, window_end));

        let piece: String = chars[pos..split_at].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        pos = skip_leading_whitespace(&chars, split_at).max(split_at);
    }

    chunks
}

/// Last `. ` / `! ` / `? ` followed by whitespace and a capital letter,
/// at or before `window_end`.
fn find_sentence_boundary(chars: &[char], start: usize, window_end: usize) -> Option<usize> {
    let end = window_end.min(chars.len());
    let mut best = None;
    let mut i = start;
    while i + 1 < end {
        if matches!(chars[i], '.' | '!' | '?') && chars[i + 1].is_whitespace() {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && chars[j].is_uppercase() && j <= end {
                best = Some(i + 1);
            }
        }
        i += 1;
    }
    best
}

/// Last `;`, `:`, or `,` at or before `window_end`.
fn find_clause_boundary(chars: &[char], start: usize, window_end: usize) -> Option<usize> {
    let end = window_end.min(chars.len());
    let mut best = None;
    for i in start..end {
        if matches!(chars[i], ';' | ':' | ',') {
            best = Some(i + 1);
        }
    }
    best
}

/// Nearest whitespace at or before `window_end`, so the split never lands
/// inside a word.
fn find_whitespace_boundary(chars: &[char], start: usize, window_end: usize) -> Option<usize> {
    let end = window_end.min(chars.len());
    for i in (start..end).rev() {
        if chars[i].is_whitespace() {
            return Some(i);
        }
    }
    None
}

/// When no boundary exists within the window at all (a single word
/// longer than `max_chars`), search forward past `window_end` for the
/// next whitespace, or the end of the text, rather than cutting the
/// word in half. This emits one over-length chunk instead of violating
/// the "never splits inside a word" invariant (§3, §8).
fn find_forward_whitespace(chars: &[char], window_end: usize) -> usize {
    let mut i = window_end.min(chars.len());
    while i < chars.len() && !chars[i].is_whitespace() {
        i += 1;
    }
    i
}

fn skip_leading_whitespace(chars: &[char], mut pos: usize) -> usize {
    while pos < chars.len() && chars[pos].is_whitespace() {
        pos += 1;
    }
    pos
}

fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_space = false;
    for c in text.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                result.push(' ');
            }
            last_was_space = true;
        } else {
            result.push(c);
            last_was_space = false;
        }
    }
    result
}
