//! C2 — Heading Detector.
//!
//! Tiered chapter detection over a block of extracted text: keep
//! parser-provided titles when they look real, otherwise fall back to
//! known section names and isolated title-like lines, and finally to
//! ALL-CAPS formatting cues. Runs only when [`ParsedBook::is_page_based`]
//! says the parser gave up on structure.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::book::{Chapter, ParsedBook};

const FACING_PAGE_BLOCK_SIZE: usize = 50;
const FACING_PAGE_SIMILARITY_THRESHOLD: f64 = 0.80;
const FACING_PAGE_SAMPLE_CHARS: usize = 500;

const MIN_HEADING_TIER_HITS: usize = 2;

static KNOWN_SECTIONS: Lazy<Regex> = Lazy::new(|| {
    let alternatives = [
        r"Translator'?s?\s+Note", r"Editor'?s?\s+Note", r"Author'?s?\s+Note",
        r"Preface", r"Foreword", r"Introduction", r"Prologue",
        r"A\s+Note\s+on\s+the\s+Text", r"Acknowledgm?ents?",
        r"Dedication",
        r"Part\s+[IVXLCDMivxlcdm\d]+(?:\s*[:\-—]\s*.+)?",
        r"Book\s+[IVXLCDMivxlcdm\d]+(?:\s*[:\-—]\s*.+)?",
        r"Chapter\s+[IVXLCDMivxlcdm\d]+(?:\s*[:\-—]\s*.+)?",
        r"Section\s+[IVXLCDMivxlcdm\d]+(?:\s*[:\-—]\s*.+)?",
        r"Act\s+[IVXLCDMivxlcdm\d]+", r"Scene\s+[IVXLCDMivxlcdm\d]+",
        r"Epilogue", r"Afterword", r"Postscript",
        r"Appendix(?:\s+[A-Za-z\d]+)?", r"Appendices",
        r"Index", r"Glossary", r"Bibliography", r"References",
        r"Notes?", r"Endnotes?", r"Footnotes?",
        r"Further\s+Reading", r"Suggested\s+Reading",
        r"Chronology", r"Timeline",
        r"About\s+the\s+Author",
        r"Table\s+of\s+Contents", r"Contents",
    ];
    let pattern = format!(r"(?i)^(?:{})\.?\s*$", alternatives.join("|"));
    Regex::new(&pattern).unwrap()
});

static RE_NUMBERED_PARA: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^\d+\.\s+[a-z""\u{201c}]"#).unwrap());
static RE_BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static RE_PAGE_HEADER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\s+[A-Z]|[A-Z]\s+\d+$").unwrap());
static RE_MID_SENTENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z]").unwrap());

/// A `(line_index, title_text)` candidate heading.
type Heading = (usize, String);

/// Stateless tiered chapter detector. The compiled pattern set is shared
/// process-wide via `once_cell`.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeadingDetector;

impl HeadingDetector {
    pub fn new() -> Self {
        HeadingDetector
    }

    /// Run tiered detection against a parsed book. Returns the original
    /// chapters untouched when they already look real (tier 1), a fresh
    /// chapter list split at detected headings (tiers 2/3), or `None` if
    /// no structure could be recovered at all.
    pub fn detect(&self, book: &ParsedBook) -> Option<Vec<Chapter>> {
        if !book.chapters.is_empty() && !book.is_page_based() {
            return Some(book.chapters.clone());
        }

        let text = self.deduplicate_facing_pages(&book.join_content());
        let lines: Vec<&str> = text.split('\n').collect();

        let headings = self.find_headings(&lines);
        if headings.len() >= MIN_HEADING_TIER_HITS {
            return Some(self.split_at_headings(&lines, &headings));
        }

        let format_headings = self.find_by_formatting(&lines);
        if format_headings.len() >= MIN_HEADING_TIER_HITS {
            return Some(self.split_at_headings(&lines, &format_headings));
        }

        None
    }

    fn find_headings(&self, lines: &[&str]) -> Vec<Heading> {
        let mut headings = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let stripped = line.trim();
            if stripped.len() < 2 || stripped.chars().count() > 80 {
                continue;
            }
            if self.is_noise(stripped) {
                continue;
            }

            if KNOWN_SECTIONS.is_match(stripped) {
                headings.push((i, stripped.to_string()));
                continue;
            }

            if stripped.chars().count() <= 60 && !RE_MID_SENTENCE.is_match(stripped) {
                let has_blank_before = i == 0 || lines[i - 1].trim().is_empty();
                let has_blank_after = i + 1 == lines.len() || lines[i + 1].trim().is_empty();
                if has_blank_before && has_blank_after {
                    let last = stripped.chars().last().unwrap();
                    if !".!?,;:".contains(last) && !stripped.contains(',') && stripped.chars().any(|c| c.is_alphabetic())
                    {
                        headings.push((i, stripped.to_string()));
                    }
                }
            }
        }
        headings
    }

    fn find_by_formatting(&self, lines: &[&str]) -> Vec<Heading> {
        let mut headings = Vec::new();
        for (i, line) in lines.iter().enumerate() {
            let stripped = line.trim();
            if stripped.len() < 3 || stripped.chars().count() > 60 {
                continue;
            }
            if self.is_noise(stripped) {
                continue;
            }

            let alpha_chars: Vec<char> = stripped.chars().filter(|c| c.is_alphabetic()).collect();
            if alpha_chars.len() >= 3 && alpha_chars.iter().all(|c| c.is_uppercase()) {
                if RE_PAGE_HEADER.is_match(stripped) {
                    continue;
                }
                let has_blank_before = i == 0 || lines[i - 1].trim().is_empty();
                let has_blank_after = i + 1 == lines.len() || lines[i + 1].trim().is_empty();
                if has_blank_before || has_blank_after {
                    headings.push((i, stripped.to_string()));
                }
            }
        }
        headings
    }

    fn is_noise(&self, stripped: &str) -> bool {
        RE_BARE_NUMBER.is_match(stripped) || RE_NUMBERED_PARA.is_match(stripped)
    }

    /// Collapse consecutive near-duplicate blocks of text (bilingual
    /// facing pages, repeated scans) using a Ratcliff/Obershelp-style
    /// similarity ratio over fixed-size line blocks.
    fn deduplicate_facing_pages(&self, text: &str) -> String {
        let lines: Vec<&str> = text.split('\n').collect();
        if lines.len() < FACING_PAGE_BLOCK_SIZE * 2 {
            return text.to_string();
        }

        let blocks: Vec<&[&str]> = lines.chunks(FACING_PAGE_BLOCK_SIZE).collect();
        let mut kept: Vec<&[&str]> = vec![blocks[0]];

        for block in &blocks[1..] {
            let prev_text = kept.last().unwrap().join(" ").trim().to_string();
            let curr_text = block.join(" ").trim().to_string();
            if prev_text.is_empty() || curr_text.is_empty() {
                kept.push(block);
                continue;
            }
            let ratio = similarity_ratio(
                &truncate_chars(&prev_text, FACING_PAGE_SAMPLE_CHARS),
                &truncate_chars(&curr_text, FACING_PAGE_SAMPLE_CHARS),
            );
            if ratio < FACING_PAGE_SIMILARITY_THRESHOLD {
                kept.push(block);
            }
        }

        kept.into_iter().flatten().copied().collect::<Vec<_>>().join("\n")
    }

    fn split_at_headings(&self, lines: &[&str], headings: &[Heading]) -> Vec<Chapter> {
        let mut chapters = Vec::new();

        if headings[0].0 > 0 {
            let pre_content = lines[..headings[0].0].join("\n").trim().to_string();
            if pre_content.len() > 50 {
                chapters.push(Chapter::new("(Untitled)", pre_content));
            }
        }

        for (idx, (line_idx, title)) in headings.iter().enumerate() {
            let end_idx = headings.get(idx + 1).map(|h| h.0).unwrap_or(lines.len());
            let content = lines[(line_idx + 1).min(lines.len())..end_idx].join("\n").trim().to_string();
            chapters.push(Chapter::new(title.clone(), content));
        }

        chapters
    }
}

fn truncate_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Ratcliff/Obershelp similarity ratio: `2*M / T` where `M` is the total
/// length of matched blocks found by repeated longest-common-substring
/// extraction, and `T` is the combined length of both strings. This
/// mirrors `difflib.SequenceMatcher.ratio()` closely enough for
/// near-duplicate-block detection without pulling in a diff crate.
fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_chars(&a, &b);
    (2 * matched) as f64 / total as f64
}

/// Sum of lengths of non-overlapping matching blocks, found greedily by
/// repeatedly extracting the longest common substring from the
/// remaining unmatched ranges (the same recursive strategy
/// `SequenceMatcher` uses, without its junk-heuristics).
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut total = 0usize;
    let mut stack = vec![(0usize, a.len(), 0usize, b.len())];
    while let Some((a_lo, a_hi, b_lo, b_hi)) = stack.pop() {
        if a_lo >= a_hi || b_lo >= b_hi {
            continue;
        }
        let (i, j, len) = longest_common_substring(a, a_lo, a_hi, b, b_lo, b_hi);
        if len == 0 {
            continue;
        }
        total += len;
        stack.push((a_lo, i, b_lo, j));
        stack.push((i + len, a_hi, j + len, b_hi));
    }
    total
}

fn longest_common_substring(
    a: &[char],
    a_lo: usize,
    a_hi: usize,
    b: &[char],
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let mut best = (a_lo, b_lo, 0usize);
    let mut prev_row = vec![0usize; b_hi - b_lo + 1];
    for i in a_lo..a_hi {
        let mut curr_row = vec![0usize; b_hi - b_lo + 1];
        for j in b_lo..b_hi {
            if a[i] == b[j] {
                let val = prev_row[j - b_lo] + 1;
                curr_row[j - b_lo + 1] = val;
                if val > best.2 {
                    best = (i + 1 - val, j + 1 - val, val);
                }
            }
        }
        prev_row = curr_row;
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marked_chapters_pass_through_unchanged() {
        let book = ParsedBook::new(
            "Title",
            vec![Chapter::new("Chapter 1", "some text"), Chapter::new("Chapter 2", "more text")],
        );
        let detector = HeadingDetector::new();
        let result = detector.detect(&book).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].title, "Chapter 1");
    }

    #[test]
    fn page_based_chapters_are_resplit_by_known_sections() {
        let body = format!(
            "{}\n\nChapter One\n\n{}\n\nChapter Two\n\n{}",
            "filler ".repeat(30),
            "lorem ipsum dolor sit amet ".repeat(30),
            "consectetur adipiscing elit ".repeat(30)
        );
        let book = ParsedBook::new("Title", vec![Chapter::new("Page 1", body)]);
        let detector = HeadingDetector::new();
        let result = detector.detect(&book).unwrap();
        let titles: Vec<&str> = result.iter().map(|c| c.title.as_str()).collect();
        assert!(titles.contains(&"Chapter One"));
        assert!(titles.contains(&"Chapter Two"));
    }

    #[test]
    fn formatting_tier_splits_on_all_caps_lines() {
        let body = format!(
            "{}\n\nTHE BEGINNING\n\n{}\n\nTHE MIDDLE\n\n{}",
            "filler text ".repeat(30),
            "lorem ipsum dolor sit amet consectetur ".repeat(30),
            "adipiscing elit sed do eiusmod tempor ".repeat(30)
        );
        let book = ParsedBook::new("Title", vec![Chapter::new("Page 1", body)]);
        let detector = HeadingDetector::new();
        let result = detector.detect(&book).unwrap();
        let titles: Vec<&str> = result.iter().map(|c| c.title.as_str()).collect();
        assert!(titles.contains(&"THE BEGINNING"));
        assert!(titles.contains(&"THE MIDDLE"));
    }

    #[test]
    fn no_structure_found_returns_none() {
        let body = "just one long block of prose with no headings at all ".repeat(20);
        let book = ParsedBook::new("Title", vec![Chapter::new("Page 1", body)]);
        let detector = HeadingDetector::new();
        assert!(detector.detect(&book).is_none());
    }

    #[test]
    fn bare_numbers_are_never_headings() {
        let detector = HeadingDetector::new();
        let lines = vec!["42", "", "some content here", ""];
        let headings = detector.find_headings(&lines);
        assert!(headings.is_empty());
    }

    #[test]
    fn identical_strings_have_ratio_one() {
        assert_eq!(similarity_ratio("hello world", "hello world"), 1.0);
    }

    #[test]
    fn completely_different_strings_have_low_ratio() {
        assert!(similarity_ratio("abcdef", "uvwxyz") < 0.2);
    }

    #[test]
    fn facing_page_dedup_drops_near_duplicate_blocks() {
        let detector = HeadingDetector::new();
        let page = "The quiet house stood at the edge of town waiting. ".repeat(10);
        let mut lines: Vec<String> = Vec::new();
        for _ in 0..50 {
            lines.push(page.clone());
        }
        for _ in 0..50 {
            lines.push(page.clone());
        }
        let text = lines.join("\n");
        let deduped = detector.deduplicate_facing_pages(&text);
        assert!(deduped.len() < text.len());
    }
}
