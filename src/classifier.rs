//! C1 — Content Classifier.
//!
//! Scores each chapter on four signals (title, structural metadata,
//! regex patterns, prose density) and decides junk vs. content, then
//! finds the content boundaries of the whole book so front/back matter
//! can be trimmed. Pure function: never fails, never edits a chapter.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::book::Chapter;

const WEIGHT_TITLE: f64 = 0.35;
const WEIGHT_EPUB: f64 = 0.40;
const WEIGHT_PATTERNS: f64 = 0.30;
const WEIGHT_DENSITY: f64 = 0.20;

const BASE_JUNK_THRESHOLD: f64 = 0.7;
const BASE_SUSPECT_THRESHOLD: f64 = 0.4;
const MULTI_SIGNAL_BOOST: f64 = 1.2;

const COPYRIGHT_HIGH: usize = 3;
const COPYRIGHT_LOW: usize = 1;
const TOC_HIGH: usize = 5;
const TOC_LOW: usize = 3;
const INDEX_HIGH: usize = 10;
const INDEX_LOW: usize = 5;
const BIBLIOGRAPHY_HIGH: usize = 5;
const BIBLIOGRAPHY_LOW: usize = 2;
const PRAISE_HIGH: usize = 3;
const PRAISE_LOW: usize = 1;
const ABOUT_AUTHOR_THRESHOLD: usize = 2;

const NUMERIC_DENSITY_HIGH: f64 = 0.20;
const NUMERIC_DENSITY_LOW: f64 = 0.12;
const AVG_LINE_LENGTH_SHORT: f64 = 30.0;
const MIN_LINES_FOR_STRUCTURE: usize = 10;
const NUMBER_ENDING_RATIO: f64 = 0.4;
const SENTENCE_DENSITY_LOW: f64 = 1.0;
const COMMA_NUMBER_SEQUENCES: usize = 5;

static JUNK_TITLES_EXACT: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bibliography", "references", "index", "glossary",
        "contents", "table of contents", "endnotes", "footnotes",
        "notes", "copyright", "copyright page", "colophon",
        "about the author", "about the authors", "about the editor",
        "about the publisher", "about the translator",
        "acknowledgments", "acknowledgements",
        "also by", "other books by", "books by",
        "other works", "other titles", "novels and story collections",
        "praise for", "praise", "advance praise", "reviews",
        "blurbs", "endorsements", "testimonials",
        "catalog", "catalogue", "backlist",
        "dedication", "epigraph",
        "title page", "half title", "half-title",
        "frontispiece", "list of illustrations", "list of figures",
        "list of tables", "list of maps", "list of plates",
        "list of abbreviations", "abbreviations",
        "permissions", "credits", "photo credits", "image credits",
        "about this book", "a note on the text",
        "further reading", "suggested reading", "recommended reading",
        "resources", "appendix", "appendices",
        "chronology", "timeline",
        "dramatis personae", "cast of characters",
    ]
    .into_iter()
    .collect()
});

static JUNK_TITLES_PREFIX: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "also by", "other books", "books by", "praise for",
        "copyright", "about the", "a note on", "a note from",
        "list of", "works by", "novels by", "selected",
        "further reading", "suggested reading",
    ]
});

static CONTENT_TITLES_EXACT: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "prologue", "epilogue", "introduction", "foreword", "preface",
        "afterword", "postscript", "interlude", "intermezzo",
    ]
    .into_iter()
    .collect()
});

static CONTENT_TITLES_PREFIX: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "chapter", "part", "book", "act", "scene", "section",
        "prologue", "epilogue", "introduction", "foreword", "preface",
        "afterword",
    ]
});

static EPUB_JUNK_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "copyright-page", "colophon", "toc", "loi", "lot", "index",
        "glossary", "bibliography", "acknowledgments", "dedication",
        "epigraph", "titlepage", "halftitlepage", "imprint",
        "other-credits", "errata", "contributors",
    ]
    .into_iter()
    .collect()
});

static EPUB_CONTENT_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "bodymatter", "chapter", "prologue", "epilogue", "introduction",
        "foreword", "preface", "afterword", "part", "division",
        "volume", "subchapter", "preamble", "conclusion",
    ]
    .into_iter()
    .collect()
});

static OPF_JUNK_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "copyright-page", "toc", "loi", "lot", "index", "glossary",
        "bibliography", "colophon", "title-page", "dedication",
    ]
    .into_iter()
    .collect()
});

static OPF_CONTENT_TYPES: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ["text", "bodymatter", "preface", "foreword", "introduction"].into_iter().collect());

static RE_NUMERIC_TITLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ivxlcdm0-9\s.]+$").unwrap());

static RE_COPYRIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:copyright|©|all rights reserved|ISBN[-:\s]*[\dX-]{10,}|published by|first (?:edition|printing|published)|printed in|library of congress|cataloging.in.publication|no part of this (?:book|publication)|permission .{0,40} publisher)",
    )
    .unwrap()
});
static RE_TOC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(?:^\s*(?:chapter|part|section)\s+[ivxlc\d]+\b.*\d+\s*$|^\s*\d+\.\s+.{5,60}\s+\d+\s*$|^\s*.{5,60}\.{3,}\s*\d+\s*$)",
    )
    .unwrap()
});
static RE_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*[A-Z][a-z]+(?:,\s*\d[\d,\s-]*)+\s*$").unwrap());
static RE_BIBLIOGRAPHY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)(?:^\s*[A-Z][a-z]+,\s+[A-Z]\..*\(\d{4}\)|^\s*\[\d+\]\s+|(?:et al\.|pp?\.\s*\d+|vol\.\s*\d+|eds?\.|trans\.))",
    )
    .unwrap()
});
static RE_PRAISE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)(?:["“”'].{20,200}["“”']\s*[-—–]\s*[A-Z][a-z]+ [A-Z]|praise for\b|advance praise|new york times|wall street journal|washington post|bestselling author|award.winning)"#,
    )
    .unwrap()
});
static RE_ABOUT_AUTHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:is the author of|lives in|was born in|has written|graduated from|teaches at|is a (?:professor|writer|journalist|novelist|poet)|her (?:novels?|books?|works?) include|his (?:novels?|books?|works?) include)",
    )
    .unwrap()
});
static RE_CATALOG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*[A-Z][A-Z\s]{5,50}\s*$(?:\s*^\s*[A-Z][A-Z\s]{5,50}\s*$){3,}").unwrap()
});
static RE_COMMA_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+,\s*\d+").unwrap());
static RE_SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]").unwrap());

/// Category a chapter was classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    Content,
    Copyright,
    Toc,
    Index,
    Bibliography,
    Praise,
    AboutAuthor,
    Catalog,
    FrontMatter,
    BackMatter,
    Junk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Per-chapter signal scores, each in `[0,1]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Signals {
    pub title: f64,
    pub epub: f64,
    pub patterns: f64,
    pub density: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub is_junk: bool,
    pub junk_score: f64,
    pub signals: Signals,
    pub category: Category,
    pub confidence: Confidence,
}

impl ClassificationResult {
    fn protected_as_content(signals: Signals) -> Self {
        ClassificationResult {
            is_junk: false,
            junk_score: 0.0,
            signals,
            category: Category::Content,
            confidence: Confidence::High,
        }
    }
}

/// Classifies chapters and finds the content boundaries of a book.
/// Stateless aside from its pre-compiled regex set, which is process-wide
/// (`once_cell::sync::Lazy`) rather than per-instance, since the patterns
/// never change at runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct Classifier;

impl Classifier {
    pub fn new() -> Self {
        Classifier
    }

    /// Score a chapter title. Returns `None` for "no opinion", `Some((-1,
    /// cat))` meaning content-protected, or `Some((score, cat))`.
    fn score_title(&self, title: &str) -> (Option<f64>, Option<&'static str>) {
        if title.is_empty() {
            return (None, None);
        }
        let title_lower = title.trim().to_lowercase();

        for prefix in CONTENT_TITLES_PREFIX.iter() {
            if title_lower.starts_with(prefix) {
                return (Some(-1.0), Some("content"));
            }
        }
        if CONTENT_TITLES_EXACT.contains(title_lower.as_str()) {
            return (Some(-1.0), Some("content"));
        }

        if JUNK_TITLES_EXACT.contains(title_lower.as_str()) {
            return (Some(1.0), Some(categorize_title(&title_lower)));
        }
        for prefix in JUNK_TITLES_PREFIX.iter() {
            if title_lower.starts_with(prefix) {
                return (Some(1.0), Some(categorize_title(prefix)));
            }
        }

        if RE_NUMERIC_TITLE.is_match(&title_lower) {
            return (Some(-1.0), Some("content"));
        }

        (None, None)
    }

    fn score_epub_metadata(&self, epub_type: Option<&str>, guide_type: Option<&str>) -> f64 {
        let epub_lower = epub_type.map(|s| s.trim().to_lowercase()).unwrap_or_default();
        let guide_lower = guide_type.map(|s| s.trim().to_lowercase()).unwrap_or_default();

        if EPUB_CONTENT_TYPES.contains(epub_lower.as_str())
            || OPF_CONTENT_TYPES.contains(guide_lower.as_str())
        {
            return -1.0;
        }
        if EPUB_JUNK_TYPES.contains(epub_lower.as_str()) || OPF_JUNK_TYPES.contains(guide_lower.as_str()) {
            return 1.0;
        }
        0.0
    }

    fn score_patterns(&self, text: &str) -> (f64, Option<&'static str>) {
        if text.len() < 50 {
            return (0.0, None);
        }
        let sample_end = text.char_indices().nth(3000).map(|(i, _)| i).unwrap_or(text.len());
        let sample = &text[..sample_end];
        let five_end = text.char_indices().nth(5000).map(|(i, _)| i).unwrap_or(text.len());
        let first5k = &text[..five_end];

        let hits = RE_COPYRIGHT.find_iter(sample).count();
        if hits >= COPYRIGHT_HIGH {
            return (1.0, Some("copyright"));
        }
        if hits >= COPYRIGHT_LOW {
            if text.len() < 1000 && hits >= 2 {
                return (1.0, Some("copyright"));
            }
            let score = 0.5 + 0.5 * (hits as f64 / COPYRIGHT_HIGH as f64);
            return (score.min(0.9), Some("copyright"));
        }

        let hits = RE_TOC.find_iter(text).count();
        if hits >= TOC_HIGH {
            return (1.0, Some("toc"));
        }
        if hits >= TOC_LOW {
            return (0.5 + 0.5 * (hits as f64 / TOC_HIGH as f64), Some("toc"));
        }

        let hits = RE_INDEX.find_iter(first5k).count();
        if hits >= INDEX_HIGH {
            return (1.0, Some("index"));
        }
        if hits >= INDEX_LOW {
            return (0.5 + 0.5 * (hits as f64 / INDEX_HIGH as f64), Some("index"));
        }

        let hits = RE_BIBLIOGRAPHY.find_iter(first5k).count();
        if hits >= BIBLIOGRAPHY_HIGH {
            return (1.0, Some("bibliography"));
        }
        if hits >= BIBLIOGRAPHY_LOW {
            return (0.5 + 0.5 * (hits as f64 / BIBLIOGRAPHY_HIGH as f64), Some("bibliography"));
        }

        let hits = RE_PRAISE.find_iter(sample).count();
        if hits >= PRAISE_HIGH {
            return (1.0, Some("praise"));
        }
        if hits >= PRAISE_LOW {
            return (0.5 + 0.5 * (hits as f64 / PRAISE_HIGH as f64), Some("praise"));
        }

        let hits = RE_ABOUT_AUTHOR.find_iter(sample).count();
        if hits >= ABOUT_AUTHOR_THRESHOLD {
            return (0.8, Some("about_author"));
        }

        if RE_CATALOG.is_match(first5k) {
            return (0.8, Some("catalog"));
        }

        (0.0, None)
    }

    fn score_density(&self, text: &str) -> f64 {
        if text.len() < 100 {
            return 0.0;
        }
        let lines: Vec<&str> = text.trim().split('\n').filter(|l| !l.trim().is_empty()).collect();
        if lines.len() < MIN_LINES_FOR_STRUCTURE {
            return 0.0;
        }
        let total_chars: usize = lines.iter().map(|l| l.len()).sum();
        if total_chars == 0 {
            return 0.0;
        }

        let mut signals = Vec::new();

        let digit_count = text.chars().filter(|c| c.is_ascii_digit()).count();
        let numeric_density = digit_count as f64 / text.chars().count() as f64;
        if numeric_density >= NUMERIC_DENSITY_HIGH {
            signals.push(0.8);
        } else if numeric_density >= NUMERIC_DENSITY_LOW {
            signals.push(0.4);
        }

        let avg_line_len = total_chars as f64 / lines.len() as f64;
        if avg_line_len < AVG_LINE_LENGTH_SHORT {
            signals.push(0.5);
        }

        let number_endings = lines
            .iter()
            .filter(|l| l.trim().chars().last().is_some_and(|c| c.is_ascii_digit()))
            .count();
        let number_ratio = number_endings as f64 / lines.len() as f64;
        if number_ratio >= NUMBER_ENDING_RATIO {
            signals.push(0.7);
        }

        let sample_end = text.char_indices().nth(2000).map(|(i, _)| i).unwrap_or(text.len());
        let sample = &text[..sample_end];
        let sentence_ends = RE_SENTENCE_END.find_iter(sample).count();
        let chars_sampled = sample.chars().count().max(1);
        let sentence_density = (sentence_ends as f64 / chars_sampled as f64) * 100.0;
        if sentence_density < SENTENCE_DENSITY_LOW {
            signals.push(0.3);
        }

        let three_end = text.char_indices().nth(3000).map(|(i, _)| i).unwrap_or(text.len());
        let comma_nums = RE_COMMA_NUMBER.find_iter(&text[..three_end]).count();
        if comma_nums >= COMMA_NUMBER_SEQUENCES {
            signals.push(0.6);
        }

        if signals.is_empty() {
            return 0.0;
        }
        signals.iter().sum::<f64>() / signals.len() as f64
    }

    /// Classify a single chapter. Pure, infallible (§4.1 failure
    /// semantics): an unclassifiable chapter defaults to content.
    pub fn classify(&self, chapter: &Chapter, sensitivity: f64) -> ClassificationResult {
        let mut categories = Vec::new();
        let mut signals = Signals::default();

        let (title_score, title_cat) = self.score_title(&chapter.title);
        if let Some(cat) = title_cat {
            categories.push(cat);
        }
        if title_score == Some(-1.0) {
            return ClassificationResult::protected_as_content(Signals {
                title: 0.0,
                ..Default::default()
            });
        }
        signals.title = title_score.unwrap_or(0.0).max(0.0);

        let epub_score = self.score_epub_metadata(chapter.epub_type.as_deref(), chapter.guide_type.as_deref());
        if epub_score == -1.0 {
            return ClassificationResult::protected_as_content(Signals {
                title: signals.title,
                epub: 0.0,
                ..Default::default()
            });
        }
        signals.epub = epub_score.max(0.0);

        let (pattern_score, pattern_cat) = self.score_patterns(&chapter.content);
        signals.patterns = pattern_score;
        if let Some(cat) = pattern_cat {
            categories.push(cat);
        }

        signals.density = self.score_density(&chapter.content);

        let weighted: [(f64, f64); 4] = [
            (signals.title, WEIGHT_TITLE),
            (signals.epub, WEIGHT_EPUB),
            (signals.patterns, WEIGHT_PATTERNS),
            (signals.density, WEIGHT_DENSITY),
        ];
        let active: Vec<(f64, f64)> = weighted.into_iter().filter(|(s, _)| *s > 0.0).collect();
        let total_weight: f64 = active.iter().map(|(_, w)| w).sum();
        let mut raw_score = if total_weight > 0.0 {
            active.iter().map(|(s, w)| s * w).sum::<f64>() / total_weight
        } else {
            0.0
        };

        let active_count = [signals.title, signals.epub, signals.patterns, signals.density]
            .iter()
            .filter(|v| **v > 0.3)
            .count();
        if active_count >= 2 {
            raw_score = (raw_score * MULTI_SIGNAL_BOOST).min(1.0);
        }

        let junk_threshold = (BASE_JUNK_THRESHOLD - (sensitivity - 0.5) * 0.4).clamp(0.2, 0.9);
        let suspect_threshold = (BASE_SUSPECT_THRESHOLD - (sensitivity - 0.5) * 0.3).clamp(0.1, 0.7);

        let is_junk = raw_score >= junk_threshold;
        let confidence = if raw_score >= junk_threshold + 0.15 {
            Confidence::High
        } else if raw_score >= junk_threshold {
            Confidence::Medium
        } else if raw_score >= suspect_threshold {
            Confidence::Low
        } else {
            Confidence::High
        };

        let category = categories
            .first()
            .map(|c| category_from_str(c))
            .unwrap_or(if is_junk { Category::Junk } else { Category::Content });

        ClassificationResult {
            is_junk,
            junk_score: (raw_score * 1000.0).round() / 1000.0,
            signals,
            category,
            confidence,
        }
    }

    pub fn classify_chapters(&self, chapters: &[Chapter], sensitivity: f64) -> Vec<ClassificationResult> {
        chapters.iter().map(|ch| self.classify(ch, sensitivity)).collect()
    }

    /// Find `(start, end)` indices (end exclusive) bounding the narrative
    /// content of a book, trimming leading and trailing junk. Junk
    /// between content chapters is preserved. Never returns an empty
    /// range if the book has at least one chapter (§4.1, §8 property 6).
    pub fn find_content_boundaries(&self, chapters: &[Chapter], sensitivity: f64) -> (usize, usize) {
        if chapters.is_empty() {
            return (0, 0);
        }
        let results = self.classify_chapters(chapters, sensitivity);

        let start = results.iter().position(|r| !r.is_junk);
        let Some(start) = start else {
            return (0, chapters.len());
        };

        let end = results.iter().rposition(|r| !r.is_junk).map(|i| i + 1).unwrap_or(chapters.len());

        (start, end)
    }

    /// Title plus first N sentences of a chapter, for operator previews.
    /// Independent of junk scoring (carried over from the original
    /// `get_preview`, SPEC_FULL §10.5).
    pub fn preview(&self, chapter: &Chapter, max_sentences: usize) -> String {
        let title = chapter.title.trim();
        let content = chapter.content.trim();
        if content.is_empty() {
            return if title.is_empty() { "(empty chapter)".to_string() } else { title.to_string() };
        }

        let mut sentences = Vec::new();
        let mut current = String::new();
        for ch in content.chars() {
            current.push(ch);
            if matches!(ch, '.' | '!' | '?') && current.trim().len() > 10 {
                sentences.push(current.trim().to_string());
                current.clear();
                if sentences.len() >= max_sentences {
                    break;
                }
            }
        }

        let preview_text = if sentences.is_empty() {
            let cut = content.char_indices().nth(200).map(|(i, _)| i).unwrap_or(content.len());
            let mut s = content[..cut].trim().to_string();
            if content.len() > cut {
                s.push_str("...");
            }
            s
        } else {
            sentences.join(" ")
        };

        if title.is_empty() {
            preview_text
        } else {
            format!("{title}\n  {preview_text}")
        }
    }
}

fn categorize_title(title_lower: &str) -> &'static str {
    const CATEGORIES: &[(&str, &[&str])] = &[
        ("copyright", &["copyright", "permissions", "credits"]),
        ("toc", &["contents", "table of contents"]),
        ("index", &["index", "glossary", "abbreviations"]),
        (
            "bibliography",
            &[
                "bibliography", "references", "notes", "endnotes", "footnotes",
                "further reading", "suggested reading", "recommended reading",
            ],
        ),
        ("praise", &["praise", "blurbs", "endorsements", "testimonials", "reviews", "advance praise"]),
        ("about_author", &["about the", "a note on", "a note from"]),
        (
            "catalog",
            &[
                "also by", "other books", "books by", "other works", "other titles",
                "novels", "works by", "selected", "catalog", "catalogue", "backlist",
            ],
        ),
        ("front_matter", &["title page", "half title", "frontispiece", "dedication", "epigraph", "list of"]),
        (
            "back_matter",
            &["appendix", "appendices", "chronology", "timeline", "resources", "dramatis personae", "cast of characters"],
        ),
    ];
    for (cat, keywords) in CATEGORIES {
        for kw in *keywords {
            if title_lower.contains(kw) {
                return cat;
            }
        }
    }
    "junk"
}

fn category_from_str(s: &str) -> Category {
    match s {
        "copyright" => Category::Copyright,
        "toc" => Category::Toc,
        "index" => Category::Index,
        "bibliography" => Category::Bibliography,
        "praise" => Category::Praise,
        "about_author" => Category::AboutAuthor,
        "catalog" => Category::Catalog,
        "front_matter" => Category::FrontMatter,
        "back_matter" => Category::BackMatter,
        "content" => Category::Content,
        _ => Category::Junk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_prose(n: usize) -> String {
        "The quiet house stood at the edge of town, waiting for someone to remember it. "
            .repeat(n)
    }

    #[test]
    fn content_protected_title_is_never_junk() {
        let c = Classifier::new();
        let chapter = Chapter::new("Chapter 5", long_prose(1));
        let result = c.classify(&chapter, 0.5);
        assert!(!result.is_junk);
        assert!(matches!(result.category, Category::Content));
    }

    #[test]
    fn roman_numeral_title_is_content() {
        let c = Classifier::new();
        let chapter = Chapter::new("XIV", long_prose(1));
        let result = c.classify(&chapter, 0.5);
        assert!(!result.is_junk);
    }

    #[test]
    fn copyright_page_is_junk() {
        let c = Classifier::new();
        let content = "Copyright \u{a9} 2020. All rights reserved. ISBN-13: 978-0-00-000000-0. \
                        Library of Congress Cataloging-in-Publication Data. No part of this \
                        publication may be reproduced."
            .to_string();
        let chapter = Chapter::new("Front Matter", content);
        let result = c.classify(&chapter, 0.5);
        assert!(result.is_junk);
        assert!(matches!(result.category, Category::Copyright));
    }

    #[test]
    fn exact_title_match_is_junk() {
        let c = Classifier::new();
        let chapter = Chapter::new("Bibliography", "Smith, J. (2001). A Book. Publisher.".to_string());
        let result = c.classify(&chapter, 0.5);
        assert!(result.is_junk);
    }

    #[test]
    fn epub_type_forces_content() {
        let c = Classifier::new();
        let chapter = Chapter::new("Untitled", long_prose(1)).with_epub_type("bodymatter");
        let result = c.classify(&chapter, 0.5);
        assert!(!result.is_junk);
    }

    #[test]
    fn epub_type_forces_junk() {
        let c = Classifier::new();
        let chapter = Chapter::new("Legal", "some text here".to_string()).with_epub_type("copyright-page");
        let result = c.classify(&chapter, 0.5);
        assert!(result.is_junk);
    }

    #[test]
    fn classification_is_idempotent() {
        let c = Classifier::new();
        let chapter = Chapter::new("Index", "Smith, 1, 5, 9\nJones, 2, 4\n".repeat(10));
        let r1 = c.classify(&chapter, 0.5);
        let r2 = c.classify(&chapter, 0.5);
        assert_eq!(r1.is_junk, r2.is_junk);
        assert_eq!(r1.junk_score, r2.junk_score);
    }

    #[test]
    fn boundary_trimming_keeps_only_content_chapters() {
        let c = Classifier::new();
        let chapters = vec![
            Chapter::new(
                "Copyright",
                "Copyright \u{a9} 2020. All rights reserved. ISBN-13: 978-0-00-000000-0. \
                 Library of Congress Cataloging-in-Publication Data."
                    .to_string(),
            ),
            Chapter::new("Also by the Author", "Also by the author: other titles follow.".repeat(5)),
            Chapter::new("Chapter 1", long_prose(20)),
            Chapter::new("Chapter 2", long_prose(20)),
            Chapter::new("Index", "Smith, 1, 5, 9\nJones, 2, 4\nAllen, 3, 8, 12\n".repeat(10)),
        ];
        let (start, end) = c.find_content_boundaries(&chapters, 0.5);
        assert_eq!((start, end), (2, 4));
    }

    #[test]
    fn all_junk_book_returns_full_range() {
        let c = Classifier::new();
        let chapters = vec![Chapter::new("Index", "Smith, 1, 5, 9\nJones, 2, 4\nAllen, 3, 8\n".repeat(10))];
        let (start, end) = c.find_content_boundaries(&chapters, 0.5);
        assert_eq!((start, end), (0, 1));
    }

    #[test]
    fn empty_book_returns_empty_range() {
        let c = Classifier::new();
        let (start, end) = c.find_content_boundaries(&[], 0.5);
        assert_eq!((start, end), (0, 0));
    }

    #[test]
    fn higher_sensitivity_lowers_junk_threshold() {
        let c = Classifier::new();
        // A chapter with middling pattern signal strength only, to sit
        // near the threshold boundary.
        let chapter = Chapter::new(
            "Untitled",
            "is the author of several novels and has written extensively. Jane Doe teaches at a university."
                .to_string(),
        );
        let lenient = c.classify(&chapter, 0.0);
        let strict = c.classify(&chapter, 1.0);
        assert!(strict.junk_score >= lenient.junk_score || strict.is_junk == lenient.is_junk);
    }
}
