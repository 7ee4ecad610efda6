//! The input data model consumed by the pipeline core.
//!
//! `ParsedBook` and `Chapter` are produced by a format-specific parser
//! (EPUB, PDF, plain text, ...) that lives outside this crate. The core
//! only ever reads them; it never mutates a `Chapter` in place, it
//! replaces chapters wholesale when it needs to (see [`crate::headings`]).

use serde::{Deserialize, Serialize};

/// A single chapter as handed to the core by an external parser.
///
/// Immutable once produced. The classifier and heading detector never
/// edit a `Chapter`'s text; they either keep it or replace it with a
/// freshly built one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub content: String,
    /// EPUB3 `epub:type` semantic hint, when the parser carried one.
    pub epub_type: Option<String>,
    /// OPF `<guide>` reference type, when the parser carried one.
    pub guide_type: Option<String>,
    /// Byte offset of this chapter within the original source, if known.
    pub start_pos: Option<usize>,
}

impl Chapter {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Chapter {
            title: title.into(),
            content: content.into(),
            epub_type: None,
            guide_type: None,
            start_pos: None,
        }
    }

    pub fn with_epub_type(mut self, epub_type: impl Into<String>) -> Self {
        self.epub_type = Some(epub_type.into());
        self
    }

    pub fn with_guide_type(mut self, guide_type: impl Into<String>) -> Self {
        self.guide_type = Some(guide_type.into());
        self
    }
}

/// A parsed book: ordered chapters plus whatever bibliographic metadata
/// the parser recovered. This is the sole input to [`crate::orchestrator::Orchestrator::convert`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedBook {
    pub title: String,
    pub author: Option<String>,
    pub language: Option<String>,
    pub chapters: Vec<Chapter>,
}

impl ParsedBook {
    pub fn new(title: impl Into<String>, chapters: Vec<Chapter>) -> Self {
        ParsedBook {
            title: title.into(),
            author: None,
            language: None,
            chapters,
        }
    }

    /// True if every chapter title looks like `"Page N"` — the shape a
    /// parser falls back to when it could not recover real chapter
    /// structure from the source. The heading detector uses this to
    /// decide whether it should run at all.
    pub fn is_page_based(&self) -> bool {
        if self.chapters.is_empty() {
            return false;
        }
        self.chapters
            .iter()
            .all(|ch| is_page_title(&ch.title))
    }

    /// Concatenation of all chapter bodies, in order, separated by blank
    /// lines. Used as input to the heading detector when chapters are
    /// page-based.
    pub fn join_content(&self) -> String {
        let mut joined = String::new();
        for (i, ch) in self.chapters.iter().enumerate() {
            if i > 0 {
                joined.push_str("\n\n");
            }
            joined.push_str(&ch.content);
        }
        joined
    }
}

fn is_page_title(title: &str) -> bool {
    let t = title.trim();
    let Some(rest) = t.strip_prefix("Page ").or_else(|| t.strip_prefix("page ")) else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}
