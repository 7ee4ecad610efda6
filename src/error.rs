//! Typed error hierarchy for the conversion pipeline.
//!
//! The Python source drove retries off string-matching exception
//! messages. This crate replaces that with two small sum types:
//! [`SynthError`] for the synthesizer boundary (matched on by the
//! orchestrator's retry loop) and [`ConvertError`] for everything the
//! pipeline can surface to a caller.

use std::path::PathBuf;

use thiserror::Error;

/// Errors a [`crate::synth::Synthesizer`] call can return. The
/// orchestrator matches on the variant, not on any message text.
#[derive(Debug, Error)]
pub enum SynthError {
    /// Timeout, connection drop, accelerator warm-up, queue full — worth
    /// retrying with backoff.
    #[error("transient synthesizer error: {0}")]
    Transient(String),

    /// The input text exceeds the backend's documented phoneme/character
    /// budget. Treated as a chunker bug: shrink and retry.
    #[error("input exceeds synthesizer length budget ({len} chars, max {max})")]
    OverLength { len: usize, max: usize },

    /// The caller cancelled the run while this call was in flight.
    #[error("synthesis cancelled")]
    Cancelled,

    /// Anything else: bad voice id, backend crashed, unrecoverable.
    #[error("fatal synthesizer error: {0}")]
    Fatal(#[source] anyhow::Error),
}

/// The taxonomy of §7: what the orchestrator can hand back to a caller.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Raised before any synthesis happens; no output or checkpoint is
    /// created.
    #[error("book has no narrative content after junk trimming")]
    EmptyBook,

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("checkpoint error for {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The caller cancelled the run. Not a failure: the output file is a
    /// valid prefix and a checkpoint was written.
    #[error("conversion cancelled after chunk {completed_chunks}/{total_chunks}")]
    Cancelled {
        completed_chunks: usize,
        total_chunks: usize,
    },

    #[error("synthesis failed on chunk {chunk_index}: {source}")]
    Synthesis {
        chunk_index: usize,
        #[source]
        source: SynthError,
    },

    #[error("encoding failed: {0}")]
    Encode(#[source] anyhow::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;
