//! Conversion pipeline core: turns a parsed book into a single encoded
//! audio artifact by driving an external TTS backend fragment by
//! fragment, with bounded memory, resumable checkpoints, and thermal
//! backpressure.
//!
//! Format-specific text extraction, the acoustic model itself, voice
//! catalogs, and downstream audio post-processing are all external
//! collaborators this crate consumes through narrow traits
//! ([`synth::Synthesizer`], [`encoder::Encoder`]) — see [`orchestrator`]
//! for how they're wired together.

pub mod book;
pub mod checkpoint;
pub mod chunker;
pub mod classifier;
pub mod encoder;
pub mod error;
pub mod headings;
pub mod host_load;
pub mod orchestrator;
pub mod settings;
pub mod synth;
pub mod wav;
pub mod worker_pool;

pub use book::{Chapter, ParsedBook};
pub use encoder::ChapterMarker;
pub use error::{ConvertError, ConvertResult, SynthError};
pub use orchestrator::{CancellationToken, Orchestrator};
pub use settings::{ConcurrencyMode, Container, Settings, SettingsFingerprint};
