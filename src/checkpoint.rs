//! C4 — Checkpoint Store.
//!
//! One checkpoint record per output file, written as a whole-file JSON
//! replacement next to it. The Python source kept a rolling per-segment
//! checkpoint scheme (`checkpoint_manager.py`); this port keeps only the
//! single-checkpoint-per-output-file model of `StreamProcessor` (SPEC_FULL
//! §9 open question) since it is what the orchestrator actually needs to
//! resume byte-for-byte.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::settings::SettingsFingerprint;

/// A persisted snapshot of progress through one conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub source_path: PathBuf,
    /// Stable hash of the source file's bytes, if the caller supplied
    /// one. Used only as an optional extra guard against a changed input
    /// (§4.4 load policy, item 5).
    pub source_hash: Option<String>,
    pub total_chunks: usize,
    pub completed_chunks: usize,
    pub output_size_bytes: u64,
    pub settings_fingerprint: SettingsFingerprint,
    pub timestamp: u64,
}

/// Reads and writes [`Checkpoint`] records co-located with an output
/// file, by suffix substitution (`foo.wav` → `foo.checkpoint`).
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    checkpoint_path: PathBuf,
}

impl CheckpointStore {
    pub fn for_output_path(output_path: &Path) -> Self {
        CheckpointStore {
            checkpoint_path: output_path.with_extension("checkpoint"),
        }
    }

    pub fn checkpoint_path(&self) -> &Path {
        &self.checkpoint_path
    }

    /// Write a checkpoint as a whole-file replacement. A write failure is
    /// logged and swallowed (§4.4 failure semantics: progress is
    /// advisory, the output file is the ground truth).
    pub fn save(
        &self,
        source_path: &Path,
        source_hash: Option<String>,
        completed_chunks: usize,
        total_chunks: usize,
        output_size_bytes: u64,
        fingerprint: &SettingsFingerprint,
    ) {
        let checkpoint = Checkpoint {
            source_path: source_path.to_path_buf(),
            source_hash,
            total_chunks,
            completed_chunks,
            output_size_bytes,
            settings_fingerprint: fingerprint.clone(),
            timestamp: now_epoch_seconds(),
        };

        if let Err(err) = self.write(&checkpoint) {
            warn!(path = %self.checkpoint_path.display(), error = %err, "failed to save checkpoint, continuing without it");
        }
    }

    fn write(&self, checkpoint: &Checkpoint) -> Result<()> {
        let json = serde_json::to_vec_pretty(checkpoint).context("serialize checkpoint")?;
        fs::write(&self.checkpoint_path, json)
            .with_context(|| format!("write checkpoint to {}", self.checkpoint_path.display()))?;
        Ok(())
    }

    /// Apply the §4.4 load policy: return a checkpoint only if it
    /// exists, deserializes, matches the current fingerprint and planned
    /// total, and the output file on disk has exactly the claimed size.
    /// Any other outcome — missing, corrupt, stale, or out of sync — is
    /// logged and treated as "start fresh", never as an error.
    pub fn load(
        &self,
        output_path: &Path,
        current_fingerprint: &SettingsFingerprint,
        planned_total_chunks: usize,
        current_source_hash: Option<&str>,
    ) -> Option<Checkpoint> {
        let bytes = match fs::read(&self.checkpoint_path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.checkpoint_path.display(), error = %err, "failed to read checkpoint, starting fresh");
                return None;
            }
        };

        let checkpoint: Checkpoint = match serde_json::from_slice(&bytes) {
            Ok(c) => c,
            Err(err) => {
                warn!(path = %self.checkpoint_path.display(), error = %err, "checkpoint did not deserialize, starting fresh");
                return None;
            }
        };

        if checkpoint.settings_fingerprint != *current_fingerprint {
            warn!("checkpoint fingerprint mismatch, settings changed, starting fresh");
            return None;
        }
        if checkpoint.total_chunks != planned_total_chunks {
            warn!(
                checkpoint_total = checkpoint.total_chunks,
                planned_total = planned_total_chunks,
                "checkpoint total_chunks mismatch, starting fresh"
            );
            return None;
        }

        let actual_size = match fs::metadata(output_path) {
            Ok(meta) => meta.len(),
            Err(_) => {
                warn!("output file missing, checkpoint discarded, starting fresh");
                return None;
            }
        };
        if actual_size != checkpoint.output_size_bytes {
            warn!(
                expected = checkpoint.output_size_bytes,
                actual = actual_size,
                "output file size does not match checkpoint, starting fresh"
            );
            return None;
        }

        if let (Some(expected), Some(actual)) = (checkpoint.source_hash.as_deref(), current_source_hash) {
            if expected != actual {
                warn!("source file hash mismatch, checkpoint discarded, starting fresh");
                return None;
            }
        }

        Some(checkpoint)
    }

    /// Delete the checkpoint file once the encoder has committed the
    /// final container (§4.4 "on completion"). Missing is not an error.
    pub fn clear(&self) {
        match fs::remove_file(&self.checkpoint_path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(path = %self.checkpoint_path.display(), error = %err, "failed to remove checkpoint");
            }
        }
    }
}

fn now_epoch_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::fs::File;
    use std::io::Write;

    fn fingerprint() -> SettingsFingerprint {
        Settings::new("kokoro", "am_michael").fingerprint()
    }

    #[test]
    fn round_trips_a_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        File::create(&output_path).unwrap().write_all(&[0u8; 100]).unwrap();

        let store = CheckpointStore::for_output_path(&output_path);
        let fp = fingerprint();
        store.save(Path::new("/books/book.epub"), None, 10, 40, 100, &fp);

        let loaded = store.load(&output_path, &fp, 40, None);
        assert!(loaded.is_some());
        let loaded = loaded.unwrap();
        assert_eq!(loaded.completed_chunks, 10);
        assert_eq!(loaded.total_chunks, 40);
    }

    #[test]
    fn missing_checkpoint_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        let store = CheckpointStore::for_output_path(&output_path);
        assert!(store.load(&output_path, &fingerprint(), 40, None).is_none());
    }

    #[test]
    fn fingerprint_mismatch_discards_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        File::create(&output_path).unwrap().write_all(&[0u8; 100]).unwrap();

        let store = CheckpointStore::for_output_path(&output_path);
        store.save(Path::new("/books/book.epub"), None, 10, 40, 100, &fingerprint());

        let mut other = Settings::new("kokoro", "am_michael");
        other.speed = 1.5;
        let loaded = store.load(&output_path, &other.fingerprint(), 40, None);
        assert!(loaded.is_none());
    }

    #[test]
    fn total_chunks_mismatch_discards_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        File::create(&output_path).unwrap().write_all(&[0u8; 100]).unwrap();

        let store = CheckpointStore::for_output_path(&output_path);
        let fp = fingerprint();
        store.save(Path::new("/books/book.epub"), None, 10, 40, 100, &fp);

        assert!(store.load(&output_path, &fp, 41, None).is_none());
    }

    #[test]
    fn output_size_mismatch_discards_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        File::create(&output_path).unwrap().write_all(&[0u8; 50]).unwrap();

        let store = CheckpointStore::for_output_path(&output_path);
        let fp = fingerprint();
        store.save(Path::new("/books/book.epub"), None, 10, 40, 100, &fp);

        assert!(store.load(&output_path, &fp, 40, None).is_none());
    }

    #[test]
    fn missing_output_file_discards_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        let store = CheckpointStore::for_output_path(&output_path);
        let fp = fingerprint();
        store.save(Path::new("/books/book.epub"), None, 10, 40, 100, &fp);

        assert!(store.load(&output_path, &fp, 40, None).is_none());
    }

    #[test]
    fn source_hash_mismatch_discards_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        File::create(&output_path).unwrap().write_all(&[0u8; 100]).unwrap();

        let store = CheckpointStore::for_output_path(&output_path);
        let fp = fingerprint();
        store.save(Path::new("/books/book.epub"), Some("abc123".into()), 10, 40, 100, &fp);

        assert!(store.load(&output_path, &fp, 40, Some("different")).is_none());
        assert!(store.load(&output_path, &fp, 40, Some("abc123")).is_some());
    }

    #[test]
    fn clear_removes_the_checkpoint_file() {
        let dir = tempfile::tempdir().unwrap();
        let output_path = dir.path().join("book.wav");
        File::create(&output_path).unwrap().write_all(&[0u8; 100]).unwrap();

        let store = CheckpointStore::for_output_path(&output_path);
        let fp = fingerprint();
        store.save(Path::new("/books/book.epub"), None, 10, 40, 100, &fp);
        assert!(store.checkpoint_path().exists());

        store.clear();
        assert!(!store.checkpoint_path().exists());

        store.clear();
    }
}
