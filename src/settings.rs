//! Explicit, serializable run settings.
//!
//! The Python source kept a process-wide mutable config manager; this
//! port replaces it with a plain value constructed by the caller and
//! threaded into [`crate::orchestrator::Orchestrator`] at construction
//! (see SPEC_FULL §9, §10.3). [`SettingsFingerprint`] is a pure function
//! of this value alone.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Output container. Only `Wav` is natively produced by stream-append;
/// the others require a finalize pass over accumulated PCM (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Wav,
    Mp3,
    M4a,
    M4b,
}

impl Container {
    pub fn is_raw_pcm(self) -> bool {
        matches!(self, Container::Wav)
    }

    pub fn extension(self) -> &'static str {
        match self {
            Container::Wav => "wav",
            Container::Mp3 => "mp3",
            Container::M4a => "m4a",
            Container::M4b => "m4b",
        }
    }
}

/// Execution mode for the streaming orchestrator (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConcurrencyMode {
    /// One chunk in flight at a time. Default; required for on-device
    /// accelerators that overheat under oversubscription.
    Sequential,
    /// Bounded worker pool, adaptive size, batched submission.
    BoundedParallel,
}

/// Every parameter that can change the resulting audio bytes, plus the
/// operational knobs that govern checkpointing, retries, and
/// backpressure. Passed by value into the orchestrator; never mutated
/// globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // --- audio-affecting parameters (participate in the fingerprint) ---
    pub backend_id: String,
    pub voice: String,
    pub speed: f64,
    pub sample_rate: u32,
    pub container: Container,
    pub chunk_max_chars: usize,
    /// Bitrate/quality knob for compressed containers. Part of the
    /// fingerprint because it changes the resulting bytes even though it
    /// does not change the decoded audio (§9 open question: MP3/M4A
    /// encoder parameters are settings inputs and fingerprint
    /// participants).
    pub encoder_bitrate_kbps: u32,

    // --- operational knobs (do not affect audio bytes) ---
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default)]
    pub continue_on_error: bool,
    #[serde(default = "default_concurrency_mode")]
    pub concurrency_mode: ConcurrencyMode,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_cpu_high_water")]
    pub cpu_high_water: f64,
    #[serde(default = "default_cpu_low_water")]
    pub cpu_low_water: f64,
    #[serde(default = "default_classifier_sensitivity")]
    pub classifier_sensitivity: f64,
}

fn default_checkpoint_interval() -> usize {
    25
}
fn default_retry_count() -> u32 {
    3
}
fn default_concurrency_mode() -> ConcurrencyMode {
    ConcurrencyMode::Sequential
}
fn default_max_workers() -> usize {
    4
}
fn default_batch_size() -> usize {
    4
}
fn default_cpu_high_water() -> f64 {
    75.0
}
fn default_cpu_low_water() -> f64 {
    70.0
}
fn default_classifier_sensitivity() -> f64 {
    0.5
}

impl Settings {
    pub fn new(backend_id: impl Into<String>, voice: impl Into<String>) -> Self {
        Settings {
            backend_id: backend_id.into(),
            voice: voice.into(),
            speed: 1.0,
            sample_rate: 24_000,
            container: Container::Wav,
            chunk_max_chars: 400,
            encoder_bitrate_kbps: 128,
            checkpoint_interval: default_checkpoint_interval(),
            retry_count: default_retry_count(),
            continue_on_error: false,
            concurrency_mode: default_concurrency_mode(),
            max_workers: default_max_workers(),
            batch_size: default_batch_size(),
            cpu_high_water: default_cpu_high_water(),
            cpu_low_water: default_cpu_low_water(),
            classifier_sensitivity: default_classifier_sensitivity(),
        }
    }

    /// Basic structural validation, raised as `ConvertError::InvalidSettings`
    /// before any synthesis happens (§7).
    pub fn validate(&self) -> Result<(), String> {
        if self.voice.trim().is_empty() {
            return Err("voice must not be empty".into());
        }
        if self.speed <= 0.0 {
            return Err(format!("speed must be positive, got {}", self.speed));
        }
        if self.sample_rate == 0 {
            return Err("sample_rate must be positive".into());
        }
        if self.chunk_max_chars == 0 {
            return Err("chunk_max_chars must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.classifier_sensitivity) {
            return Err(format!(
                "classifier_sensitivity must be in [0,1], got {}",
                self.classifier_sensitivity
            ));
        }
        if self.max_workers == 0 {
            return Err("max_workers must be at least 1".into());
        }
        Ok(())
    }

    /// The subset of fields that can change the resulting audio bytes.
    /// This is what gets hashed into [`SettingsFingerprint`] — the
    /// operational knobs (retry count, checkpoint interval, ...) are
    /// deliberately excluded, since changing them does not invalidate a
    /// checkpoint.
    fn audio_affecting_canonical_json(&self) -> String {
        #[derive(Serialize)]
        struct AudioAffecting<'a> {
            backend_id: &'a str,
            voice: &'a str,
            speed_bits: u64,
            sample_rate: u32,
            container: Container,
            chunk_max_chars: usize,
            encoder_bitrate_kbps: u32,
        }
        let canonical = AudioAffecting {
            backend_id: &self.backend_id,
            voice: &self.voice,
            // Hash the bit pattern, not the float, so the fingerprint is
            // exact and not subject to float-formatting drift.
            speed_bits: self.speed.to_bits(),
            sample_rate: self.sample_rate,
            container: self.container,
            chunk_max_chars: self.chunk_max_chars,
            encoder_bitrate_kbps: self.encoder_bitrate_kbps,
        };
        serde_json::to_string(&canonical).expect("Settings fields are always serializable")
    }

    pub fn fingerprint(&self) -> SettingsFingerprint {
        let mut hasher = Sha256::new();
        hasher.update(self.audio_affecting_canonical_json().as_bytes());
        let digest = hasher.finalize();
        let hex = digest.iter().map(|b| format!("{b:02x}")).collect::<String>();
        SettingsFingerprint(hex[..8].to_string())
    }
}

/// A content-addressed hex digest over every audio-affecting setting.
/// The sole arbiter of checkpoint compatibility (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsFingerprint(pub String);

impl std::fmt::Display for SettingsFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_stable_and_eight_hex_chars() {
        let s = Settings::new("kokoro", "am_michael");
        let fp1 = s.fingerprint();
        let fp2 = s.fingerprint();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1.0.len(), 8);
        assert!(fp1.0.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fingerprint_changes_with_speed() {
        let mut s = Settings::new("kokoro", "am_michael");
        let fp1 = s.fingerprint();
        s.speed = 1.1;
        let fp2 = s.fingerprint();
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn fingerprint_unaffected_by_operational_knobs() {
        let mut s = Settings::new("kokoro", "am_michael");
        let fp1 = s.fingerprint();
        s.retry_count = 10;
        s.checkpoint_interval = 5;
        s.continue_on_error = true;
        s.max_workers = 8;
        let fp2 = s.fingerprint();
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn validate_rejects_bad_speed() {
        let mut s = Settings::new("kokoro", "am_michael");
        s.speed = 0.0;
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_rejects_empty_voice() {
        let s = Settings::new("kokoro", "");
        assert!(s.validate().is_err());
    }
}
