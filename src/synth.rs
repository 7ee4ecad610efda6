//! The `Synthesizer` capability (§6, §9 "duck-typed backends").
//!
//! The Python source drove a TTS backend through duck typing and
//! string-matched its exceptions. This port models it as one trait with
//! a tight method set; the orchestrator never inspects a backend beyond
//! this interface.

use crate::error::SynthError;

/// An external text-to-speech backend. Implementations are not assumed
/// thread-safe (§5): in bounded-parallel mode the orchestrator either
/// gives each worker its own handle or serializes calls through this
/// trait itself.
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` at the given `voice`/`speed` and return a
    /// self-contained WAV frame (RIFF header + PCM16 mono at the
    /// backend's native sample rate).
    fn synthesize(&self, text: &str, voice: &str, speed: f64) -> Result<Vec<u8>, SynthError>;

    /// The backend's documented maximum input length in characters, if
    /// it publishes one. The chunker is expected to respect it; the
    /// orchestrator treats an `OverLength` error as a chunker bug to
    /// recover from by retrying at a tighter cap.
    fn max_input_chars(&self) -> Option<usize> {
        None
    }

    /// Native sample rate of the PCM the backend returns. Used for
    /// silence substitution so empty chunks stay sample-rate-consistent.
    fn sample_rate(&self) -> u32;

    /// Voices this backend can speak as, if it can enumerate them. Not
    /// used by the core pipeline; exposed for callers building a voice
    /// picker (§6: "optional, not used by the core").
    fn list_voices(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A deterministic test double: returns a fixed tone-free silent WAV
/// frame whose length is proportional to the input text, so tests can
/// assert on output size without depending on a real TTS engine.
/// Optionally scripted to fail a configured number of times before
/// succeeding, to exercise the retry path (§8 scenario S5).
pub struct FakeSynthesizer {
    sample_rate: u32,
    chars_per_second: f64,
    max_input_chars: Option<usize>,
    scripted_failures: std::sync::Mutex<std::collections::HashMap<String, u32>>,
}

impl FakeSynthesizer {
    pub fn new(sample_rate: u32) -> Self {
        FakeSynthesizer {
            sample_rate,
            chars_per_second: 15.0,
            max_input_chars: None,
            scripted_failures: std::sync::Mutex::new(std::collections::HashMap::new()),
        }
    }

    pub fn with_max_input_chars(mut self, max: usize) -> Self {
        self.max_input_chars = Some(max);
        self
    }

    /// Script `text` to fail with a transient error the first `count`
    /// times it is synthesized, then succeed.
    pub fn fail_first_n_times(&self, text: &str, count: u32) {
        self.scripted_failures.lock().unwrap().insert(text.to_string(), count);
    }
}

impl Synthesizer for FakeSynthesizer {
    fn synthesize(&self, text: &str, _voice: &str, speed: f64) -> Result<Vec<u8>, SynthError> {
        if let Some(max) = self.max_input_chars {
            if text.chars().count() > max {
                return Err(SynthError::OverLength { len: text.chars().count(), max });
            }
        }

        {
            let mut failures = self.scripted_failures.lock().unwrap();
            if let Some(remaining) = failures.get_mut(text) {
                if *remaining > 0 {
                    *remaining -= 1;
                    return Err(SynthError::Transient("scripted test failure".to_string()));
                }
            }
        }

        let seconds = (text.chars().count() as f64 / self.chars_per_second / speed.max(0.01)).max(0.01);
        let pcm = crate::wav::silence_pcm16_mono(self.sample_rate, seconds);
        Ok(crate::wav::wrap_pcm16_mono(&pcm, self.sample_rate))
    }

    fn max_input_chars(&self) -> Option<usize> {
        self.max_input_chars
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_synthesizer_produces_a_wav_frame() {
        let synth = FakeSynthesizer::new(24_000);
        let wav = synth.synthesize("hello world", "am_michael", 1.0).unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
    }

    #[test]
    fn fake_synthesizer_rejects_overlength_input() {
        let synth = FakeSynthesizer::new(24_000).with_max_input_chars(10);
        let result = synth.synthesize(&"a".repeat(20), "v", 1.0);
        assert!(matches!(result, Err(SynthError::OverLength { .. })));
    }

    #[test]
    fn scripted_failures_then_success() {
        let synth = FakeSynthesizer::new(24_000);
        synth.fail_first_n_times("retry me", 2);
        assert!(synth.synthesize("retry me", "v", 1.0).is_err());
        assert!(synth.synthesize("retry me", "v", 1.0).is_err());
        assert!(synth.synthesize("retry me", "v", 1.0).is_ok());
    }
}
