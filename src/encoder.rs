//! The `Encoder` capability (§6): offline finalize-pass conversion from
//! accumulated WAV PCM to a compressed container.
//!
//! The default implementation shells out to the `ffmpeg` CLI via
//! `std::process::Command`, the same pattern the teacher used to drive
//! `mkvpropedit` for chapter-marker writes — a temp file in, a
//! subprocess, a status check, not an in-process codec binding.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use mktemp::Temp;

use crate::wav::WAV_HEADER_LEN;

/// A chapter marker at a time offset derived from cumulative chunk
/// sample counts (§6: "independent of the synthesizer"), handed to the
/// encoder's finalize pass so compressed containers can carry chapter
/// metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ChapterMarker {
    pub title: String,
    pub start_seconds: f64,
}

/// Containers an [`Encoder`] can finalize into. Mirrors
/// [`crate::settings::Container`] minus `Wav`, since WAV never needs a
/// finalize pass (§6: "only wav is natively produced by stream-append").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    Mp3,
    M4a,
    M4b,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Mp3 => "mp3",
            TargetFormat::M4a => "m4a",
            TargetFormat::M4b => "m4b",
        }
    }

    fn ffmpeg_codec_args(self, bitrate_kbps: u32) -> Vec<String> {
        match self {
            TargetFormat::Mp3 => vec!["-codec:a".into(), "libmp3lame".into(), "-b:a".into(), format!("{bitrate_kbps}k")],
            TargetFormat::M4a | TargetFormat::M4b => {
                vec!["-codec:a".into(), "aac".into(), "-b:a".into(), format!("{bitrate_kbps}k")]
            }
        }
    }
}

/// An external audio encoding backend. The core never links a codec
/// library directly (§9 "duck-typed backends" generalizes to: model the
/// encoder as an explicit capability with a tight method set).
pub trait Encoder: Send + Sync {
    /// Finalize-convert a WAV file on disk into `target_format` at
    /// `output_path`. `chapter_markers`, if non-empty, are placed at
    /// their declared time offsets in the resulting container (§6).
    fn convert(
        &self,
        input_wav_path: &Path,
        output_path: &Path,
        target_format: TargetFormat,
        bitrate_kbps: u32,
        chapter_markers: &[ChapterMarker],
    ) -> Result<()>;

    /// Concatenate several self-contained WAV byte buffers into one. Used
    /// to merge a batch before handing it to `convert` (§6).
    fn concat_wavs(&self, wavs: &[Vec<u8>]) -> Result<Vec<u8>> {
        default_concat_wavs(wavs)
    }
}

/// Naive RIFF-aware concatenation: re-wrap the combined PCM payloads of
/// every input WAV under one header. All inputs are assumed to share a
/// sample rate (the orchestrator only ever batches chunks from the same
/// run).
fn default_concat_wavs(wavs: &[Vec<u8>]) -> Result<Vec<u8>> {
    let mut combined_pcm = Vec::new();
    let mut sample_rate = None;
    for wav in wavs {
        let (pcm, rate) = crate::wav::extract_pcm16_mono(wav).map_err(|e| anyhow::anyhow!(e))?;
        sample_rate.get_or_insert(rate);
        combined_pcm.extend_from_slice(&pcm);
    }
    let sample_rate = sample_rate.context("concat_wavs called with no inputs")?;
    Ok(crate::wav::wrap_pcm16_mono(&combined_pcm, sample_rate))
}

/// Invokes the system `ffmpeg` binary for every finalize pass.
pub struct FfmpegCliEncoder {
    ffmpeg_path: PathBuf,
}

impl Default for FfmpegCliEncoder {
    fn default() -> Self {
        FfmpegCliEncoder { ffmpeg_path: PathBuf::from("ffmpeg") }
    }
}

impl FfmpegCliEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ffmpeg_path(ffmpeg_path: impl Into<PathBuf>) -> Self {
        FfmpegCliEncoder { ffmpeg_path: ffmpeg_path.into() }
    }
}

impl Encoder for FfmpegCliEncoder {
    fn convert(
        &self,
        input_wav_path: &Path,
        output_path: &Path,
        target_format: TargetFormat,
        bitrate_kbps: u32,
        chapter_markers: &[ChapterMarker],
    ) -> Result<()> {
        let metadata_temp = if chapter_markers.is_empty() {
            None
        } else {
            let duration = wav_duration_seconds(input_wav_path)?;
            let temp = Temp::new_file().context("creating ffmetadata temp file")?;
            std::fs::write(temp.as_path(), render_ffmetadata(chapter_markers, duration))
                .context("writing ffmetadata temp file")?;
            Some(temp)
        };

        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.arg("-y").arg("-i").arg(input_wav_path);
        if let Some(temp) = &metadata_temp {
            cmd.arg("-i").arg(temp.as_path()).arg("-map_metadata").arg("1");
        }
        let output = cmd
            .args(target_format.ffmpeg_codec_args(bitrate_kbps))
            .arg(output_path)
            .output()
            .with_context(|| format!("spawning ffmpeg to encode {}", input_wav_path.display()))?;

        if !output.status.success() {
            bail!(
                "ffmpeg failed converting {:?} to {:?}:\nstdout:\n{}\nstderr:\n{}",
                input_wav_path,
                output_path,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            );
        }

        Ok(())
    }

    fn concat_wavs(&self, wavs: &[Vec<u8>]) -> Result<Vec<u8>> {
        default_concat_wavs(wavs)
    }
}

/// Duration in seconds of a 44-byte-header PCM16 mono WAV file, read from
/// its header fields rather than its full data (the finalize pass may be
/// handed a book-length file).
fn wav_duration_seconds(path: &Path) -> Result<f64> {
    let mut file = std::fs::File::open(path).with_context(|| format!("opening {} for duration", path.display()))?;
    let mut header = [0u8; WAV_HEADER_LEN];
    file.read_exact(&mut header).with_context(|| format!("reading WAV header of {}", path.display()))?;

    let sample_rate = u32::from_le_bytes(header[24..28].try_into().unwrap());
    let data_size = u32::from_le_bytes(header[40..44].try_into().unwrap());
    if sample_rate == 0 {
        return Ok(0.0);
    }
    const BYTES_PER_SAMPLE: u32 = 2;
    Ok(data_size as f64 / BYTES_PER_SAMPLE as f64 / sample_rate as f64)
}

/// Render an `ffmetadata1` chapter file (the format `ffmpeg -i chapters.txt
/// -map_metadata 1` expects): each chapter's `END` is the next marker's
/// start, or `total_duration_secs` for the last one.
fn render_ffmetadata(markers: &[ChapterMarker], total_duration_secs: f64) -> String {
    let mut out = String::from(";FFMETADATA1\n");
    for (i, marker) in markers.iter().enumerate() {
        let start_ms = (marker.start_seconds * 1000.0).round().max(0.0) as u64;
        let end_secs = markers.get(i + 1).map(|m| m.start_seconds).unwrap_or(total_duration_secs);
        let end_ms = (end_secs * 1000.0).round().max(start_ms as f64) as u64;
        out.push_str("[CHAPTER]\nTIMEBASE=1/1000\n");
        out.push_str(&format!("START={start_ms}\nEND={end_ms}\n"));
        out.push_str(&format!("title={}\n", escape_ffmetadata(&marker.title)));
    }
    out
}

/// Escape `=`, `;`, `#`, `\`, and newlines per the `ffmetadata1` format,
/// which treats them as syntactically significant.
fn escape_ffmetadata(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Write `wav_bytes` to a scratch file, invoke `encoder.convert`, and
/// return the resulting encoded bytes. The scratch files are cleaned up
/// on drop via [`mktemp::Temp`].
pub fn encode_via_temp_files(
    encoder: &dyn Encoder,
    wav_bytes: &[u8],
    target_format: TargetFormat,
    bitrate_kbps: u32,
    chapter_markers: &[ChapterMarker],
) -> Result<Vec<u8>> {
    let input_temp = Temp::new_file().context("creating temp input file")?;
    std::fs::write(input_temp.as_path(), wav_bytes).context("writing temp input wav")?;

    let output_temp = Temp::new_file().context("creating temp output file")?;
    encoder.convert(input_temp.as_path(), output_temp.as_path(), target_format, bitrate_kbps, chapter_markers)?;

    std::fs::read(output_temp.as_path()).context("reading encoded output")
}

/// A test double that just records calls and round-trips WAV bytes
/// unchanged (tagged with a fake extension), so orchestrator tests don't
/// need a real `ffmpeg` on PATH.
#[derive(Default)]
pub struct FakeEncoder {
    pub convert_calls: std::sync::Mutex<Vec<(PathBuf, PathBuf, TargetFormat, Vec<ChapterMarker>)>>,
}

impl Encoder for FakeEncoder {
    fn convert(
        &self,
        input_wav_path: &Path,
        output_path: &Path,
        target_format: TargetFormat,
        _bitrate_kbps: u32,
        chapter_markers: &[ChapterMarker],
    ) -> Result<()> {
        self.convert_calls.lock().unwrap().push((
            input_wav_path.to_path_buf(),
            output_path.to_path_buf(),
            target_format,
            chapter_markers.to_vec(),
        ));
        std::fs::copy(input_wav_path, output_path).context("fake encoder copy")?;
        Ok(())
    }
}
