//! RIFF/WAV container helpers: wrap raw PCM16 mono into a standalone WAV
//! frame, parse a synthesizer's WAV output back down to PCM, and rewrite
//! the fixed-size header fields once an output file's final length is
//! known (§6 output file layout).

const WAV_FORMAT_PCM: u16 = 1;
const WAV_FORMAT_EXTENSIBLE: u16 = 0xFFFE;
const WAV_CHANNELS_MONO: u16 = 1;
const WAV_BITS_PER_SAMPLE: u16 = 16;
const WAV_BLOCK_ALIGN: u16 = (WAV_BITS_PER_SAMPLE / 8) * WAV_CHANNELS_MONO;
const WAV_FMT_CHUNK_SIZE: u32 = 16;
pub const WAV_HEADER_LEN: usize = 44;

/// Wrap raw PCM16 mono samples in a standalone 44-byte RIFF/WAV header.
pub fn wrap_pcm16_mono(pcm: &[u8], sample_rate: u32) -> Vec<u8> {
    let data_len = pcm.len() as u32;
    let file_len = (WAV_HEADER_LEN as u32 - 8) + data_len;
    let byte_rate = sample_rate * WAV_BLOCK_ALIGN as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());

    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&file_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&WAV_FMT_CHUNK_SIZE.to_le_bytes());
    out.extend_from_slice(&WAV_FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&WAV_CHANNELS_MONO.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&WAV_BLOCK_ALIGN.to_le_bytes());
    out.extend_from_slice(&WAV_BITS_PER_SAMPLE.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(pcm);

    out
}

/// `0.1` second of silence at `sample_rate`, already PCM16 mono (§4.5
/// empty/blank chunk substitution).
pub fn silence_pcm16_mono(sample_rate: u32, seconds: f64) -> Vec<u8> {
    let num_samples = (sample_rate as f64 * seconds).round() as usize;
    vec![0u8; num_samples * 2]
}

/// Extract the mono PCM16 payload (and declared sample rate) from a
/// synthesizer's self-contained WAV frame, downmixing multi-channel or
/// float32 data if present. Grounded on the same chunk-walk used to parse
/// WAV files produced by TTS engines for waveform preview/caching.
pub fn extract_pcm16_mono(wav_bytes: &[u8]) -> Result<(Vec<u8>, u32), String> {
    let (format, num_channels, sample_rate, bits_per_sample, data) = parse_chunks(wav_bytes)?;

    match (format, bits_per_sample) {
        (WAV_FORMAT_PCM, 16) | (WAV_FORMAT_EXTENSIBLE, 16) => {
            pcm16_to_mono(data, num_channels, sample_rate)
        }
        (3, 32) | (WAV_FORMAT_EXTENSIBLE, 32) => float32_to_mono(data, num_channels, sample_rate),
        _ => Err(format!("unsupported WAV format: format={format} bits={bits_per_sample}")),
    }
}

fn parse_chunks(wav_bytes: &[u8]) -> Result<(u16, usize, u32, u16, &[u8]), String> {
    if wav_bytes.len() < 12 {
        return Err("WAV too short to contain RIFF header".into());
    }
    if &wav_bytes[0..4] != b"RIFF" || &wav_bytes[8..12] != b"WAVE" {
        return Err("invalid RIFF/WAVE header".into());
    }

    let mut offset = 12;
    let mut format = None;
    let mut num_channels = None;
    let mut sample_rate = None;
    let mut bits_per_sample = None;
    let mut data_chunk: Option<&[u8]> = None;

    while offset + 8 <= wav_bytes.len() {
        let chunk_id = &wav_bytes[offset..offset + 4];
        let chunk_size = u32::from_le_bytes([
            wav_bytes[offset + 4],
            wav_bytes[offset + 5],
            wav_bytes[offset + 6],
            wav_bytes[offset + 7],
        ]) as usize;
        let chunk_start = offset + 8;
        let chunk_end = (chunk_start + chunk_size).min(wav_bytes.len());

        if chunk_id == b"fmt " {
            if chunk_size < 16 || chunk_end < chunk_start + 16 {
                return Err("WAV fmt chunk too small".into());
            }
            format = Some(u16::from_le_bytes([wav_bytes[chunk_start], wav_bytes[chunk_start + 1]]));
            num_channels =
                Some(u16::from_le_bytes([wav_bytes[chunk_start + 2], wav_bytes[chunk_start + 3]]) as usize);
            sample_rate = Some(u32::from_le_bytes([
                wav_bytes[chunk_start + 4],
                wav_bytes[chunk_start + 5],
                wav_bytes[chunk_start + 6],
                wav_bytes[chunk_start + 7],
            ]));
            bits_per_sample =
                Some(u16::from_le_bytes([wav_bytes[chunk_start + 14], wav_bytes[chunk_start + 15]]));
        } else if chunk_id == b"data" {
            data_chunk = Some(&wav_bytes[chunk_start..chunk_end]);
        }

        offset = chunk_end + (chunk_size % 2);
    }

    let format = format.ok_or("missing WAV fmt chunk")?;
    let num_channels = num_channels.ok_or("missing WAV channel count")?;
    let sample_rate = sample_rate.ok_or("missing WAV sample rate")?;
    let bits_per_sample = bits_per_sample.ok_or("missing WAV bits per sample")?;
    let data = data_chunk.ok_or("missing WAV data chunk")?;

    if num_channels == 0 {
        return Err("WAV has zero channels".into());
    }

    Ok((format, num_channels, sample_rate, bits_per_sample, data))
}

fn pcm16_to_mono(data: &[u8], num_channels: usize, sample_rate: u32) -> Result<(Vec<u8>, u32), String> {
    let frame_bytes = num_channels * 2;
    if frame_bytes == 0 || data.len() < frame_bytes {
        return Err("WAV data chunk too small".into());
    }
    let mut pcm = Vec::with_capacity(data.len() / num_channels);
    for frame in data.chunks_exact(frame_bytes) {
        let mut sum = 0i32;
        for ch in 0..num_channels {
            let off = ch * 2;
            sum += i16::from_le_bytes([frame[off], frame[off + 1]]) as i32;
        }
        let mono = (sum / num_channels as i32) as i16;
        pcm.extend_from_slice(&mono.to_le_bytes());
    }
    Ok((pcm, sample_rate))
}

fn float32_to_mono(data: &[u8], num_channels: usize, sample_rate: u32) -> Result<(Vec<u8>, u32), String> {
    let frame_bytes = num_channels * 4;
    if frame_bytes == 0 || data.len() < frame_bytes {
        return Err("WAV data chunk too small".into());
    }
    let num_frames = data.len() / frame_bytes;
    let mut pcm = Vec::with_capacity(num_frames * 2);

    for frame in data.chunks_exact(frame_bytes) {
        let mut sum = 0.0f32;
        for ch in 0..num_channels {
            let off = ch * 4;
            sum += f32::from_le_bytes([frame[off], frame[off + 1], frame[off + 2], frame[off + 3]]);
        }
        let mono = (sum / num_channels as f32).clamp(-1.0, 1.0);
        pcm.extend_from_slice(&((mono * 32767.0) as i16).to_le_bytes());
    }

    Ok((pcm, sample_rate))
}

/// Rewrite the RIFF size (bytes 4–7) and data chunk size (bytes 40–43) of
/// an on-disk 44-byte-header WAV file to reflect its actual final
/// length (§4.5 finalize, §8 property 8).
pub fn finalize_header(file: &mut std::fs::File) -> std::io::Result<()> {
    use std::io::{Seek, SeekFrom, Write};

    let file_len = file.metadata()?.len();
    if file_len < WAV_HEADER_LEN as u64 {
        return Ok(());
    }
    let riff_size = (file_len - 8) as u32;
    let data_size = (file_len - WAV_HEADER_LEN as u64) as u32;

    file.seek(SeekFrom::Start(4))?;
    file.write_all(&riff_size.to_le_bytes())?;
    file.seek(SeekFrom::Start(40))?;
    file.write_all(&data_size.to_le_bytes())?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_and_extract_round_trip() {
        let pcm: Vec<u8> = (0..2000u16).flat_map(|v| v.to_le_bytes()).collect();
        let wav = wrap_pcm16_mono(&pcm, 24_000);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");

        let (extracted, sample_rate) = extract_pcm16_mono(&wav).unwrap();
        assert_eq!(extracted, pcm);
        assert_eq!(sample_rate, 24_000);
    }

    #[test]
    fn silence_is_correct_length() {
        let silence = silence_pcm16_mono(24_000, 0.1);
        assert_eq!(silence.len(), 2400 * 2);
        assert!(silence.iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_truncated_header() {
        assert!(extract_pcm16_mono(&[0u8; 4]).is_err());
    }

    #[test]
    fn finalize_header_matches_actual_file_size() {
        use std::io::Write;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let pcm = vec![0u8; 1000];
        let wav = wrap_pcm16_mono(&pcm, 24_000);

        {
            let mut f = std::fs::File::create(&path).unwrap();
            f.write_all(&wav).unwrap();
            f.write_all(&[7u8; 500]).unwrap();
        }

        let mut f = std::fs::OpenOptions::new().read(true).write(true).open(&path).unwrap();
        finalize_header(&mut f).unwrap();
        drop(f);

        let bytes = std::fs::read(&path).unwrap();
        let total_len = bytes.len() as u64;
        let riff_size = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let data_size = u32::from_le_bytes(bytes[40..44].try_into().unwrap());
        assert_eq!(riff_size as u64, total_len - 8);
        assert_eq!(data_size as u64, total_len - WAV_HEADER_LEN as u64);
    }
}
