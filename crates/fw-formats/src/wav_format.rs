//! WAV container for 16-bit interleaved PCM.
//!
//! The engine works on headerless PCM; this wraps renders for listening
//! and unwraps WAV files whose payload already matches the mixer format.

use crate::WavError;
use std::io::Write;

const BITS_PER_SAMPLE: u16 = 16;

/// Headerless PCM pulled out of a WAV file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WavPcm {
    pub channels: u16,
    pub sample_rate: u32,
    /// Interleaved little-endian i16 samples
    pub pcm: Vec<u8>,
}

// --- Writing ---

/// Write `pcm` (interleaved LE i16) as a WAV file.
pub fn write_wav(
    w: &mut impl Write,
    pcm: &[u8],
    channels: u16,
    sample_rate: u32,
) -> std::io::Result<()> {
    let block_align = channels * (BITS_PER_SAMPLE / 8);
    let whole_frames = pcm.len() - pcm.len() % block_align.max(1) as usize;
    let data = &pcm[..whole_frames];
    let data_size = data.len() as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, channels, sample_rate, block_align)?;
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    w.write_all(data)
}

pub fn pcm_to_wav(pcm: &[u8], channels: u16, sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + pcm.len());
    write_wav(&mut buf, pcm, channels, sample_rate).expect("Vec<u8> write cannot fail");
    buf
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    channels: u16,
    sample_rate: u32,
    block_align: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&BITS_PER_SAMPLE.to_le_bytes())
}

// --- Reading ---

/// Extract the PCM payload of a 16-bit integer WAV file.
pub fn parse_wav(data: &[u8]) -> Result<WavPcm, WavError> {
    if data.len() < 12 {
        return Err(WavError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(WavError::InvalidHeader);
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32)> = None;
    let mut payload: Option<&[u8]> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;
        let body_start = pos + 8;

        if chunk_id == b"fmt " {
            if chunk_size < 16 || body_start + 16 > data.len() {
                return Err(WavError::UnexpectedEof);
            }
            if read_u16_le(data, body_start) != 1 {
                return Err(WavError::Unsupported("non-integer PCM"));
            }
            if read_u16_le(data, body_start + 14) != BITS_PER_SAMPLE {
                return Err(WavError::Unsupported("sample width other than 16 bits"));
            }
            let channels = read_u16_le(data, body_start + 2);
            let rate = read_u32_le(data, body_start + 4);
            fmt = Some((channels, rate));
        } else if chunk_id == b"data" {
            let end = body_start.saturating_add(chunk_size).min(data.len());
            payload = Some(&data[body_start..end]);
        }

        pos = body_start.saturating_add(chunk_size);
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (channels, sample_rate) = fmt.ok_or(WavError::InvalidHeader)?;
    let pcm = payload.ok_or(WavError::InvalidHeader)?.to_vec();
    Ok(WavPcm {
        channels,
        sample_rate,
        pcm,
    })
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn header_layout() {
        let wav = pcm_to_wav(&samples(&[1, -1, 2, -2]), 2, 44100);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(wav[4..8].try_into().unwrap()), 36 + 8);
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        // byte rate = rate * block align
        assert_eq!(u32::from_le_bytes(wav[28..32].try_into().unwrap()), 44100 * 4);
        assert_eq!(&wav[36..40], b"data");
        assert_eq!(wav.len(), 44 + 8);
    }

    #[test]
    fn partial_frames_are_dropped() {
        let mut pcm = samples(&[1, 2]);
        pcm.push(7);
        let wav = pcm_to_wav(&pcm, 2, 8000);
        assert_eq!(wav.len(), 44 + 4);
    }

    #[test]
    fn payload_comes_back_out() {
        let pcm = samples(&[100, -100, 32767, -32768]);
        let parsed = parse_wav(&pcm_to_wav(&pcm, 2, 22050)).unwrap();
        assert_eq!(parsed.channels, 2);
        assert_eq!(parsed.sample_rate, 22050);
        assert_eq!(parsed.pcm, pcm);
    }

    #[test]
    fn rejects_garbage_and_8_bit() {
        assert_eq!(parse_wav(b"RIFF"), Err(WavError::UnexpectedEof));
        assert_eq!(parse_wav(b"RIFX\0\0\0\0WAVEjunk"), Err(WavError::InvalidHeader));

        let mut wav = pcm_to_wav(&samples(&[0, 0]), 2, 8000);
        wav[34] = 8;
        assert!(matches!(parse_wav(&wav), Err(WavError::Unsupported(_))));
    }
}
