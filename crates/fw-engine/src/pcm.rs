//! PCM geometry and sample arithmetic.
//!
//! Everything is interleaved signed 16-bit little-endian. Samples are
//! normalised by 32768 so that every i16 maps exactly onto a float and back.

use std::time::Duration;

/// Width of one sample. Only 16-bit PCM is supported.
pub const BYTES_PER_SAMPLE: usize = 2;

const SCALE: f64 = 32768.0;

/// Output geometry shared by the mixer, its clips and the sinks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmFormat {
    /// Interleaved channels per frame
    pub channels: u16,
    /// Frames per second
    pub sample_rate: u32,
    /// Frames mixed and written per output period
    pub frames_per_write: usize,
}

impl PcmFormat {
    pub const fn new(channels: u16, sample_rate: u32, frames_per_write: usize) -> Self {
        Self {
            channels,
            sample_rate,
            frames_per_write,
        }
    }

    pub const fn bytes_per_sample(&self) -> usize {
        BYTES_PER_SAMPLE
    }

    /// Bytes in one interleaved frame.
    pub const fn frame_stride(&self) -> usize {
        self.channels as usize * BYTES_PER_SAMPLE
    }

    /// Bytes in one output period; also the size of every clip buffer.
    pub const fn buffer_size(&self) -> usize {
        self.frames_per_write * self.frame_stride()
    }

    /// Length of one output period in seconds.
    pub fn period_secs(&self) -> f64 {
        self.frames_per_write as f64 / self.sample_rate as f64
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(self.period_secs())
    }

    /// Reject geometry the mixer cannot render.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.channels == 0 {
            return Err("channels must be at least 1");
        }
        if self.sample_rate == 0 {
            return Err("sample rate must be positive");
        }
        if self.frames_per_write == 0 {
            return Err("frames per write must be positive");
        }
        Ok(())
    }

    /// Seconds of audio in `bytes` of PCM.
    pub fn bytes_to_secs(&self, bytes: u64) -> f64 {
        let stride = self.frame_stride() as u64;
        if stride == 0 || self.sample_rate == 0 {
            return 0.0;
        }
        (bytes / stride) as f64 / self.sample_rate as f64
    }
}

impl Default for PcmFormat {
    /// Stereo, 44.1 kHz, 128 frames per write.
    fn default() -> Self {
        Self::new(2, 44100, 128)
    }
}

/// Little-endian i16 to [-1.0, 1.0).
#[inline]
pub fn decode_sample(bytes: [u8; 2]) -> f64 {
    i16::from_le_bytes(bytes) as f64 / SCALE
}

/// Hard-clip to [-1.0, 1.0] and re-encode as little-endian i16.
#[inline]
pub fn encode_sample(value: f64) -> [u8; 2] {
    let clipped = value.clamp(-1.0, 1.0);
    let scaled = (clipped * SCALE).round().clamp(i16::MIN as f64, i16::MAX as f64);
    (scaled as i16).to_le_bytes()
}

/// Add `clip` scaled by `gain` onto the samples already in `out`.
///
/// Only the overlapping whole samples are touched.
#[inline]
pub fn mix_pcm(out: &mut [u8], clip: &[u8], gain: f64) {
    for (o, c) in out
        .chunks_exact_mut(BYTES_PER_SAMPLE)
        .zip(clip.chunks_exact(BYTES_PER_SAMPLE))
    {
        let mixed = decode_sample([o[0], o[1]]) + decode_sample([c[0], c[1]]) * gain;
        o.copy_from_slice(&encode_sample(mixed));
    }
}

/// Serialise samples as interleaved little-endian PCM.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
        bytes
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn default_geometry() {
        let format = PcmFormat::default();
        assert_eq!(format.frame_stride(), 4);
        assert_eq!(format.buffer_size(), 512);
        assert_eq!(format.bytes_per_sample(), 2);
        assert!((format.period_secs() - 128.0 / 44100.0).abs() < 1e-12);
        assert_eq!(format.bytes_to_secs(44100 * 4), 1.0);
    }

    #[test]
    fn degenerate_geometry_is_rejected() {
        assert_eq!(PcmFormat::default().validate(), Ok(()));
        assert!(PcmFormat::new(0, 44100, 128).validate().is_err());
        assert!(PcmFormat::new(2, 0, 128).validate().is_err());
        assert!(PcmFormat::new(2, 44100, 0).validate().is_err());
    }

    #[test]
    fn every_sample_survives_the_float_trip() {
        for value in [i16::MIN, -12345, -1, 0, 1, 777, i16::MAX] {
            assert_eq!(encode_sample(decode_sample(value.to_le_bytes())), value.to_le_bytes());
        }
    }

    #[test]
    fn encode_hard_clips() {
        assert_eq!(encode_sample(3.0), i16::MAX.to_le_bytes());
        assert_eq!(encode_sample(-3.0), i16::MIN.to_le_bytes());
    }

    #[test]
    fn silent_clip_leaves_frame_unchanged() {
        let original = samples_to_bytes(&[i16::MIN, -300, 0, 5, 12000, i16::MAX]);
        let mut out = original.clone();
        mix_pcm(&mut out, &[0u8; 12], 0.8);
        assert_eq!(out, original);
    }

    #[test]
    fn mix_is_additive_and_scaled() {
        let mut out = samples_to_bytes(&[1000, -1000]);
        mix_pcm(&mut out, &samples_to_bytes(&[500, 500]), 1.0);
        assert_eq!(bytes_to_samples(&out), vec![1500, -500]);
        mix_pcm(&mut out, &samples_to_bytes(&[1000, 1000]), 0.5);
        assert_eq!(bytes_to_samples(&out), vec![2000, 0]);
    }

    #[test]
    fn mix_order_does_not_matter_without_clipping() {
        let a = samples_to_bytes(&[100, -2000, 3000, 7]);
        let b = samples_to_bytes(&[-50, 900, 12, -7]);
        let base = samples_to_bytes(&[10, 20, 30, 40]);

        let mut ab = base.clone();
        mix_pcm(&mut ab, &a, 1.0);
        mix_pcm(&mut ab, &b, 1.0);
        let mut ba = base;
        mix_pcm(&mut ba, &b, 1.0);
        mix_pcm(&mut ba, &a, 1.0);
        assert_eq!(ab, ba);
    }

    #[test]
    fn loud_clips_clip() {
        let mut out = samples_to_bytes(&[30000]);
        mix_pcm(&mut out, &samples_to_bytes(&[30000]), 1.0);
        assert_eq!(bytes_to_samples(&out), vec![i16::MAX]);
    }
}
