//! Core audio data types
//!
//! Sample formats, PCM layout descriptors and the small atomic wrapper used
//! for cross-thread f32 fields.
//!
//! **Format conventions:**
//! - All PCM data is interleaved: [L, R, L, R, ...]
//! - Multi-byte samples are little-endian
//! - One "frame" = one sample per channel

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU32, Ordering};

/// Native sample format of a buffer or wave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleFormat {
    /// Unsigned 8-bit, silence at 128
    U8,
    /// Signed 16-bit
    S16,
    /// Signed 32-bit
    S32,
    /// 32-bit IEEE float in [-1.0, 1.0]
    F32,
}

impl SampleFormat {
    /// Bytes used by one sample
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleFormat::U8 => 1,
            SampleFormat::S16 => 2,
            SampleFormat::S32 | SampleFormat::F32 => 4,
        }
    }

    /// Map a sample size in bits (8, 16 or 32) to a format.
    ///
    /// 32 bits means float, matching the wave and stream loaders.
    pub fn from_sample_size(bits: u32) -> Result<Self> {
        match bits {
            8 => Ok(SampleFormat::U8),
            16 => Ok(SampleFormat::S16),
            32 => Ok(SampleFormat::F32),
            other => Err(Error::InvalidArgument(format!(
                "Unsupported sample size: {} bits",
                other
            ))),
        }
    }

    /// Sample size in bits
    pub fn sample_size(&self) -> u32 {
        (self.bytes_per_sample() * 8) as u32
    }

    /// Byte value that encodes silence (unsigned 8-bit is offset by 128)
    pub fn silence_byte(&self) -> u8 {
        match self {
            SampleFormat::U8 => 128,
            _ => 0,
        }
    }

    /// Decode one little-endian sample to f32.
    ///
    /// `bytes` must be at least `bytes_per_sample()` long.
    #[inline]
    pub fn decode(&self, bytes: &[u8]) -> f32 {
        match self {
            SampleFormat::U8 => (bytes[0] as f32 - 128.0) / 128.0,
            SampleFormat::S16 => i16::from_le_bytes([bytes[0], bytes[1]]) as f32 / 32_768.0,
            SampleFormat::S32 => {
                i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
                    / 2_147_483_648.0
            }
            SampleFormat::F32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        }
    }

    /// Encode one f32 sample (clamped to [-1.0, 1.0]) as little-endian bytes.
    #[inline]
    pub fn encode(&self, sample: f32, out: &mut [u8]) {
        let s = sample.clamp(-1.0, 1.0);
        match self {
            SampleFormat::U8 => out[0] = ((s * 127.0) + 128.0).round() as u8,
            SampleFormat::S16 => {
                out[..2].copy_from_slice(&((s * 32_767.0).round() as i16).to_le_bytes())
            }
            SampleFormat::S32 => out[..4]
                .copy_from_slice(&((s as f64 * 2_147_483_647.0).round() as i32).to_le_bytes()),
            SampleFormat::F32 => out[..4].copy_from_slice(&s.to_le_bytes()),
        }
    }
}

/// Complete PCM layout: sample format, channel count and sample rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_format: SampleFormat,
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmFormat {
    pub fn new(sample_format: SampleFormat, channels: u16, sample_rate: u32) -> Self {
        Self {
            sample_format,
            channels,
            sample_rate,
        }
    }

    /// Bytes used by one frame (all channels)
    pub fn bytes_per_frame(&self) -> usize {
        self.sample_format.bytes_per_sample() * self.channels as usize
    }

    /// Reject zero channels or zero sample rate
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 {
            return Err(Error::InvalidArgument("Channel count must be > 0".to_string()));
        }
        if self.sample_rate == 0 {
            return Err(Error::InvalidArgument("Sample rate must be > 0".to_string()));
        }
        Ok(())
    }
}

/// How a buffer's backing storage is consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferUsage {
    /// Whole pre-decoded sound, read once per play
    Static,
    /// Two halves continuously refilled by a producer
    Stream,
}

/// PCM sample types accepted by the stream write path
pub trait PcmSample: Copy {
    /// Format this Rust type represents
    const FORMAT: SampleFormat;

    /// Write the little-endian bytes of this sample
    fn write_le(self, out: &mut [u8]);
}

impl PcmSample for u8 {
    const FORMAT: SampleFormat = SampleFormat::U8;
    fn write_le(self, out: &mut [u8]) {
        out[0] = self;
    }
}

impl PcmSample for i16 {
    const FORMAT: SampleFormat = SampleFormat::S16;
    fn write_le(self, out: &mut [u8]) {
        out[..2].copy_from_slice(&self.to_le_bytes());
    }
}

impl PcmSample for i32 {
    const FORMAT: SampleFormat = SampleFormat::S32;
    fn write_le(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }
}

impl PcmSample for f32 {
    const FORMAT: SampleFormat = SampleFormat::F32;
    fn write_le(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_le_bytes());
    }
}

/// Serialize typed samples into little-endian bytes
pub fn samples_to_bytes<S: PcmSample>(samples: &[S]) -> Vec<u8> {
    let width = S::FORMAT.bytes_per_sample();
    let mut bytes = vec![0u8; samples.len() * width];
    for (sample, out) in samples.iter().zip(bytes.chunks_exact_mut(width)) {
        sample.write_le(out);
    }
    bytes
}

/// f32 stored as its bit pattern in an AtomicU32
///
/// Used for volume and pitch, which the application thread writes while the
/// audio thread reads them without a lock.
#[derive(Debug)]
pub struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub fn new(value: f32) -> Self {
        Self(AtomicU32::new(value.to_bits()))
    }

    #[inline]
    pub fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn store(&self, value: f32) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bytes_per_frame() {
        assert_eq!(PcmFormat::new(SampleFormat::S16, 2, 44_100).bytes_per_frame(), 4);
        assert_eq!(PcmFormat::new(SampleFormat::F32, 2, 44_100).bytes_per_frame(), 8);
        assert_eq!(PcmFormat::new(SampleFormat::U8, 1, 22_050).bytes_per_frame(), 1);
    }

    #[test]
    fn test_sample_size_mapping() {
        assert_eq!(SampleFormat::from_sample_size(8).unwrap(), SampleFormat::U8);
        assert_eq!(SampleFormat::from_sample_size(16).unwrap(), SampleFormat::S16);
        assert_eq!(SampleFormat::from_sample_size(32).unwrap(), SampleFormat::F32);
        assert!(SampleFormat::from_sample_size(24).is_err());
    }

    #[test]
    fn test_decode_reference_values() {
        assert_eq!(SampleFormat::U8.decode(&[128]), 0.0);
        assert_eq!(SampleFormat::U8.decode(&[0]), -1.0);
        assert_eq!(SampleFormat::S16.decode(&i16::MIN.to_le_bytes()), -1.0);
        assert_eq!(SampleFormat::S16.decode(&16_384i16.to_le_bytes()), 0.5);
        assert_eq!(SampleFormat::F32.decode(&0.25f32.to_le_bytes()), 0.25);
    }

    #[test]
    fn test_encode_clamps() {
        let mut out = [0u8; 2];
        SampleFormat::S16.encode(2.0, &mut out);
        assert_eq!(i16::from_le_bytes(out), 32_767);

        let mut byte = [0u8; 1];
        SampleFormat::U8.encode(0.0, &mut byte);
        assert_eq!(byte[0], 128);
    }

    #[test]
    fn test_format_validation() {
        assert!(PcmFormat::new(SampleFormat::F32, 0, 44_100).validate().is_err());
        assert!(PcmFormat::new(SampleFormat::F32, 2, 0).validate().is_err());
        assert!(PcmFormat::new(SampleFormat::F32, 2, 44_100).validate().is_ok());
    }

    #[test]
    fn test_atomic_f32() {
        let value = AtomicF32::new(1.0);
        assert_eq!(value.load(), 1.0);
        value.store(-0.35);
        assert_eq!(value.load(), -0.35);
    }
}
