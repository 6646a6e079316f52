//! In-memory PCM clips
//!
//! A `Wave` is raw interleaved little-endian PCM plus its layout. It is the
//! input to sounds and the output of offline decoding. Sample sizes follow
//! the loaders: 8 = unsigned 8-bit, 16 = signed 16-bit, 32 = float.

use crate::audio::converter::to_f32_interleaved;
use crate::audio::decoder::{self, FileType};
use crate::audio::resampler::Resampler;
use crate::audio::types::{PcmFormat, SampleFormat};
use crate::error::{Error, Result};
use std::io::{Cursor, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Decoded audio clip
#[derive(Debug, Clone, PartialEq)]
pub struct Wave {
    frame_count: usize,
    sample_rate: u32,
    sample_size: u32,
    channels: u16,
    data: Vec<u8>,
}

impl Wave {
    /// Wrap raw PCM bytes. `data` must hold whole frames.
    pub fn new(sample_rate: u32, sample_size: u32, channels: u16, data: Vec<u8>) -> Result<Self> {
        let format = PcmFormat::new(SampleFormat::from_sample_size(sample_size)?, channels, sample_rate);
        format.validate()?;

        let bpf = format.bytes_per_frame();
        if data.len() % bpf != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte frames",
                data.len(),
                bpf
            )));
        }

        Ok(Self {
            frame_count: data.len() / bpf,
            sample_rate,
            sample_size,
            channels,
            data,
        })
    }

    /// Build a 32-bit float wave from interleaved samples
    pub fn from_samples(sample_rate: u32, channels: u16, samples: &[f32]) -> Result<Self> {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(sample_rate, 32, channels, data)
    }

    /// Load a wave from a file (WAV, OGG, FLAC, MP3).
    pub fn load(path: &Path) -> Result<Self> {
        let wave = match FileType::from_path(path)? {
            FileType::Wav => Self::read_wav(hound::WavReader::open(path)?)?,
            _ => Self::decode(decoder::open(path)?.as_mut())?,
        };

        info!(
            "Wave loaded: {} ({} frames, {}Hz, {}-bit, {}ch)",
            path.display(),
            wave.frame_count,
            wave.sample_rate,
            wave.sample_size,
            wave.channels
        );
        Ok(wave)
    }

    /// Load a wave from an in-memory file image; `file_type` is an extension
    /// such as ".wav".
    pub fn load_from_memory(file_type: &str, bytes: &[u8]) -> Result<Self> {
        match FileType::from_extension(file_type)? {
            FileType::Wav => Self::read_wav(hound::WavReader::new(Cursor::new(bytes))?),
            _ => Self::decode(decoder::open_memory(file_type, bytes.to_vec())?.as_mut()),
        }
    }

    /// Keep WAV samples in their native width where possible.
    ///
    /// 24-bit and 32-bit integer files are widened to float.
    fn read_wav<R: Read>(mut reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();

        let (sample_size, data) = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 8) => {
                let mut data = Vec::with_capacity(reader.len() as usize);
                for sample in reader.samples::<i8>() {
                    data.push((sample? as i16 + 128) as u8);
                }
                (8, data)
            }
            (hound::SampleFormat::Int, 16) => {
                let mut data = Vec::with_capacity(reader.len() as usize * 2);
                for sample in reader.samples::<i16>() {
                    data.extend_from_slice(&sample?.to_le_bytes());
                }
                (16, data)
            }
            (hound::SampleFormat::Int, bits @ (24 | 32)) => {
                let scale = 1.0 / (1u64 << (bits - 1)) as f32;
                let mut data = Vec::with_capacity(reader.len() as usize * 4);
                for sample in reader.samples::<i32>() {
                    data.extend_from_slice(&(sample? as f32 * scale).to_le_bytes());
                }
                (32, data)
            }
            (hound::SampleFormat::Float, 32) => {
                let mut data = Vec::with_capacity(reader.len() as usize * 4);
                for sample in reader.samples::<f32>() {
                    data.extend_from_slice(&sample?.to_le_bytes());
                }
                (32, data)
            }
            (format, bits) => {
                return Err(Error::UnsupportedFormat(format!(
                    "WAV {:?} with {} bits per sample",
                    format, bits
                )))
            }
        };

        debug!(
            "WAV read: {}Hz, {}ch, {} bits stored as {}",
            spec.sample_rate, spec.channels, spec.bits_per_sample, sample_size
        );
        Self::new(spec.sample_rate, sample_size, spec.channels, data)
    }

    fn decode(decoder: &mut dyn decoder::Decoder) -> Result<Self> {
        let info = decoder.info();
        let samples = decoder::decode_all(decoder)?;
        Self::from_samples(info.sample_rate, info.channels, &samples)
    }

    /// Write the wave as a WAV file.
    pub fn export(&self, path: &Path) -> Result<()> {
        let spec = hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.sample_size as u16,
            sample_format: if self.sample_size == 32 {
                hound::SampleFormat::Float
            } else {
                hound::SampleFormat::Int
            },
        };

        let mut writer = hound::WavWriter::create(path, spec)?;
        match self.sample_format() {
            SampleFormat::U8 => {
                for &byte in &self.data {
                    writer.write_sample((byte as i16 - 128) as i8)?;
                }
            }
            SampleFormat::S16 => {
                for chunk in self.data.chunks_exact(2) {
                    writer.write_sample(i16::from_le_bytes([chunk[0], chunk[1]]))?;
                }
            }
            SampleFormat::F32 | SampleFormat::S32 => {
                for chunk in self.data.chunks_exact(4) {
                    writer.write_sample(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))?;
                }
            }
        }
        writer.finalize()?;

        info!("Wave exported: {}", path.display());
        Ok(())
    }

    /// Data present and layout valid
    pub fn is_ready(&self) -> bool {
        !self.data.is_empty()
            && self.sample_rate > 0
            && self.channels > 0
            && matches!(self.sample_size, 8 | 16 | 32)
    }

    /// Keep frames `init_frame..final_frame`.
    ///
    /// Requires `init_frame < final_frame <= frame_count`; otherwise the wave
    /// is left unchanged.
    pub fn crop(&mut self, init_frame: usize, final_frame: usize) -> Result<()> {
        if init_frame >= final_frame || final_frame > self.frame_count {
            warn!(
                "Wave crop range {}..{} invalid for {} frames",
                init_frame, final_frame, self.frame_count
            );
            return Err(Error::InvalidArgument(format!(
                "Crop range {}..{} outside 0..{}",
                init_frame, final_frame, self.frame_count
            )));
        }

        let bpf = self.pcm_format().bytes_per_frame();
        self.data.truncate(final_frame * bpf);
        self.data.drain(..init_frame * bpf);
        self.frame_count = final_frame - init_frame;
        Ok(())
    }

    /// Convert to another rate, sample size and channel count in place.
    pub fn format(&mut self, sample_rate: u32, sample_size: u32, channels: u16) -> Result<()> {
        let target = PcmFormat::new(SampleFormat::from_sample_size(sample_size)?, channels, sample_rate);
        target.validate()?;

        if target == self.pcm_format() {
            return Ok(());
        }

        let mapped = to_f32_interleaved(self.pcm_format(), &self.data, channels as usize);
        let resampled = Resampler::resample(&mapped, self.sample_rate, sample_rate, channels)?;

        let width = target.sample_format.bytes_per_sample();
        let mut data = vec![0u8; resampled.len() * width];
        for (&sample, out) in resampled.iter().zip(data.chunks_exact_mut(width)) {
            target.sample_format.encode(sample, out);
        }

        debug!(
            "Wave formatted: {}Hz/{}bit/{}ch -> {}Hz/{}bit/{}ch",
            self.sample_rate, self.sample_size, self.channels, sample_rate, sample_size, channels
        );

        self.frame_count = data.len() / target.bytes_per_frame();
        self.sample_rate = sample_rate;
        self.sample_size = sample_size;
        self.channels = channels;
        self.data = data;
        Ok(())
    }

    /// Samples as interleaved f32 in the wave's own channel layout
    pub fn samples(&self) -> Vec<f32> {
        to_f32_interleaved(self.pcm_format(), &self.data, self.channels as usize)
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_size(&self) -> u32 {
        self.sample_size
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Raw little-endian PCM bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn sample_format(&self) -> SampleFormat {
        self.pcm_format().sample_format
    }

    pub fn pcm_format(&self) -> PcmFormat {
        let sample_format = match self.sample_size {
            8 => SampleFormat::U8,
            16 => SampleFormat::S16,
            _ => SampleFormat::F32,
        };
        PcmFormat::new(sample_format, self.channels, self.sample_rate)
    }

    /// Length in seconds
    pub fn duration_secs(&self) -> f32 {
        self.frame_count as f32 / self.sample_rate as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp_wave(frames: usize) -> Wave {
        let samples: Vec<f32> = (0..frames * 2).map(|i| (i as f32 / (frames * 2) as f32) - 0.5).collect();
        Wave::from_samples(44_100, 2, &samples).unwrap()
    }

    #[test]
    fn test_new_validates_layout() {
        assert!(Wave::new(44_100, 16, 2, vec![0; 8]).is_ok());
        assert!(Wave::new(44_100, 16, 2, vec![0; 7]).is_err());
        assert!(Wave::new(44_100, 24, 2, vec![0; 6]).is_err());
        assert!(Wave::new(0, 16, 2, vec![0; 4]).is_err());
        assert_eq!(Wave::new(44_100, 16, 2, vec![0; 8]).unwrap().frame_count(), 2);
    }

    #[test]
    fn test_is_ready() {
        assert!(ramp_wave(4).is_ready());
        assert!(!Wave::new(44_100, 16, 2, Vec::new()).unwrap().is_ready());
    }

    #[test]
    fn test_crop_keeps_range() {
        let mut wave = ramp_wave(100);
        let original = wave.samples();

        wave.crop(10, 30).unwrap();
        assert_eq!(wave.frame_count(), 20);
        assert_eq!(wave.samples(), original[20..60].to_vec());
    }

    #[test]
    fn test_crop_invalid_range_unchanged() {
        let mut wave = ramp_wave(10);
        let before = wave.clone();
        assert!(wave.crop(5, 5).is_err());
        assert!(wave.crop(0, 11).is_err());
        assert!(wave.crop(8, 2).is_err());
        assert_eq!(wave, before);
    }

    #[test]
    fn test_format_to_mono_s16() {
        let mut wave = Wave::from_samples(44_100, 2, &[0.5, 0.5, -0.5, -0.5]).unwrap();
        wave.format(44_100, 16, 1).unwrap();

        assert_eq!(wave.channels(), 1);
        assert_eq!(wave.sample_size(), 16);
        assert_eq!(wave.frame_count(), 2);
        assert_eq!(wave.data().len(), 4);
        let samples = wave.samples();
        assert!((samples[0] - 0.5).abs() < 1e-3);
        assert!((samples[1] + 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_format_rate_change_frame_count() {
        let mut wave = ramp_wave(1_000);
        wave.format(22_050, 32, 2).unwrap();
        assert_eq!(wave.sample_rate(), 22_050);
        assert_eq!(wave.frame_count(), 500);
    }

    #[test]
    fn test_duration() {
        let wave = ramp_wave(22_050);
        assert!((wave.duration_secs() - 0.5).abs() < 1e-6);
    }
}
