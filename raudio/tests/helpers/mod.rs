//! Shared helpers for raudio integration tests
//!
//! - Engine construction with small, deterministic stream sizes
//! - Driving the mixer without an audio device
//! - Deterministic WAV fixtures written with hound into temp directories

#![allow(dead_code)]

use hound::{WavSpec, WavWriter};
use raudio::{AudioConfig, AudioEngine};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Device rate used by every test engine
pub const TEST_SAMPLE_RATE: u32 = 44_100;

/// Device channel count used by every test engine
pub const TEST_CHANNELS: u16 = 2;

/// Engine with default device format and no device opened
pub fn test_engine() -> AudioEngine {
    AudioEngine::new(AudioConfig::default()).expect("default config is valid")
}

/// Engine whose streams use `sub_buffer_frames` per half
pub fn test_engine_with_stream_size(sub_buffer_frames: u32) -> AudioEngine {
    let engine = test_engine();
    engine.set_audio_stream_buffer_size_default(sub_buffer_frames);
    engine
}

/// Run one mixing pass of `frames` frames and return the interleaved output
pub fn mix(engine: &AudioEngine, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; frames * TEST_CHANNELS as usize];
    engine.mixer().mix(&mut out);
    out
}

/// Frames in which any channel is non-silent
pub fn audible_frames(out: &[f32]) -> usize {
    out.chunks_exact(TEST_CHANNELS as usize)
        .filter(|frame| frame.iter().any(|s| s.abs() > 1e-6))
        .count()
}

/// Interleaved stereo ramp with distinct, non-zero values
pub fn stereo_ramp(frames: usize) -> Vec<f32> {
    (0..frames * 2).map(|i| (i + 1) as f32 / (frames * 4) as f32).collect()
}

/// Write a WAV of constant-value 16-bit frames
pub fn write_constant_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    value: i16,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for _ in 0..frames * channels as usize {
        writer.write_sample(value)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Write a 16-bit sine WAV at `frequency_hz`, amplitude 0.5
pub fn write_sine_wav(
    path: &Path,
    sample_rate: u32,
    channels: u16,
    frames: usize,
    frequency_hz: f32,
) -> Result<(), hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let sample = (2.0 * std::f32::consts::PI * frequency_hz * t).sin() * 0.5;
        for _ in 0..channels {
            writer.write_sample((sample * i16::MAX as f32) as i16)?;
        }
    }
    writer.finalize()?;
    Ok(())
}

/// Temp dir plus a path inside it; the dir lives as long as the returned guard
pub fn temp_wav(name: &str) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(name);
    (dir, path)
}
