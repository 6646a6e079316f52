//! Sounds: fully decoded clips played from a Static buffer
//!
//! The clip is converted to the device format (f32, device channels, device
//! rate) when the sound is loaded, so at pitch 1.0 the mixer copies frames
//! without any further conversion.

use crate::audio::converter::to_f32_interleaved;
use crate::audio::resampler::Resampler;
use crate::audio::types::{samples_to_bytes, BufferUsage, PcmFormat, SampleFormat};
use crate::audio::wave::Wave;
use crate::error::{Error, Result};
use crate::playback::engine::{AudioEngine, BufferHandle};
use std::path::Path;
use tracing::{debug, warn};

/// One-shot clip registered with an engine
#[derive(Debug)]
pub struct Sound {
    handle: BufferHandle,
    frame_count: usize,
}

impl AudioEngine {
    /// Load a file and turn it into a sound
    pub fn load_sound(&self, path: &Path) -> Result<Sound> {
        let wave = Wave::load(path)?;
        self.load_sound_from_wave(&wave)
    }

    /// Convert a wave to the device format and register it as a sound
    pub fn load_sound_from_wave(&self, wave: &Wave) -> Result<Sound> {
        if !wave.is_ready() {
            warn!("Sound could not be loaded from an empty wave");
            return Err(Error::InvalidArgument("Wave has no frames".to_string()));
        }

        let channels = self.device_channels();
        let rate = self.device_sample_rate();

        let mapped = to_f32_interleaved(wave.pcm_format(), wave.data(), channels as usize);
        let converted = Resampler::resample(&mapped, wave.sample_rate(), rate, channels)?;
        let frame_count = converted.len() / channels as usize;

        let format = PcmFormat::new(SampleFormat::F32, channels, rate);
        let handle = self.create_audio_buffer(format, frame_count, BufferUsage::Static)?;
        handle.update_static_bytes(&samples_to_bytes(&converted))?;

        debug!(
            "Sound loaded: {} frames ({}Hz {}ch -> {}Hz {}ch)",
            frame_count,
            wave.sample_rate(),
            wave.channels(),
            rate,
            channels
        );

        Ok(Sound { handle, frame_count })
    }

    /// Unregister a sound and release its buffer
    pub fn unload_sound(&self, sound: Sound) -> Result<()> {
        self.delete_audio_buffer(&sound.handle)
    }
}

impl Sound {
    /// Frames after conversion to the device format
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn handle(&self) -> &BufferHandle {
        &self.handle
    }

    pub fn play(&self) {
        self.handle.play();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn is_playing(&self) -> bool {
        self.handle.is_playing()
    }

    pub fn set_volume(&self, volume: f32) {
        self.handle.set_volume(volume);
    }

    pub fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.handle.set_pitch(pitch)
    }

    /// Replace the first frames of the sound with device-format samples
    pub fn update(&self, samples: &[f32]) -> Result<()> {
        self.handle.update_static_bytes(&samples_to_bytes(samples))
    }
}
