//! Audio engine context
//!
//! `AudioEngine` replaces the process-wide audio state: it owns the fixed
//! device format, the buffer registry (through the [`Mixer`]), the master
//! volume, the stream sizing default and the output device.
//!
//! Buffers can be created before the device is opened; they are mixed as
//! soon as a device callback runs. Tests drive [`Mixer::mix`] directly
//! without any device.

use crate::audio::buffer::AudioBuffer;
use crate::audio::output::AudioOutput;
use crate::audio::types::{BufferUsage, PcmFormat};
use crate::error::{Error, Result};
use crate::playback::mixer::Mixer;
use crate::playback::registry::BufferId;
use raudio_common::{AudioConfig, ErrorPolicy};
use std::ops::Deref;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sub-buffer size divisor used when no default is configured (~33 ms)
pub const DEFAULT_STREAM_DIVISOR: u32 = 30;

/// A buffer registered with an engine
///
/// Dereferences to the [`AudioBuffer`] so playback controls are called
/// directly on the handle.
#[derive(Debug, Clone)]
pub struct BufferHandle {
    id: BufferId,
    buffer: Arc<AudioBuffer>,
}

impl BufferHandle {
    pub fn id(&self) -> BufferId {
        self.id
    }

    pub fn buffer(&self) -> &Arc<AudioBuffer> {
        &self.buffer
    }
}

impl Deref for BufferHandle {
    type Target = AudioBuffer;

    fn deref(&self) -> &AudioBuffer {
        &self.buffer
    }
}

/// Audio engine: device, registry and mixing configuration
pub struct AudioEngine {
    config: AudioConfig,
    policy: ErrorPolicy,
    mixer: Mixer,
    output: Option<AudioOutput>,

    /// Runtime override for the stream sub-buffer size (0 = unset)
    stream_buffer_default: AtomicU32,
}

impl AudioEngine {
    /// Create an engine with the device format from `config`.
    ///
    /// The device itself is not opened; call [`AudioEngine::init_device`].
    pub fn new(config: AudioConfig) -> Result<Self> {
        config.validate()?;

        let policy = config.error_policy();
        let mixer = Mixer::new(config.device.channels);

        debug!(
            "AudioEngine created: f32 {}ch {}Hz, policy {:?}",
            config.device.channels, config.device.sample_rate, policy
        );

        Ok(Self {
            stream_buffer_default: AtomicU32::new(config.stream.default_buffer_frames),
            config,
            policy,
            mixer,
            output: None,
        })
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Handle to the mixing pass (shared with the device callback)
    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Device output sample rate
    pub fn device_sample_rate(&self) -> u32 {
        self.config.device.sample_rate
    }

    /// Device output channel count
    pub fn device_channels(&self) -> u16 {
        self.config.device.channels
    }

    /// Output device names reported by the host
    pub fn list_devices() -> Result<Vec<String>> {
        AudioOutput::list_devices()
    }

    /// Open the configured output device and start the mixing callback.
    ///
    /// Calling this while the device is already open is a warning no-op.
    pub fn init_device(&mut self) -> Result<()> {
        if self.output.is_some() {
            warn!("Audio device already initialized");
            return Ok(());
        }

        let device = &self.config.device;
        let opened = AudioOutput::open(
            device.name.as_deref(),
            device.sample_rate,
            device.channels,
            device.period_frames,
        )
        .and_then(|mut output| {
            output.start(self.mixer.clone())?;
            Ok(output)
        });

        match opened {
            Ok(output) => {
                info!(
                    "Audio device initialized: {} ({}ch, {}Hz, f32 mixing, device format {:?})",
                    output.device_name(),
                    output.channels(),
                    output.sample_rate(),
                    output.sample_format()
                );
                self.output = Some(output);
                Ok(())
            }
            Err(e) => {
                let err = match e {
                    Error::DeviceInit(_) => e,
                    other => Error::DeviceInit(other.to_string()),
                };
                self.policy.report("Failed to initialize audio device", &err);
                Err(err)
            }
        }
    }

    /// Stop the callback and release the device
    pub fn close_device(&mut self) {
        match self.output.take() {
            Some(mut output) => {
                if let Err(e) = output.stop() {
                    warn!("Error while stopping audio device: {}", e);
                }
                info!("Audio device closed");
            }
            None => warn!("Audio device could not be closed, not currently initialized"),
        }
    }

    pub fn is_device_ready(&self) -> bool {
        self.output.is_some()
    }

    /// Master volume, clamped to [0.0, 1.0]
    pub fn set_master_volume(&self, volume: f32) {
        self.mixer.set_master_volume(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.mixer.master_volume()
    }

    /// Create a buffer in `format` and register it for mixing.
    pub fn create_audio_buffer(
        &self,
        format: PcmFormat,
        size_in_frames: usize,
        usage: BufferUsage,
    ) -> Result<BufferHandle> {
        let buffer = AudioBuffer::new(
            format,
            size_in_frames,
            usage,
            self.config.device.channels,
            self.config.device.sample_rate,
        );

        let buffer = match buffer {
            Ok(buffer) => Arc::new(buffer),
            Err(e @ Error::AllocationFailure(_)) => {
                self.policy.report("Failed to create audio buffer", &e);
                return Err(e);
            }
            Err(e) => {
                warn!("Failed to create audio buffer: {}", e);
                return Err(e);
            }
        };

        let (id, orphans) = {
            let mut registry = self.mixer.lock_registry();
            let orphans = registry.prune();
            (registry.insert(&buffer), orphans)
        };
        if !orphans.is_empty() {
            debug!("Released {} audio buffers with no remaining handle", orphans.len());
        }
        drop(orphans);

        Ok(BufferHandle { id, buffer })
    }

    /// Unlink a buffer from the registry.
    ///
    /// A buffer that is not registered is reported and left alone.
    pub fn delete_audio_buffer(&self, handle: &BufferHandle) -> Result<()> {
        let removed = self.mixer.lock_registry().remove(handle.id);
        if removed.is_some() {
            debug!("Audio buffer unregistered");
            Ok(())
        } else {
            let err = Error::InvalidArgument("Audio buffer is not registered".to_string());
            self.policy.report("Failed to delete audio buffer", &err);
            Err(err)
        }
    }

    /// True while the handle's buffer is in the registry
    pub fn is_registered(&self, handle: &BufferHandle) -> bool {
        self.mixer.lock_registry().contains(handle.id)
    }

    /// Registry entries, including ones whose owner dropped every handle
    pub fn registered_buffers(&self) -> usize {
        self.mixer.lock_registry().len()
    }

    /// Override the sub-buffer size for streams created from now on
    pub fn set_audio_stream_buffer_size_default(&self, frames: u32) {
        self.stream_buffer_default.store(frames, Ordering::Relaxed);
    }

    /// Sub-buffer size for new streams.
    ///
    /// Configured or runtime default, else `device_rate / 30`, raised to at
    /// least the device period.
    pub fn stream_sub_buffer_frames(&self) -> usize {
        let configured = self.stream_buffer_default.load(Ordering::Relaxed);
        let size = if configured > 0 {
            configured
        } else {
            self.config.device.sample_rate / DEFAULT_STREAM_DIVISOR
        };

        let period = self
            .output
            .as_ref()
            .map(|output| output.period_frames())
            .unwrap_or(self.config.device.period_frames)
            .unwrap_or(0);

        size.max(period).max(1) as usize
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        if self.output.is_some() {
            self.close_device();
        }
    }
}
