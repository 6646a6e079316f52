//! Audio output using cpal
//!
//! Opens the output device at the engine's fixed format and hosts the mixing
//! callback on cpal's audio thread. Mixing is always f32; devices that only
//! offer i16/u16 get a conversion at the callback edge.

use crate::error::{Error, Result};
use crate::playback::mixer::Mixer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Frames converted per pass on the non-f32 device path
const EDGE_SCRATCH_FRAMES: usize = 4096;

/// Device sample formats in order of preference
const FORMAT_PREFERENCE: [SampleFormat; 3] = [SampleFormat::F32, SampleFormat::I16, SampleFormat::U16];

/// Audio output manager using cpal.
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Stream errors reported by cpal since the stream was built
    error_count: Arc<AtomicU32>,
}

impl AudioOutput {
    /// List available audio output devices.
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device at a fixed rate and channel count.
    ///
    /// A named device that cannot be found falls back to the host default.
    pub fn open(
        device_name: Option<&str>,
        sample_rate: u32,
        channels: u16,
        period_frames: Option<u32>,
    ) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host
                    .output_devices()
                    .map_err(|e| Error::DeviceInit(format!("Failed to enumerate devices: {}", e)))?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(dev) => {
                        info!("Found requested audio device: {}", name);
                        dev
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::DeviceInit(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::DeviceInit("No default output device found".to_string()))?,
        };

        let (mut config, sample_format) = Self::select_config(&device, sample_rate, channels)?;

        if let Some(size) = period_frames {
            config.buffer_size = cpal::BufferSize::Fixed(size);
            debug!("Using requested period: {} frames", size);
        }

        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}, buffer_size={:?}",
            config.sample_rate.0, config.channels, sample_format, config.buffer_size
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_count: Arc::new(AtomicU32::new(0)),
        })
    }

    /// Find a supported config at exactly `sample_rate` / `channels`,
    /// preferring f32 samples.
    fn select_config(device: &Device, sample_rate: u32, channels: u16) -> Result<(StreamConfig, SampleFormat)> {
        let supported: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceInit(format!("Failed to get device configs: {}", e)))?
            .filter(|config| {
                config.channels() == channels
                    && config.min_sample_rate().0 <= sample_rate
                    && config.max_sample_rate().0 >= sample_rate
            })
            .collect();

        for wanted in FORMAT_PREFERENCE {
            if let Some(range) = supported.iter().find(|c| c.sample_format() == wanted) {
                let config = range.clone().with_sample_rate(cpal::SampleRate(sample_rate)).config();
                return Ok((config, wanted));
            }
        }

        Err(Error::DeviceInit(format!(
            "Device supports no f32/i16/u16 output at {}Hz with {} channels",
            sample_rate, channels
        )))
    }

    /// Build the stream and start pulling frames from `mixer`.
    pub fn start(&mut self, mixer: Mixer) -> Result<()> {
        info!("Starting audio stream");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream_f32(mixer)?,
            SampleFormat::I16 => self.build_stream_converted::<i16>(mixer)?,
            SampleFormat::U16 => self.build_stream_converted::<u16>(mixer)?,
            sample_format => {
                return Err(Error::DeviceInit(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::DeviceInit(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);

        info!("Audio stream started successfully");
        Ok(())
    }

    /// f32 device: the mixer writes straight into the device buffer
    fn build_stream_f32(&self, mixer: Mixer) -> Result<Stream> {
        let error_count = Arc::clone(&self.error_count);

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    mixer.mix(data);
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_count.fetch_add(1, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::DeviceInit(format!("Failed to build stream: {}", e)))
    }

    /// Integer device: mix into f32 scratch, then saturate and convert
    fn build_stream_converted<T>(&self, mixer: Mixer) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let error_count = Arc::clone(&self.error_count);
        let channels = self.config.channels as usize;
        let mut scratch = vec![0.0f32; EDGE_SCRATCH_FRAMES * channels];

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    for block in data.chunks_mut(scratch.len()) {
                        let mixed = &mut scratch[..block.len()];
                        mixer.mix(mixed);
                        for (dst, &src) in block.iter_mut().zip(mixed.iter()) {
                            *dst = T::from_sample(src.clamp(-1.0, 1.0));
                        }
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_count.fetch_add(1, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::DeviceInit(format!("Failed to build stream: {}", e)))
    }

    /// Pause and drop the stream.
    pub fn stop(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            info!("Stopping audio stream");
            stream
                .pause()
                .map_err(|e| Error::AudioOutput(format!("Failed to pause stream: {}", e)))?;
        }
        Ok(())
    }

    pub fn device_name(&self) -> String {
        self.device.name().unwrap_or_else(|_| "Unknown".to_string())
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Sample format negotiated with the device
    pub fn sample_format(&self) -> SampleFormat {
        self.sample_format
    }

    /// Fixed period in frames, None when the device picks its own
    pub fn period_frames(&self) -> Option<u32> {
        match self.config.buffer_size {
            cpal::BufferSize::Fixed(size) => Some(size),
            cpal::BufferSize::Default => None,
        }
    }

    /// Stream errors reported by the backend
    pub fn error_count(&self) -> u32 {
        self.error_count.load(Ordering::Relaxed)
    }
}

impl Drop for AudioOutput {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
