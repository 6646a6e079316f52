//! Audio streams: producer-fed Stream buffers
//!
//! The producer calls [`AudioStream::update`] whenever
//! [`AudioStream::is_processed`] reports a free half. Each update carries at
//! most one half of frames in the stream's native format.

use crate::audio::types::{BufferUsage, PcmFormat, PcmSample, SampleFormat};
use crate::error::Result;
use crate::playback::engine::{AudioEngine, BufferHandle};
use tracing::debug;

/// Continuously refilled stream registered with an engine
#[derive(Debug)]
pub struct AudioStream {
    handle: BufferHandle,
    format: PcmFormat,
}

impl AudioEngine {
    /// Create a stream of `sample_size` bits (8, 16 or 32 = float).
    ///
    /// The buffer holds two sub-buffers of
    /// [`AudioEngine::stream_sub_buffer_frames`] frames and always loops.
    pub fn load_audio_stream(&self, sample_rate: u32, sample_size: u32, channels: u16) -> Result<AudioStream> {
        let format = PcmFormat::new(SampleFormat::from_sample_size(sample_size)?, channels, sample_rate);
        let sub_buffer_frames = self.stream_sub_buffer_frames();

        let handle = self.create_audio_buffer(format, sub_buffer_frames * 2, BufferUsage::Stream)?;
        handle.set_looping(true);

        debug!(
            "Audio stream created: {}Hz, {}-bit, {}ch, sub-buffer {} frames",
            sample_rate, sample_size, channels, sub_buffer_frames
        );

        Ok(AudioStream { handle, format })
    }

    pub fn unload_audio_stream(&self, stream: AudioStream) -> Result<()> {
        self.delete_audio_buffer(&stream.handle)
    }
}

impl AudioStream {
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn handle(&self) -> &BufferHandle {
        &self.handle
    }

    /// Frames accepted by one update
    pub fn sub_buffer_frames(&self) -> usize {
        self.handle.sub_buffer_size_in_frames()
    }

    /// Push the next block of interleaved samples
    pub fn update<S: PcmSample>(&self, samples: &[S]) -> Result<()> {
        self.handle.update_stream(samples)
    }

    /// Push the next block as raw native-format bytes
    pub fn update_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.handle.update_stream_bytes(bytes)
    }

    /// True when at least one half can be refilled
    pub fn is_processed(&self) -> bool {
        self.handle.is_sub_buffer_processed(0) || self.handle.is_sub_buffer_processed(1)
    }

    pub fn play(&self) {
        self.handle.play();
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn stop(&self) {
        self.handle.stop();
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
}
