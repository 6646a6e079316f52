//! AudioBuffer: the unit of playback state
//!
//! One AudioBuffer exists per sound or stream. It owns the native-format
//! sample storage, the playback cursor, volume/pitch and the conversion
//! pipeline to the device format.
//!
//! # Streaming protocol
//!
//! A Stream buffer is split into two equal halves. Each half is either
//! *processed* (drained by the mixer, free for the producer to overwrite) or
//! *filled* (written by the producer, waiting to be drained):
//!
//! ```text
//!            update_stream()                 mixer drains half
//! Processed ────────────────────▶ Filled ─────────────────────▶ Processed
//! ```
//!
//! Both halves start processed. The producer only writes a processed half
//! and the mixer only reads a filled half, so each half has exactly one
//! owner at any instant.
//!
//! # Thread Safety
//!
//! - `playing`, `paused`, `looping`, `volume`, `pitch` and the two
//!   processed flags are atomics, written by the application thread without
//!   the registry lock.
//! - Cursor, sample bytes, converter state and the processed-frame counter
//!   sit behind a per-buffer mutex. Its critical sections are bounded: one
//!   half-buffer copy on the producer side, one conversion chunk on the
//!   mixer side.
//!
//! **Memory Ordering:**
//! - Processed flags: Release on write, Acquire on read
//! - Playback flags, volume, pitch: Relaxed, picked up on the next mix

use crate::audio::converter::FormatConverter;
use crate::audio::types::{samples_to_bytes, AtomicF32, BufferUsage, PcmFormat, PcmSample};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

/// Lowest accepted pitch factor
pub const MIN_PITCH: f32 = 0.125;

/// Highest accepted pitch factor
pub const MAX_PITCH: f32 = 8.0;

/// Mutable playback state guarded by the per-buffer mutex
pub struct BufferState {
    data: Vec<u8>,
    frame_cursor_pos: usize,
    frames_processed: u64,
    converter: FormatConverter,
}

/// Playback buffer in its native PCM format
pub struct AudioBuffer {
    format: PcmFormat,
    usage: BufferUsage,
    size_in_frames: usize,

    playing: AtomicBool,
    paused: AtomicBool,
    looping: AtomicBool,
    volume: AtomicF32,
    pitch: AtomicF32,

    /// Per-half "ready to be refilled" flags
    sub_buffer_processed: [AtomicBool; 2],

    state: Mutex<BufferState>,
}

impl std::fmt::Debug for AudioBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioBuffer")
            .field("format", &self.format)
            .field("usage", &self.usage)
            .field("size_in_frames", &self.size_in_frames)
            .field("playing", &self.playing.load(Ordering::Relaxed))
            .field("paused", &self.paused.load(Ordering::Relaxed))
            .field("looping", &self.looping.load(Ordering::Relaxed))
            .field("volume", &self.volume.load())
            .field("pitch", &self.pitch.load())
            .field("sub_buffer_processed", &[self.is_sub_buffer_processed(0), self.is_sub_buffer_processed(1)])
            .finish()
    }
}

impl AudioBuffer {
    /// Allocate a buffer of `size_in_frames` frames in `format`.
    ///
    /// Frames are converted to f32 at `device_channels` / `device_rate` when
    /// mixed. Stream buffers must have an even, non-zero size.
    ///
    /// The buffer starts stopped, not looping, at volume 1.0 and pitch 1.0,
    /// with both halves processed.
    pub fn new(
        format: PcmFormat,
        size_in_frames: usize,
        usage: BufferUsage,
        device_channels: u16,
        device_rate: u32,
    ) -> Result<Self> {
        format.validate()?;

        if size_in_frames == 0 {
            return Err(Error::InvalidArgument("Buffer size must be > 0 frames".to_string()));
        }
        if usage == BufferUsage::Stream && size_in_frames % 2 != 0 {
            return Err(Error::InvalidArgument(format!(
                "Stream buffer size must be even, got {} frames",
                size_in_frames
            )));
        }

        let bytes = size_in_frames
            .checked_mul(format.bytes_per_frame())
            .ok_or_else(|| Error::AllocationFailure(format!("{} frames overflow", size_in_frames)))?;

        let mut data = Vec::new();
        data.try_reserve_exact(bytes).map_err(|e| {
            Error::AllocationFailure(format!("Failed to allocate {} bytes: {}", bytes, e))
        })?;
        data.resize(bytes, format.sample_format.silence_byte());

        let converter = FormatConverter::new(format, device_channels, device_rate)?;

        debug!(
            "AudioBuffer created: {:?}, {} frames, {:?}",
            format, size_in_frames, usage
        );

        Ok(Self {
            format,
            usage,
            size_in_frames,
            playing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            looping: AtomicBool::new(false),
            volume: AtomicF32::new(1.0),
            pitch: AtomicF32::new(1.0),
            sub_buffer_processed: [AtomicBool::new(true), AtomicBool::new(true)],
            state: Mutex::new(BufferState {
                data,
                frame_cursor_pos: 0,
                frames_processed: 0,
                converter,
            }),
        })
    }

    /// Native PCM format
    pub fn format(&self) -> PcmFormat {
        self.format
    }

    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    /// Total backing capacity in frames
    pub fn size_in_frames(&self) -> usize {
        self.size_in_frames
    }

    /// Frames in one half
    pub fn sub_buffer_size_in_frames(&self) -> usize {
        if self.size_in_frames > 1 {
            self.size_in_frames / 2
        } else {
            self.size_in_frames
        }
    }

    /// Audible: playing and not paused
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed) && !self.paused.load(Ordering::Relaxed)
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn is_looping(&self) -> bool {
        self.looping.load(Ordering::Relaxed)
    }

    pub fn set_looping(&self, looping: bool) {
        self.looping.store(looping, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        self.volume.load()
    }

    /// Set the buffer volume. Not clamped: values above 1.0 amplify.
    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume);
    }

    pub fn pitch(&self) -> f32 {
        self.pitch.load()
    }

    /// Set the pitch factor by changing the converter's output rate.
    ///
    /// `outRate = (deviceRate / nativeRate) / pitch * nativeRate`, so pitch
    /// 2.0 consumes native frames twice as fast.
    pub fn set_pitch(&self, pitch: f32) -> Result<()> {
        if !(MIN_PITCH..=MAX_PITCH).contains(&pitch) {
            warn!("Pitch {} outside {}..={}, ignored", pitch, MIN_PITCH, MAX_PITCH);
            return Err(Error::InvalidArgument(format!("Pitch {} out of range", pitch)));
        }

        let mut state = self.lock_state();
        let device_rate = state.converter.device_rate() as f32;
        let native_rate = self.format.sample_rate as f32;
        let output_rate = ((device_rate / native_rate) / pitch * native_rate) as u32;

        if let Err(e) = state.converter.set_output_rate(output_rate) {
            warn!("Pitch {} ({}Hz output) rejected by converter: {}", pitch, output_rate, e);
            return Err(e);
        }
        self.pitch.store(pitch);
        Ok(())
    }

    /// Output rate currently requested from the conversion pipeline
    pub fn converter_output_rate(&self) -> u32 {
        self.lock_state().converter.output_rate()
    }

    /// Read position within the backing storage, in frames
    pub fn frame_cursor_pos(&self) -> usize {
        self.lock_state().frame_cursor_pos
    }

    /// Frames handed to the stream by the producer since the last stop
    pub fn frames_processed(&self) -> u64 {
        self.lock_state().frames_processed
    }

    /// True when half `index` (0 or 1) may be overwritten by the producer
    pub fn is_sub_buffer_processed(&self, index: usize) -> bool {
        self.sub_buffer_processed
            .get(index)
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Start from the beginning. Use pause/resume to keep the position.
    pub fn play(&self) {
        let mut state = self.lock_state();
        state.frame_cursor_pos = 0;
        state.converter.reset();
        self.paused.store(false, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
    }

    /// Start without rewinding the cursor (music keeps its stream position)
    pub(crate) fn play_from_cursor(&self) {
        self.paused.store(false, Ordering::Relaxed);
        self.playing.store(true, Ordering::Relaxed);
    }

    /// Override the producer frame counter after a music seek or loop
    pub(crate) fn set_frames_processed(&self, frames: u64) {
        self.lock_state().frames_processed = frames;
    }

    /// Stop and rewind. No-op unless the buffer is audible.
    pub fn stop(&self) {
        if !self.is_playing() {
            return;
        }

        let mut state = self.lock_state();
        let BufferState {
            frame_cursor_pos,
            frames_processed,
            ..
        } = &mut *state;
        self.halt(frame_cursor_pos, frames_processed);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::Relaxed);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Relaxed);
    }

    /// Feed the next half of a Stream buffer with typed samples.
    ///
    /// `S` must match the buffer's native sample format.
    pub fn update_stream<S: PcmSample>(&self, samples: &[S]) -> Result<()> {
        if S::FORMAT != self.format.sample_format {
            return Err(Error::InvalidArgument(format!(
                "Samples are {:?}, buffer expects {:?}",
                S::FORMAT,
                self.format.sample_format
            )));
        }
        self.update_stream_bytes(&samples_to_bytes(samples))
    }

    /// Feed the next half of a Stream buffer with native-format bytes.
    ///
    /// - Neither half processed: ProtocolViolation, nothing written
    /// - Both halves processed: half 0 is written and the cursor rewinds
    /// - Otherwise the processed half is written
    ///
    /// More frames than one half holds is a CapacityOverflow and leaves the
    /// buffer untouched. A short write is padded with silence.
    pub fn update_stream_bytes(&self, bytes: &[u8]) -> Result<()> {
        if self.usage != BufferUsage::Stream {
            return Err(Error::InvalidArgument(
                "update_stream requires a Stream buffer".to_string(),
            ));
        }

        let bpf = self.format.bytes_per_frame();
        if bytes.len() % bpf != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                bpf
            )));
        }
        let frame_count = bytes.len() / bpf;

        let mut state = self.lock_state();

        let processed = [self.is_sub_buffer_processed(0), self.is_sub_buffer_processed(1)];
        if !processed[0] && !processed[1] {
            return Err(Error::ProtocolViolation(
                "No processed sub-buffer available for updating".to_string(),
            ));
        }

        let sub_size = self.sub_buffer_size_in_frames();
        if frame_count > sub_size {
            return Err(Error::CapacityOverflow {
                requested: frame_count,
                capacity: sub_size,
            });
        }

        let target = if processed[0] && processed[1] {
            // Both free: restart from the front
            state.frame_cursor_pos = 0;
            0
        } else if processed[0] {
            0
        } else {
            1
        };

        let start = target * sub_size * bpf;
        let half = &mut state.data[start..start + sub_size * bpf];
        half[..bytes.len()].copy_from_slice(bytes);
        half[bytes.len()..].fill(self.format.sample_format.silence_byte());

        state.frames_processed += sub_size as u64;
        self.sub_buffer_processed[target].store(false, Ordering::Release);
        Ok(())
    }

    /// Stop, then overwrite the start of a Static buffer with new frames.
    pub fn update_static_bytes(&self, bytes: &[u8]) -> Result<()> {
        let bpf = self.format.bytes_per_frame();
        if bytes.len() % bpf != 0 {
            return Err(Error::InvalidArgument(format!(
                "{} bytes is not a whole number of {}-byte frames",
                bytes.len(),
                bpf
            )));
        }
        let frame_count = bytes.len() / bpf;
        if frame_count > self.size_in_frames {
            return Err(Error::CapacityOverflow {
                requested: frame_count,
                capacity: self.size_in_frames,
            });
        }

        self.stop();
        let mut state = self.lock_state();
        state.data[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Lock the playback state, recovering from a poisoned mutex
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, BufferState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Pull frames converted to the mixing format into `out`.
    ///
    /// Called by the mixer with the state lock held. Returns frames produced.
    pub(crate) fn read_mixing_frames(&self, state: &mut BufferState, out: &mut [f32]) -> usize {
        let BufferState {
            data,
            frame_cursor_pos,
            frames_processed,
            converter,
        } = state;

        converter.read_frames(out, |raw, frame_count| {
            self.read_internal(data, frame_cursor_pos, frames_processed, raw, frame_count)
        })
    }

    /// Rewind the cursor after a looping under-read
    pub(crate) fn rewind(&self, state: &mut BufferState) {
        state.frame_cursor_pos = 0;
    }

    /// Stop from a path that already holds the state lock
    pub(crate) fn stop_locked(&self, state: &mut BufferState) {
        if !self.is_playing() {
            return;
        }
        let BufferState {
            frame_cursor_pos,
            frames_processed,
            ..
        } = state;
        self.halt(frame_cursor_pos, frames_processed);
    }

    fn halt(&self, frame_cursor_pos: &mut usize, frames_processed: &mut u64) {
        self.playing.store(false, Ordering::Relaxed);
        self.paused.store(false, Ordering::Relaxed);
        *frame_cursor_pos = 0;
        *frames_processed = 0;
        self.sub_buffer_processed[0].store(true, Ordering::Release);
        self.sub_buffer_processed[1].store(true, Ordering::Release);
    }

    /// Copy native frames from the backing storage into `out`.
    ///
    /// Static buffers copy until the request is met (wrapping when looping).
    /// Stream buffers only copy from filled halves and mark each half
    /// processed once drained. Any shortfall is filled with silence; for
    /// Stream buffers the silence counts as read so temporary starvation is
    /// not mistaken for the end of the stream.
    fn read_internal(
        &self,
        data: &[u8],
        frame_cursor_pos: &mut usize,
        frames_processed: &mut u64,
        out: &mut [u8],
        frame_count: usize,
    ) -> usize {
        let bpf = self.format.bytes_per_frame();
        let sub_size = self.sub_buffer_size_in_frames();
        let stream = self.usage == BufferUsage::Stream;

        let mut current = *frame_cursor_pos / sub_size;
        if stream && current > 1 {
            return 0;
        }

        // Snapshot; the producer may only flip processed -> filled
        let mut processed = [self.is_sub_buffer_processed(0), self.is_sub_buffer_processed(1)];

        let mut frames_read = 0usize;
        loop {
            if stream {
                if processed[current] {
                    break;
                }
            } else if frames_read >= frame_count {
                break;
            }

            let remaining = frame_count - frames_read;
            if remaining == 0 {
                break;
            }

            let available = if stream {
                sub_size - (*frame_cursor_pos - sub_size * current)
            } else {
                self.size_in_frames - *frame_cursor_pos
            };

            let to_read = remaining.min(available);
            let src = *frame_cursor_pos * bpf;
            let dst = frames_read * bpf;
            out[dst..dst + to_read * bpf].copy_from_slice(&data[src..src + to_read * bpf]);

            *frame_cursor_pos = (*frame_cursor_pos + to_read) % self.size_in_frames;
            frames_read += to_read;

            if to_read == available {
                if stream {
                    self.sub_buffer_processed[current].store(true, Ordering::Release);
                    processed[current] = true;
                    current = (current + 1) % 2;
                }

                if !self.is_looping() {
                    self.halt(frame_cursor_pos, frames_processed);
                    break;
                }
            }
        }

        let remaining = frame_count - frames_read;
        if remaining > 0 {
            out[frames_read * bpf..frame_count * bpf].fill(self.format.sample_format.silence_byte());
            if stream {
                frames_read += remaining;
            }
        }

        frames_read
    }
}
