//! Mixing callback
//!
//! Produces one device period by summing every audible buffer in the
//! registry:
//!
//! ```text
//! out[i] = Σ buffer_frames[i] * master_volume * buffer_volume
//! ```
//!
//! # Real-time constraints
//!
//! `mix` runs on the audio thread. It locks the registry for the whole pass
//! and each buffer's state while pulling from it. It never allocates
//! (scratch lives on the stack), only borrows registry entries so no buffer
//! is ever freed here, and never returns an error: anything unexpected is
//! logged and degrades to silence.
//!
//! Output is not clamped; the device edge saturates integer formats.

use crate::audio::types::AtomicF32;
use crate::playback::registry::Registry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, error, warn};

/// Samples in the stack scratch buffer used per pull (512 stereo frames)
pub const MIXING_SCRATCH_SAMPLES: usize = 1024;

struct MixerShared {
    registry: Mutex<Registry>,
    master_volume: AtomicF32,
    channels: u16,
    underrun_recoveries: AtomicU64,
    over_reads: AtomicU64,
}

/// Shared handle to the registry and the mixing pass
///
/// Cloning is cheap; the engine keeps one clone and the device callback
/// owns another.
#[derive(Clone)]
pub struct Mixer {
    shared: Arc<MixerShared>,
}

impl Mixer {
    /// Create a mixer producing interleaved frames of `channels` samples
    pub fn new(channels: u16) -> Self {
        debug!("Mixer created ({} channels)", channels);
        Self {
            shared: Arc::new(MixerShared {
                registry: Mutex::new(Registry::new()),
                master_volume: AtomicF32::new(1.0),
                channels: channels.max(1),
                underrun_recoveries: AtomicU64::new(0),
                over_reads: AtomicU64::new(0),
            }),
        }
    }

    pub fn channels(&self) -> u16 {
        self.shared.channels
    }

    /// Master volume, clamped to [0.0, 1.0]
    pub fn set_master_volume(&self, volume: f32) {
        let clamped = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.shared.master_volume.store(clamped);
    }

    pub fn master_volume(&self) -> f32 {
        self.shared.master_volume.load()
    }

    /// Looping buffers that came back short and were rewound.
    ///
    /// Stays at zero as long as every looping stream is fed on time.
    pub fn underrun_recoveries(&self) -> u64 {
        self.shared.underrun_recoveries.load(Ordering::Relaxed)
    }

    /// Pulls that returned more frames than requested (clamped)
    pub fn over_reads(&self) -> u64 {
        self.shared.over_reads.load(Ordering::Relaxed)
    }

    /// Lock the registry, recovering from a poisoned mutex
    pub(crate) fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        match self.shared.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Fill `out` (interleaved, `channels()` samples per frame) with the
    /// mix of every audible buffer.
    pub fn mix(&self, out: &mut [f32]) {
        out.fill(0.0);

        let channels = self.shared.channels as usize;
        let frame_count = out.len() / channels;
        if frame_count == 0 {
            return;
        }

        let max_chunk = MIXING_SCRATCH_SAMPLES / channels;
        if max_chunk == 0 {
            error!("Mixer has {} channels, scratch too small", channels);
            return;
        }

        let mut scratch = [0.0f32; MIXING_SCRATCH_SAMPLES];
        let master = self.master_volume();

        let registry = self.lock_registry();
        for buffer in registry.iter() {
            if !buffer.is_playing() {
                continue;
            }

            let gain = master * buffer.volume();
            let mut state = buffer.lock_state();
            let mut frames_mixed = 0usize;

            while frames_mixed < frame_count {
                if !buffer.is_playing() {
                    break;
                }

                let request = (frame_count - frames_mixed).min(max_chunk);
                let chunk = &mut scratch[..request * channels];
                let mut frames_read = buffer.read_mixing_frames(&mut state, chunk);

                if frames_read > request {
                    warn!(
                        "Buffer returned {} frames, {} requested; clamping",
                        frames_read, request
                    );
                    self.shared.over_reads.fetch_add(1, Ordering::Relaxed);
                    frames_read = request;
                }

                let start = frames_mixed * channels;
                let mixed = &mut out[start..start + frames_read * channels];
                for (dst, src) in mixed.iter_mut().zip(chunk.iter()) {
                    *dst += src * gain;
                }
                frames_mixed += frames_read;

                if frames_read < request {
                    if !buffer.is_looping() {
                        buffer.stop_locked(&mut state);
                        break;
                    }

                    buffer.rewind(&mut state);
                    self.shared.underrun_recoveries.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Looping buffer under-read ({} of {} frames), cursor rewound",
                        frames_read, request
                    );
                    if frames_read == 0 {
                        break;
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for Mixer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mixer")
            .field("channels", &self.shared.channels)
            .field("master_volume", &self.master_volume())
            .field("underrun_recoveries", &self.underrun_recoveries())
            .finish()
    }
}
