//! # raudio
//!
//! Real-time audio mixing engine.
//!
//! **Purpose:** Keep a registry of playback buffers (one-shot sounds,
//! producer-fed streams, decoded music), convert each to the device format
//! on the fly and mix them on the audio thread.
//!
//! **Architecture:** explicit [`AudioEngine`] context; cpal device callback
//! running [`Mixer::mix`]; rubato for rate conversion; hound and symphonia
//! for decoding.

pub mod audio;
pub mod error;
pub mod playback;

pub use audio::{BufferUsage, PcmFormat, SampleFormat, Wave};
pub use error::{Error, Result};
pub use playback::{AudioEngine, AudioStream, Mixer, Music, Sound};
pub use raudio_common::{AudioConfig, ErrorPolicy};
