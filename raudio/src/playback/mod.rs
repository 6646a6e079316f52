//! Playback layer
//!
//! The engine context, the buffer registry and the mixing callback, plus the
//! three public faces of a buffer: sounds, audio streams and music.

pub mod engine;
pub mod mixer;
pub mod music;
pub mod registry;
pub mod sound;
pub mod stream;

pub use engine::{AudioEngine, BufferHandle};
pub use mixer::Mixer;
pub use music::Music;
pub use registry::BufferId;
pub use sound::Sound;
pub use stream::AudioStream;
