//! Audio data path: buffers, format conversion, decoding and device output
//!
//! Leaf modules, used by the playback layer:
//! - types: sample formats and PCM layout
//! - buffer: per-buffer playback state and the streaming protocol
//! - converter: real-time native → device format conversion
//! - resampler: offline whole-clip resampling
//! - decoder: pull-based file decoders (hound, symphonia)
//! - wave: in-memory PCM clips
//! - output: cpal device hosting the mixing callback

pub mod buffer;
pub mod converter;
pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;
pub mod wave;

pub use buffer::AudioBuffer;
pub use converter::FormatConverter;
pub use decoder::{Decoder, DecoderInfo, FileType};
pub use output::AudioOutput;
pub use resampler::Resampler;
pub use types::{BufferUsage, PcmFormat, PcmSample, SampleFormat};
pub use wave::Wave;
