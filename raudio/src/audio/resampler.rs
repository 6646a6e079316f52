//! Offline resampling using rubato
//!
//! Converts a whole clip between sample rates in one pass. Used when a wave
//! is reformatted or a sound is converted to the device format at load time;
//! the real-time path lives in [`crate::audio::converter`].

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Whole-buffer resampler
pub struct Resampler;

impl Resampler {
    /// Resample interleaved audio from `input_rate` to `output_rate`.
    ///
    /// The output always holds exactly `expected_frames(frames, in, out)`
    /// frames: resampler tail or shortfall is trimmed or zero-padded.
    ///
    /// If the rates are equal, returns a copy without resampling.
    pub fn resample(
        input: &[f32],
        input_rate: u32,
        output_rate: u32,
        channels: u16,
    ) -> Result<Vec<f32>> {
        if channels == 0 || input_rate == 0 || output_rate == 0 {
            return Err(Error::InvalidArgument(
                "Resample needs channels and sample rates > 0".to_string(),
            ));
        }

        if input_rate == output_rate {
            debug!("Sample rate already at {}Hz, skipping resample", output_rate);
            return Ok(input.to_vec());
        }

        let num_channels = channels as usize;
        let input_frames = input.len() / num_channels;
        let target_frames = Self::expected_frames(input_frames, input_rate, output_rate);

        if input_frames == 0 {
            return Ok(Vec::new());
        }

        debug!(
            "Resampling {} frames from {}Hz to {}Hz ({} channels)",
            input_frames, input_rate, output_rate, channels
        );

        // rubato expects planar format
        let planar_input = Self::deinterleave(input, channels);

        let mut resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0, // no runtime ratio changes
            PolynomialDegree::Septic,
            input_frames,
            num_channels,
        )
        .map_err(|e| Error::InvalidArgument(format!("Failed to create resampler: {}", e)))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;

        Ok(Self::interleave(&planar_output, target_frames))
    }

    /// Frame count after converting `frames` frames between two rates
    pub fn expected_frames(frames: usize, input_rate: u32, output_rate: u32) -> usize {
        if input_rate == 0 {
            return 0;
        }
        ((frames as u64 * output_rate as u64).div_ceil(input_rate as u64)) as usize
    }

    /// Split interleaved frames into one plane per channel
    fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
        let channels = channels as usize;
        (0..channels)
            .map(|ch| samples.chunks_exact(channels).map(|frame| frame[ch]).collect())
            .collect()
    }

    /// Merge planes into exactly `frames` interleaved frames; missing
    /// samples are silent and surplus ones dropped.
    fn interleave(planes: &[Vec<f32>], frames: usize) -> Vec<f32> {
        let channels = planes.len();
        let mut out = vec![0.0f32; frames * channels];
        for (ch, plane) in planes.iter().enumerate() {
            for (frame, &sample) in out.chunks_exact_mut(channels).zip(plane) {
                frame[ch] = sample;
            }
        }
        out
    }
}
