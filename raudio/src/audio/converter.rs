//! Per-buffer format conversion pipeline
//!
//! Converts frames from a buffer's native layout (sample format, channel
//! count, sample rate) to the fixed device mixing layout (f32, device
//! channels, device rate) while the mixer pulls them.
//!
//! The converter owns all of its scratch storage; it is allocated once on
//! the application thread when the buffer is created, so pulling frames on
//! the audio thread never allocates.
//!
//! Pitch is modelled as a change of the effective output rate. When the
//! output rate equals the native rate the converter is a pure passthrough
//! (sample decode and channel mapping only), which keeps frame counts exact.
//! Otherwise frames go through a rubato polynomial resampler whose
//! interpolation state persists between pulls.

use crate::audio::types::PcmFormat;
use crate::error::{Error, Result};
use rubato::{FastFixedOut, PolynomialDegree, Resampler as RubatoResampler};
use tracing::{debug, warn};

/// Output frames produced by one resampler pass
pub const CONVERTER_CHUNK_FRAMES: usize = 512;

/// Largest supported pitch factor (and inverse of the smallest)
pub const MAX_PITCH_RATIO: f64 = 8.0;

/// Slack on the resampler's ratio bounds; output rates are whole Hz, so the
/// extreme pitches land a hair outside `1/8..=8` of the construction ratio
const RATIO_HEADROOM: f64 = 1.01;

/// Stateful converter from a native PCM layout to the mixing layout
pub struct FormatConverter {
    input: PcmFormat,
    output_channels: u16,
    device_rate: u32,

    /// Effective output rate; equals `device_rate` at pitch 1.0
    output_rate: u32,

    resampler: FastFixedOut<f32>,
    resampling: bool,

    /// Frames the raw/mapped scratch buffers can hold
    scratch_frames: usize,
    raw: Vec<u8>,
    mapped: Vec<f32>,
    planar_in: Vec<Vec<f32>>,
    planar_out: Vec<Vec<f32>>,

    /// Converted frames left over from the last resampler pass
    pending_offset: usize,
    pending_len: usize,
}

impl FormatConverter {
    /// Create a converter from `input` to f32 at `output_channels` / `device_rate`.
    pub fn new(input: PcmFormat, output_channels: u16, device_rate: u32) -> Result<Self> {
        input.validate()?;
        if output_channels == 0 || device_rate == 0 {
            return Err(Error::InvalidArgument(
                "Converter output format must have channels and a sample rate".to_string(),
            ));
        }

        let ratio = device_rate as f64 / input.sample_rate as f64;
        let resampler = FastFixedOut::<f32>::new(
            ratio,
            MAX_PITCH_RATIO * RATIO_HEADROOM,
            PolynomialDegree::Cubic,
            CONVERTER_CHUNK_FRAMES,
            output_channels as usize,
        )
        .map_err(|e| Error::InvalidArgument(format!("Failed to create converter: {}", e)))?;

        let scratch_frames = resampler.input_frames_max().max(CONVERTER_CHUNK_FRAMES);
        let planar_in = resampler.input_buffer_allocate(true);
        let planar_out = resampler.output_buffer_allocate(true);

        debug!(
            "Converter {:?} {}ch {}Hz -> f32 {}ch {}Hz (scratch {} frames)",
            input.sample_format,
            input.channels,
            input.sample_rate,
            output_channels,
            device_rate,
            scratch_frames
        );

        Ok(Self {
            input,
            output_channels,
            device_rate,
            output_rate: device_rate,
            resampler,
            resampling: device_rate != input.sample_rate,
            scratch_frames,
            raw: vec![0u8; scratch_frames * input.bytes_per_frame()],
            mapped: vec![0.0; scratch_frames * output_channels as usize],
            planar_in,
            planar_out,
            pending_offset: 0,
            pending_len: 0,
        })
    }

    /// Native layout frames are converted from
    pub fn input_format(&self) -> PcmFormat {
        self.input
    }

    /// Output channel count
    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    /// Device rate the mixer consumes frames at
    pub fn device_rate(&self) -> u32 {
        self.device_rate
    }

    /// Effective output rate the native frames are resampled to
    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    /// True when frames pass through the resampler
    pub fn is_resampling(&self) -> bool {
        self.resampling
    }

    /// Change the effective output rate (dynamic sample rate).
    ///
    /// The change is rejected, leaving the converter untouched, when the new
    /// rate is outside the range the resampler was built for.
    pub fn set_output_rate(&mut self, rate: u32) -> Result<()> {
        if rate == 0 {
            return Err(Error::InvalidArgument("Output rate must be > 0".to_string()));
        }

        let resample = rate != self.input.sample_rate;
        if resample {
            if !self.resampling {
                // Interpolation history from an earlier resampling period is stale
                self.resampler.reset();
            }
            let ratio = rate as f64 / self.input.sample_rate as f64;
            self.resampler
                .set_resample_ratio(ratio, false)
                .map_err(|e| Error::InvalidArgument(format!("Output rate {}Hz rejected: {}", rate, e)))?;
        }

        self.resampling = resample;
        self.output_rate = rate;
        Ok(())
    }

    /// Drop leftover frames and interpolation history, keeping the output rate.
    pub fn reset(&mut self) {
        self.pending_offset = 0;
        self.pending_len = 0;
        self.resampler.reset();
        if self.resampling {
            // reset() restores the construction ratio
            let ratio = self.output_rate as f64 / self.input.sample_rate as f64;
            if let Err(e) = self.resampler.set_resample_ratio(ratio, false) {
                warn!(
                    "Converter reset could not restore {}Hz output, back to {}Hz: {}",
                    self.output_rate, self.device_rate, e
                );
                self.output_rate = self.device_rate;
                self.resampling = self.device_rate != self.input.sample_rate;
            }
        }
    }

    /// Pull converted frames into `out` (interleaved, output channels).
    ///
    /// `source` fills the given byte slice with up to `n` native frames and
    /// returns how many it wrote. Returns the number of output frames
    /// produced; fewer than requested means the source ran dry.
    pub fn read_frames<F>(&mut self, out: &mut [f32], mut source: F) -> usize
    where
        F: FnMut(&mut [u8], usize) -> usize,
    {
        let out_ch = self.output_channels as usize;
        let frame_count = out.len() / out_ch;
        let bpf = self.input.bytes_per_frame();

        let mut produced = self.drain_pending(out, 0, frame_count);

        if !self.resampling {
            while produced < frame_count {
                let request = (frame_count - produced).min(self.scratch_frames);
                let got = source(&mut self.raw[..request * bpf], request).min(request);
                convert_into(
                    self.input,
                    &self.raw[..got * bpf],
                    out_ch,
                    &mut out[produced * out_ch..(produced + got) * out_ch],
                );
                produced += got;
                if got < request {
                    break;
                }
            }
            return produced;
        }

        let mut source_dry = false;
        while produced < frame_count {
            if self.pending_len > 0 {
                produced += self.drain_pending(out, produced, frame_count);
                continue;
            }
            if source_dry {
                break;
            }

            let needed = self.resampler.input_frames_next().min(self.scratch_frames);
            let got = source(&mut self.raw[..needed * bpf], needed).min(needed);
            convert_into(
                self.input,
                &self.raw[..got * bpf],
                out_ch,
                &mut self.mapped[..got * out_ch],
            );

            for (ch, plane) in self.planar_in.iter_mut().enumerate() {
                for frame in 0..got {
                    plane[frame] = self.mapped[frame * out_ch + ch];
                }
                plane[got..needed].fill(0.0);
            }

            let written = match self
                .resampler
                .process_into_buffer(&self.planar_in, &mut self.planar_out, None)
            {
                Ok((_, written)) => written,
                Err(_) => break,
            };

            let valid = if got < needed {
                source_dry = true;
                let ratio = self.output_rate as f64 / self.input.sample_rate as f64;
                ((got as f64 * ratio).ceil() as usize).min(written)
            } else {
                written
            };

            self.pending_offset = 0;
            self.pending_len = valid;
        }

        produced
    }

    /// Copy leftover resampled frames into `out` starting at frame `at`
    fn drain_pending(&mut self, out: &mut [f32], at: usize, frame_count: usize) -> usize {
        let n = self.pending_len.min(frame_count - at);
        if n == 0 {
            return 0;
        }

        let out_ch = self.output_channels as usize;
        for frame in 0..n {
            for (ch, plane) in self.planar_out.iter().enumerate() {
                out[(at + frame) * out_ch + ch] = plane[self.pending_offset + frame];
            }
        }

        self.pending_offset += n;
        self.pending_len -= n;
        n
    }
}

/// Decode raw native frames and map them onto `out_channels` f32 channels.
///
/// Channel mapping:
/// - same count: copied
/// - mono input: duplicated into every output channel
/// - mono output: average of the input channels
/// - otherwise: matching channels copied, extra output channels silent
pub fn convert_into(input: PcmFormat, raw: &[u8], out_channels: usize, out: &mut [f32]) {
    let bps = input.sample_format.bytes_per_sample();
    let in_ch = input.channels as usize;
    let bpf = bps * in_ch;
    let format = input.sample_format;

    for (frame, dst) in raw.chunks_exact(bpf).zip(out.chunks_exact_mut(out_channels)) {
        if in_ch == out_channels {
            for (ch, sample) in dst.iter_mut().enumerate() {
                *sample = format.decode(&frame[ch * bps..]);
            }
        } else if in_ch == 1 {
            dst.fill(format.decode(frame));
        } else if out_channels == 1 {
            let sum: f32 = (0..in_ch).map(|ch| format.decode(&frame[ch * bps..])).sum();
            dst[0] = sum / in_ch as f32;
        } else {
            for (ch, sample) in dst.iter_mut().enumerate() {
                *sample = if ch < in_ch {
                    format.decode(&frame[ch * bps..])
                } else {
                    0.0
                };
            }
        }
    }
}

/// Offline helper: decode a whole native byte buffer to interleaved f32.
pub fn to_f32_interleaved(input: PcmFormat, raw: &[u8], out_channels: usize) -> Vec<f32> {
    let frames = raw.len() / input.bytes_per_frame();
    let mut out = vec![0.0; frames * out_channels];
    convert_into(input, raw, out_channels, &mut out);
    out
}
