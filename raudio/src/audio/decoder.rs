//! Pull-based format decoders
//!
//! A decoder hands out interleaved f32 frames in the file's native rate and
//! channel count, on demand. Music streams call it from their update loop;
//! `Wave::load` drains it once.
//!
//! - WAV through hound
//! - OGG Vorbis / FLAC / MP3 through symphonia
//! - Tracker modules (XM, MOD) are not supported

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Stream parameters reported by a decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoderInfo {
    pub sample_rate: u32,
    pub channels: u16,
    /// Total frames, 0 when the container does not say
    pub total_frames: u64,
}

/// Pull-based decoder producing interleaved f32 frames
pub trait Decoder: Send {
    fn info(&self) -> DecoderInfo;

    /// Decode up to `out.len() / channels` frames into `out`.
    ///
    /// Returns the frames written; fewer than requested means end of stream.
    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize>;

    /// Position the next read at `frame`
    fn seek(&mut self, frame: u64) -> Result<()>;

    fn seek_to_start(&mut self) -> Result<()> {
        self.seek(0)
    }
}

/// Audio container recognised by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Wav,
    Ogg,
    Flac,
    Mp3,
}

impl FileType {
    /// Parse an extension with or without the leading dot (case-insensitive)
    pub fn from_extension(ext: &str) -> Result<Self> {
        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        match ext.as_str() {
            "wav" => Ok(FileType::Wav),
            "ogg" => Ok(FileType::Ogg),
            "flac" => Ok(FileType::Flac),
            "mp3" => Ok(FileType::Mp3),
            "xm" | "mod" => Err(Error::UnsupportedFormat(format!(
                "Tracker module '.{}' is not supported",
                ext
            ))),
            other => Err(Error::UnsupportedFormat(format!("Unknown file type '.{}'", other))),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(format!("No file extension: {}", path.display())))?;
        Self::from_extension(ext)
    }

    fn extension(&self) -> &'static str {
        match self {
            FileType::Wav => "wav",
            FileType::Ogg => "ogg",
            FileType::Flac => "flac",
            FileType::Mp3 => "mp3",
        }
    }
}

/// Open a decoder for a file, dispatching on its extension
pub fn open(path: &Path) -> Result<Box<dyn Decoder>> {
    let file_type = FileType::from_path(path)?;
    debug!("Opening {:?} decoder for {}", file_type, path.display());

    match file_type {
        FileType::Wav => {
            let reader = hound::WavReader::open(path)?;
            Ok(Box::new(WavDecoder::new(reader)?))
        }
        _ => {
            let file = File::open(path)?;
            Ok(Box::new(SymphoniaDecoder::new(Box::new(file), file_type)?))
        }
    }
}

/// Open a decoder over an in-memory file image
pub fn open_memory(file_type: &str, bytes: Vec<u8>) -> Result<Box<dyn Decoder>> {
    let file_type = FileType::from_extension(file_type)?;
    debug!("Opening {:?} decoder for {} bytes in memory", file_type, bytes.len());

    match file_type {
        FileType::Wav => {
            let reader = hound::WavReader::new(Cursor::new(bytes))?;
            Ok(Box::new(WavDecoder::new(reader)?))
        }
        _ => Ok(Box::new(SymphoniaDecoder::new(Box::new(Cursor::new(bytes)), file_type)?)),
    }
}

/// Read every remaining frame of a decoder
pub fn decode_all(decoder: &mut dyn Decoder) -> Result<Vec<f32>> {
    let info = decoder.info();
    let channels = info.channels as usize;
    let mut samples = Vec::with_capacity(info.total_frames as usize * channels);
    let mut chunk = vec![0.0f32; 4096 * channels];

    loop {
        let frames = decoder.read_frames(&mut chunk)?;
        samples.extend_from_slice(&chunk[..frames * channels]);
        if frames * channels < chunk.len() {
            break;
        }
    }

    debug!("Decoded {} frames", samples.len() / channels.max(1));
    Ok(samples)
}

/// WAV decoder over any seekable reader
pub struct WavDecoder<R: Read + Seek> {
    reader: hound::WavReader<R>,
    info: DecoderInfo,
    float: bool,
    scale: f32,
}

/// File-backed WAV decoder
pub type WavFileDecoder = WavDecoder<BufReader<File>>;

impl<R: Read + Seek> WavDecoder<R> {
    pub fn new(reader: hound::WavReader<R>) -> Result<Self> {
        let spec = reader.spec();
        let float = spec.sample_format == hound::SampleFormat::Float;
        if float && spec.bits_per_sample != 32 {
            return Err(Error::UnsupportedFormat(format!(
                "{}-bit float WAV",
                spec.bits_per_sample
            )));
        }
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(Error::Decode("WAV header has zero channels or rate".to_string()));
        }

        let info = DecoderInfo {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            total_frames: reader.duration() as u64,
        };

        debug!(
            "WAV: {}Hz, {}ch, {}-bit {}, {} frames",
            spec.sample_rate,
            spec.channels,
            spec.bits_per_sample,
            if float { "float" } else { "int" },
            info.total_frames
        );

        Ok(Self {
            reader,
            info,
            float,
            scale: 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32,
        })
    }
}

impl<R: Read + Seek + Send> Decoder for WavDecoder<R> {
    fn info(&self) -> DecoderInfo {
        self.info
    }

    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.info.channels as usize;
        let wanted = out.len() / channels * channels;
        let mut written = 0;

        if self.float {
            for sample in self.reader.samples::<f32>().take(wanted) {
                out[written] = sample?;
                written += 1;
            }
        } else {
            let scale = self.scale;
            for sample in self.reader.samples::<i32>().take(wanted) {
                out[written] = sample? as f32 * scale;
                written += 1;
            }
        }

        Ok(written / channels)
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let frame = frame.min(self.info.total_frames) as u32;
        self.reader.seek(frame)?;
        Ok(())
    }
}

/// Compressed-format decoder built on symphonia
pub struct SymphoniaDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    info: DecoderInfo,

    sample_buf: Option<SampleBuffer<f32>>,
    /// Decoded samples not yet handed out
    pending: Vec<f32>,
    pending_pos: usize,
    /// Samples to discard after an inexact seek
    skip: usize,
    finished: bool,
}

impl SymphoniaDecoder {
    pub fn new(source: Box<dyn MediaSource>, file_type: FileType) -> Result<Self> {
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        hint.with_extension(file_type.extension());

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = &track.codec_params;

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;
        let total_frames = params.n_frames.unwrap_or(0);

        let decoder = symphonia::default::get_codecs()
            .make(params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("Failed to create decoder: {}", e)))?;

        debug!(
            "{:?}: sample_rate={}, channels={}, frames={}",
            file_type, sample_rate, channels, total_frames
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            info: DecoderInfo {
                sample_rate,
                channels,
                total_frames,
            },
            sample_buf: None,
            pending: Vec::new(),
            pending_pos: 0,
            skip: 0,
            finished: false,
        })
    }

    /// Decode the next packet of our track into `pending`.
    ///
    /// Returns false at end of stream.
    fn refill(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream");
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Error reading packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Decode error, skipping packet: {}", e);
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let needs_new = self
                .sample_buf
                .as_ref()
                .map(|buf| buf.capacity() < decoded.capacity() * decoded.spec().channels.count())
                .unwrap_or(true);
            if needs_new {
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, *decoded.spec()));
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                self.pending.clear();
                self.pending.extend_from_slice(buf.samples());
                self.pending_pos = 0;
            }

            if self.skip > 0 {
                let dropped = self.skip.min(self.pending.len());
                self.pending_pos = dropped;
                self.skip -= dropped;
            }

            if self.pending_pos < self.pending.len() {
                return Ok(true);
            }
        }
    }
}

impl Decoder for SymphoniaDecoder {
    fn info(&self) -> DecoderInfo {
        self.info
    }

    fn read_frames(&mut self, out: &mut [f32]) -> Result<usize> {
        let channels = self.info.channels as usize;
        let wanted = out.len() / channels * channels;
        let mut written = 0;

        while written < wanted {
            if self.pending_pos >= self.pending.len() {
                if self.finished || !self.refill()? {
                    self.finished = true;
                    break;
                }
            }

            let n = (wanted - written).min(self.pending.len() - self.pending_pos);
            out[written..written + n]
                .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
            written += n;
            self.pending_pos += n;
        }

        Ok(written / channels)
    }

    fn seek(&mut self, frame: u64) -> Result<()> {
        let seeked = self
            .format
            .seek(
                SeekMode::Accurate,
                SeekTo::TimeStamp {
                    ts: frame,
                    track_id: self.track_id,
                },
            )
            .map_err(|e| Error::Decode(format!("Seek to frame {} failed: {}", frame, e)))?;

        self.decoder.reset();
        self.pending.clear();
        self.pending_pos = 0;
        self.finished = false;

        // Land exactly on the requested frame
        let lead = seeked.required_ts.saturating_sub(seeked.actual_ts);
        self.skip = lead as usize * self.info.channels as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(spec: hound::WavSpec, samples: &[i32]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_file_type_dispatch() {
        assert_eq!(FileType::from_extension(".WAV").unwrap(), FileType::Wav);
        assert_eq!(FileType::from_extension("ogg").unwrap(), FileType::Ogg);
        assert_eq!(FileType::from_path(Path::new("a/b.flac")).unwrap(), FileType::Flac);
        assert!(matches!(
            FileType::from_extension("xm"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(matches!(
            FileType::from_extension(".mod"),
            Err(Error::UnsupportedFormat(_))
        ));
        assert!(FileType::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_wav_decoder_reads_and_seeks() {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let samples: Vec<i32> = (0..20).map(|i| i * 1_000).collect();
        let mut decoder = open_memory("wav", wav_bytes(spec, &samples)).unwrap();

        let info = decoder.info();
        assert_eq!(info.sample_rate, 8_000);
        assert_eq!(info.channels, 2);
        assert_eq!(info.total_frames, 10);

        let mut out = vec![0.0f32; 8];
        assert_eq!(decoder.read_frames(&mut out).unwrap(), 4);
        assert!((out[1] - 1_000.0 / 32_768.0).abs() < 1e-6);

        decoder.seek(8).unwrap();
        assert_eq!(decoder.read_frames(&mut out).unwrap(), 2);
        assert!((out[0] - 16_000.0 / 32_768.0).abs() < 1e-6);

        decoder.seek_to_start().unwrap();
        let all = decode_all(decoder.as_mut()).unwrap();
        assert_eq!(all.len(), 20);
    }

    #[test]
    fn test_eight_bit_wav_is_centred() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 8_000,
            bits_per_sample: 8,
            sample_format: hound::SampleFormat::Int,
        };
        let mut decoder = open_memory(".wav", wav_bytes(spec, &[0, 64, -128])).unwrap();
        let mut out = vec![0.0f32; 3];
        assert_eq!(decoder.read_frames(&mut out).unwrap(), 3);
        assert_eq!(out, vec![0.0, 0.5, -1.0]);
    }
}
