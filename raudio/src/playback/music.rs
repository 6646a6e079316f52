//! Music: a decoder feeding an f32 audio stream
//!
//! The application calls [`Music::update`] regularly (every frame in a game
//! loop, every few milliseconds in a player). Each call refills whichever
//! stream halves the mixer has drained.
//!
//! # Looping
//!
//! A looping music wraps the decoder to its first frame as soon as it runs
//! out, inside the same half, so the loop point is gapless. A non-looping
//! music pushes its last frames, lets the mixer drain them, and only then
//! stops.

use crate::audio::decoder::{self, Decoder};
use crate::error::Result;
use crate::playback::engine::AudioEngine;
use crate::playback::stream::AudioStream;
use std::path::Path;
use tracing::{debug, info};

/// Streamed music track registered with an engine
pub struct Music {
    stream: AudioStream,
    decoder: Box<dyn Decoder>,
    frame_count: u64,
    looping: bool,

    /// Frames pulled from the decoder since its last rewind
    frames_decoded: u64,
    /// Last frames pushed; waiting for the mixer to drain them
    ending: bool,
    /// One sub-buffer of decoded samples
    scratch: Vec<f32>,
}

impl std::fmt::Debug for Music {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Music")
            .field("stream", &self.stream)
            .field("frame_count", &self.frame_count)
            .field("looping", &self.looping)
            .field("frames_decoded", &self.frames_decoded)
            .field("ending", &self.ending)
            .finish()
    }
}

impl AudioEngine {
    /// Open a music file for streaming
    pub fn load_music_stream(&self, path: &Path) -> Result<Music> {
        let decoder = decoder::open(path)?;
        let music = self.music_from_decoder(decoder)?;
        info!(
            "Music loaded: {} ({:.2}s)",
            path.display(),
            music.time_length()
        );
        Ok(music)
    }

    /// Stream music from an in-memory file image (`file_type` like ".ogg")
    pub fn load_music_stream_from_memory(&self, file_type: &str, bytes: Vec<u8>) -> Result<Music> {
        let decoder = decoder::open_memory(file_type, bytes)?;
        self.music_from_decoder(decoder)
    }

    fn music_from_decoder(&self, decoder: Box<dyn Decoder>) -> Result<Music> {
        let info = decoder.info();
        let stream = self.load_audio_stream(info.sample_rate, 32, info.channels)?;
        let scratch = vec![0.0f32; stream.sub_buffer_frames() * info.channels as usize];

        debug!(
            "Music stream: {}Hz, {}ch, {} frames",
            info.sample_rate, info.channels, info.total_frames
        );

        Ok(Music {
            stream,
            decoder,
            frame_count: info.total_frames,
            looping: true,
            frames_decoded: 0,
            ending: false,
            scratch,
        })
    }

    pub fn unload_music_stream(&self, music: Music) -> Result<()> {
        self.unload_audio_stream(music.stream)
    }
}

impl Music {
    /// Refill drained stream halves from the decoder.
    pub fn update(&mut self) -> Result<()> {
        let buffer = self.stream.handle();

        if self.ending {
            if buffer.is_sub_buffer_processed(0) && buffer.is_sub_buffer_processed(1) {
                debug!("Music drained, stopping");
                self.stop()?;
            }
            return Ok(());
        }

        let channels = self.stream.format().channels as usize;
        let sub_frames = self.stream.sub_buffer_frames();

        while self.stream.is_processed() {
            let want = match self.frames_left() {
                Some(left) => left.min(sub_frames as u64) as usize,
                None => sub_frames,
            };

            let mut got = if want > 0 {
                self.decoder.read_frames(&mut self.scratch[..want * channels])?
            } else {
                0
            };
            self.frames_decoded += got as u64;

            if self.looping && got < sub_frames && (got > 0 || self.frames_decoded > 0) {
                self.decoder.seek_to_start()?;
                let extra = self
                    .decoder
                    .read_frames(&mut self.scratch[got * channels..sub_frames * channels])?;
                self.frames_decoded = extra as u64;
                got += extra;
            }

            if got == 0 {
                self.ending = true;
                break;
            }

            self.stream.update(&self.scratch[..got * channels])?;

            if !self.looping && (got < sub_frames || self.frames_left() == Some(0)) {
                self.ending = true;
                break;
            }
        }

        if self.looping && self.frame_count > 0 {
            let processed = self.stream.handle().frames_processed();
            self.stream
                .handle()
                .set_frames_processed(processed % self.frame_count);
        }

        Ok(())
    }

    fn frames_left(&self) -> Option<u64> {
        (self.frame_count > 0).then(|| self.frame_count.saturating_sub(self.frames_decoded))
    }

    /// Start or restart playback from the stream's current position
    pub fn play(&mut self) {
        self.stream.handle().play_from_cursor();
    }

    /// Stop playback and rewind the decoder
    pub fn stop(&mut self) -> Result<()> {
        self.stream.stop();
        self.ending = false;
        self.frames_decoded = 0;
        self.decoder.seek_to_start()
    }

    pub fn pause(&self) {
        self.stream.pause();
    }

    pub fn resume(&self) {
        self.stream.resume();
    }

    pub fn is_playing(&self) -> bool {
        self.stream.is_playing()
    }

    pub fn set_volume(&self, volume: f32) {
        self.stream.set_volume(volume);
    }

    pub fn set_pitch(&self, pitch: f32) -> Result<()> {
        self.stream.set_pitch(pitch)
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Jump to `seconds` into the track.
    ///
    /// Frames already queued in the stream still play first.
    pub fn seek(&mut self, seconds: f32) -> Result<()> {
        let rate = self.stream.format().sample_rate as f32;
        let mut position = (seconds.max(0.0) * rate) as u64;
        if self.frame_count > 0 {
            position = position.min(self.frame_count);
        }

        self.decoder.seek(position)?;
        self.frames_decoded = position;
        self.ending = false;
        self.stream.handle().set_frames_processed(position);
        debug!("Music seek to frame {}", position);
        Ok(())
    }

    /// Total length in seconds (0 when the decoder does not know it)
    pub fn time_length(&self) -> f32 {
        self.frame_count as f32 / self.stream.format().sample_rate as f32
    }

    /// Seconds of audio the mixer has consumed, modulo the track length
    pub fn time_played(&self) -> f32 {
        let buffer = self.stream.handle();
        let sub = buffer.sub_buffer_size_in_frames() as i64;

        let queued = (0..2).filter(|&i| !buffer.is_sub_buffer_processed(i)).count() as i64 * sub;
        let sent = buffer.frame_cursor_pos() as i64 % sub;
        let played = buffer.frames_processed() as i64 - queued + sent;

        let played = if self.frame_count > 0 {
            played.rem_euclid(self.frame_count as i64)
        } else {
            played.max(0)
        };
        played as f32 / self.stream.format().sample_rate as f32
    }

    /// Total frames reported by the decoder
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn stream(&self) -> &AudioStream {
        &self.stream
    }
}
