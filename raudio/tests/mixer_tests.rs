//! Mixing callback integration tests
//!
//! Drives `Mixer::mix` directly (no audio device) against buffers registered
//! through the engine:
//! - Frame-exact static playback
//! - Gain law and registry-order independence
//! - Pause/resume position keeping
//! - Master vs. buffer volume clamping

mod helpers;

use helpers::*;
use raudio::{BufferUsage, PcmFormat, SampleFormat, Wave};

fn load_ramp_sound(engine: &raudio::AudioEngine, frames: usize) -> (raudio::Sound, Vec<f32>) {
    let samples = stereo_ramp(frames);
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &samples).unwrap();
    (engine.load_sound_from_wave(&wave).unwrap(), samples)
}

fn load_constant_sound(engine: &raudio::AudioEngine, frames: usize, value: f32) -> raudio::Sound {
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &vec![value; frames * 2]).unwrap();
    engine.load_sound_from_wave(&wave).unwrap()
}

#[test]
fn test_unplayed_static_buffer_is_silent() {
    let engine = test_engine();
    let format = PcmFormat::new(SampleFormat::F32, 2, TEST_SAMPLE_RATE);
    let handle = engine.create_audio_buffer(format, 100, BufferUsage::Static).unwrap();

    let out = mix(&engine, 256);
    assert!(out.iter().all(|&s| s == 0.0));
    assert!(engine.is_registered(&handle));
    assert!(!handle.is_playing());
}

#[test]
fn test_static_playback_delivers_every_frame_once() {
    let engine = test_engine();
    let (sound, samples) = load_ramp_sound(&engine, 1_000);
    assert_eq!(sound.frame_count(), 1_000);
    sound.play();

    let mut delivered = Vec::new();
    for _ in 0..5 {
        delivered.extend(mix(&engine, 300));
    }

    assert!(!sound.is_playing());
    assert_eq!(&delivered[..2_000], &samples[..]);
    assert!(delivered[2_000..].iter().all(|&s| s == 0.0));
    assert_eq!(audible_frames(&delivered), 1_000);
    assert_eq!(engine.mixer().underrun_recoveries(), 0);
}

#[test]
fn test_looping_sound_repeats_exactly() {
    let engine = test_engine();
    let (sound, samples) = load_ramp_sound(&engine, 100);
    sound.handle().set_looping(true);
    sound.play();

    let out = mix(&engine, 250);
    assert_eq!(&out[..200], &samples[..]);
    assert_eq!(&out[200..400], &samples[..]);
    assert_eq!(&out[400..], &samples[..100]);
    assert!(sound.is_playing());
    assert_eq!(sound.handle().frame_cursor_pos(), 50);
}

fn mix_gain_scenario(constant_first: bool) -> Vec<f32> {
    let engine = test_engine();
    engine.set_master_volume(0.5);

    let mut sounds = Vec::new();
    if constant_first {
        let loud = load_constant_sound(&engine, 512, 0.5);
        loud.set_volume(0.6);
        sounds.push(loud);
    }
    sounds.push(load_constant_sound(&engine, 512, 0.0));
    sounds.push(load_constant_sound(&engine, 512, 0.0));
    if !constant_first {
        let loud = load_constant_sound(&engine, 512, 0.5);
        loud.set_volume(0.6);
        sounds.push(loud);
    }

    for sound in &sounds {
        sound.play();
    }
    mix(&engine, 256)
}

#[test]
fn test_gain_law_independent_of_registry_order() {
    let first = mix_gain_scenario(true);
    let last = mix_gain_scenario(false);

    let expected = 0.5 * 0.6 * 0.5;
    assert!(first.iter().all(|&s| (s - expected).abs() < 1e-6));
    assert!(last.iter().all(|&s| (s - expected).abs() < 1e-6));
    assert_eq!(first, last);
}

#[test]
fn test_summing_two_sounds() {
    let engine = test_engine();
    let a = load_constant_sound(&engine, 256, 0.25);
    let b = load_constant_sound(&engine, 256, -0.5);
    a.play();
    b.play();

    let out = mix(&engine, 128);
    assert!(out.iter().all(|&s| (s + 0.25).abs() < 1e-6));
}

#[test]
fn test_buffer_volume_unclamped_master_clamped() {
    let engine = test_engine();
    let sound = load_constant_sound(&engine, 256, 0.25);
    sound.set_volume(2.0);
    engine.set_master_volume(3.0);
    assert_eq!(engine.master_volume(), 1.0);
    sound.play();

    let out = mix(&engine, 64);
    assert!(out.iter().all(|&s| (s - 0.5).abs() < 1e-6));

    engine.set_master_volume(-1.0);
    assert_eq!(engine.master_volume(), 0.0);
    let out = mix(&engine, 64);
    assert!(out.iter().all(|&s| s == 0.0));
}

#[test]
fn test_pause_keeps_position_and_resume_continues() {
    let engine = test_engine();
    let (sound, samples) = load_ramp_sound(&engine, 400);
    sound.play();

    let first = mix(&engine, 100);
    assert_eq!(&first[..], &samples[..200]);

    sound.pause();
    let paused = mix(&engine, 100);
    assert!(paused.iter().all(|&s| s == 0.0));
    assert_eq!(sound.handle().frame_cursor_pos(), 100);
    assert!(!sound.is_playing());

    sound.resume();
    let resumed = mix(&engine, 100);
    assert_eq!(&resumed[..], &samples[200..400]);
}

#[test]
fn test_play_restarts_from_beginning() {
    let engine = test_engine();
    let (sound, samples) = load_ramp_sound(&engine, 300);
    sound.play();
    mix(&engine, 120);

    sound.play();
    let out = mix(&engine, 50);
    assert_eq!(&out[..], &samples[..100]);
}

#[test]
fn test_unloaded_and_dropped_sounds_not_mixed() {
    let engine = test_engine();
    let kept = load_constant_sound(&engine, 256, 0.1);
    let unloaded = load_constant_sound(&engine, 256, 0.2);
    let dropped = load_constant_sound(&engine, 256, 0.3);

    kept.play();
    unloaded.play();
    dropped.play();

    engine.unload_sound(unloaded).unwrap();
    drop(dropped);

    let out = mix(&engine, 64);
    assert!(out.iter().all(|&s| (s - 0.1).abs() < 1e-6));
}

#[test]
fn test_period_longer_than_scratch_mixes_fully() {
    let engine = test_engine();
    let sound = load_constant_sound(&engine, 4_096, 0.125);
    sound.play();

    let out = mix(&engine, 2_000);
    assert_eq!(audible_frames(&out), 2_000);
    assert_eq!(sound.handle().frame_cursor_pos(), 2_000);
}
