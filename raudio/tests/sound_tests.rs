//! Sound loading and update tests

mod helpers;

use helpers::*;
use raudio::{Error, Wave};

#[test]
fn test_load_sound_converts_to_device_format() {
    let engine = test_engine();
    let (_dir, path) = temp_wav("blip.wav");
    write_constant_wav(&path, 22_050, 1, 1_000, 16_384).unwrap();

    let sound = engine.load_sound(&path).unwrap();
    assert_eq!(sound.frame_count(), 2_000);
    assert_eq!(sound.handle().format().channels, TEST_CHANNELS);
    assert_eq!(sound.handle().format().sample_rate, TEST_SAMPLE_RATE);
    assert!(engine.is_registered(sound.handle()));

    sound.play();
    let out = mix(&engine, 1_000);
    // Mono duplicated into both channels
    for frame in out[200..1_800].chunks_exact(2) {
        assert!((frame[0] - 0.5).abs() < 0.01);
        assert_eq!(frame[0], frame[1]);
    }
}

#[test]
fn test_unload_sound_unregisters() {
    let engine = test_engine();
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &[0.1; 64]).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();
    let handle = sound.handle().clone();
    assert_eq!(engine.registered_buffers(), 1);

    engine.unload_sound(sound).unwrap();
    assert!(!engine.is_registered(&handle));
    assert_eq!(engine.registered_buffers(), 0);

    // Second delete of the same buffer is rejected
    assert!(matches!(
        engine.delete_audio_buffer(&handle),
        Err(Error::InvalidArgument(_))
    ));
}

#[test]
fn test_update_replaces_leading_frames() {
    let engine = test_engine();
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &vec![0.25; 400]).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();

    sound.play();
    mix(&engine, 50);
    sound.update(&vec![0.75; 200]).unwrap();
    // Update stops the sound
    assert!(!sound.is_playing());

    sound.play();
    let out = mix(&engine, 200);
    assert!(out[..200].iter().all(|&s| s == 0.75));
    assert!(out[200..].iter().all(|&s| s == 0.25));
}

#[test]
fn test_oversized_update_rejected() {
    let engine = test_engine();
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &vec![0.25; 200]).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();

    let result = sound.update(&vec![0.5; 202]);
    assert!(matches!(
        result,
        Err(Error::CapacityOverflow {
            requested: 101,
            capacity: 100
        })
    ));

    sound.play();
    let out = mix(&engine, 100);
    assert!(out.iter().all(|&s| s == 0.25));
}

#[test]
fn test_empty_wave_rejected() {
    let engine = test_engine();
    let wave = Wave::new(TEST_SAMPLE_RATE, 16, 2, Vec::new()).unwrap();

    assert!(matches!(
        engine.load_sound_from_wave(&wave),
        Err(Error::InvalidArgument(_))
    ));
    assert_eq!(engine.registered_buffers(), 0);
}

#[test]
fn test_sound_stop_rewinds() {
    let engine = test_engine();
    let samples = stereo_ramp(300);
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &samples).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();

    sound.play();
    mix(&engine, 100);
    sound.stop();
    assert!(!sound.is_playing());
    assert_eq!(sound.handle().frame_cursor_pos(), 0);

    assert!(mix(&engine, 100).iter().all(|&s| s == 0.0));
}
