//! Pitch and sample-rate conversion tests
//!
//! Pitch is applied as a change of the converter's output rate:
//! `outRate = (deviceRate / nativeRate) / pitch * nativeRate`.

mod helpers;

use helpers::*;
use raudio::{BufferUsage, Error, PcmFormat, SampleFormat, Wave};

#[test]
fn test_pitch_two_halves_output_rate() {
    let engine = test_engine();
    let format = PcmFormat::new(SampleFormat::F32, 2, 44_100);
    let handle = engine.create_audio_buffer(format, 1_024, BufferUsage::Static).unwrap();

    assert_eq!(handle.converter_output_rate(), 44_100);
    handle.set_pitch(2.0).unwrap();
    assert_eq!(handle.converter_output_rate(), 22_050);
    assert_eq!(handle.pitch(), 2.0);

    handle.set_pitch(0.5).unwrap();
    assert_eq!(handle.converter_output_rate(), 88_200);

    handle.set_pitch(1.0).unwrap();
    assert_eq!(handle.converter_output_rate(), 44_100);
}

#[test]
fn test_pitch_with_native_rate_conversion() {
    let engine = test_engine();
    let format = PcmFormat::new(SampleFormat::S16, 1, 22_050);
    let handle = engine.create_audio_buffer(format, 1_024, BufferUsage::Static).unwrap();

    handle.set_pitch(2.0).unwrap();
    assert_eq!(handle.converter_output_rate(), 22_050);
}

#[test]
fn test_pitch_range_ends_accepted() {
    let engine = test_engine();

    for native in [22_050, 44_100, 48_000] {
        let format = PcmFormat::new(SampleFormat::F32, 2, native);
        let handle = engine.create_audio_buffer(format, 256, BufferUsage::Static).unwrap();

        handle.set_pitch(8.0).unwrap();
        assert_eq!(handle.pitch(), 8.0);
        assert_eq!(handle.converter_output_rate(), 5_512, "{}Hz at pitch 8", native);

        handle.set_pitch(0.125).unwrap();
        assert_eq!(handle.pitch(), 0.125);
        assert_eq!(handle.converter_output_rate(), 352_800, "{}Hz at pitch 1/8", native);
    }
}

#[test]
fn test_top_pitch_plays_eight_times_faster() {
    let engine = test_engine();
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &vec![0.5f32; 8_192 * 2]).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();
    sound.set_pitch(8.0).unwrap();
    sound.play();

    mix(&engine, 512);
    let cursor = sound.handle().frame_cursor_pos();
    assert!(
        (4_000..=4_300).contains(&cursor),
        "Expected ~4096 native frames consumed, cursor at {}",
        cursor
    );
}

#[test]
fn test_invalid_pitch_ignored() {
    let engine = test_engine();
    let format = PcmFormat::new(SampleFormat::F32, 2, 44_100);
    let handle = engine.create_audio_buffer(format, 64, BufferUsage::Static).unwrap();
    handle.set_pitch(1.5).unwrap();

    for bad in [0.0, -2.0, 0.01, 100.0] {
        assert!(matches!(handle.set_pitch(bad), Err(Error::InvalidArgument(_))));
        assert_eq!(handle.pitch(), 1.5);
        assert_eq!(handle.converter_output_rate(), 29_400);
    }
}

#[test]
fn test_double_pitch_halves_duration() {
    let engine = test_engine();
    let frames = 8_192;
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &vec![0.5f32; frames * 2]).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();
    sound.set_pitch(2.0).unwrap();
    sound.play();

    let mut audible = 0;
    for _ in 0..40 {
        let out = mix(&engine, 512);
        audible += out
            .chunks_exact(2)
            .filter(|frame| frame[0].abs() > 0.25)
            .count();
        if !sound.is_playing() {
            break;
        }
    }

    assert!(!sound.is_playing());
    let expected = frames / 2;
    assert!(
        audible + 600 >= expected && audible <= expected + 600,
        "Expected ~{} audible frames at pitch 2.0, got {}",
        expected,
        audible
    );
}

#[test]
fn test_half_pitch_consumes_half_speed() {
    let engine = test_engine();
    let wave = Wave::from_samples(TEST_SAMPLE_RATE, 2, &vec![0.5f32; 8_192 * 2]).unwrap();
    let sound = engine.load_sound_from_wave(&wave).unwrap();
    sound.set_pitch(0.5).unwrap();
    sound.play();

    for _ in 0..4 {
        mix(&engine, 512);
    }

    let cursor = sound.handle().frame_cursor_pos();
    assert!(
        (900..=1_200).contains(&cursor),
        "Expected ~1024 native frames consumed, cursor at {}",
        cursor
    );
}

#[test]
fn test_resampled_stream_feeds_device_rate() {
    let engine = test_engine_with_stream_size(1_024);
    let stream = engine.load_audio_stream(22_050, 16, 1).unwrap();
    let block = vec![8_192i16; 1_024];

    stream.play();
    let mut audible = 0;
    for _ in 0..8 {
        while stream.is_processed() {
            stream.update(&block).unwrap();
        }
        audible += audible_frames(&mix(&engine, 512));
    }

    // Upsampled 2x: every device frame after the filter warm-up carries signal
    assert!(audible >= 8 * 512 - 16, "only {} audible frames", audible);
    assert_eq!(engine.mixer().underrun_recoveries(), 0);
}
