//! Voice pipeline integration tests
//!
//! Tests voice components without requiring audio hardware

use sage_voice::voice::{
    Disabled, Endpoint, EndpointConfig, Endpointer, SAMPLE_RATE, SpeechCapture, SpeechEvent,
    SpeechEvents, SpeechOutput, Utterance, samples_to_wav,
};
use sage_voice::{Event, Generation};
use std::io::Cursor;
use tokio::sync::mpsc;

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}

/// Generate silence
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn generate_silence(duration_secs: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    vec![0.0; num_samples]
}

/// Feed audio in 100ms blocks, as the capture thread does
fn feed(endpointer: &mut Endpointer, audio: &[f32]) -> Endpoint {
    for block in audio.chunks(1600) {
        match endpointer.push(block) {
            Endpoint::Pending => {}
            done => return done,
        }
    }
    Endpoint::Pending
}

#[test]
fn test_endpoint_config_from_durations() {
    let config = EndpointConfig::from_durations(500, 3, 8);

    assert_eq!(config.silence_samples, 8000);
    assert_eq!(config.no_speech_samples, 48000);
    assert_eq!(config.max_samples, 128_000);
}

#[test]
fn test_spoken_phrase_completes() {
    let mut endpointer = Endpointer::new(EndpointConfig::default());

    assert_eq!(
        feed(&mut endpointer, &generate_sine_samples(440.0, 1.0, 0.5)),
        Endpoint::Pending
    );
    assert!(endpointer.is_speaking());
    assert_eq!(
        feed(&mut endpointer, &generate_silence(1.0)),
        Endpoint::Complete
    );

    let speech = endpointer.take_speech();
    assert!(speech.len() >= 16000);
}

#[test]
fn test_silence_reports_no_speech() {
    let config = EndpointConfig::from_durations(800, 2, 10);
    let mut endpointer = Endpointer::new(config);

    assert_eq!(
        feed(&mut endpointer, &generate_silence(3.0)),
        Endpoint::NoSpeech
    );
    assert!(!endpointer.is_speaking());
}

#[test]
fn test_quiet_tone_is_not_speech() {
    let config = EndpointConfig::from_durations(800, 1, 10);
    let mut endpointer = Endpointer::new(config);

    assert_eq!(
        feed(&mut endpointer, &generate_sine_samples(440.0, 2.0, 0.01)),
        Endpoint::NoSpeech
    );
}

#[test]
fn test_long_speech_hits_cap() {
    let config = EndpointConfig::from_durations(800, 5, 2);
    let mut endpointer = Endpointer::new(config);

    assert_eq!(
        feed(&mut endpointer, &generate_sine_samples(220.0, 3.0, 0.5)),
        Endpoint::Complete
    );
    assert!(endpointer.take_speech().len() >= 32000);
}

#[test]
fn test_wav_encoding_roundtrip() {
    let samples = generate_sine_samples(440.0, 0.5, 0.5);
    let wav = samples_to_wav(&samples, SAMPLE_RATE).unwrap();

    let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 1);
    assert_eq!(spec.sample_rate, SAMPLE_RATE);
    assert_eq!(spec.bits_per_sample, 16);
    assert_eq!(reader.len() as usize, samples.len());
}

#[test]
fn test_disabled_capture_refuses() {
    let (tx, _rx) = mpsc::unbounded_channel();

    assert!(!Disabled.is_available());
    assert!(
        Disabled
            .start(sage_voice::voice::CaptureEvents::new(Generation::default(), tx))
            .is_err()
    );
}

#[test]
fn test_disabled_output_completes_utterances() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let generation = Generation::default().next();

    assert!(Disabled.voices().is_empty());

    let handle = Disabled
        .speak(
            Utterance {
                text: "hello".to_string(),
                voice_id: Some("nova".to_string()),
            },
            SpeechEvents::new(generation, tx),
        )
        .unwrap();
    assert!(!handle.is_cancelled());

    match rx.try_recv().unwrap() {
        Event::Speech {
            generation: tagged,
            event,
        } => {
            assert_eq!(tagged, generation);
            assert_eq!(event, SpeechEvent::Finished);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
