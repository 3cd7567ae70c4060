//! Cancellable audio playback to speakers

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};
use tokio_util::sync::CancellationToken;

use crate::{Error, Result};

/// Sample rate assumed when a clip carries none (matches common TTS output)
const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// How often the playing thread checks for completion or cancellation
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Decoded mono audio
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Clip {
    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the clip has no audio
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample rate in Hz
    #[must_use]
    pub const fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Plays clips on the default output device
///
/// Playback blocks the calling thread; run it on a blocking task.
pub struct Speaker;

impl Speaker {
    /// Whether the host has an output device
    #[must_use]
    pub fn probe() -> bool {
        cpal::default_host().default_output_device().is_some()
    }

    /// Play a clip until it ends or `cancel` fires
    ///
    /// Returns `true` if the clip played to the end.
    ///
    /// # Errors
    ///
    /// Returns error if the output stream cannot be opened
    pub fn play(clip: &Clip, cancel: &CancellationToken) -> Result<bool> {
        if clip.is_empty() {
            return Ok(true);
        }

        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        let config = output_config(&device, clip.sample_rate)?;
        let channels = usize::from(config.channels);

        let samples = Arc::new(clip.samples.clone());
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = if let Some(&s) = samples.get(pos) {
                                position.store(pos + 1, Ordering::Relaxed);
                                s
                            } else {
                                finished.store(true, Ordering::Release);
                                0.0
                            };

                            for out in frame.iter_mut() {
                                *out = sample;
                            }
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        let duration_ms = (samples.len() as u64 * 1000) / u64::from(clip.sample_rate);
        let deadline = Instant::now() + Duration::from_millis(duration_ms + 500);

        let completed = loop {
            if cancel.is_cancelled() {
                break false;
            }
            if finished.load(Ordering::Acquire) || Instant::now() > deadline {
                break true;
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        drop(stream);
        tracing::debug!(samples = samples.len(), completed, "playback done");

        Ok(completed)
    }
}

fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |c: &cpal::SupportedStreamConfigRange, channels: u16| {
        c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
    };

    let mono = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| supports(c, 1));

    let supported = match mono {
        Some(c) => c,
        None => device
            .supported_output_configs()
            .map_err(|e| Error::Audio(e.to_string()))?
            .find(|c| supports(c, 2))
            .ok_or_else(|| Error::Audio("no suitable output config found".to_string()))?,
    };

    Ok(supported.with_sample_rate(rate).config())
}

/// Decode MP3 bytes to a mono clip
///
/// # Errors
///
/// Returns error if the data is not valid MP3
pub fn decode_mp3(mp3_data: &[u8]) -> Result<Clip> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let rate = u32::try_from(frame.sample_rate).unwrap_or(DEFAULT_SAMPLE_RATE);
                sample_rate.get_or_insert(rate);

                if frame.channels == 2 {
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    Ok(Clip {
        samples,
        sample_rate: sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
    })
}
