//! Two-tone wake confirmation on the default output device

use std::f32::consts::TAU;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;

use super::capture::AudioError;

/// (frequency Hz, duration ms) pairs
const TONES: [(f32, u64); 2] = [(880.0, 120), (1320.0, 120)];

/// Peak amplitude of the generated tones
const AMPLITUDE: f32 = 0.3;

/// A short audible cue, rendered synchronously
pub trait Chime: Send + Sync {
    fn play(&self) -> Result<(), AudioError>;
}

/// Plays `TONES` through cpal
#[derive(Debug, Default)]
pub struct CpalChime;

impl Chime for CpalChime {
    fn play(&self) -> Result<(), AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoOutputDevice)?;

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Backend(e.to_string()))?;
        if supported.sample_format() != SampleFormat::F32 {
            return Err(AudioError::Backend(format!(
                "unsupported output format {:?}",
                supported.sample_format()
            )));
        }

        let config = supported.config();
        let channels = usize::from(config.channels);
        let samples = Arc::new(render_tones(config.sample_rate.0));
        let position = Arc::new(AtomicUsize::new(0));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.fetch_add(1, Ordering::Relaxed);
                            let sample = samples.get(pos).copied().unwrap_or(0.0);
                            frame.fill(sample);
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "chime playback error");
                    },
                    None,
                )
                .map_err(|e| AudioError::Backend(e.to_string()))?
        };

        stream
            .play()
            .map_err(|e| AudioError::Backend(e.to_string()))?;

        let total: u64 = TONES.iter().map(|(_, ms)| ms).sum();
        let deadline = Instant::now() + Duration::from_millis(total + 500);
        while position.load(Ordering::Relaxed) < samples.len() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }

        drop(stream);
        tracing::debug!("chime complete");
        Ok(())
    }
}

/// Render the tone sequence as mono f32 at `sample_rate`
fn render_tones(sample_rate: u32) -> Vec<f32> {
    let rate = sample_rate as f32;
    TONES
        .iter()
        .flat_map(|&(freq, ms)| {
            let len = (sample_rate as u64 * ms / 1000) as usize;
            (0..len).map(move |i| {
                // short linear fade at both ends avoids clicks
                let fade = (i.min(len - i) as f32 / 64.0).min(1.0);
                (TAU * freq * i as f32 / rate).sin() * AMPLITUDE * fade
            })
        })
        .collect()
}
