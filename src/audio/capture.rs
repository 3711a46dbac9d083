//! Microphone capture streams
//!
//! A capture stream owns the physical input device while it exists and
//! invokes a callback with every completed frame from the audio
//! subsystem's real-time thread. Device errors are logged there and never
//! raised.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use tracing::{debug, warn};

use super::frame::{f32_to_i16, Frame, FrameAssembler};

/// Callback receiving each completed frame on the capture thread
pub type FrameSink = Box<dyn FnMut(Frame) + Send + 'static>;

/// Errors that can occur while opening or running a capture stream
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no input device available")]
    NoInputDevice,

    #[error("no output device available")]
    NoOutputDevice,

    #[error("input device is held by another capture stream")]
    Busy,

    #[error("no supported input config at {0}Hz")]
    UnsupportedConfig(u32),

    #[error("capture stream is already started")]
    AlreadyStarted,

    #[error("audio backend error: {0}")]
    Backend(String),
}

/// A started-or-stopped stream bound to one physical input device
///
/// Dropping the stream stops it and releases the device.
pub trait CaptureStream {
    /// Begin delivering frames to `on_frame` until `stop()`
    fn start(&mut self, on_frame: FrameSink) -> Result<(), AudioError>;

    /// Stop delivery. Idempotent, safe before `start()`.
    /// No frame is delivered after this returns.
    fn stop(&mut self);
}

/// Factory for capture streams on one physical device
pub trait InputDevice: Send + Sync {
    /// Open a stream producing frames of `frame_len` samples
    ///
    /// Fails with `AudioError::Busy` while another stream from this device
    /// is still alive.
    fn open(&self, frame_len: usize) -> Result<Box<dyn CaptureStream>, AudioError>;
}

/// Exclusive claim on a physical device, released on drop
pub struct DeviceLease {
    held: Arc<AtomicBool>,
}

impl DeviceLease {
    pub fn acquire(held: &Arc<AtomicBool>) -> Result<Self, AudioError> {
        if held.swap(true, Ordering::SeqCst) {
            return Err(AudioError::Busy);
        }
        Ok(Self {
            held: Arc::clone(held),
        })
    }
}

impl Drop for DeviceLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

/// The host's default input device via cpal
pub struct CpalInput {
    sample_rate: u32,
    held: Arc<AtomicBool>,
}

impl CpalInput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            held: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl InputDevice for CpalInput {
    fn open(&self, frame_len: usize) -> Result<Box<dyn CaptureStream>, AudioError> {
        let lease = DeviceLease::acquire(&self.held)?;

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or(AudioError::NoInputDevice)?;

        let rate = SampleRate(self.sample_rate);
        let supported = device
            .supported_input_configs()
            .map_err(|e| AudioError::Backend(e.to_string()))?
            .filter(|c| {
                matches!(c.sample_format(), SampleFormat::I16 | SampleFormat::F32)
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
            })
            .min_by_key(|c| c.channels())
            .ok_or(AudioError::UnsupportedConfig(self.sample_rate))?
            .with_sample_rate(rate);

        let format = supported.sample_format();
        let config = supported.config();

        debug!(
            device = device.name().unwrap_or_default(),
            sample_rate = self.sample_rate,
            channels = config.channels,
            ?format,
            frame_len,
            "capture stream opened"
        );

        Ok(Box::new(CpalCaptureStream {
            device,
            config,
            format,
            frame_len,
            stream: None,
            _lease: lease,
        }))
    }
}

struct CpalCaptureStream {
    device: Device,
    config: StreamConfig,
    format: SampleFormat,
    frame_len: usize,
    stream: Option<Stream>,
    _lease: DeviceLease,
}

impl CaptureStream for CpalCaptureStream {
    fn start(&mut self, mut on_frame: FrameSink) -> Result<(), AudioError> {
        if self.stream.is_some() {
            return Err(AudioError::AlreadyStarted);
        }

        let mut assembler = FrameAssembler::new(self.frame_len, usize::from(self.config.channels));
        let on_error = |err: cpal::StreamError| {
            warn!(error = %err, "capture device error, frame dropped");
        };

        let stream = match self.format {
            SampleFormat::I16 => self.device.build_input_stream(
                &self.config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, |s| s, |frame| on_frame(frame));
                },
                on_error,
                None,
            ),
            _ => self.device.build_input_stream(
                &self.config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    assembler.push(data, f32_to_i16, |frame| on_frame(frame));
                },
                on_error,
                None,
            ),
        }
        .map_err(|e| AudioError::Backend(e.to_string()))?;

        stream
            .play()
            .map_err(|e| AudioError::Backend(e.to_string()))?;
        self.stream = Some(stream);

        debug!("capture stream started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            drop(stream);
            debug!("capture stream stopped");
        }
    }
}

impl Drop for CpalCaptureStream {
    fn drop(&mut self) {
        self.stop();
    }
}
