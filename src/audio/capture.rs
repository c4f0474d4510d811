//! Microphone capture via cpal.
//!
//! A [`Recorder`] is opened when the user toggles recording on and consumed
//! when they toggle it off. The cpal callback pushes raw device-rate frames
//! into a lock-free ring buffer; conversion to 16 kHz mono happens once, on
//! the controller thread, after the stream is torn down.

use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use ringbuf::{
    traits::{Consumer, Producer, Split},
    HeapCons, HeapRb,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::wav::SAMPLE_RATE;

/// Longest recording the ring buffer can hold before dropping frames.
const MAX_RECORDING_SECS: usize = 60;

/// An open microphone stream accumulating samples.
pub struct Recorder {
    // Held only to keep the stream alive; dropped on finish().
    _stream: cpal::Stream,
    consumer: HeapCons<f32>,
    capturing: Arc<AtomicBool>,
    dropped: Arc<AtomicUsize>,
    device_rate: u32,
    device_channels: u16,
}

impl Recorder {
    /// Open the default input device and start capturing immediately.
    ///
    /// # Errors
    /// Returns an error when no input device exists or the stream cannot be
    /// built or started; the caller rolls the toggle back in that case.
    pub fn open() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .context("no audio input device available")?;
        let device_name = device.name().unwrap_or_else(|_| "unknown".to_owned());

        let supported = device
            .default_input_config()
            .context("failed to query input device config")?;
        let device_rate = supported.sample_rate().0;
        let device_channels = supported.channels();

        info!(
            device = %device_name,
            rate = device_rate,
            channels = device_channels,
            "opening input stream"
        );

        let capacity = device_rate as usize * device_channels as usize * MAX_RECORDING_SECS;
        let (mut producer, consumer) = HeapRb::<f32>::new(capacity).split();

        let capturing = Arc::new(AtomicBool::new(true));
        let gate = Arc::clone(&capturing);
        let dropped = Arc::new(AtomicUsize::new(0));
        let drop_counter = Arc::clone(&dropped);

        let stream = device
            .build_input_stream(
                &supported.into(),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if gate.load(Ordering::Relaxed) {
                        let pushed = producer.push_slice(data);
                        if pushed < data.len() {
                            drop_counter.fetch_add(data.len() - pushed, Ordering::Relaxed);
                            warn!(dropped = data.len() - pushed, "ring buffer full");
                        }
                    }
                },
                |err| warn!(error = %err, "input stream error"),
                None,
            )
            .context("failed to build input stream")?;

        stream.play().context("failed to start input stream")?;

        Ok(Self {
            _stream: stream,
            consumer,
            capturing,
            dropped,
            device_rate,
            device_channels,
        })
    }

    /// Raw device samples lost to ring-buffer overflow so far.
    #[must_use]
    pub fn dropped_samples(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop capturing and return everything recorded, as 16 kHz mono f32.
    pub fn finish(mut self) -> Vec<f32> {
        self.capturing.store(false, Ordering::Relaxed);

        let mut raw = Vec::new();
        while let Some(sample) = self.consumer.try_pop() {
            raw.push(sample);
        }
        debug!(raw_samples = raw.len(), "ring buffer drained");

        let mono = downmix_to_mono(&raw, self.device_channels);
        let samples = resample_linear(&mono, self.device_rate, SAMPLE_RATE);
        info!(
            samples = samples.len(),
            device_rate = self.device_rate,
            "capture finished"
        );
        samples
    }
}

/// Average interleaved frames down to a single channel.
#[must_use]
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let divisor = f64::from(channels);
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: f64 = frame.iter().map(|&s| f64::from(s)).sum();
            #[allow(clippy::cast_possible_truncation)]
            {
                (sum / divisor) as f32
            }
        })
        .collect()
}

/// Linear-interpolation resampling between arbitrary rates.
///
/// Good enough for speech headed to a transcription model; the 100 Hz
/// high-pass and the model itself are far less precise than the
/// interpolation error.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = f64::from(from_rate) / f64::from(to_rate);
    let output_len = ((samples.len() as f64) / ratio).ceil() as usize;

    let mut out = Vec::with_capacity(output_len);
    let last = samples.len() - 1;
    for i in 0..output_len {
        let pos = (i as f64) * ratio;
        let idx = (pos.floor() as usize).min(last);
        let next = (idx + 1).min(last);
        let fract = pos - pos.floor();

        let s1 = f64::from(samples[idx]);
        let s2 = f64::from(samples[next]);
        out.push(s1.mul_add(1.0 - fract, s2 * fract) as f32);
    }
    out
}
