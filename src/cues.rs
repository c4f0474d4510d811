//! Audible start/stop cues.
//!
//! Cues are fire-and-forget: playback runs on a short-lived thread and any
//! failure is logged, never surfaced to the recording path. When a bundled
//! WAV asset is present next to the executable it is used; otherwise a short
//! synthesized tone stands in.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::f32::consts::TAU;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum CueError {
    #[error("no audio output device available")]
    NoOutputDevice,
    #[error("failed to query output config: {0}")]
    OutputConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// Which cue to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cue {
    RecordStart,
    RecordStop,
}

impl Cue {
    fn asset_name(self) -> &'static str {
        match self {
            Self::RecordStart => "record_start.wav",
            Self::RecordStop => "record_stop.wav",
        }
    }

    /// Tone used when no asset file is found. Start is the higher pitch.
    fn tone_hz(self) -> f32 {
        match self {
            Self::RecordStart => 880.0,
            Self::RecordStop => 440.0,
        }
    }
}

/// Play a cue without blocking the caller. Errors are logged and swallowed.
pub fn play(cue: Cue) {
    std::thread::spawn(move || {
        let (samples, rate) = load_cue_samples(cue);
        if let Err(e) = play_samples(&samples, rate) {
            warn!(cue = ?cue, error = %e, "cue playback failed");
        }
    });
}

/// Samples for a cue: the asset file when readable, a synthesized tone
/// otherwise.
fn load_cue_samples(cue: Cue) -> (Vec<f32>, u32) {
    if let Some(path) = asset_path(cue) {
        match hound::WavReader::open(&path) {
            Ok(mut reader) => {
                let spec = reader.spec();
                let samples: Vec<f32> = match spec.sample_format {
                    hound::SampleFormat::Float => {
                        reader.samples::<f32>().filter_map(Result::ok).collect()
                    }
                    hound::SampleFormat::Int => reader
                        .samples::<i16>()
                        .filter_map(Result::ok)
                        .map(|s| f32::from(s) / f32::from(i16::MAX))
                        .collect(),
                };
                let mono = crate::audio::capture::downmix_to_mono(&samples, spec.channels);
                debug!(path = %path.display(), samples = mono.len(), "loaded cue asset");
                return (mono, spec.sample_rate);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cue asset unreadable, using tone");
            }
        }
    }
    (synth_tone(cue.tone_hz(), 0.12, 44_100), 44_100)
}

fn asset_path(cue: Cue) -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    let path = exe.parent()?.join("assets").join(cue.asset_name());
    path.exists().then_some(path)
}

/// Sine tone with a short linear fade at both ends to avoid clicks.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_sign_loss, clippy::cast_possible_truncation)]
fn synth_tone(freq: f32, secs: f32, rate: u32) -> Vec<f32> {
    let len = (secs * rate as f32) as usize;
    let fade = (len / 20).max(1);
    (0..len)
        .map(|i| {
            let envelope = if i < fade {
                i as f32 / fade as f32
            } else if i >= len - fade {
                (len - i) as f32 / fade as f32
            } else {
                1.0
            };
            (TAU * freq * i as f32 / rate as f32).sin() * 0.25 * envelope
        })
        .collect()
}

/// Blocking playback of mono samples on the default output device.
fn play_samples(samples: &[f32], source_rate: u32) -> Result<(), CueError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(CueError::NoOutputDevice)?;
    let config = device.default_output_config()?;

    let out_rate = config.sample_rate().0;
    let out_channels = config.channels() as usize;
    let resampled = crate::audio::capture::resample_linear(samples, source_rate, out_rate);

    let duration_ms = resampled.len() as u64 * 1000 / u64::from(out_rate.max(1));
    let mut position = 0usize;
    let stream = device.build_output_stream(
        &config.into(),
        move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(out_channels) {
                let value = resampled.get(position).copied().unwrap_or(0.0);
                position += 1;
                for slot in frame {
                    *slot = value;
                }
            }
        },
        |err| warn!(error = %err, "output stream error"),
        None,
    )?;
    stream.play()?;

    // Small margin so the tail is not cut off by the stream drop.
    std::thread::sleep(Duration::from_millis(duration_ms + 60));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_is_bounded_and_nonempty() {
        let tone = synth_tone(880.0, 0.12, 44_100);
        assert!(!tone.is_empty());
        assert!(tone.iter().all(|s| s.abs() <= 0.25 + f32::EPSILON));
    }

    #[test]
    fn test_tone_fades_in_and_out() {
        let tone = synth_tone(440.0, 0.1, 44_100);
        assert_eq!(tone[0], 0.0);
        assert!(tone[tone.len() - 1].abs() < 0.05);
    }

    #[test]
    fn test_cue_pitches_differ() {
        assert!(Cue::RecordStart.tone_hz() > Cue::RecordStop.tone_hz());
    }

    #[test]
    fn test_fallback_samples_when_asset_missing() {
        // No assets directory exists under the test binary, so this must
        // take the synthesized path.
        let (samples, rate) = load_cue_samples(Cue::RecordStop);
        assert!(!samples.is_empty());
        assert_eq!(rate, 44_100);
    }

    #[test]
    #[ignore = "requires audio hardware"]
    fn test_play_samples_on_default_output() {
        let tone = synth_tone(440.0, 0.05, 44_100);
        play_samples(&tone, 44_100).unwrap();
    }
}
