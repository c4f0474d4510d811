//! Per-utterance transcription pipeline.
//!
//! Each finished recording gets its own one-shot worker thread that owns the
//! captured samples outright. A new recording can start while a worker is
//! still in flight; there is no shared buffer between them.

use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use tracing::{error, info, warn};

use crate::audio::{filter, wav};
use crate::config::ConfigStore;
use crate::input::inject::{KeystrokeInjector, TextInjector};
use crate::transcription::gemini::{GeminiClient, Transcript, TranscriptionBackend};
use crate::ui::{ready_status, truncate_status, UiMessage};

/// Longest error text shown in the status line.
const STATUS_ERROR_CHARS: usize = 120;

/// Spawn a worker for one utterance. The thread builds its own API client
/// and injector from the settings current at spawn time.
pub fn spawn(
    samples: Vec<f32>,
    config: Arc<Mutex<ConfigStore>>,
    ui: Sender<UiMessage>,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        let (api_key, model, prompt) = {
            let cfg = config.lock().unwrap_or_else(PoisonError::into_inner);
            (
                cfg.settings.api_key.clone(),
                cfg.settings.model.clone(),
                cfg.settings.prompt.clone(),
            )
        };

        let backend = match GeminiClient::new(&api_key, &model) {
            Ok(client) => client,
            Err(e) => {
                warn!(error = %e, "cannot create transcription client");
                let _ = ui.send(UiMessage::Status(truncate_status(
                    &format!("Error: {e}"),
                    STATUS_ERROR_CHARS,
                )));
                return;
            }
        };

        let mut injector = match KeystrokeInjector::new() {
            Ok(injector) => injector,
            Err(e) => {
                error!(error = %e, "cannot create keystroke injector");
                let _ = ui.send(UiMessage::Status(truncate_status(
                    &format!("Error: {e}"),
                    STATUS_ERROR_CHARS,
                )));
                return;
            }
        };

        process(samples, &model, &prompt, &backend, &mut injector, &config, &ui);
    })
}

/// The pipeline proper, split out so tests can drive it with mocks.
fn process(
    samples: Vec<f32>,
    model: &str,
    prompt: &str,
    backend: &dyn TranscriptionBackend,
    injector: &mut dyn TextInjector,
    config: &Mutex<ConfigStore>,
    ui: &Sender<UiMessage>,
) {
    let _ = ui.send(UiMessage::Status("Processing audio…".to_owned()));

    let filtered = filter::maybe_high_pass(samples, wav::SAMPLE_RATE);

    let wav_bytes = match wav::encode_wav(&filtered, wav::SAMPLE_RATE) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "WAV encoding failed");
            let _ = ui.send(UiMessage::Status(truncate_status(
                &format!("Error: {e}"),
                STATUS_ERROR_CHARS,
            )));
            let _ = ui.send(UiMessage::Status(ready_status()));
            return;
        }
    };

    let _ = ui.send(UiMessage::Status(format!("Transcribing with {model}…")));

    let transcript = match backend.transcribe(&wav_bytes, prompt) {
        Ok(transcript) => transcript,
        Err(e) => {
            warn!(error = %e, "transcription request failed");
            let _ = ui.send(UiMessage::Status(truncate_status(
                &format!("Error: {e}"),
                STATUS_ERROR_CHARS,
            )));
            let _ = ui.send(UiMessage::Status(ready_status()));
            return;
        }
    };

    // The API exchange succeeded, so it counts against quota either way.
    record_call(config, ui);

    match transcript {
        Transcript::Empty { reason } => {
            info!(reason = ?reason, "no text transcribed");
            let status = match reason {
                Some(reason) => format!("No text transcribed ({reason})"),
                None => "No text transcribed".to_owned(),
            };
            let _ = ui.send(UiMessage::Status(status));
            let _ = ui.send(UiMessage::Status(ready_status()));
        }
        Transcript::Text(text) => {
            let _ = ui.send(UiMessage::Status("Transcribed, typing…".to_owned()));
            // Trailing space so consecutive dictations don't run together.
            let to_type = format!("{text} ");
            if let Err(e) = injector.inject(&to_type) {
                error!(error = %e, "text injection failed");
                let _ = ui.send(UiMessage::Status(truncate_status(
                    &format!("Error: {e}"),
                    STATUS_ERROR_CHARS,
                )));
            }
            let _ = ui.send(UiMessage::Status(ready_status()));
        }
    }
}

fn record_call(config: &Mutex<ConfigStore>, ui: &Sender<UiMessage>) {
    let mut cfg = config.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = cfg.record_call() {
        warn!(error = %e, "failed to persist usage counters");
    }
    let _ = ui.send(UiMessage::StatsChanged {
        daily_calls: cfg.api_stats.daily_calls,
        total_calls: cfg.api_stats.total_calls,
    });
}
