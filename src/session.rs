//! Recording session controller.
//!
//! The cpal stream is not `Send`, so a dedicated controller thread owns it
//! for the whole recording. Other threads talk to the controller through a
//! command channel: the hotkey listener sends `Toggle`, the quit path sends
//! `Shutdown`.

use anyhow::Result;
use crossbeam_channel::{Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::audio::capture::Recorder;
use crate::config::ConfigStore;
use crate::cues::{self, Cue};
use crate::transcription::worker;
use crate::ui::{ready_status, truncate_status, UiMessage};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    Toggle,
    Shutdown,
}

/// Live microphone capture owned by the controller thread.
pub trait CaptureHandle {
    fn finish(self: Box<Self>) -> Vec<f32>;
    /// Samples lost to buffer overflow during this capture.
    fn dropped_samples(&self) -> usize;
}

impl CaptureHandle for Recorder {
    fn finish(self: Box<Self>) -> Vec<f32> {
        Recorder::finish(*self)
    }

    fn dropped_samples(&self) -> usize {
        Recorder::dropped_samples(self)
    }
}

/// Where the controller gets its recordings from. The production source
/// opens the default cpal input; tests substitute scripted captures.
pub trait AudioSource: Send {
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>>;
}

/// Default input device via cpal.
pub struct CpalSource;

impl AudioSource for CpalSource {
    fn open(&mut self) -> Result<Box<dyn CaptureHandle>> {
        Ok(Box::new(Recorder::open()?))
    }
}

/// Handle to the controller thread.
pub struct Session {
    commands: Sender<SessionCommand>,
    handle: Option<JoinHandle<()>>,
}

impl Session {
    /// Start the controller thread against the real audio stack.
    pub fn spawn(config: Arc<Mutex<ConfigStore>>, ui: Sender<UiMessage>) -> Result<Self> {
        let (tx, rx) = crossbeam_channel::unbounded();
        let dispatch_config = Arc::clone(&config);
        let dispatch_ui = ui.clone();

        let handle = std::thread::Builder::new()
            .name("session-controller".to_owned())
            .spawn(move || {
                let mut source = CpalSource;
                let mut dispatch = move |samples: Vec<f32>| {
                    // Worker owns the samples; a new recording can start
                    // while this one is still in flight.
                    let _ = worker::spawn(
                        samples,
                        Arc::clone(&dispatch_config),
                        dispatch_ui.clone(),
                    );
                };
                run_controller(&mut source, &rx, &config, &ui, &mut dispatch);
            })?;

        Ok(Self {
            commands: tx,
            handle: Some(handle),
        })
    }

    /// Toggle recording on or off. Safe to call from any thread.
    pub fn toggle(&self) {
        let _ = self.commands.send(SessionCommand::Toggle);
    }

    /// Cheap handle the hotkey listener can call from its own thread.
    pub fn toggle_handle(&self) -> impl Fn() + Send + 'static {
        let commands = self.commands.clone();
        move || {
            let _ = commands.send(SessionCommand::Toggle);
        }
    }

    /// Stop the controller, discarding any active recording. Bounded wait.
    pub fn shutdown(&mut self) {
        let _ = self.commands.send(SessionCommand::Shutdown);
        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + SHUTDOWN_DEADLINE;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("session controller did not stop in time, detaching");
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        if handle.join().is_err() {
            warn!("session controller thread panicked");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Command loop. Extracted from [`Session::spawn`] so tests can drive it with
/// a scripted [`AudioSource`] and capture dispatched buffers.
fn run_controller(
    source: &mut dyn AudioSource,
    commands: &Receiver<SessionCommand>,
    config: &Mutex<ConfigStore>,
    ui: &Sender<UiMessage>,
    dispatch: &mut dyn FnMut(Vec<f32>),
) {
    let mut active: Option<Box<dyn CaptureHandle>> = None;

    while let Ok(command) = commands.recv() {
        match command {
            SessionCommand::Toggle => {
                if let Some(recording) = active.take() {
                    stop_recording(recording, ui, dispatch);
                } else {
                    active = start_recording(source, config, ui);
                }
            }
            SessionCommand::Shutdown => break,
        }
    }

    if active.take().is_some() {
        info!("shutdown while recording, discarding capture");
    }
    let cfg = config.lock().unwrap_or_else(PoisonError::into_inner);
    if let Err(e) = cfg.save() {
        warn!(error = %e, "failed to persist config on shutdown");
    }
    info!("session controller stopped");
}

fn start_recording(
    source: &mut dyn AudioSource,
    config: &Mutex<ConfigStore>,
    ui: &Sender<UiMessage>,
) -> Option<Box<dyn CaptureHandle>> {
    let key_missing = {
        let cfg = config.lock().unwrap_or_else(PoisonError::into_inner);
        cfg.settings.api_key.trim().is_empty()
    };
    if key_missing {
        warn!("recording refused, no API key configured");
        let _ = ui.send(UiMessage::Status(
            "API key required — open Settings".to_owned(),
        ));
        return None;
    }

    match source.open() {
        Ok(recording) => {
            info!("recording started");
            cues::play(Cue::RecordStart);
            let _ = ui.send(UiMessage::Recording(true));
            let _ = ui.send(UiMessage::Status("Recording…".to_owned()));
            Some(recording)
        }
        Err(e) => {
            warn!(error = %e, "could not open input device");
            let _ = ui.send(UiMessage::Status(truncate_status(&format!("Error: {e}"), 120)));
            None
        }
    }
}

fn stop_recording(
    recording: Box<dyn CaptureHandle>,
    ui: &Sender<UiMessage>,
    dispatch: &mut dyn FnMut(Vec<f32>),
) {
    cues::play(Cue::RecordStop);
    let _ = ui.send(UiMessage::Recording(false));

    let dropped = recording.dropped_samples();
    if dropped > 0 {
        warn!(dropped, "capture overflowed, recording is truncated");
        let _ = ui.send(UiMessage::Status(format!(
            "Recording too long, {dropped} samples lost"
        )));
    }

    let samples = recording.finish();
    if samples.is_empty() {
        warn!("recording produced no audio");
        let _ = ui.send(UiMessage::Status("No audio captured".to_owned()));
        let _ = ui.send(UiMessage::Status(ready_status()));
        return;
    }

    info!(samples = samples.len(), "recording finished, dispatching");
    dispatch(samples);
}
