//! Push-to-talk voice dictation.
//!
//! A global hotkey (Ctrl+Alt+D) toggles microphone recording. When recording
//! stops, the audio is high-pass filtered, encoded as WAV in memory, sent to
//! the Gemini API for transcription, and the returned text is typed into the
//! focused application. A settings window and system tray icon round out the
//! desktop surface.

pub mod audio;
pub mod config;
pub mod cues;
pub mod input;
pub mod session;
pub mod telemetry;
pub mod transcription;
pub mod tray;
pub mod ui;
