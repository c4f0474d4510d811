//! Settings window.
//!
//! The window is the only egui surface. Closing it hides the app to the
//! tray; the tray's Quit entry is the one true exit, which tears the
//! background threads down in order before letting the viewport close.

use crossbeam_channel::Receiver;
use eframe::egui;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{info, warn};

use crate::config::{ConfigStore, Settings, AVAILABLE_MODELS, DEFAULT_PROMPT};
use crate::input::hotkey::HotkeyListener;
use crate::session::Session;
use crate::tray::{TrayCommand, TrayManager};
use crate::ui::{ready_status, UiMessage};

/// Explicit visibility lifecycle. `Terminated` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowState {
    Visible,
    Hidden,
    Terminated,
}

impl WindowState {
    /// User clicked the window close button.
    #[must_use]
    pub fn on_close_request(self) -> Self {
        match self {
            Self::Visible | Self::Hidden => Self::Hidden,
            Self::Terminated => Self::Terminated,
        }
    }

    /// Tray "Show Settings" selected.
    #[must_use]
    pub fn on_show(self) -> Self {
        match self {
            Self::Visible | Self::Hidden => Self::Visible,
            Self::Terminated => Self::Terminated,
        }
    }

    /// Tray "Quit" selected.
    #[must_use]
    pub fn on_quit(self) -> Self {
        Self::Terminated
    }
}

/// Display-side state fed exclusively by [`UiMessage`]s.
struct StatusModel {
    status: String,
    recording: bool,
    daily_calls: u64,
    total_calls: u64,
}

impl StatusModel {
    fn apply(&mut self, message: UiMessage) {
        match message {
            UiMessage::Status(status) => self.status = status,
            UiMessage::Recording(recording) => self.recording = recording,
            UiMessage::StatsChanged {
                daily_calls,
                total_calls,
            } => {
                self.daily_calls = daily_calls;
                self.total_calls = total_calls;
            }
        }
    }
}

pub struct SettingsApp {
    config: Arc<Mutex<ConfigStore>>,
    messages: Receiver<UiMessage>,
    session: Session,
    hotkeys: HotkeyListener,
    // None when tray creation failed; the close button then quits outright.
    tray: Option<TrayManager>,
    window: WindowState,
    model: StatusModel,
    draft: Settings,
}

impl SettingsApp {
    pub fn new(
        config: Arc<Mutex<ConfigStore>>,
        messages: Receiver<UiMessage>,
        session: Session,
        hotkeys: HotkeyListener,
    ) -> Self {
        let (draft, daily_calls, total_calls) = {
            let cfg = config.lock().unwrap_or_else(PoisonError::into_inner);
            (
                cfg.settings.clone(),
                cfg.api_stats.daily_calls,
                cfg.api_stats.total_calls,
            )
        };

        let tray = match TrayManager::new() {
            Ok(tray) => Some(tray),
            Err(e) => {
                warn!(error = %e, "tray unavailable, window close will quit");
                None
            }
        };

        let status = if draft.api_key.trim().is_empty() {
            "API key required — open Settings".to_owned()
        } else {
            ready_status()
        };

        Self {
            config,
            messages,
            session,
            hotkeys,
            tray,
            window: WindowState::Visible,
            model: StatusModel {
                status,
                recording: false,
                daily_calls,
                total_calls,
            },
            draft,
        }
    }

    fn save_settings(&mut self) {
        let mut cfg = self.config.lock().unwrap_or_else(PoisonError::into_inner);
        cfg.settings = self.draft.clone();
        match cfg.save() {
            Ok(()) => {
                info!("settings saved");
                self.model.status = if cfg.settings.api_key.trim().is_empty() {
                    "API key required — open Settings".to_owned()
                } else {
                    "Settings saved".to_owned()
                };
            }
            Err(e) => {
                warn!(error = %e, "failed to save settings");
                self.model.status = format!("Error: {e}");
            }
        }
    }

    fn quit(&mut self, ctx: &egui::Context) {
        info!("quit requested, shutting down");
        self.window = self.window.on_quit();
        self.hotkeys.shutdown();
        self.session.shutdown();
        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
    }

    fn handle_tray(&mut self, ctx: &egui::Context) {
        while let Some(command) = TrayManager::poll_events() {
            match command {
                TrayCommand::ShowSettings => {
                    self.window = self.window.on_show();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Visible(true));
                    ctx.send_viewport_cmd(egui::ViewportCommand::Focus);
                }
                TrayCommand::Quit => self.quit(ctx),
            }
        }
    }

    fn handle_close_request(&mut self, ctx: &egui::Context) {
        if !ctx.input(|i| i.viewport().close_requested()) {
            return;
        }
        if self.window == WindowState::Terminated {
            return; // let the close proceed
        }
        if self.tray.is_some() {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            ctx.send_viewport_cmd(egui::ViewportCommand::Visible(false));
            self.window = self.window.on_close_request();
            info!("window hidden to tray");
        } else {
            ctx.send_viewport_cmd(egui::ViewportCommand::CancelClose);
            self.quit(ctx);
        }
    }
}

impl eframe::App for SettingsApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_tray(ctx);
        for message in self.messages.try_iter().collect::<Vec<_>>() {
            self.model.apply(message);
        }
        self.handle_close_request(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label("Status:");
                if self.model.recording {
                    ui.colored_label(egui::Color32::RED, "● Recording");
                } else {
                    ui.label(&self.model.status);
                }
            });
            ui.separator();

            ui.horizontal(|ui| {
                ui.label("API key:");
                ui.add(
                    egui::TextEdit::singleline(&mut self.draft.api_key)
                        .password(true)
                        .desired_width(280.0),
                );
            });

            egui::ComboBox::from_label("Model")
                .selected_text(self.draft.model.clone())
                .show_ui(ui, |ui| {
                    for &model in AVAILABLE_MODELS {
                        ui.selectable_value(&mut self.draft.model, model.to_owned(), model);
                    }
                });

            ui.label("Prompt:");
            ui.add(
                egui::TextEdit::multiline(&mut self.draft.prompt)
                    .desired_rows(8)
                    .desired_width(f32::INFINITY),
            );

            ui.horizontal(|ui| {
                if ui.button("Save").clicked() {
                    self.save_settings();
                }
                if ui.button("Restore Default Prompt").clicked() {
                    self.draft.prompt = DEFAULT_PROMPT.to_owned();
                }
            });

            ui.separator();
            ui.label(format!(
                "API calls today: {}   total: {}",
                self.model.daily_calls, self.model.total_calls
            ));
        });

        // Keep polling tray and message queues while hidden.
        ctx.request_repaint_after(Duration::from_millis(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_state_close_hides() {
        assert_eq!(WindowState::Visible.on_close_request(), WindowState::Hidden);
        assert_eq!(WindowState::Hidden.on_close_request(), WindowState::Hidden);
    }

    #[test]
    fn test_window_state_show_restores() {
        assert_eq!(WindowState::Hidden.on_show(), WindowState::Visible);
        assert_eq!(WindowState::Visible.on_show(), WindowState::Visible);
    }

    #[test]
    fn test_window_state_terminated_is_final() {
        assert_eq!(WindowState::Terminated.on_show(), WindowState::Terminated);
        assert_eq!(
            WindowState::Terminated.on_close_request(),
            WindowState::Terminated
        );
        assert_eq!(WindowState::Visible.on_quit(), WindowState::Terminated);
        assert_eq!(WindowState::Hidden.on_quit(), WindowState::Terminated);
    }

    #[test]
    fn test_status_model_applies_messages() {
        let mut model = StatusModel {
            status: String::new(),
            recording: false,
            daily_calls: 0,
            total_calls: 0,
        };

        model.apply(UiMessage::Status("Recording…".to_owned()));
        assert_eq!(model.status, "Recording…");

        model.apply(UiMessage::Recording(true));
        assert!(model.recording);

        model.apply(UiMessage::StatsChanged {
            daily_calls: 3,
            total_calls: 17,
        });
        assert_eq!(model.daily_calls, 3);
        assert_eq!(model.total_calls, 17);

        model.apply(UiMessage::Recording(false));
        assert!(!model.recording);
    }
}
