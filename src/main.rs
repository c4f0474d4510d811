use anyhow::{anyhow, Result};
use eframe::egui;
use std::sync::{Arc, Mutex};
use tracing::info;

use dictation_hotkey::config::ConfigStore;
use dictation_hotkey::input::hotkey::HotkeyListener;
use dictation_hotkey::session::Session;
use dictation_hotkey::telemetry;
use dictation_hotkey::ui::app::SettingsApp;

fn main() -> Result<()> {
    telemetry::init();

    let config = ConfigStore::load_or_create()?;
    info!(path = %config.path().display(), "config loaded");
    let config = Arc::new(Mutex::new(config));

    let (ui_tx, ui_rx) = crossbeam_channel::unbounded();

    let session = Session::spawn(Arc::clone(&config), ui_tx)?;
    let toggle = session.toggle_handle();
    let hotkeys = HotkeyListener::spawn(toggle)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Dictation Hotkey")
            .with_inner_size([480.0, 440.0]),
        ..Default::default()
    };

    eframe::run_native(
        "dictation-hotkey",
        options,
        Box::new(move |_cc| {
            Ok(Box::new(SettingsApp::new(config, ui_rx, session, hotkeys)))
        }),
    )
    .map_err(|e| anyhow!("GUI event loop failed: {e}"))?;

    info!("exited cleanly");
    Ok(())
}
