//! System tray icon and menu.
//!
//! The tray is the application's persistent surface: closing the settings
//! window only hides it, and Quit here is the single true exit path. The
//! icon asset is optional; a generated placeholder keeps the tray usable
//! without bundled resources.

use anyhow::{Context, Result};
use tray_icon::menu::{Menu, MenuEvent, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon, TrayIconBuilder};
use tracing::{debug, warn};

const ICON_FILE: &str = "icon-32.png";
const SHOW_SETTINGS_ID: &str = "show-settings";
const QUIT_ID: &str = "quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayCommand {
    ShowSettings,
    Quit,
}

pub struct TrayManager {
    // Dropping the TrayIcon removes it from the tray.
    _tray: TrayIcon,
}

impl TrayManager {
    /// Build the tray icon with its menu. Must run on the GUI thread.
    pub fn new() -> Result<Self> {
        let menu = Menu::new();
        let show = MenuItem::with_id(SHOW_SETTINGS_ID, "Show Settings", true, None);
        let quit = MenuItem::with_id(QUIT_ID, "Quit", true, None);
        menu.append(&show).context("failed to append show item")?;
        menu.append(&PredefinedMenuItem::separator())
            .context("failed to append separator")?;
        menu.append(&quit).context("failed to append quit item")?;

        let tray = TrayIconBuilder::new()
            .with_menu(Box::new(menu))
            .with_tooltip("Dictation Hotkey")
            .with_icon(load_icon())
            .build()
            .context("failed to build tray icon")?;

        Ok(Self { _tray: tray })
    }

    /// Drain pending tray menu events. Call from the GUI update loop.
    pub fn poll_events() -> Option<TrayCommand> {
        if let Ok(event) = MenuEvent::receiver().try_recv() {
            debug!(id = %event.id.0, "tray menu event");
            return parse_menu_id(event.id.0.as_str());
        }
        None
    }
}

fn parse_menu_id(id: &str) -> Option<TrayCommand> {
    match id {
        SHOW_SETTINGS_ID => Some(TrayCommand::ShowSettings),
        QUIT_ID => Some(TrayCommand::Quit),
        _ => None,
    }
}

/// Icon asset next to the executable, or a generated placeholder.
fn load_icon() -> Icon {
    if let Some(icon) = load_icon_asset() {
        return icon;
    }
    warn!("tray icon asset missing, using generated placeholder");
    placeholder_icon()
}

fn load_icon_asset() -> Option<Icon> {
    let exe = std::env::current_exe().ok()?;
    let path = exe.parent()?.join("assets").join(ICON_FILE);
    if !path.exists() {
        return None;
    }
    let image = image::open(&path).ok()?.into_rgba8();
    let (width, height) = image.dimensions();
    Icon::from_rgba(image.into_raw(), width, height).ok()
}

/// 32x32 filled circle on a transparent background.
fn placeholder_icon() -> Icon {
    let (rgba, width, height) = placeholder_rgba();
    #[allow(clippy::unwrap_used)] // dimensions and buffer length are fixed here
    Icon::from_rgba(rgba, width, height).unwrap()
}

fn placeholder_rgba() -> (Vec<u8>, u32, u32) {
    const SIZE: u32 = 32;
    let mut image = image::RgbaImage::new(SIZE, SIZE);
    let center = f64::from(SIZE) / 2.0 - 0.5;
    let radius = f64::from(SIZE) / 2.0 - 2.0;
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        let dx = f64::from(x) - center;
        let dy = f64::from(y) - center;
        *pixel = if dx.hypot(dy) <= radius {
            image::Rgba([0x2e, 0x7d, 0x32, 0xff])
        } else {
            image::Rgba([0, 0, 0, 0])
        };
    }
    (image.into_raw(), SIZE, SIZE)
}
