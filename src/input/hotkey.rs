//! Global push-to-talk hotkey.
//!
//! The binding is fixed at Ctrl+Alt+D. A dedicated listener thread polls the
//! global-hotkey event channel and invokes the toggle callback on each press;
//! key releases are ignored (toggle semantics, not hold-to-talk).

use anyhow::{Context, Result};
use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Human-readable name of the fixed binding, shown in status messages.
pub const HOTKEY_LABEL: &str = "Ctrl+Alt+D";

const POLL_INTERVAL: Duration = Duration::from_millis(10);
const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(2);

fn binding() -> HotKey {
    HotKey::new(Some(Modifiers::CONTROL | Modifiers::ALT), Code::KeyD)
}

/// Owns the listener thread and its cooperative stop flag.
pub struct HotkeyListener {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl HotkeyListener {
    /// Register the hotkey and start the listener thread.
    ///
    /// `on_toggle` runs on the listener thread for every press. Registration
    /// happens inside the thread; failure is reported back before this
    /// function returns.
    pub fn spawn<F>(on_toggle: F) -> Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<Result<()>>(1);

        let handle = std::thread::Builder::new()
            .name("hotkey-listener".to_owned())
            .spawn(move || {
                // The manager must live on the thread that services events.
                let manager = match GlobalHotKeyManager::new()
                    .context("failed to create hotkey manager")
                {
                    Ok(m) => m,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let hotkey = binding();
                if let Err(e) = manager.register(hotkey).context("failed to register hotkey") {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
                let _ = ready_tx.send(Ok(()));
                info!(hotkey = HOTKEY_LABEL, "global hotkey registered");

                let receiver = GlobalHotKeyEvent::receiver();
                while !stop_flag.load(Ordering::Relaxed) {
                    match receiver.try_recv() {
                        Ok(event) => {
                            if event.id == hotkey.id() && event.state == HotKeyState::Pressed {
                                debug!("hotkey pressed");
                                on_toggle();
                            }
                        }
                        Err(_) => std::thread::sleep(POLL_INTERVAL),
                    }
                }

                if let Err(e) = manager.unregister(hotkey) {
                    warn!(error = %e, "failed to unregister hotkey");
                }
                info!("hotkey listener stopped");
            })
            .context("failed to spawn hotkey listener thread")?;

        ready_rx
            .recv()
            .context("hotkey listener thread exited before reporting readiness")??;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Signal the listener to stop and wait for it, bounded by a deadline.
    pub fn shutdown(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        let Some(handle) = self.handle.take() else {
            return;
        };

        let deadline = Instant::now() + SHUTDOWN_DEADLINE;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("hotkey listener did not stop in time, detaching");
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
        if handle.join().is_err() {
            warn!("hotkey listener thread panicked");
        }
    }
}

impl Drop for HotkeyListener {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_is_ctrl_alt_d() {
        let hotkey = binding();
        // Two distinct constructions of the same chord share an id.
        let same = HotKey::new(Some(Modifiers::CONTROL | Modifiers::ALT), Code::KeyD);
        assert_eq!(hotkey.id(), same.id());

        let other = HotKey::new(Some(Modifiers::CONTROL), Code::KeyD);
        assert_ne!(hotkey.id(), other.id());
    }

    #[test]
    #[ignore = "requires a display server to register global hotkeys"]
    fn test_spawn_and_shutdown() {
        let mut listener = HotkeyListener::spawn(|| {}).unwrap();
        listener.shutdown();
        // Second shutdown is a no-op.
        listener.shutdown();
    }
}
