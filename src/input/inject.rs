//! Typing transcribed text into the focused application.

use enigo::{Enigo, Keyboard, Settings};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("failed to initialize input synthesizer: {0}")]
    Init(String),
    #[error("failed to type text: {0}")]
    Type(String),
}

/// Sink for transcribed text. Mocked in worker tests.
#[cfg_attr(test, mockall::automock)]
pub trait TextInjector: Send {
    fn inject(&mut self, text: &str) -> Result<(), InjectionError>;
}

/// Simulated-keystroke injection via enigo.
pub struct KeystrokeInjector {
    enigo: Enigo,
}

impl KeystrokeInjector {
    pub fn new() -> Result<Self, InjectionError> {
        let enigo =
            Enigo::new(&Settings::default()).map_err(|e| InjectionError::Init(e.to_string()))?;
        Ok(Self { enigo })
    }
}

impl TextInjector for KeystrokeInjector {
    fn inject(&mut self, text: &str) -> Result<(), InjectionError> {
        info!(chars = text.chars().count(), "typing transcribed text");
        self.enigo
            .text(text)
            .map_err(|e| InjectionError::Type(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_injector_receives_text() {
        let mut mock = MockTextInjector::new();
        mock.expect_inject()
            .withf(|text| text == "hello world ")
            .times(1)
            .returning(|_| Ok(()));

        mock.inject("hello world ").unwrap();
    }

    #[test]
    #[ignore = "requires a display server and input permissions"]
    fn test_keystroke_injector_initializes() {
        let _injector = KeystrokeInjector::new().unwrap();
    }
}
