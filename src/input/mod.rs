pub mod hotkey;
pub mod inject;
