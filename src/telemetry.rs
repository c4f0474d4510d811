use tracing_subscriber::EnvFilter;

/// Initialize logging for the process.
///
/// Honors `RUST_LOG` when set; defaults to `info` for this crate otherwise.
/// Calling this more than once is a no-op (the global subscriber can only be
/// installed once per process).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dictation_hotkey=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init();
        init();
    }
}
