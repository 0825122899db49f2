//! Tracing setup
//!
//! The library only emits `tracing` events; binaries and tests decide where
//! they go. These helpers install a `tracing-subscriber` fmt layer filtered by
//! `RUST_LOG`, falling back to the given level.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global fmt subscriber; `RUST_LOG` overrides `default_level`
///
/// Returns `false` if a global subscriber was already set.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .is_ok()
}

/// Install a subscriber that writes through the test harness' capture
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("storelink=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
        assert!(!init_tracing("info"));
    }
}
