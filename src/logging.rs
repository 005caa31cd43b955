//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; hosts that do not install their
//! own subscriber can call [`init`] once at startup.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set and the caller gives none
pub const DEFAULT_LOG_FILTER: &str = "player_save=info";

/// Install a formatting subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`, which falls back to
/// [`DEFAULT_LOG_FILTER`]. Returns `false` if a global subscriber was already
/// installed, which makes repeated calls safe.
pub fn init(default_filter: Option<&str>) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_filter))
        .try_init()
        .is_ok()
}

/// Install a subscriber that writes through the test harness's capture
pub fn init_for_tests() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(None))
        .with_test_writer()
        .try_init();
}

fn env_filter(default_filter: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.unwrap_or(DEFAULT_LOG_FILTER)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_safe_to_repeat() {
        init_for_tests();
        assert!(!init(None));
        assert!(!init(Some("player_save=debug")));
    }
}
