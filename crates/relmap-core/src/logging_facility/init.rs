//! Logging initialization

use std::sync::Once;
use tracing_subscriber::{util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset
const DEFAULT_DEBUG_FILTER: &str = "relmap_core=debug,relmap_store=debug,relmap_engine=debug";
const DEFAULT_INFO_FILTER: &str = "relmap_core=info,relmap_store=info,relmap_engine=info";

/// Logging profile configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Profile {
    /// Human-readable output, debug level
    Development,
    /// JSON lines, info level
    Production,
    /// Bare registry; events are collected by `init_test_capture`
    Test,
}

impl Profile {
    fn default_filter(&self) -> &'static str {
        match self {
            Profile::Development => DEFAULT_DEBUG_FILTER,
            Profile::Production | Profile::Test => DEFAULT_INFO_FILTER,
        }
    }
}

static INIT_ONCE: Once = Once::new();

/// Install the global subscriber for `profile`
///
/// Only the first call has an effect. `RUST_LOG` overrides the profile's
/// default filter. Output goes to stderr.
pub fn init(profile: Profile) {
    INIT_ONCE.call_once(|| {
        let filter = || {
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(profile.default_filter()))
        };
        // A subscriber installed elsewhere (e.g. test capture) wins.
        let _ = match profile {
            Profile::Development => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(false)
                .with_writer(std::io::stderr)
                .finish()
                .try_init(),
            Profile::Production => tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter())
                .with_writer(std::io::stderr)
                .finish()
                .try_init(),
            Profile::Test => tracing_subscriber::registry().try_init(),
        };
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_pick_levels() {
        assert!(Profile::Development.default_filter().contains("=debug"));
        assert!(Profile::Production.default_filter().contains("=info"));
    }
}
