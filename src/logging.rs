//! Process-wide log setup for the roster binaries.

use tracing_subscriber::{EnvFilter, fmt};

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Installs a compact fmt subscriber.
///
/// `RUST_LOG` takes precedence; otherwise the level is `info`, or `debug` when `verbose`.
/// Calling this more than once is harmless: later calls leave the first subscriber in place.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_lowers_level() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "debug");
    }

    #[test]
    fn repeated_init_is_harmless() {
        init_logging(false);
        init_logging(true);
        tracing::info!("logging initialized twice");
    }
}
