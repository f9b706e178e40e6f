//! Tracing subscriber setup.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::core::constants::ENV_LOG;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, no timestamps.
    #[default]
    Compact,
    /// One JSON object per event.
    Json,
}

/// Install the global subscriber.
///
/// The filter comes from `CB_LOG`; without it, `verbose` selects debug output
/// for this crate and warnings otherwise. Returns an error if a global
/// subscriber is already set.
pub fn try_init(
    verbose: bool,
    format: LogFormat,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| default_filter(verbose));

    let compact = (format == LogFormat::Compact)
        .then(|| fmt::layer().with_target(false).without_time());
    let json = (format == LogFormat::Json).then(|| fmt::layer().json());

    tracing_subscriber::registry()
        .with(filter)
        .with(compact)
        .with(json)
        .try_init()
}

fn default_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("cloud_builder=debug")
    } else {
        EnvFilter::new("cloud_builder=warn")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_levels() {
        assert_eq!(default_filter(true).to_string(), "cloud_builder=debug");
        assert_eq!(default_filter(false).to_string(), "cloud_builder=warn");
    }

    #[test]
    fn test_second_init_fails() {
        let _ = try_init(false, LogFormat::Compact);
        assert!(try_init(false, LogFormat::Json).is_err());
    }
}
