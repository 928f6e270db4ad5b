//! Tracing subscriber setup.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::PassageError;

/// Installs a global `tracing` subscriber: an `EnvFilter` followed by the
/// fmt layer.
///
/// Filter directives come from `RUST_LOG` when it is set and non-empty,
/// otherwise from `default_filter` (e.g. `"info"` or
/// `"passage_session=debug,info"`).
///
/// # Errors
/// [`PassageError::Telemetry`] if the directives don't parse or a global
/// subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), PassageError> {
    let from_env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(from_env.as_deref(), default_filter)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| PassageError::Telemetry(e.to_string()))
}

fn build_filter(
    from_env: Option<&str>,
    default_filter: &str,
) -> Result<EnvFilter, PassageError> {
    let directives = from_env
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_filter);
    EnvFilter::try_new(directives)
        .map_err(|e| PassageError::Telemetry(format!("{directives}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_uses_default_when_env_missing() {
        let filter = build_filter(None, "passage_session=debug,info").unwrap();
        assert!(filter.to_string().contains("passage_session=debug"));
    }

    #[test]
    fn test_build_filter_prefers_env_value() {
        let filter = build_filter(Some("warn"), "debug").unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("warn"));
        assert!(!rendered.contains("debug"));
    }

    #[test]
    fn test_build_filter_ignores_blank_env_value() {
        let filter = build_filter(Some("  "), "info").unwrap();
        assert!(filter.to_string().contains("info"));
    }

    #[test]
    fn test_build_filter_rejects_bad_level() {
        let result = build_filter(None, "passage=loud");
        assert!(matches!(result, Err(PassageError::Telemetry(_))));
    }

    #[test]
    fn test_init_tracing_second_call_returns_error() {
        // Only test in this binary that installs a global subscriber.
        let _ = init_tracing("info");
        let second = init_tracing("info");
        assert!(matches!(second, Err(PassageError::Telemetry(_))));
    }
}
