//! Process-wide `tracing` setup.
//!
//! The level comes from `LOG_LEVEL` once at startup and is read-only after
//! that. `RUST_LOG`, when present, takes over so ad-hoc per-module filters
//! still work during development.

use once_cell::sync::OnceCell;

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static LOG_LEVEL: OnceCell<String> = OnceCell::new();

/// Install the subscriber. Later calls are no-ops and return the level that
/// won the first call.
pub fn init_logging(level: &str) -> anyhow::Result<&'static str> {
    if let Some(existing) = LOG_LEVEL.get() {
        return Ok(existing.as_str());
    }

    let directive = level_directive(level);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    Ok(LOG_LEVEL.get_or_init(|| directive.to_string()).as_str())
}

/// Map `LOG_LEVEL` spellings (including `WARNING` and `CRITICAL`) onto
/// `tracing` filter directives. Unknown values fall back to `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_uppercase().as_str() {
        "TRACE" => "trace",
        "DEBUG" => "debug",
        "WARN" | "WARNING" => "warn",
        "ERROR" | "CRITICAL" | "FATAL" => "error",
        "OFF" | "NONE" => "off",
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::level_directive;

    #[test]
    fn maps_common_level_names() {
        assert_eq!(level_directive("DEBUG"), "debug");
        assert_eq!(level_directive(" warning "), "warn");
        assert_eq!(level_directive("CRITICAL"), "error");
        assert_eq!(level_directive("INFO"), "info");
        assert_eq!(level_directive("verbose"), "info");
    }
}
