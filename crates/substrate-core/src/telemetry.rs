//! Logging setup driven by the `[logging]` config section.
//!
//! `RUST_LOG`, when set, takes precedence over the configured level. The
//! global subscriber can only be installed once per process; later calls
//! leave the first one in place and report `false`.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::ConfigError;

/// Install the global subscriber described by `config`.
///
/// An unknown `level` is rejected before anything is installed.
pub fn init_tracing_from(config: &LoggingConfig) -> Result<bool, ConfigError> {
    let level = config.level()?;
    Ok(init_tracing(config.json, level))
}

/// Install the global subscriber. Returns whether this call installed it.
///
/// JSON lines go to stdout for collectors; text lines go to stderr so they
/// never mix with command output.
pub fn init_tracing(json: bool, level: Level) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let json_layer = json.then(|| fmt::layer().with_target(false).json());
    let text_layer = (!json).then(|| {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_level_is_rejected_before_install() {
        let config = LoggingConfig {
            json: false,
            level: "chatty".into(),
        };
        let err = init_tracing_from(&config).expect_err("unknown level");
        assert!(err.to_string().contains("chatty"));
    }

    #[test]
    fn only_the_first_install_wins() {
        init_tracing_from(&LoggingConfig::default()).expect("valid level");
        assert!(!init_tracing(true, Level::DEBUG));
    }
}
