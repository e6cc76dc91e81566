//! Tracing subscriber setup

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

/// Environment variable holding the tracing filter directives
pub const LOG_ENV: &str = "RELAYCRM_LOG";

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Human,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "human" | "text" | "pretty" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            other => Err(format!("Unknown log format: {other}")),
        }
    }
}

/// Install the global tracing subscriber
///
/// The filter comes from `RELAYCRM_LOG`, defaulting to `info`. Uses
/// `try_init` so it's safe to call multiple times (e.g. from tests).
pub fn init_tracing(format: LogFormat) {
    use tracing_subscriber::fmt;

    let directives = std::env::var(LOG_ENV).unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"));

    let result = match format {
        LogFormat::Json => fmt::fmt().with_env_filter(filter).json().try_init(),
        LogFormat::Human => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_format_parses() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Human);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing(LogFormat::Human);
        init_tracing(LogFormat::Json);
    }
}
