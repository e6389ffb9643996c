//! Structured logging utilities, component-tagged the same way across the
//! worker, coordinator, engine, and sink.
//!
//! ```ignore
//! use pscatter_config::logging::*;
//!
//! log_worker_info!("directory list received", count = dirs.len());
//! log_coordinator_debug!("distributing work", shares = shares.len());
//! ```

/// Component identifiers for log filtering.
pub struct Component;

impl Component {
    pub const WORKER: &'static str = "WORKER";
    pub const COORDINATOR: &'static str = "COORDINATOR";
    pub const ENGINE: &'static str = "ENGINE";
    pub const SINK: &'static str = "SINK";
    pub const CLI: &'static str = "CLI";
}

/// Log levels for runtime configuration (`config_update.log_level`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl std::str::FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(()),
        }
    }
}

#[macro_export]
macro_rules! log_worker_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "WORKER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_worker_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "WORKER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_worker_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "WORKER", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_coordinator_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "COORDINATOR", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_coordinator_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "COORDINATOR", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_coordinator_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "COORDINATOR", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_engine_debug {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::debug!(component = "ENGINE", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_sink_warn {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::warn!(component = "SINK", $($key = $value,)* $msg)
    };
}

#[macro_export]
macro_rules! log_cli_info {
    ($msg:literal $(, $key:ident = $value:expr)* $(,)?) => {
        tracing::info!(component = "CLI", $($key = $value,)* $msg)
    };
}

/// Initialize logging with the given level filter. Call this once at
/// application startup; respects `RUST_LOG` if set.
pub fn init_logging(level: LogLevel) {
    use tracing_subscriber::EnvFilter;

    let filter = match level {
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn component_constants() {
        assert_eq!(Component::WORKER, "WORKER");
        assert_eq!(Component::COORDINATOR, "COORDINATOR");
    }

    #[test]
    fn log_level_parses_case_insensitively() {
        assert_eq!(LogLevel::from_str("DEBUG"), Ok(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("bogus"), Err(()));
    }
}
