// src/logging.rs
//! Tracing setup and the `app_log!` macro used across the crate

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer, Registry};

const DEFAULT_DIRECTIVE: &str = "info";

/// Log through `tracing` with the level as first argument:
/// `app_log!(info, "Polling {}", id)`.
#[macro_export]
macro_rules! app_log {
    ($level:ident, $($arg:tt)+) => {
        ::tracing::$level!($($arg)+)
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info` filter.
/// When `log_file` is set the file is truncated and receives all output.
pub fn init_logging(format: LogFormat, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_DIRECTIVE))
        .context("Invalid log filter directive")?;

    let fmt_layer: Box<dyn Layer<Registry> + Send + Sync> = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            let layer = fmt::layer().with_writer(Mutex::new(file)).with_ansi(false);
            match format {
                LogFormat::Json => layer
                    .json()
                    .with_current_span(false)
                    .with_span_list(false)
                    .boxed(),
                LogFormat::Pretty => layer.boxed(),
            }
        }
        None => {
            let layer = fmt::layer().with_writer(std::io::stderr);
            match format {
                LogFormat::Json => layer.json().boxed(),
                LogFormat::Pretty => layer.with_target(false).boxed(),
            }
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init()
        .context("Failed to install tracing subscriber")
}
