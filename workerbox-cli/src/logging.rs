//! CLI logging setup
//!
//! Per-target filtering on top of `tracing-subscriber`.

use crate::config::{LogConfig, TARGETS};
use anyhow::Context as _;
use std::io;
use std::path::Path;
use tracing_subscriber::{filter::Targets, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer};

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Colored, multi-line
    Pretty,
    /// One line per event
    Compact,
    /// JSON lines for tooling
    Json,
}

fn targets(config: &LogConfig) -> Targets {
    TARGETS
        .iter()
        .fold(Targets::new().with_default(config.global), |targets, target| {
            targets.with_target(*target, config.level_for(target))
        })
}

/// Install the global subscriber, writing to stderr and optionally a file
pub fn init(config: &LogConfig, format: LogFormat, file: Option<&Path>) -> anyhow::Result<()> {
    let targets = targets(config);
    let console = format_layer(format, io::stderr).with_filter(targets.clone());

    match file {
        Some(path) => {
            let handle = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file '{}'", path.display()))?;
            let file_layer = fmt::layer()
                .json()
                .with_writer(std::sync::Mutex::new(handle))
                .with_filter(targets);
            tracing_subscriber::registry()
                .with(console)
                .with(file_layer)
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry().with(console).try_init()?;
        }
    }
    Ok(())
}

fn format_layer<W, F>(format: LogFormat, make_writer: F) -> Box<dyn Layer<tracing_subscriber::Registry> + Send + Sync>
where
    W: io::Write + 'static,
    F: Fn() -> W + Send + Sync + 'static,
{
    match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .without_time()
            .with_writer(make_writer)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_writer(make_writer)
            .boxed(),
    }
}
