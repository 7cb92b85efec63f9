use clap::ValueEnum;
use eyre::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn filter(verbose: u8, quiet: bool, level: Option<LogLevel>) -> EnvFilter {
    let level = match (level, quiet, verbose) {
        (Some(level), _, _) => level,
        (None, true, _) => LogLevel::Error,
        (None, false, 0) => LogLevel::Warn,
        (None, false, 1) => LogLevel::Info,
        (None, false, 2) => LogLevel::Debug,
        (None, false, _) => LogLevel::Trace,
    };
    EnvFilter::new(level.directive())
}

/// Install the global subscriber. Logs go to stderr so dumps on stdout stay clean.
pub(crate) fn setup(verbose: u8, quiet: bool, level: Option<LogLevel>) -> Result<()> {
    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_level(true);

    tracing_subscriber::registry()
        .with(formatter)
        .with(filter(verbose, quiet, level))
        .try_init()?;
    Ok(())
}
