// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Log subscriber setup.

use std::fs::OpenOptions;
use std::sync::Arc;

use config::Config;
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{Registry, reload};

use crate::error::StartupError;

/// Map a configured log level to a filter: 0 info, 1 debug, anything above trace.
#[must_use]
pub fn level_filter(log_level: u8) -> LevelFilter {
    match log_level {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Handle to change the log level after setup.
#[derive(Debug, Clone)]
pub struct LogHandle(reload::Handle<LevelFilter, Registry>);

impl LogHandle {
    /// Switch to `log_level`.
    ///
    /// # Errors
    ///
    /// Fails if the subscriber is gone.
    pub fn set_level(&self, log_level: u8) -> Result<(), StartupError> {
        let level = level_filter(log_level);
        self.0
            .modify(|filter| *filter = level)
            .map_err(|e| StartupError::Logging(e.to_string()))?;
        debug!("Log level now {level}");
        Ok(())
    }
}

/// Install the global subscriber at the startup level, `log_level + init_lldelta`.
///
/// # Errors
///
/// Fails if the log file can not be opened or a subscriber is already installed.
pub fn init(config: &Config) -> Result<LogHandle, StartupError> {
    let startup_level = level_filter(config.log_level.saturating_add(config.init_lldelta));
    let (filter, handle) = reload::Layer::new(startup_level);

    let log_path = config.log_path();
    let writer = match &log_path {
        None => BoxMakeWriter::new(std::io::stderr),
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)
                    .map_err(|e| StartupError::Logging(format!("{}: {e}", dir.display())))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| StartupError::Logging(format!("{}: {e}", path.display())))?;
            BoxMakeWriter::new(Arc::new(file))
        }
    };

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_ansi(log_path.is_none())
        .with_writer(writer);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| StartupError::Logging(e.to_string()))?;
    Ok(LogHandle(handle))
}
