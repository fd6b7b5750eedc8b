// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-engine logging: console plus a non-blocking file appender under
//! the data root, with size-based rotation at startup.

use std::io;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Rotation policy for one engine's log file.
///
/// Edge devices run on small flash, and every worker writes its own
/// log, so the caps are deliberately tight.
#[derive(Debug, Clone)]
pub struct LogRotation {
    /// Rotate once the live file reaches this many bytes.
    pub max_bytes: u64,
    /// Rotated generations to keep (`<log>.1` .. `<log>.<keep>`).
    pub keep: u32,
}

impl Default for LogRotation {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            keep: 2,
        }
    }
}

/// Wire up tracing for one engine process.
///
/// Returns the appender guard; dropping it flushes buffered log lines,
/// so the caller holds it for the process lifetime.
pub fn setup_logging(log_path: &Path, verbose: bool) -> io::Result<WorkerGuard> {
    let parent = log_path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no parent"))?;
    let file_name = log_path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "log path has no file name"))?;
    std::fs::create_dir_all(parent)?;

    rotate_log(log_path, &LogRotation::default());

    let file_appender = tracing_appender::rolling::never(parent, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(fmt::layer())
        .init();

    Ok(guard)
}

/// Rotate the log file once it has grown past the policy cap.
///
/// The live file becomes generation 1 and older generations age by one,
/// with the last falling off the end. Every step is best-effort: a
/// failed rename never blocks startup.
pub fn rotate_log(log_path: &Path, policy: &LogRotation) {
    let over_cap = std::fs::metadata(log_path)
        .map(|meta| meta.len() >= policy.max_bytes)
        .unwrap_or(false);
    if !over_cap || policy.keep == 0 {
        return;
    }

    let generation = |n: u32| PathBuf::from(format!("{}.{n}", log_path.display()));

    let _ = std::fs::remove_file(generation(policy.keep));
    for n in (1..policy.keep).rev() {
        let _ = std::fs::rename(generation(n), generation(n + 1));
    }
    let _ = std::fs::rename(log_path, generation(1));
}

#[cfg(test)]
#[path = "logging_tests.rs"]
mod tests;
