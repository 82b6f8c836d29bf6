// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization
//!
//! Console output is always installed. With the `file-logging` feature a JSON
//! log file is also written to a timestamped run folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── taglink.log
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;

/// Keeps background log writers alive; flushes on drop
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder receiving log files, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

/// Logging options resolved from configuration
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    /// Default level for crates without a debug flag
    pub level: String,
    /// Base directory for JSON log files (ignored without `file-logging`)
    pub log_dir: Option<PathBuf>,
    /// Keep N most recent run folders
    pub retention_runs: usize,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
            retention_runs: 10,
        }
    }
}

/// Build the filter used by every layer
///
/// `RUST_LOG` wins over the computed directives when set.
pub fn build_filter(debug_flags: &CrateDebugFlags, level: &str) -> Result<EnvFilter> {
    if let Ok(directives) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(&directives)
            .with_context(|| format!("Invalid RUST_LOG filter: {}", directives));
    }
    let directives = debug_flags.to_filter_string(level);
    EnvFilter::try_new(&directives).with_context(|| format!("Invalid log filter: {}", directives))
}

/// Initialize the global tracing subscriber
///
/// # Errors
/// Fails on an invalid level string, an unwritable log directory, or when a global
/// subscriber is already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, options: &LoggingOptions) -> Result<LoggingGuard> {
    let env_filter = build_filter(debug_flags, &options.level)?;

    let mut layers = Vec::new();

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter)
        .boxed();
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guard, log_dir) = match &options.log_dir {
        Some(base) => {
            let run_folder = create_run_folder(base)?;
            cleanup_old_runs(base, options.retention_runs)?;

            let appender = tracing_appender::rolling::daily(&run_folder, "taglink.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .json()
                .with_filter(build_filter(debug_flags, &options.level)?)
                .boxed();
            layers.push(file_layer);
            (Some(guard), Some(run_folder))
        }
        None => (None, None),
    };

    #[cfg(not(feature = "file-logging"))]
    let log_dir = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("Global tracing subscriber already installed")?;

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guard: file_guard,
        log_dir,
    })
}

#[cfg(feature = "file-logging")]
fn create_run_folder(base: &Path) -> Result<PathBuf> {
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let run_folder = base.join(format!("run_{}", timestamp));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    Ok(run_folder)
}

/// Remove all but the newest `retention_runs` run folders
#[cfg_attr(not(feature = "file-logging"), allow(dead_code))]
fn cleanup_old_runs(base: &Path, retention_runs: usize) -> Result<()> {
    if !base.exists() {
        return Ok(());
    }

    let mut runs: Vec<(PathBuf, chrono::NaiveDateTime)> = Vec::new();
    for entry in std::fs::read_dir(base)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let stamp = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix("run_"))
            .and_then(|s| chrono::NaiveDateTime::parse_from_str(s, "%Y%m%d_%H%M%S").ok());
        if let Some(stamp) = stamp {
            runs.push((path, stamp));
        }
    }

    runs.sort_by_key(|(_, stamp)| *stamp);
    let excess = runs.len().saturating_sub(retention_runs);
    for (path, _) in runs.into_iter().take(excess) {
        if let Err(e) = std::fs::remove_dir_all(&path) {
            eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_filter_accepts_levels() {
        std::env::remove_var("RUST_LOG");
        let flags = CrateDebugFlags::from_crate_names(["taglink-server"]);
        assert!(build_filter(&flags, "warn").is_ok());
    }

    #[test]
    fn test_cleanup_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        for stamp in ["20250101_120000", "20250102_120000", "20250103_120000"] {
            std::fs::create_dir_all(dir.path().join(format!("run_{}", stamp))).unwrap();
        }
        std::fs::create_dir_all(dir.path().join("unrelated")).unwrap();

        cleanup_old_runs(dir.path(), 2).unwrap();

        assert!(!dir.path().join("run_20250101_120000").exists());
        assert!(dir.path().join("run_20250102_120000").exists());
        assert!(dir.path().join("run_20250103_120000").exists());
        assert!(dir.path().join("unrelated").exists());
    }
}
