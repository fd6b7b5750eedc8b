// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor configuration and constants.

use ne_adapters::DEFAULT_UNIT_DIR;
use ne_core::DataDirs;
use ne_engine::AppConfig;
use std::path::PathBuf;
use std::time::Duration;

/// The supervisor's own engine id.
pub const SUPERVISOR_APP_ID: &str = "supervisor";

/// Interpreter baked into generated unit files.
pub const DEFAULT_INTERPRETER: &str = "/root/.venv/bin/python3";

/// Paths and intervals for one supervisor instance.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub db_path: PathBuf,
    pub license_dir: PathBuf,
    pub pubkey_file: PathBuf,
    pub unit_dir: PathBuf,
    pub interpreter: PathBuf,
    /// How often the entitlement sweep runs inside EXECUTE.
    pub entitlement_check_interval: Duration,
}

impl SupervisorConfig {
    /// Standard layout under the data root.
    pub fn from_dirs(dirs: &DataDirs) -> Self {
        Self {
            db_path: dirs.db_path(),
            license_dir: dirs.license_dir(),
            pubkey_file: dirs.root().join("license").join("cloud_pub.pem"),
            unit_dir: PathBuf::from(DEFAULT_UNIT_DIR),
            interpreter: PathBuf::from(DEFAULT_INTERPRETER),
            entitlement_check_interval: Duration::from_secs(60),
        }
    }
}

/// Engine tuning for the supervisor: a slow execute plane for the
/// entitlement sweep and a 10 s manage plane for healthchecking.
pub fn supervisor_app_config() -> AppConfig {
    AppConfig {
        execute_interval: Duration::from_secs(5),
        manage_interval: Duration::from_secs(10),
        ..AppConfig::default()
    }
}
