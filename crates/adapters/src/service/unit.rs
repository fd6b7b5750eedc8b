// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service unit file generation.

use ne_core::AppCategory;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default unit directory on the host.
pub const DEFAULT_UNIT_DIR: &str = "/etc/systemd/system";

const INTERFACE_UNIT_TEMPLATE: &str = "\
[Unit]
Description=Nodi Edge Interface: {app_id}
After=network.target ne-supervisor.service
Requires=ne-supervisor.service

[Service]
Type=simple
User=root
Group=root
ExecStart={interpreter} -m {module} --conn-id={conn_id}
Restart=always
RestartSec=5
StartLimitIntervalSec=300
StartLimitBurst=5
Environment=PYTHONUNBUFFERED=1

[Install]
WantedBy=multi-user.target
";

const ADDON_UNIT_TEMPLATE: &str = "\
[Unit]
Description=Nodi Edge Addon: {app_id}
After=network.target ne-supervisor.service
Requires=ne-supervisor.service

[Service]
Type=simple
User=root
Group=root
ExecStart={interpreter} -m {module}
Restart=on-failure
RestartSec=5
StartLimitIntervalSec=300
StartLimitBurst=5
Environment=PYTHONUNBUFFERED=1

[Install]
WantedBy=multi-user.target
";

/// Errors from unit file operations
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("unit file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What to materialize for one managed worker.
#[derive(Debug, Clone)]
pub struct UnitSpec {
    pub app_id: String,
    pub category: AppCategory,
    pub module: String,
    pub conn_id: Option<String>,
}

/// Service name (without the `.service` suffix): `ne-<category>-<app-id>`.
pub fn service_name(category: AppCategory, app_id: &str) -> String {
    format!("ne-{category}-{app_id}")
}

/// Writes and removes unit files for managed workers.
#[derive(Debug, Clone)]
pub struct UnitWriter {
    unit_dir: PathBuf,
    interpreter: PathBuf,
}

impl UnitWriter {
    pub fn new(unit_dir: impl Into<PathBuf>, interpreter: impl Into<PathBuf>) -> Self {
        Self {
            unit_dir: unit_dir.into(),
            interpreter: interpreter.into(),
        }
    }

    pub fn unit_path(&self, category: AppCategory, app_id: &str) -> PathBuf {
        self.unit_dir
            .join(format!("{}.service", service_name(category, app_id)))
    }

    /// Render the unit text for a spec.
    pub fn render(&self, spec: &UnitSpec) -> String {
        let interpreter = self.interpreter.display().to_string();
        match spec.category {
            AppCategory::Interface => {
                let conn_id = spec.conn_id.as_deref().unwrap_or(&spec.app_id);
                INTERFACE_UNIT_TEMPLATE
                    .replace("{app_id}", &spec.app_id)
                    .replace("{interpreter}", &interpreter)
                    .replace("{module}", &spec.module)
                    .replace("{conn_id}", conn_id)
            }
            AppCategory::Addon => ADDON_UNIT_TEMPLATE
                .replace("{app_id}", &spec.app_id)
                .replace("{interpreter}", &interpreter)
                .replace("{module}", &spec.module),
        }
    }

    /// Write (overwrite) the unit file. Returns its path.
    pub fn create(&self, spec: &UnitSpec) -> Result<PathBuf, UnitError> {
        let path = self.unit_path(spec.category, &spec.app_id);
        std::fs::write(&path, self.render(spec)).map_err(|source| UnitError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Delete the unit file if present. Returns whether it existed.
    pub fn remove(&self, category: AppCategory, app_id: &str) -> Result<bool, UnitError> {
        let path = self.unit_path(category, app_id);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(|source| UnitError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(true)
    }

    pub fn unit_dir(&self) -> &Path {
        &self.unit_dir
    }
}

#[cfg(test)]
#[path = "unit_tests.rs"]
mod tests;
