// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! systemd adapter: `systemctl` via the elevation wrapper.

use super::ServiceManager;
use async_trait::async_trait;
use std::time::Duration;
use tokio::process::Command;

const MUTATION_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Shell-out driver for systemd.
#[derive(Clone, Default)]
pub struct SystemdManager;

impl SystemdManager {
    pub fn new() -> Self {
        Self
    }

    async fn systemctl(&self, args: &[&str], timeout: Duration) -> bool {
        let mut cmd = Command::new("sudo");
        cmd.arg("systemctl").args(args);

        let output = match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(err)) => {
                tracing::warn!(?args, error = %err, "systemctl spawn failed");
                return false;
            }
            Err(_) => {
                tracing::warn!(?args, timeout_s = timeout.as_secs(), "systemctl timed out");
                return false;
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::warn!(?args, stderr = %stderr.trim(), "systemctl failed");
            return false;
        }
        true
    }
}

#[async_trait]
impl ServiceManager for SystemdManager {
    async fn daemon_reload(&self) -> bool {
        self.systemctl(&["daemon-reload"], MUTATION_TIMEOUT).await
    }

    async fn start(&self, service: &str) -> bool {
        self.systemctl(&["start", service], MUTATION_TIMEOUT).await
    }

    async fn stop(&self, service: &str) -> bool {
        self.systemctl(&["stop", service], MUTATION_TIMEOUT).await
    }

    async fn restart(&self, service: &str) -> bool {
        self.systemctl(&["restart", service], MUTATION_TIMEOUT)
            .await
    }

    async fn is_active(&self, service: &str) -> bool {
        // A dead unit is an answer, not an error: no WARN on non-zero exit.
        let mut cmd = Command::new("sudo");
        cmd.args(["systemctl", "is-active", "--quiet", service]);

        match tokio::time::timeout(PROBE_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) => output.status.success(),
            Ok(Err(err)) => {
                tracing::warn!(service, error = %err, "is-active spawn failed");
                false
            }
            Err(_) => {
                tracing::warn!(service, "is-active timed out");
                false
            }
        }
    }
}
