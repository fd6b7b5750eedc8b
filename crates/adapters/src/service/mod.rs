// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Service-manager adapters and unit-file generation.

mod systemd;
mod unit;

pub use systemd::SystemdManager;
pub use unit::{service_name, UnitError, UnitSpec, UnitWriter, DEFAULT_UNIT_DIR};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeServiceManager, ServiceCall};

use async_trait::async_trait;

/// Adapter for the host's service manager.
///
/// Every verb returns a plain success boolean: failures (non-zero exit,
/// spawn error, timeout) are logged at WARN by the implementation and
/// never surface as errors. Mutations carry a 30 s wall timeout, probes
/// 10 s.
#[async_trait]
pub trait ServiceManager: Clone + Send + Sync + 'static {
    /// Rescan unit files.
    async fn daemon_reload(&self) -> bool;

    /// Start a unit by service name.
    async fn start(&self, service: &str) -> bool;

    /// Stop a unit by service name.
    async fn stop(&self, service: &str) -> bool;

    /// Restart a unit by service name.
    async fn restart(&self, service: &str) -> bool;

    /// Probe liveness. False means dead or unknown, never an error.
    async fn is_active(&self, service: &str) -> bool;
}
