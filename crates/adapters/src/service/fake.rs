// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake service manager for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::ServiceManager;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Recorded service-manager call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceCall {
    DaemonReload,
    Start(String),
    Stop(String),
    Restart(String),
    IsActive(String),
}

#[derive(Default)]
struct FakeState {
    calls: Vec<ServiceCall>,
    active: HashMap<String, bool>,
    fail_start: HashSet<String>,
    zombie: HashSet<String>,
}

/// Fake service manager: records calls, liveness is fully scriptable.
#[derive(Clone, Default)]
pub struct FakeServiceManager {
    state: Arc<Mutex<FakeState>>,
}

impl FakeServiceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<ServiceCall> {
        self.state.lock().calls.clone()
    }

    pub fn daemon_reload_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| **c == ServiceCall::DaemonReload)
            .count()
    }

    pub fn start_count(&self, service: &str) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| **c == ServiceCall::Start(service.to_string()))
            .count()
    }

    /// Force the next `start` calls for this service to fail.
    pub fn fail_start(&self, service: &str) {
        self.state.lock().fail_start.insert(service.to_string());
    }

    /// `start` succeeds but the unit never reports active (S4-style
    /// crash-looping service).
    pub fn set_zombie(&self, service: &str) {
        self.state.lock().zombie.insert(service.to_string());
    }

    /// Directly set the probed liveness of a service.
    pub fn set_active(&self, service: &str, active: bool) {
        self.state.lock().active.insert(service.to_string(), active);
    }
}

#[async_trait]
impl ServiceManager for FakeServiceManager {
    async fn daemon_reload(&self) -> bool {
        self.state.lock().calls.push(ServiceCall::DaemonReload);
        true
    }

    async fn start(&self, service: &str) -> bool {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Start(service.to_string()));
        if state.fail_start.contains(service) {
            return false;
        }
        if !state.zombie.contains(service) {
            state.active.insert(service.to_string(), true);
        }
        true
    }

    async fn stop(&self, service: &str) -> bool {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Stop(service.to_string()));
        state.active.insert(service.to_string(), false);
        true
    }

    async fn restart(&self, service: &str) -> bool {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::Restart(service.to_string()));
        if state.fail_start.contains(service) {
            return false;
        }
        if !state.zombie.contains(service) {
            state.active.insert(service.to_string(), true);
        }
        true
    }

    async fn is_active(&self, service: &str) -> bool {
        let mut state = self.state.lock();
        state.calls.push(ServiceCall::IsActive(service.to_string()));
        state.active.get(service).copied().unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
