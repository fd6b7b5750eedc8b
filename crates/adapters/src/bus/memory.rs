// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process TagBus implementation.
//!
//! Stands in for the external bus on single-box deployments and keeps the
//! test suite hermetic. Staged writes become visible on `commit`, which
//! also dispatches matching subscription callbacks (awaited in commit
//! order, so tests observe effects deterministically).

use super::pattern::matches;
use super::{BusCallback, BusError, TagBus, TagValue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

struct Subscription {
    patterns: Vec<String>,
    handler: BusCallback,
}

#[derive(Default)]
struct BusState {
    tags: HashMap<String, TagValue>,
    staged: Vec<(String, TagValue)>,
    subscriptions: Vec<Subscription>,
    synced: Vec<String>,
    connected: bool,
}

/// In-memory pub/sub key-value store.
#[derive(Clone, Default)]
pub struct MemoryTagBus {
    state: Arc<Mutex<BusState>>,
    debug: bool,
}

impl MemoryTagBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable verbose dispatch tracing (`--debug`).
    pub fn with_debug(debug: bool) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState::default())),
            debug,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    /// Patterns declared through `sync`, for tests.
    pub fn synced_patterns(&self) -> Vec<String> {
        self.state.lock().synced.clone()
    }
}

#[async_trait]
impl TagBus for MemoryTagBus {
    async fn connect(&self) -> Result<(), BusError> {
        self.state.lock().connected = true;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.connected = false;
        state.subscriptions.clear();
        Ok(())
    }

    async fn sync(&self, patterns: &[String]) -> Result<(), BusError> {
        let mut state = self.state.lock();
        for pattern in patterns {
            if pattern.is_empty() {
                return Err(BusError::InvalidPattern(pattern.clone()));
            }
            if !state.synced.contains(pattern) {
                state.synced.push(pattern.clone());
            }
        }
        Ok(())
    }

    async fn subscribe(&self, patterns: &[String], handler: BusCallback) -> Result<(), BusError> {
        if patterns.is_empty() {
            return Err(BusError::InvalidPattern(String::new()));
        }
        self.state.lock().subscriptions.push(Subscription {
            patterns: patterns.to_vec(),
            handler,
        });
        Ok(())
    }

    async fn publish(&self, key: &str, value: TagValue) -> Result<(), BusError> {
        self.state.lock().staged.push((key.to_string(), value));
        Ok(())
    }

    async fn commit(&self) -> Result<(), BusError> {
        // Collect dispatches under the lock, run them after releasing it:
        // a callback may publish and commit again.
        let dispatches: Vec<(BusCallback, String, TagValue)> = {
            let mut state = self.state.lock();
            let batch = std::mem::take(&mut state.staged);
            let mut dispatches = Vec::new();
            for (key, value) in batch {
                state.tags.insert(key.clone(), value.clone());
                for sub in &state.subscriptions {
                    if sub.patterns.iter().any(|p| matches(p, &key)) {
                        dispatches.push((Arc::clone(&sub.handler), key.clone(), value.clone()));
                    }
                }
            }
            dispatches
        };

        for (handler, key, value) in dispatches {
            if self.debug {
                tracing::debug!(key = %key, "bus dispatch");
            }
            handler(key, value).await;
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Option<TagValue> {
        self.state.lock().tags.get(key).cloned()
    }

    async fn clear(&self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.tags.clear();
        state.staged.clear();
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
