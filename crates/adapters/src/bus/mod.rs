// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TagBus client seam.
//!
//! The bus itself is an external pub/sub store; the engines consume four
//! operations from it (sync, subscribe, publish, commit) plus session
//! open/close. Writes are staged by `publish`; they become visible and
//! are dispatched to matching subscriptions on `commit`.

pub mod keys;
mod memory;
mod pattern;

pub use memory::MemoryTagBus;
pub use pattern::matches;

use async_trait::async_trait;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// Value stored under a bus key.
pub type TagValue = serde_json::Value;

/// Subscription callback. Invoked with (key, value) for every committed
/// write matching one of the subscribed patterns. Callbacks must swallow
/// their own failures; a callback can never break the bus.
pub type BusCallback =
    Arc<dyn Fn(String, TagValue) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// Build a [`BusCallback`] from an async closure.
pub fn callback<F, Fut>(f: F) -> BusCallback
where
    F: Fn(String, TagValue) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |key, value| Box::pin(f(key, value)))
}

/// Errors from bus operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus session not open")]
    NotConnected,
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("bus error: {0}")]
    Other(String),
}

/// Client handle to the key-value bus.
#[async_trait]
pub trait TagBus: Send + Sync + 'static {
    /// Open the session.
    async fn connect(&self) -> Result<(), BusError>;

    /// Close the session. Idempotent.
    async fn disconnect(&self) -> Result<(), BusError>;

    /// Declare interest in a set of key patterns ahead of subscribing.
    async fn sync(&self, patterns: &[String]) -> Result<(), BusError>;

    /// Register a callback for committed writes matching any pattern.
    async fn subscribe(&self, patterns: &[String], handler: BusCallback) -> Result<(), BusError>;

    /// Stage one write. Not visible until `commit`.
    async fn publish(&self, key: &str, value: TagValue) -> Result<(), BusError>;

    /// Apply staged writes and dispatch subscriptions.
    async fn commit(&self) -> Result<(), BusError>;

    /// Read the committed value of one key.
    async fn get(&self, key: &str) -> Option<TagValue>;

    /// Drop all committed state (the `--clean` startup path).
    async fn clear(&self) -> Result<(), BusError>;
}
