// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finite-state machine with a single driver task.
//!
//! The FSM owns the current state and validates every transition against
//! the immutable relation in [`AppState::allowed_next`]. One handler runs
//! per state, supplied as a [`StateDriver`] (the explicit handler table
//! built at engine construction) and yields a [`Directive`]. A handler
//! error is routed to `on_error` and leaves the state unchanged.

use async_trait::async_trait;
use ne_core::AppState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Errors surfaced through the FSM's `on_error` callback
#[derive(Debug, Error)]
pub enum FsmError {
    #[error("transition {from} -> {to} is not allowed")]
    InvalidTransition { from: AppState, to: AppState },
    #[error("handler error in {state}: {message}")]
    Handler { state: AppState, message: String },
    #[error("fsm is not running")]
    NotRunning,
}

/// What a state handler asks the driver to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive {
    Transition(AppState),
    Stop,
}

/// Boxed handler failure, mapped to [`FsmError::Handler`].
pub type DriveError = Box<dyn std::error::Error + Send + Sync>;

/// The per-state handler table. One object, one `match`: handlers cannot
/// be rebound at runtime.
#[async_trait]
pub trait StateDriver: Send + 'static {
    async fn drive(&mut self, state: AppState) -> Result<Directive, DriveError>;
}

type TransitionHook = Box<dyn Fn(AppState, AppState) + Send + Sync>;
type ErrorHook = Box<dyn Fn(&FsmError) + Send + Sync>;

struct Shared {
    current: Mutex<Option<AppState>>,
    stop: Arc<AtomicBool>,
    running_tx: watch::Sender<bool>,
    on_transition: Mutex<Option<TransitionHook>>,
    on_error: Mutex<Option<ErrorHook>>,
}

impl Shared {
    fn transition(&self, next: AppState) -> Result<(), FsmError> {
        let prev = {
            let mut current = self.current.lock();
            let Some(prev) = *current else {
                return Err(FsmError::NotRunning);
            };
            if !prev.can_transition(next) {
                return Err(FsmError::InvalidTransition {
                    from: prev,
                    to: next,
                });
            }
            *current = Some(next);
            prev
        };
        if let Some(hook) = self.on_transition.lock().as_ref() {
            hook(prev, next);
        }
        Ok(())
    }

    fn emit_error(&self, err: &FsmError) {
        if let Some(hook) = self.on_error.lock().as_ref() {
            hook(err);
        } else {
            tracing::error!(error = %err, "fsm error");
        }
    }
}

/// The state machine. Cheap to share behind an `Arc`.
pub struct Fsm {
    shared: Arc<Shared>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Fsm {
    pub fn new() -> Self {
        let (running_tx, _) = watch::channel(false);
        Self {
            shared: Arc::new(Shared {
                current: Mutex::new(None),
                stop: Arc::new(AtomicBool::new(false)),
                running_tx,
                on_transition: Mutex::new(None),
                on_error: Mutex::new(None),
            }),
            handle: Mutex::new(None),
        }
    }

    /// Install the transition callback, invoked after every accepted edge.
    pub fn on_transition(&self, hook: impl Fn(AppState, AppState) + Send + Sync + 'static) {
        *self.shared.on_transition.lock() = Some(Box::new(hook));
    }

    /// Install the error callback. Without one, errors are logged.
    pub fn on_error(&self, hook: impl Fn(&FsmError) + Send + Sync + 'static) {
        *self.shared.on_error.lock() = Some(Box::new(hook));
    }

    pub fn current_state(&self) -> Option<AppState> {
        *self.shared.current.lock()
    }

    /// True between `start` and the driver task's exit.
    pub fn is_running(&self) -> bool {
        *self.shared.running_tx.borrow()
    }

    /// Wakes when the driver task exits.
    pub fn running_receiver(&self) -> watch::Receiver<bool> {
        self.shared.running_tx.subscribe()
    }

    /// The shutdown flag, observed by stage handlers at their suspension
    /// points.
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shared.stop)
    }

    pub fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Validate and apply one transition.
    pub fn transition(&self, next: AppState) -> Result<(), FsmError> {
        self.shared.transition(next)
    }

    /// Spawn the driver task at `initial`. A second call while running is
    /// ignored.
    pub fn start<D: StateDriver>(&self, initial: AppState, mut driver: D) {
        if self.is_running() {
            return;
        }
        let shared = Arc::clone(&self.shared);
        *shared.current.lock() = Some(initial);
        shared.stop.store(false, Ordering::SeqCst);
        let _ = shared.running_tx.send(true);

        let task_shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            loop {
                if task_shared.stop.load(Ordering::SeqCst) {
                    break;
                }
                let Some(state) = *task_shared.current.lock() else {
                    break;
                };
                match driver.drive(state).await {
                    Ok(Directive::Transition(next)) => {
                        if let Err(err) = task_shared.transition(next) {
                            task_shared.emit_error(&err);
                        }
                    }
                    Ok(Directive::Stop) => break,
                    Err(err) => {
                        // State stays put; the engine layer maps failures
                        // to recovery transitions before they reach here.
                        let err = FsmError::Handler {
                            state,
                            message: err.to_string(),
                        };
                        task_shared.emit_error(&err);
                    }
                }
            }
            let _ = task_shared.running_tx.send(false);
        });
        *self.handle.lock() = Some(handle);
    }

    /// Request shutdown without waiting.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    /// Request shutdown and wait for the in-flight handler to return,
    /// aborting the driver after `timeout`.
    pub async fn stop(&self, timeout: Duration) {
        self.request_stop();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let abort = handle.abort_handle();
            if tokio::time::timeout(timeout, handle).await.is_err() {
                abort.abort();
                let _ = self.shared.running_tx.send(false);
            }
        }
    }
}

impl Default for Fsm {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "fsm_tests.rs"]
mod tests;
