// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! ne-engine: the application lifecycle engine.
//!
//! Every process in the fleet, the supervisor included, is one instance
//! of [`App`]: a finite-state machine driving the canonical six-stage
//! lifecycle on one task, with a parallel manage plane on a second.

pub mod app;
pub mod args;
pub mod fsm;
pub mod hooks;
pub mod logging;
pub mod worker;

pub use app::{App, AppConfig, AppCtx, BusFactory};
pub use args::AppArgs;
pub use fsm::{Directive, Fsm, FsmError, StateDriver};
pub use hooks::{AppHooks, StageError, StageResult};
pub use worker::{link_params_changed, InterfaceApp, IntfCtx, ProtocolHooks};

use thiserror::Error;

/// Errors from engine construction and context access
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("--conn-id is required")]
    MissingConnId,
    #[error("bus session not created yet")]
    BusNotReady,
}
