// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application lifecycle states and the allowed-transition relation.

use serde::{Deserialize, Serialize};
use std::fmt;

/// States of the canonical six-stage lifecycle.
///
/// ```text
/// PREPARE → CONFIGURE → CONNECT → EXECUTE ⇄ CONFIGURE (reconfigure)
///                          ↑         ↓
///                     DISCONNECT ← RECOVER
/// ```
///
/// Every engine holds exactly one current state; the transition relation
/// returned by [`AppState::allowed_next`] is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AppState {
    Prepare,
    Configure,
    Connect,
    Execute,
    Recover,
    Disconnect,
}

impl AppState {
    /// All states, in lifecycle order.
    pub const ALL: [AppState; 6] = [
        AppState::Prepare,
        AppState::Configure,
        AppState::Connect,
        AppState::Execute,
        AppState::Recover,
        AppState::Disconnect,
    ];

    /// States reachable from this one.
    pub fn allowed_next(self) -> &'static [AppState] {
        match self {
            AppState::Prepare => &[AppState::Configure],
            AppState::Configure => &[AppState::Connect],
            AppState::Connect => &[AppState::Execute, AppState::Recover],
            AppState::Execute => &[AppState::Configure, AppState::Recover],
            AppState::Recover => &[AppState::Execute, AppState::Disconnect],
            AppState::Disconnect => &[AppState::Connect],
        }
    }

    /// Whether the edge `self → next` is in the allowed relation.
    pub fn can_transition(self, next: AppState) -> bool {
        self.allowed_next().contains(&next)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AppState::Prepare => "PREPARE",
            AppState::Configure => "CONFIGURE",
            AppState::Connect => "CONNECT",
            AppState::Execute => "EXECUTE",
            AppState::Recover => "RECOVER",
            AppState::Disconnect => "DISCONNECT",
        }
    }
}

impl fmt::Display for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[path = "states_tests.rs"]
mod tests;
