// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-engine statistics: stage timing, done flags, exception budget.

use crate::clock::Clock;
use crate::meter::MovingAverage;
use crate::states::AppState;
use parking_lot::Mutex;
use serde::Serialize;
use std::time::Instant;

/// One record per lifecycle stage.
///
/// `done` flips to true on the first successful pass through the stage and
/// is cleared on the retry/disconnect paths.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StageStats {
    pub elapsed_s: f64,
    pub done: bool,
}

/// Statistics for one engine instance.
///
/// Written only by the FSM driver and the manage task; readers tolerate
/// one tick of staleness.
#[derive(Debug, Clone)]
pub struct AppStats {
    stages: [StageStats; 6],
    pub execute_meter: MovingAverage,
    pub exception_count: u32,
    pub execute_count: u64,
}

impl AppStats {
    pub fn new() -> Self {
        Self {
            stages: [StageStats::default(); 6],
            execute_meter: MovingAverage::default(),
            exception_count: 0,
            execute_count: 0,
        }
    }

    pub fn stage(&self, state: AppState) -> &StageStats {
        &self.stages[Self::idx(state)]
    }

    pub fn stage_mut(&mut self, state: AppState) -> &mut StageStats {
        &mut self.stages[Self::idx(state)]
    }

    /// Mark the first successful pass through a stage.
    ///
    /// Returns true when this call flipped the flag, gating the
    /// stage-entered log line to exactly once per cycle.
    pub fn mark_done(&mut self, state: AppState) -> bool {
        let stage = self.stage_mut(state);
        if stage.done {
            false
        } else {
            stage.done = true;
            true
        }
    }

    pub fn clear_done(&mut self, state: AppState) {
        self.stage_mut(state).done = false;
    }

    /// Count one exception; returns the new total.
    pub fn record_exception(&mut self) -> u32 {
        self.exception_count += 1;
        self.exception_count
    }

    /// Success is the bottom of the well: a clean EXECUTE iteration
    /// zeroes the counter.
    pub fn reset_exceptions(&mut self) {
        self.exception_count = 0;
    }

    fn idx(state: AppState) -> usize {
        match state {
            AppState::Prepare => 0,
            AppState::Configure => 1,
            AppState::Connect => 2,
            AppState::Execute => 3,
            AppState::Recover => 4,
            AppState::Disconnect => 5,
        }
    }
}

impl Default for AppStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped stage timer: records elapsed seconds into the stage record on
/// drop, on every exit path.
pub struct StageGuard<'a, C: Clock> {
    clock: &'a C,
    stats: &'a Mutex<AppStats>,
    state: AppState,
    start: Instant,
}

impl<'a, C: Clock> StageGuard<'a, C> {
    pub fn new(clock: &'a C, stats: &'a Mutex<AppStats>, state: AppState) -> Self {
        Self {
            clock,
            stats,
            state,
            start: clock.now(),
        }
    }

    pub fn elapsed_s(&self) -> f64 {
        self.clock.now().duration_since(self.start).as_secs_f64()
    }
}

impl<C: Clock> Drop for StageGuard<'_, C> {
    fn drop(&mut self) {
        let elapsed = self.elapsed_s();
        self.stats.lock().stage_mut(self.state).elapsed_s = elapsed;
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
