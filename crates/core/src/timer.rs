// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Monotonic periodic timer gating fixed-interval work.

use crate::clock::Clock;
use std::time::{Duration, Instant};

/// Fires at a fixed wall interval measured on the monotonic clock.
///
/// `wait` sleeps until the next fire instant and then advances it by one
/// interval. Missed intervals are skipped, not replayed: after a long stall
/// the next fire is one interval from now.
#[derive(Debug, Clone)]
pub struct PeriodicTimer<C: Clock> {
    clock: C,
    interval: Duration,
    next: Instant,
}

impl<C: Clock> PeriodicTimer<C> {
    pub fn new(clock: C, interval: Duration) -> Self {
        let next = clock.now() + interval;
        Self {
            clock,
            interval,
            next,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True once the fire instant has passed.
    pub fn due(&self) -> bool {
        self.clock.now() >= self.next
    }

    /// Time left until the next fire, zero when due.
    pub fn remaining(&self) -> Duration {
        self.next.saturating_duration_since(self.clock.now())
    }

    /// Sleep until due, then advance to the next interval.
    pub async fn wait(&mut self) {
        let remaining = self.remaining();
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        self.advance();
    }

    /// Re-arm one full interval from now.
    pub fn reset(&mut self) {
        self.next = self.clock.now() + self.interval;
    }

    fn advance(&mut self) {
        let now = self.clock.now();
        self.next += self.interval;
        if self.next <= now {
            self.next = now + self.interval;
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
