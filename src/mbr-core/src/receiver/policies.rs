// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Retry policies for acquisition and synchronization.

use std::time::Duration;

/// Policy for retrying a failed acquisition step.
pub trait RetryPolicy: Send + Sync {
    /// Whether another attempt may follow `attempt` failed ones.
    fn should_retry(&self, attempt: u32) -> bool;

    /// Delay to wait once the policy gives up.
    fn delay(&self, attempt: u32) -> Duration;

    fn max_attempts(&self) -> u32;
}

/// Bounded attempts with a constant backoff.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    max_attempts: u32,
    delay: Duration,
}

impl FixedDelay {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for FixedDelay {
    /// 200 synchronization attempts, one second backoff.
    fn default() -> Self {
        Self::new(200, Duration::from_secs(1))
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.delay
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
