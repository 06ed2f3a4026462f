// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver state machine.
//!
//! Only the control loop drives this; every transition it accepts is one of
//! acquisition, lock, retune-and-relock, or recovery.

use std::fmt;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::tti::Tti;

/// Why the control loop left Processing for Searching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// Frame retrieval failed: underrun or lost timing.
    FrameLost,
    /// An operator parameter change arrived.
    ParametersChanged,
    /// A decode job could not be queued.
    DispatchFailed,
    /// The reported broadcast width has no usable sample rate.
    UnsupportedWidth,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FrameLost => write!(f, "synchronization lost while processing"),
            Self::ParametersChanged => write!(f, "new parameters requested"),
            Self::DispatchFailed => write!(f, "decode job could not be dispatched"),
            Self::UnsupportedWidth => write!(f, "unsupported broadcast channel width"),
        }
    }
}

/// Events that can move the receiver between states.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceiverEvent {
    /// Cell search succeeded.
    CellFound { nof_prb: u32 },
    /// Subframe timing acquired at the target rate.
    Synchronized { tti: Tti },
    /// The synchronization attempt budget ran out.
    SyncExhausted { attempts: u32 },
    /// The broadcast channel turned out wider than the radio is set up for.
    BandwidthChanged { mbsfn_prb: u32 },
    /// Processing failed; the receiver was reset.
    Failure(FailureCause),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiverState {
    #[default]
    Searching,
    Syncing,
    Processing,
}

impl fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Searching => write!(f, "Searching"),
            Self::Syncing => write!(f, "Syncing"),
            Self::Processing => write!(f, "Processing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReceiverStateMachine {
    state: ReceiverState,
    transition_count: u64,
    last_transition: Option<Instant>,
}

impl Default for ReceiverStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverStateMachine {
    /// Create a new state machine in the Searching state.
    pub fn new() -> Self {
        Self {
            state: ReceiverState::Searching,
            transition_count: 0,
            last_transition: None,
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn transition_count(&self) -> u64 {
        self.transition_count
    }

    pub fn time_in_state(&self) -> Option<Duration> {
        self.last_transition.map(|t| t.elapsed())
    }

    /// Process an event and potentially transition to a new state.
    /// Returns the previous state if a transition occurred.
    pub fn process_event(&mut self, event: &ReceiverEvent) -> Option<ReceiverState> {
        let next = self.next_state(event)?;
        let previous = self.state;
        self.state = next;
        self.transition_count += 1;
        self.last_transition = Some(Instant::now());
        Some(previous)
    }

    fn next_state(&self, event: &ReceiverEvent) -> Option<ReceiverState> {
        use ReceiverEvent as E;
        use ReceiverState as S;
        match (self.state, event) {
            (S::Searching, E::CellFound { .. }) => Some(S::Syncing),
            (S::Syncing, E::Synchronized { .. }) => Some(S::Processing),
            (S::Syncing, E::SyncExhausted { .. }) => Some(S::Searching),
            (S::Processing, E::BandwidthChanged { .. }) => Some(S::Syncing),
            (S::Processing, E::Failure(_)) => Some(S::Searching),
            _ => None,
        }
    }
}
