// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver control: acquisition, synchronization and subframe dispatch.

pub mod control;
pub mod dispatch;
pub mod events;
pub mod machine;
pub mod policies;
pub mod status;

#[cfg(test)]
pub(crate) mod testkit;

pub use control::{Collaborators, ControlOptions, ReceiverControl};
pub use dispatch::DispatchCursor;
pub use events::{ListenerId, ReceiverEventEmitter, ReceiverListener};
pub use machine::{FailureCause, ReceiverEvent, ReceiverState, ReceiverStateMachine};
pub use policies::{FixedDelay, RetryPolicy};
pub use status::{ReceiverCounters, ReceiverStatus};
