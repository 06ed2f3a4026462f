// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use thiserror::Error;

/// Errors raised by the receiver core itself.
///
/// Collaborator failures (radio, PHY) travel as `DynResult` and are absorbed
/// by the control loop's recovery path; these are the ones that can reach the
/// caller.
#[derive(Debug, Error)]
pub enum ReceiverError {
    #[error("channel width of {0} PRB is not supported")]
    UnsupportedPrb(u32),

    #[error("worker pool is shut down")]
    PoolClosed,

    #[error("failed to spawn thread {0}: {1}")]
    Spawn(String, std::io::Error),

    #[error("cannot set real-time priority {priority}: {reason}")]
    Priority { priority: i32, reason: String },

    #[error("none of the {0} candidate frequencies could be tuned")]
    NoTunableFrequency(usize),

    #[error("radio {0}: {1}")]
    Radio(String, String),

    #[error("receiver needs at least one broadcast-channel worker")]
    NoWorkers,
}
