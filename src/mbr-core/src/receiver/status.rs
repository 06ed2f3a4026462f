// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::Serialize;

use crate::cell::CellGeometry;
use crate::params::RuntimeParameters;
use crate::telemetry::TelemetrySnapshot;
use crate::tti::Tti;

use super::machine::ReceiverState;

/// Running totals kept by the control loop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReceiverCounters {
    /// Returns from Processing to Searching.
    pub recoveries: u64,
    /// Radio retunes after startup.
    pub retunes: u64,
    /// Worker acquisitions that had to wait for a previous decode.
    pub overruns: u64,
    /// Subframes decoded successfully by any worker.
    pub decoded: u64,
    /// Broadcast subframes dropped because nothing was scheduled.
    pub discarded: u64,
}

/// Snapshot published to observers on every transition and telemetry report.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReceiverStatus {
    pub state: ReceiverState,
    pub tti: Option<Tti>,
    pub params: RuntimeParameters,
    pub cell: Option<CellGeometry>,
    pub counters: ReceiverCounters,
    pub telemetry: Option<TelemetrySnapshot>,
}
