// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Contracts of the physical-layer engine and the upper-layer stack.
//!
//! The control loop only consumes these; acquisition, demodulation and
//! message parsing live behind them.

use serde::Serialize;

use crate::cell::CellGeometry;
use crate::radio::RadioSource;
use crate::tti::Tti;
use crate::Sample;

/// Multicast traffic channel carried inside a multicast channel.
#[derive(Debug, Clone, Serialize)]
pub struct McastTrafficInfo {
    pub lcid: u8,
    pub tmgi: String,
    pub dest: String,
}

/// Scheduling info of one multicast channel, as learned from the control channel.
#[derive(Debug, Clone, Serialize)]
pub struct McastChannelInfo {
    pub mcs: u8,
    pub mtchs: Vec<McastTrafficInfo>,
}

/// Cell acquisition, subframe synchronization and frame retrieval.
pub trait PhyEngine: Send {
    /// Look for a cell at the radio's current frequency.
    fn cell_search(&mut self, radio: &mut dyn RadioSource) -> bool;

    /// Try once to lock onto subframe timing and decode the broadcast
    /// master information at the current sample rate.
    fn synchronize_subframe(&mut self, radio: &mut dyn RadioSource) -> bool;

    /// Pull the next subframe's samples into `buf`. `false` means the
    /// stream underran or timing was lost.
    fn next_frame(&mut self, radio: &mut dyn RadioSource, buf: &mut [Sample]) -> bool;

    /// TTI of the last synchronized subframe.
    fn tti(&self) -> Tti;

    /// Current cell geometry, including the latest known broadcast width.
    fn cell(&self) -> CellGeometry;

    /// Replace the cell geometry used for acquisition and frame retrieval.
    fn set_cell_geometry(&mut self, cell: CellGeometry);

    fn is_dedicated_subframe(&self, tti: Tti) -> bool;

    fn is_broadcast_subframe(&self, tti: Tti) -> bool;

    /// Whether the broadcast schedule has been received from the upper layers.
    fn broadcast_schedule_known(&self) -> bool;

    /// Drop all acquired cell state.
    fn reset(&mut self);

    /// Multicast channels currently scheduled, for telemetry.
    fn multicast_channels(&self) -> Vec<McastChannelInfo> {
        Vec::new()
    }
}

/// Control-plane / data-plane protocol stack above the PHY.
pub trait UpperLayer: Send {
    /// Forget all decoded system information and bearer state.
    fn reset(&mut self);
}
