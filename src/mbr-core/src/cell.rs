// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Cell geometry and the channel-width to sample-rate mapping.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ReceiverError;

/// Width of one physical resource block in Hz.
pub const PRB_WIDTH_HZ: u32 = 200_000;

/// Fractional guard added on top of the nominal channel width when sizing the
/// radio's low-pass filter.
pub const FILTER_GUARD_MARGIN: f64 = 0.2;

/// Subcarrier spacing used by the broadcast channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubcarrierSpacing {
    #[default]
    Khz15,
    Khz7_5,
    Khz1_25,
}

impl SubcarrierSpacing {
    pub fn hz(self) -> f64 {
        match self {
            Self::Khz15 => 15_000.0,
            Self::Khz7_5 => 7_500.0,
            Self::Khz1_25 => 1_250.0,
        }
    }
}

impl fmt::Display for SubcarrierSpacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Khz15 => write!(f, "15 kHz"),
            Self::Khz7_5 => write!(f, "7.5 kHz"),
            Self::Khz1_25 => write!(f, "1.25 kHz"),
        }
    }
}

/// Parameters describing a discovered broadcast cell.
///
/// `nof_prb` is the dedicated channel width, fixed for the carrier.
/// `mbsfn_prb` is the broadcast channel width, learned from system
/// information and possibly wider than the dedicated channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellGeometry {
    pub nof_prb: u32,
    pub mbsfn_prb: u32,
    pub mbsfn_area_id: u8,
    pub subcarrier_spacing: SubcarrierSpacing,
}

impl CellGeometry {
    /// Geometry of a freshly found cell: both channels share the detected width.
    pub fn new(nof_prb: u32) -> Self {
        Self {
            nof_prb,
            mbsfn_prb: nof_prb,
            mbsfn_area_id: 0,
            subcarrier_spacing: SubcarrierSpacing::default(),
        }
    }

    /// The same cell as seen by a broadcast-channel worker, whose decode
    /// width is the broadcast width.
    pub fn broadcast_view(&self) -> Self {
        Self {
            nof_prb: self.mbsfn_prb,
            ..*self
        }
    }

    /// Nominal channel widths in MHz, for logging.
    pub fn width_mhz(prb: u32) -> f64 {
        f64::from(prb * PRB_WIDTH_HZ) / 1e6
    }
}

/// FFT size for a channel width, using standard LTE symbol sizes.
pub fn fft_size(nof_prb: u32) -> Result<u32, ReceiverError> {
    match nof_prb {
        1..=6 => Ok(128),
        7..=15 => Ok(256),
        16..=25 => Ok(512),
        26..=50 => Ok(1024),
        51..=75 => Ok(1536),
        76..=100 => Ok(2048),
        _ => Err(ReceiverError::UnsupportedPrb(nof_prb)),
    }
}

/// Sample rate needed to capture a channel of `nof_prb` resource blocks.
pub fn sampling_rate_hz(nof_prb: u32) -> Result<u32, ReceiverError> {
    Ok(fft_size(nof_prb)? * 15_000)
}

/// Low-pass filter bandwidth for a channel, nominal width plus guard margin.
pub fn filter_bandwidth_hz(nof_prb: u32) -> u32 {
    (f64::from(nof_prb * PRB_WIDTH_HZ) * (1.0 + FILTER_GUARD_MARGIN)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_lte_rates() {
        assert_eq!(sampling_rate_hz(6).unwrap(), 1_920_000);
        assert_eq!(sampling_rate_hz(15).unwrap(), 3_840_000);
        assert_eq!(sampling_rate_hz(25).unwrap(), 7_680_000);
        assert_eq!(sampling_rate_hz(50).unwrap(), 15_360_000);
        assert_eq!(sampling_rate_hz(75).unwrap(), 23_040_000);
        assert_eq!(sampling_rate_hz(100).unwrap(), 30_720_000);
    }

    #[test]
    fn non_lte_widths_round_up() {
        // 6, 7 and 8 MHz broadcast carriers.
        assert_eq!(sampling_rate_hz(30).unwrap(), 15_360_000);
        assert_eq!(sampling_rate_hz(35).unwrap(), 15_360_000);
        assert_eq!(sampling_rate_hz(40).unwrap(), 15_360_000);
    }

    #[test]
    fn rejects_out_of_range_widths() {
        assert!(matches!(
            sampling_rate_hz(0),
            Err(ReceiverError::UnsupportedPrb(0))
        ));
        assert!(sampling_rate_hz(101).is_err());
    }

    #[test]
    fn filter_bandwidth_has_guard() {
        assert_eq!(filter_bandwidth_hz(25), 6_000_000);
        assert_eq!(filter_bandwidth_hz(40), 9_600_000);
    }

    #[test]
    fn broadcast_view_swaps_width() {
        let cell = CellGeometry {
            nof_prb: 25,
            mbsfn_prb: 40,
            mbsfn_area_id: 1,
            subcarrier_spacing: SubcarrierSpacing::Khz1_25,
        };
        let view = cell.broadcast_view();
        assert_eq!(view.nof_prb, 40);
        assert_eq!(view.mbsfn_prb, 40);
        assert_eq!(view.mbsfn_area_id, 1);
    }
}
