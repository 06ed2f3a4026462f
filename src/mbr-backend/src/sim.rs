// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Simulated physical layer for dry runs without a real PHY library.
//!
//! The simulation "finds" a cell as soon as the radio delivers samples,
//! learns the broadcast schedule after a configurable number of frames and
//! can announce a wider broadcast channel at that point. Decoders measure
//! the power of their buffer and count blocks in the telemetry collector.

use std::sync::Arc;

use tracing::debug;

use mbr_core::cell::{self, CellGeometry};
use mbr_core::phy::{McastChannelInfo, McastTrafficInfo, PhyEngine, UpperLayer};
use mbr_core::radio::RadioSource;
use mbr_core::telemetry::{ChannelKind, TelemetryCollector};
use mbr_core::worker::FrameDecoder;
use mbr_core::{Sample, Tti};

/// Reference power for the simulated CINR estimate.
const NOISE_FLOOR: f32 = 1e-3;
/// Modulation and coding scheme reported for every simulated block.
const SIM_MCS: u8 = 9;

/// Samples in one subframe of a channel `nof_prb` wide.
pub fn samples_per_subframe(nof_prb: u32) -> usize {
    cell::sampling_rate_hz(nof_prb)
        .map(|rate| rate as usize / 1000)
        .unwrap_or(1920)
}

#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Dedicated channel width reported by cell search.
    pub nof_prb: u32,
    /// Broadcast width announced once the schedule is known.
    pub mbsfn_prb: Option<u32>,
    /// Frames to retrieve before the broadcast schedule is known.
    pub schedule_after_frames: u64,
    /// TTI reported by subframe synchronization.
    pub sync_tti: Tti,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            nof_prb: 25,
            mbsfn_prb: None,
            schedule_after_frames: 40,
            sync_tti: Tti::new(0),
        }
    }
}

pub struct SimulatedPhy {
    config: SimConfig,
    cell: Option<CellGeometry>,
    tti: Tti,
    frames: u64,
    schedule_known: bool,
    scratch: Vec<Sample>,
}

impl SimulatedPhy {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            cell: None,
            tti: Tti::default(),
            frames: 0,
            schedule_known: false,
            scratch: Vec::new(),
        }
    }

    fn read_subframe(&mut self, radio: &mut dyn RadioSource, nof_prb: u32) -> bool {
        self.scratch
            .resize(samples_per_subframe(nof_prb), Sample::default());
        matches!(radio.read_samples(&mut self.scratch), Ok(n) if n == self.scratch.len())
    }
}

impl PhyEngine for SimulatedPhy {
    fn cell_search(&mut self, radio: &mut dyn RadioSource) -> bool {
        if !self.read_subframe(radio, self.config.nof_prb) {
            return false;
        }
        self.cell = Some(CellGeometry::new(self.config.nof_prb));
        true
    }

    fn synchronize_subframe(&mut self, radio: &mut dyn RadioSource) -> bool {
        let Some(cell) = self.cell else {
            return false;
        };
        if !self.read_subframe(radio, cell.nof_prb.max(cell.mbsfn_prb)) {
            return false;
        }
        self.tti = self.config.sync_tti;
        true
    }

    fn next_frame(&mut self, radio: &mut dyn RadioSource, buf: &mut [Sample]) -> bool {
        let Some(cell) = self.cell.as_mut() else {
            return false;
        };
        if !matches!(radio.read_samples(buf), Ok(n) if n == buf.len()) {
            return false;
        }
        self.frames += 1;
        if !self.schedule_known && self.frames >= self.config.schedule_after_frames {
            self.schedule_known = true;
            if let Some(prb) = self.config.mbsfn_prb {
                cell.mbsfn_prb = prb;
            }
            debug!("Simulated broadcast schedule received");
        }
        true
    }

    fn tti(&self) -> Tti {
        self.tti
    }

    fn cell(&self) -> CellGeometry {
        self.cell
            .unwrap_or_else(|| CellGeometry::new(self.config.nof_prb))
    }

    fn set_cell_geometry(&mut self, cell: CellGeometry) {
        self.cell = Some(cell);
    }

    /// Dedicated channel in subframe 0 of every fourth frame.
    fn is_dedicated_subframe(&self, tti: Tti) -> bool {
        tti.frame() % 4 == 0 && tti.subframe() == 0
    }

    fn is_broadcast_subframe(&self, tti: Tti) -> bool {
        self.schedule_known && !self.is_dedicated_subframe(tti)
    }

    fn broadcast_schedule_known(&self) -> bool {
        self.schedule_known
    }

    fn reset(&mut self) {
        self.cell = None;
        self.frames = 0;
        self.schedule_known = false;
    }

    fn multicast_channels(&self) -> Vec<McastChannelInfo> {
        if !self.schedule_known {
            return Vec::new();
        }
        vec![McastChannelInfo {
            mcs: SIM_MCS,
            mtchs: vec![McastTrafficInfo {
                lcid: 1,
                tmgi: "00000009f165".to_string(),
                dest: "238.1.1.95:40085".to_string(),
            }],
        }]
    }
}

/// Decoder that estimates signal power and counts blocks.
pub struct SimulatedDecoder {
    kind: ChannelKind,
    collector: Arc<TelemetryCollector>,
    buffer: Vec<Sample>,
    cinr_db: Option<f32>,
}

impl SimulatedDecoder {
    pub fn new(kind: ChannelKind, collector: Arc<TelemetryCollector>) -> Self {
        Self {
            kind,
            collector,
            buffer: vec![Sample::default(); samples_per_subframe(6)],
            cinr_db: None,
        }
    }
}

impl FrameDecoder for SimulatedDecoder {
    fn set_cell(&mut self, cell: &CellGeometry) {
        let len = samples_per_subframe(cell.nof_prb.max(cell.mbsfn_prb));
        self.buffer.resize(len, Sample::default());
    }

    fn rx_buffer(&mut self) -> &mut [Sample] {
        &mut self.buffer
    }

    fn decode(&mut self, _tti: Tti) -> bool {
        let power = self.buffer.iter().map(|s| s.norm_sqr()).sum::<f32>() / self.buffer.len() as f32;
        let ok = power > NOISE_FLOOR;
        self.cinr_db = ok.then(|| 10.0 * (power / NOISE_FLOOR).log10());
        self.collector.record_block(self.kind, SIM_MCS, ok, Some(0.0));
        ok
    }

    fn signal_quality(&self) -> Option<f32> {
        self.cinr_db
    }
}

/// Upper layers with nothing to forget.
#[derive(Debug, Default)]
pub struct SimulatedUpper {
    resets: u64,
}

impl SimulatedUpper {
    pub fn resets(&self) -> u64 {
        self.resets
    }
}

impl UpperLayer for SimulatedUpper {
    fn reset(&mut self) {
        self.resets += 1;
        debug!("Upper layers reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DummyRadio, FileSource};
    use mbr_core::params::{param_channel, FrequencyPlan, RuntimeParameters};
    use mbr_core::pool::WorkerPool;
    use mbr_core::receiver::{Collaborators, ControlOptions, ReceiverControl, ReceiverState};
    use mbr_core::telemetry::{TelemetryCadence, TelemetryReporter};
    use std::io::Write;
    use std::time::Duration;

    fn receiver(
        radio: Box<dyn RadioSource>,
        sim: SimConfig,
        configure: impl FnOnce(&mut ControlOptions),
    ) -> (ReceiverControl, Arc<TelemetryCollector>) {
        let collector = Arc::new(TelemetryCollector::new());
        let workers: Vec<Box<dyn FrameDecoder>> = (0..3)
            .map(|_| {
                Box::new(SimulatedDecoder::new(ChannelKind::Mch(0), Arc::clone(&collector)))
                    as Box<dyn FrameDecoder>
            })
            .collect();
        let parts = Collaborators {
            radio,
            phy: Box::new(SimulatedPhy::new(sim)),
            upper: Box::new(SimulatedUpper::default()),
            dedicated: Box::new(SimulatedDecoder::new(ChannelKind::Pdsch, Arc::clone(&collector))),
            workers,
        };
        let mut options = ControlOptions::new(
            RuntimeParameters::default(),
            FrequencyPlan::new(vec![667_000_000], 10).unwrap(),
        );
        options.backoff = Duration::ZERO;
        configure(&mut options);
        let telemetry = TelemetryReporter::new(
            TelemetryCadence::from_secs(1),
            Arc::clone(&collector),
            None,
        );
        let (_updater, requests) = param_channel();
        let pool = WorkerPool::new(2, None).unwrap();
        let mut control = ReceiverControl::new(parts, pool, telemetry, requests, options).unwrap();
        control.tune_initial().unwrap();
        (control, collector)
    }

    fn step_until(control: &mut ReceiverControl, state: ReceiverState, limit: usize) -> bool {
        (0..limit).any(|_| control.step() == state)
    }

    #[test]
    fn dry_run_decodes_both_channels() {
        let (mut control, collector) =
            receiver(Box::new(DummyRadio::new()), SimConfig::default(), |_| {});
        let status = control.subscribe();
        assert!(step_until(&mut control, ReceiverState::Processing, 4));
        assert_eq!(control.params().sample_rate_hz, 7_680_000);
        for _ in 0..2000 {
            control.step();
        }
        control.shutdown();

        assert_eq!(control.state(), ReceiverState::Processing);
        let snap = collector.snapshot();
        assert!(snap.pdsch.total > 0);
        assert!(snap.mch[0].total > 0);
        assert_eq!(snap.pdsch.bler(), 0.0);
        assert!(snap.cinr_db.unwrap() > 20.0);
        assert!(control.counters().decoded > 0);
        assert!(control.counters().discarded > 0);
        assert!(status.borrow().telemetry.is_some());
    }

    #[test]
    fn wider_broadcast_channel_triggers_retune() {
        let sim = SimConfig {
            mbsfn_prb: Some(40),
            schedule_after_frames: 10,
            ..SimConfig::default()
        };
        let (mut control, _) = receiver(Box::new(DummyRadio::new()), sim, |_| {});
        assert!(step_until(&mut control, ReceiverState::Processing, 4));
        assert!(step_until(&mut control, ReceiverState::Syncing, 200));
        assert_eq!(control.params().sample_rate_hz, 15_360_000);
        assert_eq!(control.params().filter_bandwidth_hz, 9_600_000);
        assert!(step_until(&mut control, ReceiverState::Processing, 2));
        for _ in 0..500 {
            assert_eq!(control.step(), ReceiverState::Processing);
        }
        control.shutdown();
        assert_eq!(control.counters().recoveries, 0);
    }

    #[test]
    fn capture_playback_keeps_rate() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..20_000u32 {
            let phase = i as f32 * 0.1;
            file.write_all(&(0.5 * phase.cos()).to_le_bytes()).unwrap();
            file.write_all(&(0.5 * phase.sin()).to_le_bytes()).unwrap();
        }
        file.flush().unwrap();

        let radio = Box::new(FileSource::open(file.path()).unwrap());
        let (mut control, collector) = receiver(radio, SimConfig::default(), |o| {
            o.capture_prb = Some(50);
        });
        assert!(step_until(&mut control, ReceiverState::Processing, 4));
        assert_eq!(control.params().sample_rate_hz, 7_680_000);
        for _ in 0..200 {
            control.step();
        }
        control.shutdown();
        assert_eq!(control.state(), ReceiverState::Processing);
        assert!(collector.snapshot().pdsch.total > 0);
    }

    #[test]
    fn silent_radio_fails_decode() {
        let collector = Arc::new(TelemetryCollector::new());
        let mut decoder = SimulatedDecoder::new(ChannelKind::Mcch, Arc::clone(&collector));
        decoder.set_cell(&CellGeometry::new(6));
        assert!(!decoder.decode(Tti::new(1)));
        assert_eq!(decoder.signal_quality(), None);
        assert_eq!(collector.snapshot().mcch.bler(), 1.0);
    }

    #[test]
    fn reset_forgets_cell() {
        let mut phy = SimulatedPhy::new(SimConfig::default());
        let mut radio = DummyRadio::new();
        radio.start().unwrap();
        assert!(phy.cell_search(&mut radio));
        assert!(phy.synchronize_subframe(&mut radio));
        phy.reset();
        assert!(!phy.synchronize_subframe(&mut radio));
        assert!(phy.multicast_channels().is_empty());
    }
}
