// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Reception quality statistics and their periodic reporting.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::info;

use crate::phy::McastChannelInfo;

/// Number of recent CINR samples averaged into the reported value.
pub const CINR_WINDOW: usize = 100;

/// Subframes per second.
const TICKS_PER_SECOND: u64 = 1000;

/// Which decoded channel a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Dedicated downlink shared channel.
    Pdsch,
    /// Multicast control channel.
    Mcch,
    /// Multicast channel by index.
    Mch(usize),
}

/// Block counters for one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelStats {
    pub mcs: u8,
    pub errors: u64,
    pub total: u64,
    pub ber: f64,
}

impl ChannelStats {
    /// Block error rate, 0 when nothing has been received.
    pub fn bler(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 / self.total as f64
        }
    }

    fn columns(&self, out: &mut Vec<String>) {
        out.push(self.mcs.to_string());
        out.push(format!("{:.6}", self.bler()));
        out.push(format!("{:.6}", self.ber));
    }
}

/// Point-in-time copy of all counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    pub cinr_db: Option<f32>,
    pub pdsch: ChannelStats,
    pub mcch: ChannelStats,
    pub mch: Vec<ChannelStats>,
}

impl TelemetrySnapshot {
    /// Column layout of one measurement record: CINR, then MCS/BLER/BER for
    /// the dedicated channel, the control channel and each multicast channel
    /// preceded by its index.
    pub fn record_columns(&self) -> Vec<String> {
        let mut cols = Vec::with_capacity(7 + self.mch.len() * 4);
        cols.push(format!("{:.6}", self.cinr_db.unwrap_or(0.0)));
        self.pdsch.columns(&mut cols);
        self.mcch.columns(&mut cols);
        for (idx, mch) in self.mch.iter().enumerate() {
            cols.push(idx.to_string());
            mch.columns(&mut cols);
        }
        cols
    }
}

#[derive(Debug, Default)]
struct CollectorState {
    cinr: VecDeque<f32>,
    pdsch: ChannelStats,
    mcch: ChannelStats,
    mch: Vec<ChannelStats>,
}

/// Shared sink for quality figures, fed by decode jobs on any thread.
#[derive(Debug, Default)]
pub struct TelemetryCollector {
    state: Mutex<CollectorState>,
}

impl TelemetryCollector {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut CollectorState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    pub fn add_cinr_value(&self, db: f32) {
        self.with_state(|s| {
            if s.cinr.len() == CINR_WINDOW {
                s.cinr.pop_front();
            }
            s.cinr.push_back(db);
        });
    }

    /// Mean of the recent CINR samples.
    pub fn cinr_db(&self) -> Option<f32> {
        self.with_state(|s| {
            if s.cinr.is_empty() {
                None
            } else {
                Some(s.cinr.iter().sum::<f32>() / s.cinr.len() as f32)
            }
        })
    }

    /// Count one transport block on `kind`.
    pub fn record_block(&self, kind: ChannelKind, mcs: u8, ok: bool, ber: Option<f64>) {
        self.with_state(|s| {
            let stats = match kind {
                ChannelKind::Pdsch => &mut s.pdsch,
                ChannelKind::Mcch => &mut s.mcch,
                ChannelKind::Mch(idx) => {
                    if s.mch.len() <= idx {
                        s.mch.resize_with(idx + 1, ChannelStats::default);
                    }
                    &mut s.mch[idx]
                }
            };
            stats.mcs = mcs;
            stats.total += 1;
            if !ok {
                stats.errors += 1;
            }
            if let Some(ber) = ber {
                stats.ber = ber;
            }
        });
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        let cinr_db = self.cinr_db();
        self.with_state(|s| TelemetrySnapshot {
            cinr_db,
            pdsch: s.pdsch.clone(),
            mcch: s.mcch.clone(),
            mch: s.mch.clone(),
        })
    }
}

/// Destination for measurement records.
pub trait MeasurementSink: Send {
    fn write_record(&mut self, columns: &[String]);
}

/// Counts processing subframes and fires once per reporting interval.
#[derive(Debug, Clone)]
pub struct TelemetryCadence {
    interval: u64,
    ticks: u64,
}

impl TelemetryCadence {
    /// One subframe is one millisecond, so an interval of `secs` seconds is
    /// `secs * 1000` ticks. Zero is treated as one second.
    pub fn from_secs(secs: u32) -> Self {
        Self {
            interval: u64::from(secs.max(1)) * TICKS_PER_SECOND,
            ticks: 0,
        }
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Advance by one subframe. `true` when a report is due.
    pub fn tick(&mut self) -> bool {
        self.ticks += 1;
        self.ticks % self.interval == 0
    }
}

/// Logs a quality summary and optionally writes a measurement record
/// every reporting interval.
pub struct TelemetryReporter {
    cadence: TelemetryCadence,
    collector: Arc<TelemetryCollector>,
    sink: Option<Box<dyn MeasurementSink>>,
    reports: u64,
}

impl TelemetryReporter {
    pub fn new(
        cadence: TelemetryCadence,
        collector: Arc<TelemetryCollector>,
        sink: Option<Box<dyn MeasurementSink>>,
    ) -> Self {
        Self {
            cadence,
            collector,
            sink,
            reports: 0,
        }
    }

    pub fn collector(&self) -> &Arc<TelemetryCollector> {
        &self.collector
    }

    pub fn reports(&self) -> u64 {
        self.reports
    }

    /// Account for one processing subframe. When the interval elapses the
    /// channel list is fetched, the summary logged and a snapshot returned.
    pub fn on_subframe(
        &mut self,
        channels: impl FnOnce() -> Vec<McastChannelInfo>,
    ) -> Option<TelemetrySnapshot> {
        if !self.cadence.tick() {
            return None;
        }
        let mut snapshot = self.collector.snapshot();
        let channels = channels();
        if !channels.is_empty() {
            snapshot.mch.truncate(channels.len());
        }
        for (idx, info) in channels.iter().enumerate() {
            if let Some(stats) = snapshot.mch.get_mut(idx) {
                stats.mcs = info.mcs;
            } else {
                snapshot.mch.push(ChannelStats {
                    mcs: info.mcs,
                    ..ChannelStats::default()
                });
            }
        }
        self.log(&snapshot, &channels);
        if let Some(sink) = self.sink.as_mut() {
            sink.write_record(&snapshot.record_columns());
        }
        self.reports += 1;
        Some(snapshot)
    }

    fn log(&self, snapshot: &TelemetrySnapshot, channels: &[McastChannelInfo]) {
        match snapshot.cinr_db {
            Some(cinr) => info!("CINR {:.2} dB", cinr),
            None => info!("CINR n/a"),
        }
        info!(
            "PDSCH: MCS {}, BLER {:.4}, BER {:.4}",
            snapshot.pdsch.mcs,
            snapshot.pdsch.bler(),
            snapshot.pdsch.ber
        );
        info!(
            "MCCH: MCS {}, BLER {:.4}, BER {:.4}",
            snapshot.mcch.mcs,
            snapshot.mcch.bler(),
            snapshot.mcch.ber
        );
        for (idx, stats) in snapshot.mch.iter().enumerate() {
            info!(
                "MCH {}: MCS {}, BLER {:.4}, BER {:.4}",
                idx,
                stats.mcs,
                stats.bler(),
                stats.ber
            );
            if let Some(info) = channels.get(idx) {
                for mtch in &info.mtchs {
                    info!(
                        "    MTCH {}: LCID {}, TMGI 0x{}, {}",
                        idx, mtch.lcid, mtch.tmgi, mtch.dest
                    );
                }
            }
        }
    }
}
