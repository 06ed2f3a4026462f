// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Broadcast-channel worker slots.
//!
//! Each slot owns one frame decoder and its receive buffer. A slot is handed
//! out as a [`SlotLease`]: the control thread takes the lease before writing
//! samples into the buffer, then either releases it (nothing to decode) or
//! moves it into a pool job, which releases it when decoding finishes.
//! While a lease exists nobody else can touch the buffer.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, LockResult, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::cell::{CellGeometry, SubcarrierSpacing};
use crate::error::ReceiverError;
use crate::tti::Tti;
use crate::Sample;

/// Subframe decoder with its own receive buffer.
pub trait FrameDecoder: Send {
    /// Reconfigure for a cell geometry.
    fn set_cell(&mut self, cell: &CellGeometry);

    /// Prepare the broadcast-specific reference signals.
    fn configure_broadcast_area(&mut self, _area_id: u8, _spacing: SubcarrierSpacing) {}

    /// Buffer the next subframe's samples are written into.
    fn rx_buffer(&mut self) -> &mut [Sample];

    /// Decode the buffered subframe. `true` when a transport block was decoded.
    fn decode(&mut self, tti: Tti) -> bool;

    /// Latest signal quality estimate in dB, if one is available.
    fn signal_quality(&self) -> Option<f32> {
        None
    }
}

struct SlotState {
    decoder: Box<dyn FrameDecoder>,
    configured_for: Option<CellGeometry>,
}

/// One broadcast-channel worker: a decoder guarded by a binary lock.
pub struct WorkerSlot {
    index: usize,
    busy: Mutex<bool>,
    freed: Condvar,
    state: Mutex<SlotState>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    overruns: AtomicU64,
}

impl std::fmt::Debug for WorkerSlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerSlot")
            .field("index", &self.index)
            .field("locked", &self.is_locked())
            .field("overruns", &self.overruns())
            .finish()
    }
}

fn relock<'a, T>(result: LockResult<MutexGuard<'a, T>>) -> MutexGuard<'a, T> {
    result.unwrap_or_else(PoisonError::into_inner)
}

impl WorkerSlot {
    pub fn new(index: usize, decoder: Box<dyn FrameDecoder>) -> Arc<Self> {
        Arc::new(Self {
            index,
            busy: Mutex::new(false),
            freed: Condvar::new(),
            state: Mutex::new(SlotState {
                decoder,
                configured_for: None,
            }),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
            overruns: AtomicU64::new(0),
        })
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Take the slot, blocking until a previous lease is released.
    ///
    /// Having to wait means the decoder fell a full dispatch cycle behind;
    /// that is counted as an overrun.
    pub fn acquire(self: &Arc<Self>) -> SlotLease {
        self.take(true)
    }

    /// Take the slot for reconfiguration. Waits like [`acquire`](Self::acquire)
    /// but a wait here is expected and not an overrun.
    pub fn reserve(self: &Arc<Self>) -> SlotLease {
        self.take(false)
    }

    fn take(self: &Arc<Self>, count_overrun: bool) -> SlotLease {
        let mut busy = relock(self.busy.lock());
        let overran = *busy && count_overrun;
        if overran {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            debug!("Worker {} still busy, waiting", self.index);
        }
        busy = relock(self.freed.wait_while(busy, |b| *b));
        *busy = true;
        SlotLease {
            slot: Arc::clone(self),
            overran,
        }
    }

    /// Take the slot only if it is free.
    pub fn try_acquire(self: &Arc<Self>) -> Option<SlotLease> {
        let mut busy = relock(self.busy.lock());
        if *busy {
            return None;
        }
        *busy = true;
        Some(SlotLease {
            slot: Arc::clone(self),
            overran: false,
        })
    }

    pub fn is_locked(&self) -> bool {
        *relock(self.busy.lock())
    }

    /// Block until the slot is free, without taking it.
    pub fn wait_released(&self) -> bool {
        let busy = relock(self.busy.lock());
        let waited = *busy;
        drop(relock(self.freed.wait_while(busy, |b| *b)));
        waited
    }

    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Highest number of concurrent decodes ever observed on this slot.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::Relaxed)
    }

    /// Geometry the decoder was last configured for.
    pub fn configured_for(&self) -> Option<CellGeometry> {
        relock(self.state.lock()).configured_for
    }

    fn release(&self) {
        let mut busy = relock(self.busy.lock());
        *busy = false;
        self.freed.notify_all();
    }
}

/// Exclusive access to one worker slot. Releases the slot when dropped.
pub struct SlotLease {
    slot: Arc<WorkerSlot>,
    overran: bool,
}

impl std::fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlotLease")
            .field("index", &self.slot.index)
            .field("overran", &self.overran)
            .finish()
    }
}

impl SlotLease {
    pub fn index(&self) -> usize {
        self.slot.index
    }

    /// Whether taking this lease had to wait for the previous one.
    pub fn overran(&self) -> bool {
        self.overran
    }

    /// Receive buffer of the leased decoder, handed to `fill`.
    pub fn with_buffer<R>(&mut self, fill: impl FnOnce(&mut [Sample]) -> R) -> R {
        let mut state = relock(self.slot.state.lock());
        fill(state.decoder.rx_buffer())
    }

    /// Apply `cell` to the decoder as is.
    pub fn set_cell(&mut self, cell: &CellGeometry) {
        let mut state = relock(self.slot.state.lock());
        state.decoder.set_cell(cell);
        state.configured_for = None;
    }

    /// Configure the decoder for `cell` unless it already is.
    /// Returns `true` when a reconfiguration happened.
    pub fn ensure_configured(&mut self, cell: &CellGeometry) -> bool {
        let mut state = relock(self.slot.state.lock());
        if state.configured_for.as_ref() == Some(cell) {
            return false;
        }
        let view = cell.broadcast_view();
        state.decoder.set_cell(&view);
        state
            .decoder
            .configure_broadcast_area(cell.mbsfn_area_id, cell.subcarrier_spacing);
        state.configured_for = Some(*cell);
        debug!(
            "Worker {} configured for {} PRB, area {}, {}",
            self.slot.index, view.nof_prb, cell.mbsfn_area_id, cell.subcarrier_spacing
        );
        true
    }

    /// Decode the buffered subframe and release the slot.
    pub fn decode(self, tti: Tti) -> DecodeOutcome {
        let slot = &self.slot;
        let now = slot.in_flight.fetch_add(1, Ordering::AcqRel) + 1;
        slot.peak_in_flight.fetch_max(now, Ordering::AcqRel);
        if now > 1 {
            warn!("Worker {} decoding {} subframes at once", slot.index, now);
        }
        let outcome = {
            let mut state = relock(slot.state.lock());
            let decoded = state.decoder.decode(tti);
            DecodeOutcome {
                decoded,
                signal_quality: state.decoder.signal_quality(),
            }
        };
        slot.in_flight.fetch_sub(1, Ordering::AcqRel);
        outcome
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        self.slot.release();
    }
}

/// Result of one decode job.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeOutcome {
    pub decoded: bool,
    pub signal_quality: Option<f32>,
}

/// The fixed set of broadcast-channel workers, indexed by dispatch cursor.
#[derive(Debug, Clone)]
pub struct WorkerSet {
    slots: Vec<Arc<WorkerSlot>>,
}

impl WorkerSet {
    pub fn new(decoders: Vec<Box<dyn FrameDecoder>>) -> Result<Self, ReceiverError> {
        if decoders.is_empty() {
            return Err(ReceiverError::NoWorkers);
        }
        let slots = decoders
            .into_iter()
            .enumerate()
            .map(|(index, decoder)| WorkerSlot::new(index, decoder))
            .collect();
        Ok(Self { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slot(&self, index: usize) -> &Arc<WorkerSlot> {
        &self.slots[index % self.slots.len()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<WorkerSlot>> {
        self.slots.iter()
    }

    /// Wait until every slot is unlocked. Returns how many had to be waited on.
    pub fn release_all(&self) -> usize {
        self.slots.iter().filter(|s| s.wait_released()).count()
    }

    pub fn total_overruns(&self) -> u64 {
        self.slots.iter().map(|s| s.overruns()).sum()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.slots
            .iter()
            .map(|s| s.peak_in_flight())
            .max()
            .unwrap_or(0)
    }
}
