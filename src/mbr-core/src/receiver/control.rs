// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! The receiver control loop.
//!
//! One thread owns a [`ReceiverControl`] and calls [`ReceiverControl::step`]
//! until shutdown. Searching and Syncing block for as long as acquisition
//! takes; a Processing step handles exactly one subframe.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::cell::{self, CellGeometry};
use crate::error::ReceiverError;
use crate::params::{FrequencyPlan, ParamWatch, RuntimeParameters};
use crate::phy::{PhyEngine, UpperLayer};
use crate::pool::WorkerPool;
use crate::radio::RadioSource;
use crate::telemetry::{TelemetryReporter, TelemetrySnapshot};
use crate::tti::Tti;
use crate::worker::{FrameDecoder, SlotLease, WorkerSet, WorkerSlot};

use super::dispatch::DispatchCursor;
use super::events::{ListenerId, ReceiverEventEmitter, ReceiverListener};
use super::machine::{FailureCause, ReceiverEvent, ReceiverState, ReceiverStateMachine};
use super::policies::{FixedDelay, RetryPolicy};
use super::status::{ReceiverCounters, ReceiverStatus};

/// The external parts the control loop drives.
pub struct Collaborators {
    pub radio: Box<dyn RadioSource>,
    pub phy: Box<dyn PhyEngine>,
    pub upper: Box<dyn UpperLayer>,
    /// Decoder for dedicated-channel subframes.
    pub dedicated: Box<dyn FrameDecoder>,
    /// One decoder per broadcast-channel worker slot.
    pub workers: Vec<Box<dyn FrameDecoder>>,
}

#[derive(Debug, Clone)]
pub struct ControlOptions {
    /// Initial radio settings; the sample rate is the acquisition rate.
    pub params: RuntimeParameters,
    pub plan: FrequencyPlan,
    /// Subframe synchronization attempts per acquisition.
    pub sync_attempts: u32,
    /// Pause after a failed search, exhausted sync or recovery.
    pub backoff: Duration,
    /// Channel width of a recorded capture. When set the sample rate is
    /// never changed and the PHY decodes the dedicated channel out of the
    /// wider capture.
    pub capture_prb: Option<u32>,
}

impl ControlOptions {
    pub fn new(params: RuntimeParameters, plan: FrequencyPlan) -> Self {
        Self {
            params,
            plan,
            sync_attempts: 200,
            backoff: Duration::from_secs(1),
            capture_prb: None,
        }
    }
}

pub struct ReceiverControl {
    machine: ReceiverStateMachine,
    radio: Box<dyn RadioSource>,
    phy: Box<dyn PhyEngine>,
    upper: Box<dyn UpperLayer>,
    dedicated: Arc<WorkerSlot>,
    workers: WorkerSet,
    cursor: DispatchCursor,
    pool: WorkerPool,
    telemetry: TelemetryReporter,
    requests: ParamWatch,
    params: RuntimeParameters,
    search_sample_rate_hz: u32,
    plan: FrequencyPlan,
    sync_policy: FixedDelay,
    backoff: Duration,
    capture_prb: Option<u32>,
    tti: Tti,
    cell: Option<CellGeometry>,
    tracked_mbsfn_prb: u32,
    counters: ReceiverCounters,
    decoded: Arc<AtomicU64>,
    last_snapshot: Option<TelemetrySnapshot>,
    status_tx: watch::Sender<ReceiverStatus>,
    emitter: ReceiverEventEmitter,
}

impl ReceiverControl {
    pub fn new(
        parts: Collaborators,
        pool: WorkerPool,
        telemetry: TelemetryReporter,
        requests: ParamWatch,
        options: ControlOptions,
    ) -> Result<Self, ReceiverError> {
        let workers = WorkerSet::new(parts.workers)?;
        let cursor = DispatchCursor::new(workers.len());
        let (status_tx, _) = watch::channel(ReceiverStatus {
            params: options.params.clone(),
            ..ReceiverStatus::default()
        });
        Ok(Self {
            machine: ReceiverStateMachine::new(),
            radio: parts.radio,
            phy: parts.phy,
            upper: parts.upper,
            dedicated: WorkerSlot::new(workers.len(), parts.dedicated),
            workers,
            cursor,
            pool,
            telemetry,
            requests,
            search_sample_rate_hz: options.params.sample_rate_hz,
            params: options.params,
            plan: options.plan,
            sync_policy: FixedDelay::new(options.sync_attempts, options.backoff),
            backoff: options.backoff,
            capture_prb: options.capture_prb,
            tti: Tti::default(),
            cell: None,
            tracked_mbsfn_prb: 0,
            counters: ReceiverCounters::default(),
            decoded: Arc::new(AtomicU64::new(0)),
            last_snapshot: None,
            status_tx,
            emitter: ReceiverEventEmitter::new(),
        })
    }

    pub fn state(&self) -> ReceiverState {
        self.machine.state()
    }

    pub fn tti(&self) -> Tti {
        self.tti
    }

    pub fn params(&self) -> &RuntimeParameters {
        &self.params
    }

    pub fn counters(&self) -> ReceiverCounters {
        ReceiverCounters {
            decoded: self.decoded.load(Ordering::Relaxed),
            ..self.counters.clone()
        }
    }

    pub fn workers(&self) -> &WorkerSet {
        &self.workers
    }

    /// Index of the broadcast worker the next broadcast subframe goes to.
    pub fn dispatch_position(&self) -> usize {
        self.cursor.current()
    }

    /// Status updates, published on every transition and telemetry report.
    pub fn subscribe(&self) -> watch::Receiver<ReceiverStatus> {
        self.status_tx.subscribe()
    }

    pub fn register_listener(&mut self, listener: Arc<dyn ReceiverListener>) -> ListenerId {
        self.emitter.register(listener)
    }

    pub fn unregister_listener(&mut self, id: ListenerId) {
        self.emitter.unregister(id);
    }

    /// Tune the radio to the first candidate frequency it accepts and start it.
    pub fn tune_initial(&mut self) -> Result<(), ReceiverError> {
        let candidates = self.plan.candidates().to_vec();
        let mut tuned = None;
        for (idx, freq) in candidates.iter().enumerate() {
            self.params.center_frequency_hz = *freq;
            self.params.sample_rate_hz = self.search_sample_rate_hz;
            match self.radio.tune(&self.params) {
                Ok(()) => {
                    tuned = Some(idx);
                    break;
                }
                Err(e) => warn!("Tuning {} to {} Hz failed: {}", self.radio.name(), freq, e),
            }
        }
        let idx = tuned.ok_or(ReceiverError::NoTunableFrequency(candidates.len()))?;
        self.plan.select(idx);
        info!(
            "Tuned {} to {} Hz, {} Hz sample rate",
            self.radio.name(),
            self.params.center_frequency_hz,
            self.params.sample_rate_hz
        );
        self.radio
            .start()
            .map_err(|e| ReceiverError::Radio(self.radio.name().to_string(), e.to_string()))?;
        self.publish_status();
        Ok(())
    }

    /// Run until `shutdown` is raised, then stop the radio and drain the pool.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        info!("Receiver control loop started in {}", self.state());
        while !shutdown.load(Ordering::Relaxed) {
            self.step();
        }
        self.shutdown();
        info!("Receiver control loop stopped");
    }

    /// Stop the radio and wait for queued decodes to finish.
    pub fn shutdown(&mut self) {
        self.radio.stop();
        self.pool.shutdown();
    }

    /// Perform one unit of work in the current state.
    pub fn step(&mut self) -> ReceiverState {
        match self.machine.state() {
            ReceiverState::Searching => self.search(),
            ReceiverState::Syncing => self.synchronize(),
            ReceiverState::Processing => self.process_subframe(),
        }
        self.machine.state()
    }

    fn search(&mut self) {
        if let Some(req) = self.requests.take() {
            info!(
                "Applying new parameters: fc {} Hz, bw {} Hz at {} Hz acquisition rate",
                req.frequency_hz, req.bandwidth_hz, self.search_sample_rate_hz
            );
            self.radio.stop();
            self.params.apply(&req);
            self.params.sample_rate_hz = self.search_sample_rate_hz;
            self.plan.pin(req.frequency_hz);
            self.retune();
            self.start_radio();
        }

        self.radio.set_recording(false);
        self.radio.clear_buffer();

        let found = self.phy.cell_search(self.radio.as_mut());
        if let Some(next) = self.plan.record_search(found) {
            info!("No cell found, moving on to {} Hz", next);
            self.radio.stop();
            self.params.center_frequency_hz = next;
            self.params.sample_rate_hz = self.search_sample_rate_hz;
            self.retune();
            self.start_radio();
        }
        if !found {
            debug!("No cell found at {} Hz", self.params.center_frequency_hz);
            thread::sleep(self.backoff);
            return;
        }

        let mut cell = self.phy.cell();
        info!(
            "Found cell with {} PRB ({} MHz)",
            cell.nof_prb,
            CellGeometry::width_mhz(cell.nof_prb)
        );
        match self.capture_prb {
            Some(prb) => {
                cell.mbsfn_prb = prb;
                self.phy.set_cell_geometry(cell);
                self.tracked_mbsfn_prb = prb;
            }
            None => {
                let rate = match cell::sampling_rate_hz(cell.nof_prb) {
                    Ok(rate) => rate,
                    Err(e) => {
                        warn!("{}", e);
                        thread::sleep(self.backoff);
                        return;
                    }
                };
                info!(
                    "Setting sample rate {} MHz for {} PRB / {} MHz channel width",
                    f64::from(rate) / 1e6,
                    cell.nof_prb,
                    CellGeometry::width_mhz(cell.nof_prb)
                );
                self.radio.stop();
                self.params.sample_rate_hz = rate;
                self.params.filter_bandwidth_hz = cell::filter_bandwidth_hz(cell.nof_prb);
                self.retune();
                self.start_radio();
                self.tracked_mbsfn_prb = cell.nof_prb;
            }
        }
        self.cell = Some(cell);
        self.transition(ReceiverEvent::CellFound {
            nof_prb: cell.nof_prb,
        });
    }

    fn synchronize(&mut self) {
        debug!("Synchronizing subframe");
        let mut attempts = 0;
        let locked = loop {
            if self.phy.synchronize_subframe(self.radio.as_mut()) {
                break true;
            }
            attempts += 1;
            if !self.sync_policy.should_retry(attempts) {
                break false;
            }
        };

        if !locked {
            warn!(
                "Synchronization failed after {} attempts. Going back to search state.",
                attempts
            );
            self.transition(ReceiverEvent::SyncExhausted { attempts });
            thread::sleep(self.sync_policy.delay(attempts));
            return;
        }

        self.tti = self.phy.tti();
        info!(
            "Decoded MIB at target sample rate, TTI is {}. Subframe synchronized.",
            self.tti
        );
        let cell = self.phy.cell();
        self.cell = Some(cell);
        self.dedicated.reserve().set_cell(&cell);
        let waited = self.workers.release_all();
        if waited > 0 {
            debug!("Waited for {} broadcast workers to finish", waited);
        }
        self.upper.reset();
        self.transition(ReceiverEvent::Synchronized { tti: self.tti });
        self.radio.set_recording(true);
    }

    fn process_subframe(&mut self) {
        let tti = self.tti.advance();
        if self.phy.is_dedicated_subframe(tti) {
            self.dispatch_dedicated(tti);
        } else {
            self.dispatch_broadcast(tti);
        }

        let phy = &self.phy;
        if let Some(snapshot) = self.telemetry.on_subframe(|| phy.multicast_channels()) {
            self.last_snapshot = Some(snapshot);
            self.publish_status();
        }
    }

    /// Fill a leased buffer with the next subframe. A pending parameter
    /// change counts as a failed read so it is applied from Searching.
    fn fill(&mut self, lease: &mut SlotLease) -> Option<FailureCause> {
        if self.requests.is_pending() {
            return Some(FailureCause::ParametersChanged);
        }
        let phy = &mut self.phy;
        let radio = &mut self.radio;
        if lease.with_buffer(|buf| phy.next_frame(radio.as_mut(), buf)) {
            None
        } else {
            Some(FailureCause::FrameLost)
        }
    }

    fn dispatch_dedicated(&mut self, tti: Tti) {
        let mut lease = self.dedicated.acquire();
        if lease.overran() {
            self.note_overrun(lease.index());
        }
        if let Some(cause) = self.fill(&mut lease) {
            drop(lease);
            self.recover(cause);
            return;
        }

        debug!("Sending TTI {} to dedicated-channel decoder", tti);
        let collector = Arc::clone(self.telemetry.collector());
        let decoded = Arc::clone(&self.decoded);
        let job = move || {
            let outcome = lease.decode(tti);
            if outcome.decoded {
                decoded.fetch_add(1, Ordering::Relaxed);
                if let Some(cinr) = outcome.signal_quality {
                    collector.add_cinr_value(cinr);
                }
            }
        };
        if let Err(e) = self.pool.submit(job) {
            error!("Dedicated-channel decode for TTI {}: {}", tti, e);
            self.recover(FailureCause::DispatchFailed);
            return;
        }

        let reported = self.phy.cell().mbsfn_prb;
        if reported != self.tracked_mbsfn_prb {
            self.extend_bandwidth(reported);
        }
    }

    fn dispatch_broadcast(&mut self, tti: Tti) {
        let index = self.cursor.advance();
        let slot = Arc::clone(self.workers.slot(index));
        let mut lease = slot.acquire();
        if lease.overran() {
            self.note_overrun(index);
        }

        if let Some(cause) = self.fill(&mut lease) {
            drop(lease);
            self.recover(cause);
            return;
        }

        if !(self.phy.broadcast_schedule_known() && self.phy.is_broadcast_subframe(tti)) {
            // Nothing scheduled yet; drop the samples.
            drop(lease);
            self.counters.discarded += 1;
            return;
        }

        lease.ensure_configured(&self.phy.cell());
        debug!("Sending TTI {} to broadcast worker {}", tti, index);
        let decoded = Arc::clone(&self.decoded);
        let job = move || {
            if lease.decode(tti).decoded {
                decoded.fetch_add(1, Ordering::Relaxed);
            }
        };
        if let Err(e) = self.pool.submit(job) {
            error!("Broadcast decode for TTI {} on worker {}: {}", tti, index, e);
            self.recover(FailureCause::DispatchFailed);
        }
    }

    /// Resize the radio for a wider broadcast channel and relock.
    fn extend_bandwidth(&mut self, mbsfn_prb: u32) {
        let rate = match cell::sampling_rate_hz(mbsfn_prb) {
            Ok(rate) => rate,
            Err(e) => {
                warn!("{}", e);
                self.recover(FailureCause::UnsupportedWidth);
                return;
            }
        };
        info!(
            "Setting sample rate {} MHz for broadcast channel with {} PRB / {} MHz channel width",
            f64::from(rate) / 1e6,
            mbsfn_prb,
            CellGeometry::width_mhz(mbsfn_prb)
        );
        self.tracked_mbsfn_prb = mbsfn_prb;
        self.radio.stop();
        self.params.sample_rate_hz = rate;
        self.params.filter_bandwidth_hz = cell::filter_bandwidth_hz(mbsfn_prb);
        self.retune();

        let cell = self.phy.cell();
        self.phy.set_cell_geometry(cell);
        self.dedicated.reserve().set_cell(&cell);
        self.cell = Some(cell);

        self.start_radio();
        info!("Synchronizing subframe after PRB extension");
        self.transition(ReceiverEvent::BandwidthChanged { mbsfn_prb });
    }

    /// The single path back to Searching after anything goes wrong while
    /// processing.
    fn recover(&mut self, cause: FailureCause) {
        warn!("{}. Going back to search state.", cause);
        self.radio.stop();
        self.params.sample_rate_hz = self.search_sample_rate_hz;
        self.retune();
        self.start_radio();
        self.upper.reset();
        self.phy.reset();
        self.cell = None;
        self.counters.recoveries += 1;
        self.emitter.notify_recovery(cause);
        self.transition(ReceiverEvent::Failure(cause));
        thread::sleep(self.backoff);
    }

    fn retune(&mut self) {
        if let Err(e) = self.radio.tune(&self.params) {
            warn!("Retuning {} failed: {}", self.radio.name(), e);
        }
        self.counters.retunes += 1;
        self.emitter.notify_retune(&self.params);
    }

    fn start_radio(&mut self) {
        if let Err(e) = self.radio.start() {
            warn!("Starting {} failed: {}", self.radio.name(), e);
        }
    }

    fn note_overrun(&mut self, worker: usize) {
        warn!("Worker {} overrun: previous decode still running", worker);
        self.counters.overruns += 1;
        self.emitter.notify_overrun(worker);
        self.publish_status();
    }

    fn transition(&mut self, event: ReceiverEvent) {
        if let Some(old) = self.machine.process_event(&event) {
            let new = self.machine.state();
            info!("Receiver {} -> {}", old, new);
            self.emitter.notify_state_change(old, new);
            self.publish_status();
        }
    }

    fn publish_status(&self) {
        let status = ReceiverStatus {
            state: self.machine.state(),
            tti: (self.machine.state() == ReceiverState::Processing).then_some(self.tti),
            params: self.params.clone(),
            cell: self.cell,
            counters: self.counters(),
            telemetry: self.last_snapshot.clone(),
        };
        self.status_tx.send_replace(status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::receiver::testkit::{Harness, RadioCall};
    use crate::params::ParamRequest;
    use std::sync::Mutex;

    fn to_processing(h: &mut Harness) {
        assert_eq!(h.control.step(), ReceiverState::Syncing);
        assert_eq!(h.control.step(), ReceiverState::Processing);
    }

    fn step_until(h: &mut Harness, state: ReceiverState, limit: usize) -> bool {
        (0..limit).any(|_| h.control.step() == state)
    }

    #[test]
    fn reaches_processing_after_search_and_sync() {
        let mut h = Harness::new(3);
        h.phy.lock().unwrap().sync.extend([false, false, false, true]);
        h.phy.lock().unwrap().tti_at_sync = Tti::new(4242);
        to_processing(&mut h);
        assert_eq!(h.phy.lock().unwrap().sync_calls, 4);
        assert_eq!(h.control.tti(), Tti::new(4242));
        assert_eq!(h.upper_resets(), 1);
        assert!(h.radio_calls().contains(&RadioCall::Recording(true)));
    }

    #[test]
    fn sync_budget_exhaustion_returns_to_search() {
        let mut h = Harness::new(2);
        h.phy.lock().unwrap().sync.extend(std::iter::repeat(false).take(250));
        assert_eq!(h.control.step(), ReceiverState::Syncing);
        assert_eq!(h.control.step(), ReceiverState::Searching);
        assert_eq!(h.phy.lock().unwrap().sync_calls, 200);
    }

    #[test]
    fn failed_search_stays_searching() {
        let mut h = Harness::new(2);
        h.phy.lock().unwrap().search.extend([false, false]);
        assert_eq!(h.control.step(), ReceiverState::Searching);
        assert_eq!(h.control.step(), ReceiverState::Searching);
        assert_eq!(h.control.step(), ReceiverState::Syncing);
    }

    #[test]
    fn cell_found_retunes_to_channel_rate() {
        let mut h = Harness::new(2);
        h.phy.lock().unwrap().cell = CellGeometry::new(25);
        h.control.step();
        let tune = h.last_tune().unwrap();
        assert_eq!(tune.sample_rate_hz, 7_680_000);
        assert_eq!(tune.filter_bandwidth_hz, 6_000_000);
        assert!(h.radio_calls().contains(&RadioCall::Recording(false)));
    }

    #[test]
    fn capture_mode_keeps_sample_rate() {
        let mut h = Harness::with_options(2, |o| o.capture_prb = Some(50));
        let tunes_before = h.tunes().len();
        assert_eq!(h.control.step(), ReceiverState::Syncing);
        assert_eq!(h.tunes().len(), tunes_before);
        assert_eq!(h.phy.lock().unwrap().cell.mbsfn_prb, 50);
        assert_eq!(h.phy.lock().unwrap().cell.nof_prb, 15);
    }

    #[test]
    fn dispatch_cursor_cycles_regardless_of_schedule() {
        let mut h = Harness::new(3);
        to_processing(&mut h);
        // Schedule unknown: every broadcast subframe is discarded.
        for _ in 0..20 {
            h.control.step();
        }
        h.phy.lock().unwrap().schedule_known = true;
        h.decode.lock().unwrap().results.extend([false; 5]);
        for _ in 0..20 {
            h.control.step();
        }
        h.control.shutdown();

        let order = h.buffer_fills.lock().unwrap().clone();
        assert_eq!(order.len(), 32);
        for (i, worker) in order.iter().enumerate() {
            assert_eq!(*worker, i % 3, "fill {} went to worker {}", i, worker);
        }
        let counters = h.control.counters();
        assert_eq!(counters.discarded, 16);
        // 16 broadcast decodes, 5 of them failing, plus 8 dedicated.
        assert_eq!(counters.decoded, 16 - 5 + 8);
    }

    #[test]
    fn busy_worker_counts_overrun() {
        struct Overruns(Mutex<Vec<usize>>);
        impl ReceiverListener for Overruns {
            fn on_overrun(&self, worker: usize) {
                self.0.lock().unwrap().push(worker);
            }
        }

        let mut h = Harness::new(1);
        h.phy.lock().unwrap().schedule_known = true;
        h.decode.lock().unwrap().delay = Duration::from_millis(30);
        let recorder = Arc::new(Overruns(Mutex::new(Vec::new())));
        h.control.register_listener(recorder.clone());
        let rx = h.control.subscribe();
        to_processing(&mut h);
        // TTIs 1 to 4 are all broadcast subframes for worker 0.
        for _ in 0..4 {
            assert_eq!(h.control.step(), ReceiverState::Processing);
        }
        h.control.shutdown();

        let overruns = h.control.counters().overruns;
        assert!(overruns > 0);
        assert!(recorder.0.lock().unwrap().iter().all(|w| *w == 0));
        assert_eq!(recorder.0.lock().unwrap().len() as u64, overruns);
        assert_eq!(rx.borrow().counters.overruns, overruns);
        assert!(h.control.workers().total_overruns() > 0);
    }

    #[test]
    fn broadcast_workers_configured_once_with_broadcast_width() {
        let mut h = Harness::new(2);
        {
            let mut phy = h.phy.lock().unwrap();
            phy.schedule_known = true;
            phy.cell.mbsfn_area_id = 3;
        }
        to_processing(&mut h);
        for _ in 0..30 {
            h.control.step();
        }
        h.control.shutdown();
        for cells in h.worker_cells.iter() {
            let cells = cells.lock().unwrap();
            assert_eq!(cells.len(), 1);
            assert_eq!(cells[0].mbsfn_area_id, 3);
        }
        assert!(h.control.workers().peak_in_flight() <= 1);
    }

    #[test]
    fn frame_loss_recovers_to_search_rate() {
        let mut h = Harness::new(2);
        to_processing(&mut h);
        for _ in 0..3 {
            h.phy.lock().unwrap().frames.push_back(false);
            assert_eq!(h.control.step(), ReceiverState::Searching);
            assert_eq!(h.last_tune().unwrap().sample_rate_hz, 7_680_000);
            to_processing(&mut h);
        }
        assert_eq!(h.control.counters().recoveries, 3);
        assert_eq!(h.phy.lock().unwrap().resets, 3);
        // One reset per synchronization plus one per recovery.
        assert_eq!(h.upper_resets(), 4 + 3);
    }

    #[test]
    fn bandwidth_extension_retunes_once_and_resyncs() {
        let mut h = Harness::new(2);
        to_processing(&mut h);
        let retunes = h.control.counters().retunes;
        h.phy.lock().unwrap().cell.mbsfn_prb = 40;
        h.phy.lock().unwrap().sync.extend(std::iter::repeat(false).take(200));

        // Run until the next dedicated subframe hits.
        let mut state = ReceiverState::Processing;
        for _ in 0..10 {
            state = h.control.step();
            if state != ReceiverState::Processing {
                break;
            }
        }
        assert_eq!(state, ReceiverState::Syncing);
        assert_eq!(h.control.counters().retunes, retunes + 1);
        let tune = h.last_tune().unwrap();
        assert_eq!(tune.sample_rate_hz, 15_360_000);
        assert_eq!(tune.filter_bandwidth_hz, 9_600_000);
        assert_eq!(h.dedicated_cells.lock().unwrap().last().unwrap().mbsfn_prb, 40);

        // Failing sync does not sneak back into Processing.
        assert_eq!(h.control.step(), ReceiverState::Searching);
    }

    #[test]
    fn extension_repeats_after_recovery() {
        let mut h = Harness::new(2);
        to_processing(&mut h);
        h.phy.lock().unwrap().cell.mbsfn_prb = 40;
        assert!(step_until(&mut h, ReceiverState::Syncing, 10));
        assert_eq!(h.control.step(), ReceiverState::Processing);
        assert_eq!(h.last_tune().unwrap().sample_rate_hz, 15_360_000);

        // The PHY keeps announcing the wide broadcast channel after its reset.
        h.phy.lock().unwrap().frames.push_back(false);
        assert_eq!(h.control.step(), ReceiverState::Searching);
        to_processing(&mut h);
        assert_eq!(h.last_tune().unwrap().sample_rate_hz, 3_840_000);
        let retunes = h.control.counters().retunes;

        assert!(step_until(&mut h, ReceiverState::Syncing, 10));
        assert_eq!(h.control.counters().retunes, retunes + 1);
        assert_eq!(h.last_tune().unwrap().sample_rate_hz, 15_360_000);
    }

    #[test]
    fn pending_request_forces_search_and_is_applied() {
        let mut h = Harness::new(2);
        to_processing(&mut h);
        h.updater.request(ParamRequest {
            antenna: "LNAL".to_string(),
            frequency_hz: 626_000_000,
            gain: 0.4,
            sample_rate_hz: 5_760_000,
            bandwidth_hz: 5_000_000,
        });
        assert_eq!(h.control.step(), ReceiverState::Searching);
        h.control.step();

        let tune = h
            .tunes()
            .into_iter()
            .find(|p| p.center_frequency_hz == 626_000_000)
            .unwrap();
        assert_eq!(tune.sample_rate_hz, 7_680_000);
        assert_eq!(tune.filter_bandwidth_hz, 5_000_000);
        assert_eq!(tune.antenna, "LNAL");
        assert_eq!(tune.gain, 0.4);
        assert_eq!(h.control.params().center_frequency_hz, 626_000_000);

        // Recovery still goes back to the acquisition rate.
        assert_eq!(h.control.step(), ReceiverState::Processing);
        h.phy.lock().unwrap().frames.push_back(false);
        assert_eq!(h.control.step(), ReceiverState::Searching);
        let tune = h.last_tune().unwrap();
        assert_eq!(tune.sample_rate_hz, 7_680_000);
        assert_eq!(tune.center_frequency_hz, 626_000_000);
    }

    #[test]
    fn tune_initial_falls_back_to_next_candidate() {
        let mut h = Harness::with_options(1, |o| {
            o.plan = FrequencyPlan::new(vec![600_000_000, 667_000_000], 2).unwrap();
        });
        h.reject_frequency(600_000_000);
        h.control.tune_initial().unwrap();
        assert_eq!(h.control.params().center_frequency_hz, 667_000_000);
        assert!(h.radio_calls().contains(&RadioCall::Start));
    }

    #[test]
    fn tune_initial_fails_without_candidates() {
        let mut h = Harness::new(1);
        h.reject_frequency(667_000_000);
        assert!(matches!(
            h.control.tune_initial(),
            Err(ReceiverError::NoTunableFrequency(1))
        ));
    }

    #[test]
    fn search_rotates_through_candidates() {
        let mut h = Harness::with_options(1, |o| {
            o.plan = FrequencyPlan::new(vec![600_000_000, 610_000_000], 2).unwrap();
        });
        h.phy.lock().unwrap().search.extend([false, false]);
        h.control.step();
        h.control.step();
        assert_eq!(h.control.params().center_frequency_hz, 610_000_000);
        assert_eq!(h.last_tune().unwrap().center_frequency_hz, 610_000_000);
    }

    #[test]
    fn status_follows_transitions() {
        let mut h = Harness::new(2);
        let rx = h.control.subscribe();
        to_processing(&mut h);
        let status = rx.borrow().clone();
        assert_eq!(status.state, ReceiverState::Processing);
        assert_eq!(status.tti, Some(h.control.tti()));
        assert!(status.cell.is_some());
    }

    #[test]
    fn telemetry_snapshot_published_on_cadence() {
        let mut h = Harness::new(2);
        let rx = h.control.subscribe();
        to_processing(&mut h);
        for _ in 0..999 {
            h.control.step();
        }
        assert!(rx.borrow().telemetry.is_none());
        h.control.step();
        assert!(rx.borrow().telemetry.is_some());
    }

    #[test]
    fn listeners_see_recovery() {
        struct Recorder(Mutex<Vec<FailureCause>>);
        impl ReceiverListener for Recorder {
            fn on_recovery(&self, cause: FailureCause) {
                self.0.lock().unwrap().push(cause);
            }
        }

        let mut h = Harness::new(2);
        let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
        h.control.register_listener(recorder.clone());
        to_processing(&mut h);
        h.phy.lock().unwrap().frames.push_back(false);
        h.control.step();
        assert_eq!(*recorder.0.lock().unwrap(), vec![FailureCause::FrameLost]);
    }

    #[test]
    fn run_exits_on_shutdown_flag() {
        let mut h = Harness::new(1);
        let shutdown = AtomicBool::new(true);
        h.control.run(&shutdown);
        assert!(h.radio_calls().contains(&RadioCall::Stop));
    }
}
