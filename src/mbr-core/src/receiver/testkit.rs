// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Scripted in-memory collaborators for driving the control loop in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::cell::CellGeometry;
use crate::params::{param_channel, FrequencyPlan, ParamUpdater, RuntimeParameters};
use crate::phy::{PhyEngine, UpperLayer};
use crate::pool::WorkerPool;
use crate::radio::RadioSource;
use crate::telemetry::{TelemetryCadence, TelemetryCollector, TelemetryReporter};
use crate::tti::Tti;
use crate::worker::FrameDecoder;
use crate::{DynResult, Sample};

use super::control::{Collaborators, ControlOptions, ReceiverControl};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RadioCall {
    Start,
    Stop,
    Clear,
    Tune(RuntimeParameters),
    Recording(bool),
}

#[derive(Default)]
pub(crate) struct RadioScript {
    pub calls: Vec<RadioCall>,
    pub rejected: Vec<u64>,
}

struct FakeRadio(Arc<Mutex<RadioScript>>);

impl RadioSource for FakeRadio {
    fn name(&self) -> &str {
        "fake"
    }

    fn start(&mut self) -> DynResult<()> {
        self.0.lock().unwrap().calls.push(RadioCall::Start);
        Ok(())
    }

    fn stop(&mut self) {
        self.0.lock().unwrap().calls.push(RadioCall::Stop);
    }

    fn clear_buffer(&mut self) {
        self.0.lock().unwrap().calls.push(RadioCall::Clear);
    }

    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()> {
        let mut script = self.0.lock().unwrap();
        if script.rejected.contains(&params.center_frequency_hz) {
            return Err(format!("{} Hz out of range", params.center_frequency_hz).into());
        }
        script.calls.push(RadioCall::Tune(params.clone()));
        Ok(())
    }

    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize> {
        buf.fill(Sample::new(0.5, -0.5));
        Ok(buf.len())
    }

    fn set_recording(&mut self, enabled: bool) {
        self.0.lock().unwrap().calls.push(RadioCall::Recording(enabled));
    }
}

/// Outcomes are popped front to back; an empty queue means success.
pub(crate) struct PhyScript {
    pub search: VecDeque<bool>,
    pub sync: VecDeque<bool>,
    pub frames: VecDeque<bool>,
    pub cell: CellGeometry,
    pub schedule_known: bool,
    pub tti_at_sync: Tti,
    pub sync_calls: u32,
    pub resets: u32,
}

impl Default for PhyScript {
    fn default() -> Self {
        Self {
            search: VecDeque::new(),
            sync: VecDeque::new(),
            frames: VecDeque::new(),
            cell: CellGeometry::new(15),
            schedule_known: false,
            tti_at_sync: Tti::new(0),
            sync_calls: 0,
            resets: 0,
        }
    }
}

struct FakePhy(Arc<Mutex<PhyScript>>);

impl PhyEngine for FakePhy {
    fn cell_search(&mut self, _radio: &mut dyn RadioSource) -> bool {
        self.0.lock().unwrap().search.pop_front().unwrap_or(true)
    }

    fn synchronize_subframe(&mut self, _radio: &mut dyn RadioSource) -> bool {
        let mut script = self.0.lock().unwrap();
        script.sync_calls += 1;
        script.sync.pop_front().unwrap_or(true)
    }

    fn next_frame(&mut self, radio: &mut dyn RadioSource, buf: &mut [Sample]) -> bool {
        let ok = self.0.lock().unwrap().frames.pop_front().unwrap_or(true);
        ok && radio.read_samples(buf).is_ok()
    }

    fn tti(&self) -> Tti {
        self.0.lock().unwrap().tti_at_sync
    }

    fn cell(&self) -> CellGeometry {
        self.0.lock().unwrap().cell
    }

    fn set_cell_geometry(&mut self, cell: CellGeometry) {
        self.0.lock().unwrap().cell = cell;
    }

    fn is_dedicated_subframe(&self, tti: Tti) -> bool {
        matches!(tti.subframe(), 0 | 5)
    }

    fn is_broadcast_subframe(&self, tti: Tti) -> bool {
        !self.is_dedicated_subframe(tti)
    }

    fn broadcast_schedule_known(&self) -> bool {
        self.0.lock().unwrap().schedule_known
    }

    fn reset(&mut self) {
        self.0.lock().unwrap().resets += 1;
    }
}

struct FakeUpper(Arc<AtomicUsize>);

impl UpperLayer for FakeUpper {
    fn reset(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Broadcast decode outcomes are popped front to back; an empty queue
/// means success. Every decode, dedicated included, sleeps for `delay`.
#[derive(Default)]
pub(crate) struct DecodeScript {
    pub results: VecDeque<bool>,
    pub delay: Duration,
}

/// Decoder that logs which slot had its buffer filled.
struct TaggedDecoder {
    index: Option<usize>,
    fills: Arc<Mutex<Vec<usize>>>,
    cells: Arc<Mutex<Vec<CellGeometry>>>,
    script: Arc<Mutex<DecodeScript>>,
    buffer: Vec<Sample>,
}

impl FrameDecoder for TaggedDecoder {
    fn set_cell(&mut self, cell: &CellGeometry) {
        self.cells.lock().unwrap().push(*cell);
    }

    fn rx_buffer(&mut self) -> &mut [Sample] {
        if let Some(index) = self.index {
            self.fills.lock().unwrap().push(index);
        }
        &mut self.buffer
    }

    fn decode(&mut self, _tti: Tti) -> bool {
        let (delay, ok) = {
            let mut script = self.script.lock().unwrap();
            let ok = match self.index {
                Some(_) => script.results.pop_front().unwrap_or(true),
                None => true,
            };
            (script.delay, ok)
        };
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        ok
    }

    fn signal_quality(&self) -> Option<f32> {
        Some(10.0)
    }
}

pub(crate) struct Harness {
    pub control: ReceiverControl,
    pub phy: Arc<Mutex<PhyScript>>,
    pub radio: Arc<Mutex<RadioScript>>,
    pub upper_resets: Arc<AtomicUsize>,
    pub buffer_fills: Arc<Mutex<Vec<usize>>>,
    pub worker_cells: Vec<Arc<Mutex<Vec<CellGeometry>>>>,
    pub dedicated_cells: Arc<Mutex<Vec<CellGeometry>>>,
    pub decode: Arc<Mutex<DecodeScript>>,
    pub updater: ParamUpdater,
}

impl Harness {
    pub fn new(workers: usize) -> Self {
        Self::with_options(workers, |_| {})
    }

    pub fn with_options(workers: usize, configure: impl FnOnce(&mut ControlOptions)) -> Self {
        let phy = Arc::new(Mutex::new(PhyScript::default()));
        let radio = Arc::new(Mutex::new(RadioScript::default()));
        let upper_resets = Arc::new(AtomicUsize::new(0));
        let buffer_fills = Arc::new(Mutex::new(Vec::new()));
        let dedicated_cells = Arc::new(Mutex::new(Vec::new()));
        let decode = Arc::new(Mutex::new(DecodeScript::default()));

        let mut worker_cells = Vec::new();
        let mut decoders: Vec<Box<dyn FrameDecoder>> = Vec::new();
        for index in 0..workers {
            let cells = Arc::new(Mutex::new(Vec::new()));
            worker_cells.push(Arc::clone(&cells));
            decoders.push(Box::new(TaggedDecoder {
                index: Some(index),
                fills: Arc::clone(&buffer_fills),
                cells,
                script: Arc::clone(&decode),
                buffer: vec![Sample::default(); 32],
            }));
        }

        let parts = Collaborators {
            radio: Box::new(FakeRadio(Arc::clone(&radio))),
            phy: Box::new(FakePhy(Arc::clone(&phy))),
            upper: Box::new(FakeUpper(Arc::clone(&upper_resets))),
            dedicated: Box::new(TaggedDecoder {
                index: None,
                fills: Arc::clone(&buffer_fills),
                cells: Arc::clone(&dedicated_cells),
                script: Arc::clone(&decode),
                buffer: vec![Sample::default(); 32],
            }),
            workers: decoders,
        };

        let mut options = ControlOptions::new(
            RuntimeParameters::default(),
            FrequencyPlan::new(vec![667_000_000], 10).unwrap(),
        );
        options.backoff = Duration::ZERO;
        configure(&mut options);

        let (updater, requests) = param_channel();
        let telemetry = TelemetryReporter::new(
            TelemetryCadence::from_secs(1),
            Arc::new(TelemetryCollector::new()),
            None,
        );
        let pool = WorkerPool::new(2, None).unwrap();
        let control = ReceiverControl::new(parts, pool, telemetry, requests, options).unwrap();

        Self {
            control,
            phy,
            radio,
            upper_resets,
            buffer_fills,
            worker_cells,
            dedicated_cells,
            decode,
            updater,
        }
    }

    pub fn radio_calls(&self) -> Vec<RadioCall> {
        self.radio.lock().unwrap().calls.clone()
    }

    pub fn tunes(&self) -> Vec<RuntimeParameters> {
        self.radio_calls()
            .into_iter()
            .filter_map(|c| match c {
                RadioCall::Tune(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub fn last_tune(&self) -> Option<RuntimeParameters> {
        self.tunes().pop()
    }

    pub fn reject_frequency(&self, frequency_hz: u64) {
        self.radio.lock().unwrap().rejected.push(frequency_hz);
    }

    pub fn upper_resets(&self) -> usize {
        self.upper_resets.load(Ordering::SeqCst)
    }
}
