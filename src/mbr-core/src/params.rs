// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio runtime parameters and the handoff used to change them.
//!
//! The administrative interface never touches the control loop's parameters
//! directly. It publishes a complete [`ParamRequest`] into a single-slot
//! `watch` channel; the control loop picks up the latest request at its own
//! checkpoints and sees either nothing new or one whole request.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// Current front-end settings, owned by the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeParameters {
    pub center_frequency_hz: u64,
    pub sample_rate_hz: u32,
    pub filter_bandwidth_hz: u32,
    /// Normalized overall gain in `[0, 1]`.
    pub gain: f64,
    pub antenna: String,
    pub agc: bool,
}

impl Default for RuntimeParameters {
    fn default() -> Self {
        Self {
            center_frequency_hz: 667_000_000,
            sample_rate_hz: 7_680_000,
            filter_bandwidth_hz: 10_000_000,
            gain: 0.9,
            antenna: "LNAW".to_string(),
            agc: false,
        }
    }
}

impl RuntimeParameters {
    /// Overwrite the externally settable fields with a request.
    pub fn apply(&mut self, req: &ParamRequest) {
        self.antenna = req.antenna.clone();
        self.center_frequency_hz = req.frequency_hz;
        self.gain = req.gain;
        self.sample_rate_hz = req.sample_rate_hz;
        self.filter_bandwidth_hz = req.bandwidth_hz;
    }
}

/// A retune request from the administrative interface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamRequest {
    pub antenna: String,
    pub frequency_hz: u64,
    pub gain: f64,
    pub sample_rate_hz: u32,
    pub bandwidth_hz: u32,
}

/// Create a connected updater / watch pair.
pub fn param_channel() -> (ParamUpdater, ParamWatch) {
    let (tx, rx) = watch::channel(None);
    (ParamUpdater { tx: Arc::new(tx) }, ParamWatch { rx })
}

/// Writer side, handed to the administrative interface.
#[derive(Debug, Clone)]
pub struct ParamUpdater {
    tx: Arc<watch::Sender<Option<ParamRequest>>>,
}

impl ParamUpdater {
    /// Publish a request, replacing any that has not been picked up yet.
    pub fn request(&self, req: ParamRequest) {
        info!(
            "Requesting new parameters: fc {}, bw {}, rate {}, gain {}, antenna {}",
            req.frequency_hz, req.bandwidth_hz, req.sample_rate_hz, req.gain, req.antenna
        );
        self.tx.send_replace(Some(req));
    }
}

/// Reader side, owned by the control loop.
#[derive(Debug)]
pub struct ParamWatch {
    rx: watch::Receiver<Option<ParamRequest>>,
}

impl ParamWatch {
    /// Whether a request is waiting. Does not consume it.
    pub fn is_pending(&self) -> bool {
        self.rx.has_changed().unwrap_or(false)
    }

    /// Take the latest request, if one arrived since the last take.
    pub fn take(&mut self) -> Option<ParamRequest> {
        if !self.is_pending() {
            return None;
        }
        self.rx.borrow_and_update().clone()
    }
}

/// Ordered list of candidate center frequencies.
///
/// Candidates are tried front to back. While searching, the plan moves on to
/// the next candidate (wrapping around) after `searches_per_frequency`
/// consecutive failed cell searches on the current one.
#[derive(Debug, Clone)]
pub struct FrequencyPlan {
    candidates: Vec<u64>,
    current: usize,
    searches_per_frequency: u32,
    failed_searches: u32,
}

impl FrequencyPlan {
    /// Returns `None` for an empty candidate list.
    pub fn new(candidates: Vec<u64>, searches_per_frequency: u32) -> Option<Self> {
        if candidates.is_empty() {
            return None;
        }
        Some(Self {
            candidates,
            current: 0,
            searches_per_frequency,
            failed_searches: 0,
        })
    }

    pub fn current(&self) -> u64 {
        self.candidates[self.current]
    }

    pub fn candidates(&self) -> &[u64] {
        &self.candidates
    }

    /// Make the candidate at `index` current.
    pub fn select(&mut self, index: usize) {
        if index < self.candidates.len() {
            self.current = index;
            self.failed_searches = 0;
        }
    }

    /// Replace the plan with a single operator-chosen frequency.
    pub fn pin(&mut self, frequency_hz: u64) {
        self.candidates = vec![frequency_hz];
        self.current = 0;
        self.failed_searches = 0;
    }

    /// Record a cell search outcome. Returns the next frequency to tune to
    /// when the plan rotates.
    pub fn record_search(&mut self, found: bool) -> Option<u64> {
        if found {
            self.failed_searches = 0;
            return None;
        }
        self.failed_searches += 1;
        if self.candidates.len() < 2
            || self.searches_per_frequency == 0
            || self.failed_searches < self.searches_per_frequency
        {
            return None;
        }
        self.failed_searches = 0;
        self.current = (self.current + 1) % self.candidates.len();
        Some(self.current())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(freq: u64) -> ParamRequest {
        ParamRequest {
            antenna: "LNAL".to_string(),
            frequency_hz: freq,
            gain: 0.5,
            sample_rate_hz: 5_760_000,
            bandwidth_hz: 5_000_000,
        }
    }

    #[test]
    fn handoff_starts_empty() {
        let (_updater, mut watch) = param_channel();
        assert!(!watch.is_pending());
        assert!(watch.take().is_none());
    }

    #[test]
    fn handoff_delivers_latest_request_once() {
        let (updater, mut watch) = param_channel();
        updater.request(request(600_000_000));
        updater.request(request(700_000_000));
        assert!(watch.is_pending());
        assert!(watch.is_pending(), "peeking must not consume");
        assert_eq!(watch.take(), Some(request(700_000_000)));
        assert!(!watch.is_pending());
        assert!(watch.take().is_none());
    }

    #[test]
    fn handoff_from_another_thread() {
        let (updater, mut watch) = param_channel();
        let remote = updater.clone();
        std::thread::spawn(move || remote.request(request(626_000_000)))
            .join()
            .unwrap();
        assert_eq!(watch.take().map(|r| r.frequency_hz), Some(626_000_000));
    }

    #[test]
    fn apply_overwrites_requested_fields() {
        let mut params = RuntimeParameters {
            agc: true,
            ..RuntimeParameters::default()
        };
        params.apply(&request(600_000_000));
        assert_eq!(params.center_frequency_hz, 600_000_000);
        assert_eq!(params.antenna, "LNAL");
        assert_eq!(params.sample_rate_hz, 5_760_000);
        assert_eq!(params.filter_bandwidth_hz, 5_000_000);
        assert!(params.agc);
    }

    #[test]
    fn plan_rotates_after_dwell() {
        let mut plan = FrequencyPlan::new(vec![1, 2, 3], 2).unwrap();
        assert_eq!(plan.record_search(false), None);
        assert_eq!(plan.record_search(false), Some(2));
        assert_eq!(plan.record_search(false), None);
        assert_eq!(plan.record_search(false), Some(3));
        assert_eq!(plan.record_search(false), None);
        assert_eq!(plan.record_search(false), Some(1));
    }

    #[test]
    fn plan_success_resets_dwell() {
        let mut plan = FrequencyPlan::new(vec![1, 2], 2).unwrap();
        assert_eq!(plan.record_search(false), None);
        assert_eq!(plan.record_search(true), None);
        assert_eq!(plan.record_search(false), None);
        assert_eq!(plan.current(), 1);
    }

    #[test]
    fn single_candidate_never_rotates() {
        let mut plan = FrequencyPlan::new(vec![667_000_000], 1).unwrap();
        for _ in 0..5 {
            assert_eq!(plan.record_search(false), None);
        }
        assert!(FrequencyPlan::new(Vec::new(), 1).is_none());
    }

    #[test]
    fn pinned_plan_stays_put() {
        let mut plan = FrequencyPlan::new(vec![1, 2], 1).unwrap();
        plan.pin(626_000_000);
        assert_eq!(plan.current(), 626_000_000);
        assert_eq!(plan.record_search(false), None);
        assert_eq!(plan.candidates(), &[626_000_000]);
    }
}
