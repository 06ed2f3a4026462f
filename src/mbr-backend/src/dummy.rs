// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Dummy radio for development and testing.
//!
//! Produces a constant-amplitude tone at whatever rate it is tuned to.
//! No hardware required.

use std::thread;
use std::time::Duration;

use tracing::debug;

use mbr_core::params::RuntimeParameters;
use mbr_core::radio::RadioSource;
use mbr_core::{DynResult, Sample};

const TONE_STEP: f32 = 0.05;

pub struct DummyRadio {
    params: Option<RuntimeParameters>,
    running: bool,
    phase: f32,
    paced: bool,
    tunes: u64,
}

impl DummyRadio {
    /// Delivers samples as fast as they are read.
    pub fn new() -> Self {
        Self {
            params: None,
            running: false,
            phase: 0.0,
            paced: false,
            tunes: 0,
        }
    }

    /// Delivers samples no faster than the tuned sample rate.
    pub fn paced() -> Self {
        Self {
            paced: true,
            ..Self::new()
        }
    }

    pub fn params(&self) -> Option<&RuntimeParameters> {
        self.params.as_ref()
    }

    pub fn tune_count(&self) -> u64 {
        self.tunes
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for DummyRadio {
    fn default() -> Self {
        Self::new()
    }
}

impl RadioSource for DummyRadio {
    fn name(&self) -> &str {
        "dummy"
    }

    fn start(&mut self) -> DynResult<()> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn clear_buffer(&mut self) {}

    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()> {
        if params.sample_rate_hz == 0 {
            return Err("sample rate must be non-zero".into());
        }
        debug!(
            "dummy: fc {} Hz, rate {} Hz, bw {} Hz",
            params.center_frequency_hz, params.sample_rate_hz, params.filter_bandwidth_hz
        );
        self.params = Some(params.clone());
        self.tunes += 1;
        Ok(())
    }

    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize> {
        if !self.running {
            return Err("dummy radio is not streaming".into());
        }
        for s in buf.iter_mut() {
            *s = Sample::from_polar(0.5, self.phase);
            self.phase = (self.phase + TONE_STEP) % std::f32::consts::TAU;
        }
        if self.paced {
            if let Some(rate) = self.params.as_ref().map(|p| p.sample_rate_hz) {
                thread::sleep(Duration::from_secs_f64(buf.len() as f64 / f64::from(rate)));
            }
        }
        Ok(buf.len())
    }
}
