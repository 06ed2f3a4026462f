// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! SoapySDR radio source.

use num_complex::Complex;
use soapysdr::{Device, Direction, RxStream};
use tracing::{debug, info, warn};

use mbr_core::params::RuntimeParameters;
use mbr_core::radio::RadioSource;
use mbr_core::{DynResult, Sample};

const CHANNEL: usize = 0;
/// Read timeout in microseconds.
const READ_TIMEOUT_US: i64 = 100_000;
/// Upper bound on reads performed when draining the stream.
const MAX_DRAIN_READS: usize = 64;

pub struct SoapyRadio {
    args: String,
    device: Device,
    stream: Option<RxStream<Complex<f32>>>,
}

/// Argument strings of every device SoapySDR can see.
pub fn enumerate_devices() -> DynResult<Vec<String>> {
    let found = soapysdr::enumerate("")?;
    Ok(found.iter().map(|args| args.to_string()).collect())
}

impl SoapyRadio {
    pub fn open(args: &str) -> DynResult<Self> {
        info!("Initializing SoapySDR device with args: {}", args);
        let device = Device::new(args)
            .map_err(|e| format!("Failed to open SoapySDR device (args={}): {}", args, e))?;
        info!("SoapySDR device opened successfully");
        Ok(Self {
            args: args.to_string(),
            device,
            stream: None,
        })
    }

    /// Map a normalized `[0, 1]` gain onto the device's gain range.
    fn gain_db(&self, normalized: f64) -> f64 {
        match self.device.gain_range(Direction::Rx, CHANNEL) {
            Ok(range) => range.minimum + normalized.clamp(0.0, 1.0) * (range.maximum - range.minimum),
            Err(e) => {
                warn!("Failed to read gain range: {}; using {} dB", e, normalized * 60.0);
                normalized * 60.0
            }
        }
    }
}

impl RadioSource for SoapyRadio {
    fn name(&self) -> &str {
        &self.args
    }

    fn start(&mut self) -> DynResult<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let mut stream = self.device.rx_stream::<Complex<f32>>(&[CHANNEL])?;
        stream.activate(None)?;
        self.stream = Some(stream);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.deactivate(None) {
                warn!("Failed to deactivate stream: {}", e);
            }
        }
    }

    fn clear_buffer(&mut self) {
        let Some(stream) = self.stream.as_mut() else {
            return;
        };
        let mut scratch = vec![Complex::new(0.0_f32, 0.0); 4096];
        for _ in 0..MAX_DRAIN_READS {
            match stream.read(&mut [&mut scratch[..]], 0) {
                Ok(n) if n > 0 => continue,
                _ => break,
            }
        }
    }

    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()> {
        let rate = f64::from(params.sample_rate_hz);
        self.device
            .set_sample_rate(Direction::Rx, CHANNEL, rate)
            .map_err(|e| format!("Failed to set sample rate: {}", e))?;
        self.device
            .set_frequency(Direction::Rx, CHANNEL, params.center_frequency_hz as f64, ())
            .map_err(|e| format!("Failed to set frequency: {}", e))?;

        let bandwidth = f64::from(params.filter_bandwidth_hz);
        if bandwidth > 0.0 {
            if let Err(e) = self.device.set_bandwidth(Direction::Rx, CHANNEL, bandwidth) {
                warn!("Failed to set bandwidth: {}; continuing with default", e);
            }
        }
        if let Err(e) = self
            .device
            .set_antenna(Direction::Rx, CHANNEL, params.antenna.as_str())
        {
            warn!("Failed to select antenna {}: {}", params.antenna, e);
        }
        if let Err(e) = self.device.set_gain_mode(Direction::Rx, CHANNEL, params.agc) {
            warn!("Failed to set AGC: {}", e);
        }
        if !params.agc {
            let gain = self.gain_db(params.gain);
            if let Err(e) = self.device.set_gain(Direction::Rx, CHANNEL, gain) {
                warn!("Failed to set gain: {}; using device default", e);
            }
        }

        let actual_rate = self
            .device
            .sample_rate(Direction::Rx, CHANNEL)
            .unwrap_or(rate);
        debug!(
            "Tuned to {} Hz, rate {} Hz (actual {} Hz), bw {} Hz",
            params.center_frequency_hz, rate, actual_rate, bandwidth
        );
        Ok(())
    }

    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize> {
        let stream = self.stream.as_mut().ok_or("stream not started")?;
        let mut filled = 0;
        while filled < buf.len() {
            let n = stream.read(&mut [&mut buf[filled..]], READ_TIMEOUT_US)?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(filled)
    }
}

impl Drop for SoapyRadio {
    fn drop(&mut self) {
        self.stop();
    }
}
