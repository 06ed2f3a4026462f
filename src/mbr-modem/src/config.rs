// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Configuration file support for mbr-modem.
//!
//! Config is loaded from the `[mbr-modem]` section of `mbr-rs.toml`.
//! Default search order:
//! 1. Path specified via `--config` CLI argument
//! 2. `./mbr-rs.toml`
//! 3. `~/.config/mbr-rs/mbr-rs.toml`
//! 4. `/etc/mbr-rs/mbr-rs.toml`

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mbr_app::{normalize_name, parse_level, ConfigFile};
use mbr_core::params::{FrequencyPlan, RuntimeParameters};
pub use mbr_measure::MeasurementFileConfig;

/// Radios the modem knows how to open.
pub const KNOWN_RADIOS: &[&str] = &["dummy", "file", "soapysdr"];

/// Top-level modem configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Radio front-end
    pub sdr: SdrConfig,
    /// Receiver threads and acquisition behavior
    pub phy: PhyConfig,
    /// Measurement records on disk
    pub measurement_file: MeasurementFileConfig,
    /// Administrative JSON listener
    pub admin: AdminConfig,
}

/// General application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (trace, debug, info, warn, error)
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SdrConfig {
    /// Radio source: "dummy", "file" or "soapysdr"
    pub radio: String,
    /// SoapySDR device arguments, e.g. "driver=lime"
    pub device_args: String,
    /// Candidate center frequencies in Hz, tried in order
    pub center_frequencies_hz: Vec<u64>,
    /// Sample rate used during cell search
    pub search_sample_rate_hz: u32,
    /// Front-end filter bandwidth in Hz
    pub filter_bandwidth_hz: u32,
    /// Normalized gain, 0.0 to 1.0
    pub normalized_gain: f64,
    pub antenna: String,
    pub use_agc: bool,
}

impl Default for SdrConfig {
    fn default() -> Self {
        Self {
            radio: "dummy".to_string(),
            device_args: "driver=lime".to_string(),
            center_frequencies_hz: vec![667_000_000],
            search_sample_rate_hz: 7_680_000,
            filter_bandwidth_hz: 10_000_000,
            normalized_gain: 0.9,
            antenna: "LNAW".to_string(),
            use_agc: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhyConfig {
    /// Broadcast-channel decode workers
    pub threads: usize,
    /// SCHED_RR priority of the decode threads, 0 to disable
    pub thread_priority_rt: i32,
    /// SCHED_RR priority of the control thread, 0 to disable
    pub main_thread_priority_rt: i32,
    /// Subframe synchronization attempts before searching again
    pub sync_attempts: u32,
    /// Pause after a failed search or a recovery, in milliseconds
    pub backoff_ms: u64,
    /// Failed cell searches before moving to the next candidate frequency
    pub searches_per_frequency: u32,
}

impl Default for PhyConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            thread_priority_rt: 10,
            main_thread_priority_rt: 20,
            sync_attempts: 200,
            backoff_ms: 1000,
            searches_per_frequency: 10,
        }
    }
}

impl PhyConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    /// Decode thread priority, `None` when disabled.
    pub fn worker_priority(&self) -> Option<i32> {
        (self.thread_priority_rt > 0).then_some(self.thread_priority_rt)
    }

    /// Control thread priority, `None` when disabled.
    pub fn control_priority(&self) -> Option<i32> {
        (self.main_thread_priority_rt > 0).then_some(self.main_thread_priority_rt)
    }
}

/// Administrative listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Whether the listener is enabled
    pub enabled: bool,
    /// IP address to listen on
    pub listen: IpAddr,
    /// TCP port to listen on
    pub port: u16,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 3010,
        }
    }
}

impl ModemConfig {
    pub fn validate(&self) -> Result<(), String> {
        validate_log_level(self.general.log_level.as_deref())?;
        self.validate_sdr()?;

        if self.phy.threads == 0 {
            return Err("[phy].threads must be > 0".to_string());
        }
        validate_priority("[phy].thread_priority_rt", self.phy.thread_priority_rt)?;
        validate_priority(
            "[phy].main_thread_priority_rt",
            self.phy.main_thread_priority_rt,
        )?;
        if self.phy.sync_attempts == 0 {
            return Err("[phy].sync_attempts must be > 0".to_string());
        }
        if self.phy.searches_per_frequency == 0 {
            return Err("[phy].searches_per_frequency must be > 0".to_string());
        }

        if self.measurement_file.interval_secs == 0 {
            return Err("[measurement_file].interval_secs must be > 0".to_string());
        }
        if self.measurement_file.enabled && self.measurement_file.file.trim().is_empty() {
            return Err(
                "[measurement_file].file must be set when measurement files are enabled"
                    .to_string(),
            );
        }

        if self.admin.enabled && self.admin.port == 0 {
            return Err("[admin].port must be > 0 when the admin listener is enabled".to_string());
        }
        Ok(())
    }

    fn validate_sdr(&self) -> Result<(), String> {
        let sdr = &self.sdr;
        if !KNOWN_RADIOS.contains(&normalize_name(&sdr.radio).as_str()) {
            return Err(format!(
                "[sdr].radio '{}' is invalid (expected one of: {})",
                sdr.radio,
                KNOWN_RADIOS.join(", ")
            ));
        }
        if sdr.center_frequencies_hz.is_empty() {
            return Err("[sdr].center_frequencies_hz must list at least one frequency".to_string());
        }
        if sdr.center_frequencies_hz.contains(&0) {
            return Err("[sdr].center_frequencies_hz entries must be > 0".to_string());
        }
        if sdr.search_sample_rate_hz == 0 {
            return Err("[sdr].search_sample_rate_hz must be > 0".to_string());
        }
        if sdr.filter_bandwidth_hz == 0 {
            return Err("[sdr].filter_bandwidth_hz must be > 0".to_string());
        }
        if !(0.0..=1.0).contains(&sdr.normalized_gain) {
            return Err("[sdr].normalized_gain must be in range 0.0..=1.0".to_string());
        }
        if sdr.antenna.trim().is_empty() {
            return Err("[sdr].antenna must not be empty".to_string());
        }
        Ok(())
    }

    /// Radio settings the receiver starts from.
    pub fn runtime_parameters(&self) -> RuntimeParameters {
        RuntimeParameters {
            center_frequency_hz: self.sdr.center_frequencies_hz.first().copied().unwrap_or(0),
            sample_rate_hz: self.sdr.search_sample_rate_hz,
            filter_bandwidth_hz: self.sdr.filter_bandwidth_hz,
            gain: self.sdr.normalized_gain,
            antenna: self.sdr.antenna.clone(),
            agc: self.sdr.use_agc,
        }
    }

    /// Candidate frequency plan, `None` when no candidate is configured.
    pub fn frequency_plan(&self) -> Option<FrequencyPlan> {
        FrequencyPlan::new(
            self.sdr.center_frequencies_hz.clone(),
            self.phy.searches_per_frequency,
        )
    }

    /// Generate an example configuration wrapped under the `[mbr-modem]`
    /// section header, suitable for use in a combined `mbr-rs.toml` file.
    pub fn example_combined_toml() -> String {
        #[derive(Serialize)]
        struct Wrapper {
            #[serde(rename = "mbr-modem")]
            inner: ModemConfig,
        }
        let example = ModemConfig {
            general: GeneralConfig {
                log_level: Some("info".to_string()),
            },
            sdr: SdrConfig {
                radio: "soapysdr".to_string(),
                center_frequencies_hz: vec![667_000_000, 626_000_000],
                ..SdrConfig::default()
            },
            ..ModemConfig::default()
        };
        toml::to_string_pretty(&Wrapper { inner: example }).unwrap_or_default()
    }
}

fn validate_log_level(level: Option<&str>) -> Result<(), String> {
    match level {
        Some(name) if parse_level(name).is_none() => Err(format!(
            "[general].log_level '{}' is invalid (expected one of: trace, debug, info, warn, error)",
            name
        )),
        _ => Ok(()),
    }
}

fn validate_priority(path: &str, priority: i32) -> Result<(), String> {
    if !(0..=99).contains(&priority) {
        return Err(format!("{path} must be in range 0..=99"));
    }
    Ok(())
}

impl ConfigFile for ModemConfig {
    fn section_key() -> &'static str {
        "mbr-modem"
    }
}
