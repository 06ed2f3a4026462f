// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

mod admin;
mod config;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use mbr_app::{init_logging, normalize_name, parse_level, ConfigFile};
use mbr_backend::sim::{SimConfig, SimulatedDecoder, SimulatedPhy, SimulatedUpper};
use mbr_backend::{
    list_devices, register_builtin_radios_on, RadioAccess, RegistrationContext, SampleRecorder,
};
use mbr_core::cell;
use mbr_core::params::param_channel;
use mbr_core::pool::WorkerPool;
use mbr_core::radio::RadioSource;
use mbr_core::receiver::{Collaborators, ControlOptions, ReceiverControl};
use mbr_core::sched;
use mbr_core::telemetry::{
    ChannelKind, MeasurementSink, TelemetryCadence, TelemetryCollector, TelemetryReporter,
};
use mbr_core::worker::FrameDecoder;
use mbr_core::DynResult;
use mbr_measure::MeasurementFileWriter;

use config::ModemConfig;

const PKG_DESCRIPTION: &str = concat!(env!("CARGO_PKG_NAME"), " - FeMBMS broadcast receiver");
/// Dedicated-channel width assumed when cell search does not report one.
const DEFAULT_NOF_PRB: u32 = 25;

#[derive(Debug, Parser)]
#[command(
    author = env!("CARGO_PKG_AUTHORS"),
    version = env!("CARGO_PKG_VERSION"),
    about = PKG_DESCRIPTION,
)]
struct Cli {
    /// Path to configuration file
    #[arg(long = "config", short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,
    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log-level", short = 'l')]
    log_level: Option<String>,
    /// Read I/Q samples from a file instead of a radio
    #[arg(long = "sample-file", short = 'f', value_name = "FILE")]
    sample_file: Option<PathBuf>,
    /// Record received I/Q samples to a file
    #[arg(long = "write-sample-file", short = 'w', value_name = "FILE")]
    write_sample_file: Option<PathBuf>,
    /// Channel width of the sample file in MHz
    #[arg(long = "file-bandwidth", short = 'b', value_name = "MHZ")]
    file_bandwidth: Option<f64>,
    /// Override the PRB count reported by cell search
    #[arg(long = "override-nof-prb", short = 'p', value_name = "PRB")]
    override_nof_prb: Option<u32>,
    /// List available SDR devices and exit
    #[arg(long = "sdr-devices", short = 'd')]
    sdr_devices: bool,
    /// Print example configuration and exit
    #[arg(long = "print-config")]
    print_config: bool,
}

/// Width of a recorded capture in PRB.
fn capture_prb(mhz: f64) -> DynResult<u32> {
    let prb = (mhz * 5.0).round() as u32;
    cell::sampling_rate_hz(prb)?;
    Ok(prb)
}

fn build_radio(cli: &Cli, cfg: &ModemConfig) -> DynResult<Box<dyn RadioSource>> {
    let mut registry = RegistrationContext::new();
    register_builtin_radios_on(&mut registry);

    let (name, access) = match cli.sample_file.as_ref() {
        Some(path) => ("file".to_string(), RadioAccess::File { path: path.clone() }),
        None => {
            let name = normalize_name(&cfg.sdr.radio);
            let access = match name.as_str() {
                "soapysdr" => RadioAccess::Device {
                    args: cfg.sdr.device_args.clone(),
                },
                _ => RadioAccess::None,
            };
            (name, access)
        }
    };
    if !registry.is_radio_registered(&name) {
        return Err(format!(
            "Radio '{}' is not available in this build (available: {})",
            name,
            registry.registered_radios().join(", ")
        )
        .into());
    }
    let radio = registry.build_radio(&name, access)?;
    info!("Using {} radio", radio.name());

    match cli.write_sample_file.as_ref() {
        Some(path) => Ok(Box::new(SampleRecorder::create(radio, path)?)),
        None => Ok(radio),
    }
}

fn build_receiver(
    cli: &Cli,
    cfg: &ModemConfig,
) -> DynResult<(ReceiverControl, mbr_core::ParamUpdater)> {
    let capture_prb = match (cli.sample_file.as_ref(), cli.file_bandwidth) {
        (Some(_), Some(mhz)) => Some(capture_prb(mhz)?),
        (None, Some(_)) => {
            warn!("--file-bandwidth only applies with --sample-file; ignoring");
            None
        }
        _ => None,
    };
    let nof_prb = match cli.override_nof_prb {
        Some(prb) => {
            cell::sampling_rate_hz(prb)?;
            info!("Overriding cell width to {} PRB", prb);
            prb
        }
        None => DEFAULT_NOF_PRB,
    };

    let radio = build_radio(cli, cfg)?;

    let collector = Arc::new(TelemetryCollector::new());
    let workers: Vec<Box<dyn FrameDecoder>> = (0..cfg.phy.threads)
        .map(|_| {
            Box::new(SimulatedDecoder::new(ChannelKind::Mch(0), Arc::clone(&collector)))
                as Box<dyn FrameDecoder>
        })
        .collect();
    let parts = Collaborators {
        radio,
        phy: Box::new(SimulatedPhy::new(SimConfig {
            nof_prb,
            ..SimConfig::default()
        })),
        upper: Box::new(SimulatedUpper::default()),
        dedicated: Box::new(SimulatedDecoder::new(
            ChannelKind::Pdsch,
            Arc::clone(&collector),
        )),
        workers,
    };
    info!("Using simulated physical layer");

    let sink: Option<Box<dyn MeasurementSink>> =
        match MeasurementFileWriter::from_config(&cfg.measurement_file) {
            Ok(writer) => writer.map(|w| Box::new(w) as Box<dyn MeasurementSink>),
            Err(e) => {
                warn!("Measurement file output disabled: {}", e);
                None
            }
        };
    let telemetry = TelemetryReporter::new(
        TelemetryCadence::from_secs(cfg.measurement_file.interval_secs),
        collector,
        sink,
    );

    // One extra thread so a dedicated-channel decode never waits behind
    // a full set of broadcast decodes.
    let pool = WorkerPool::new(cfg.phy.threads + 1, cfg.phy.worker_priority())?;

    let plan = cfg
        .frequency_plan()
        .ok_or("No candidate center frequency configured")?;
    let mut options = ControlOptions::new(cfg.runtime_parameters(), plan);
    options.sync_attempts = cfg.phy.sync_attempts;
    options.backoff = cfg.phy.backoff();
    options.capture_prb = capture_prb;

    let (updater, requests) = param_channel();
    let mut control = ReceiverControl::new(parts, pool, telemetry, requests, options)?;
    control.tune_initial()?;
    Ok((control, updater))
}

async fn run(cli: Cli, cfg: ModemConfig) -> DynResult<()> {
    info!(
        "Starting mbr-modem {} (built {})",
        env!("CARGO_PKG_VERSION"),
        env!("MBR_MODEM_BUILD_DATE")
    );
    let (mut control, updater) = build_receiver(&cli, &cfg)?;
    let status_rx = control.subscribe();

    let shutdown = Arc::new(AtomicBool::new(false));
    let control_priority = cfg.phy.control_priority();
    let control_shutdown = Arc::clone(&shutdown);
    let control_thread = thread::Builder::new()
        .name("receiver-control".to_string())
        .spawn(move || {
            if let Some(priority) = control_priority {
                sched::promote_or_warn("receiver control", priority);
            }
            control.run(&control_shutdown);
        })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let admin_handle = if cfg.admin.enabled {
        let addr = SocketAddr::from((cfg.admin.listen, cfg.admin.port));
        Some(tokio::spawn(async move {
            if let Err(e) = admin::run_admin(addr, status_rx, updater, shutdown_rx).await {
                error!("Admin listener error: {:?}", e);
            }
        }))
    } else {
        None
    };

    signal::ctrl_c().await?;
    info!("Ctrl+C received, shutting down");
    shutdown.store(true, Ordering::Relaxed);
    let _ = shutdown_tx.send(true);

    let joined = tokio::task::spawn_blocking(move || control_thread.join()).await?;
    if joined.is_err() {
        error!("Receiver control thread panicked");
    }
    if let Some(handle) = admin_handle {
        let _ = handle.await;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> DynResult<()> {
    let cli = Cli::parse();

    if cli.print_config {
        println!("{}", ModemConfig::example_combined_toml());
        return Ok(());
    }

    let (cfg, config_path) = if let Some(ref path) = cli.config {
        let cfg = ModemConfig::load_from_file(path)?;
        (cfg, Some(path.clone()))
    } else {
        ModemConfig::load_from_default_paths()?
    };
    cfg.validate()
        .map_err(|e| format!("Invalid modem configuration: {}", e))?;
    if let Some(level) = cli.log_level.as_deref() {
        if parse_level(level).is_none() {
            return Err(format!("Invalid --log-level '{}'", level).into());
        }
    }

    init_logging(cli.log_level.as_deref().or(cfg.general.log_level.as_deref()));

    if let Some(ref path) = config_path {
        info!("Loaded configuration from {}", path.display());
    }

    if cli.sdr_devices {
        match list_devices() {
            Ok(devices) if devices.is_empty() => println!("No SDR devices found"),
            Ok(devices) => {
                for device in devices {
                    println!("{}", device);
                }
            }
            Err(e) => {
                error!("Device enumeration failed: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    if let Err(e) = run(cli, cfg).await {
        error!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}
