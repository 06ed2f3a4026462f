// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! JSON-over-TCP administrative listener.
//!
//! One JSON object per line in each direction. Status is served straight
//! from the receiver's watch channel; parameter changes are handed to the
//! control loop, which applies them at its next checkpoint.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{error, info, warn};

use mbr_core::params::{ParamRequest, ParamUpdater};
use mbr_core::receiver::ReceiverStatus;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum AdminCommand {
    GetStatus,
    SetParams(ParamRequest),
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminResponse {
    pub success: bool,
    pub status: Option<ReceiverStatus>,
    pub error: Option<String>,
}

impl AdminResponse {
    fn ok(status: ReceiverStatus) -> Self {
        Self {
            success: true,
            status: Some(status),
            error: None,
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            status: None,
            error: Some(message.into()),
        }
    }
}

fn validate_request(req: &ParamRequest) -> Result<(), String> {
    if req.frequency_hz == 0 {
        return Err("frequency_hz must be > 0".to_string());
    }
    if req.sample_rate_hz == 0 {
        return Err("sample_rate_hz must be > 0".to_string());
    }
    if req.bandwidth_hz == 0 {
        return Err("bandwidth_hz must be > 0".to_string());
    }
    if !(0.0..=1.0).contains(&req.gain) {
        return Err("gain must be in range 0.0..=1.0".to_string());
    }
    if req.antenna.trim().is_empty() {
        return Err("antenna must not be empty".to_string());
    }
    Ok(())
}

/// Answer one request line.
pub fn handle_line(
    line: &str,
    status_rx: &watch::Receiver<ReceiverStatus>,
    updater: &ParamUpdater,
) -> AdminResponse {
    let cmd = match serde_json::from_str::<AdminCommand>(line) {
        Ok(cmd) => cmd,
        Err(e) => return AdminResponse::err(format!("Invalid JSON: {}", e)),
    };
    match cmd {
        AdminCommand::GetStatus => AdminResponse::ok(status_rx.borrow().clone()),
        AdminCommand::SetParams(req) => {
            if let Err(e) = validate_request(&req) {
                return AdminResponse::err(e);
            }
            updater.request(req);
            AdminResponse::ok(status_rx.borrow().clone())
        }
    }
}

/// Bind `addr` and serve clients until `shutdown_rx` flips to true.
pub async fn run_admin(
    addr: SocketAddr,
    status_rx: watch::Receiver<ReceiverStatus>,
    updater: ParamUpdater,
    shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Admin interface listening on {}", addr);
    serve(listener, status_rx, updater, shutdown_rx).await
}

pub async fn serve(
    listener: TcpListener,
    status_rx: watch::Receiver<ReceiverStatus>,
    updater: ParamUpdater,
    mut shutdown_rx: watch::Receiver<bool>,
) -> std::io::Result<()> {
    loop {
        let (socket, peer) = tokio::select! {
            accepted = listener.accept() => accepted?,
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    info!("Admin interface stopped");
                    return Ok(());
                }
                continue;
            }
        };
        info!("Admin client connected: {}", peer);

        let srx = status_rx.clone();
        let upd = updater.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_client(socket, peer, srx, upd).await {
                error!("Admin client {} error: {:?}", peer, e);
            }
        });
    }
}

async fn handle_client(
    socket: TcpStream,
    addr: SocketAddr,
    status_rx: watch::Receiver<ReceiverStatus>,
    updater: ParamUpdater,
) -> std::io::Result<()> {
    let (reader, mut writer) = socket.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            info!("Admin client {} disconnected", addr);
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let resp = handle_line(trimmed, &status_rx, &updater);
        if let Some(e) = resp.error.as_deref() {
            warn!("Admin request from {} rejected: {}", addr, e);
        }
        let resp_line = serde_json::to_string(&resp)? + "\n";
        writer.write_all(resp_line.as_bytes()).await?;
        writer.flush().await?;
    }
    Ok(())
}
