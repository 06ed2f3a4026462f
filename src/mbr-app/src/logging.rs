// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Parse a level name, `None` for anything unrecognised.
pub fn parse_level(name: &str) -> Option<Level> {
    name.trim().parse::<Level>().ok()
}

/// Initialize logging with optional level from CLI or config.
/// Falls back to INFO if level is None or invalid. Thread names are shown
/// so control and decode threads can be told apart.
pub fn init_logging(log_level: Option<&str>) {
    let level = log_level.and_then(parse_level).unwrap_or(Level::INFO);

    FmtSubscriber::builder()
        .with_target(false)
        .with_thread_names(true)
        .with_max_level(level)
        .init();
}
