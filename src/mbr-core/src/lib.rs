// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

pub mod cell;
pub mod error;
pub mod params;
pub mod phy;
pub mod pool;
pub mod radio;
pub mod receiver;
pub mod sched;
pub mod telemetry;
pub mod tti;
pub mod worker;

pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Complex baseband sample as delivered by every radio source.
pub type Sample = num_complex::Complex<f32>;

pub use cell::{CellGeometry, SubcarrierSpacing};
pub use error::ReceiverError;
pub use params::{FrequencyPlan, ParamRequest, ParamUpdater, ParamWatch, RuntimeParameters};
pub use receiver::{ReceiverControl, ReceiverState, ReceiverStatus};
pub use tti::Tti;
