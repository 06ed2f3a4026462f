// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Transmission time interval counter.
//!
//! One TTI is one 1 ms subframe. The counter wraps after 1024 radio frames
//! of 10 subframes each, so `frame()` is the system frame number and
//! `subframe()` the index within that frame.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of distinct TTI values before the counter wraps.
pub const TTI_MODULUS: u32 = 10_240;

/// Subframes per radio frame.
pub const SUBFRAMES_PER_FRAME: u32 = 10;

/// TTI counter in `[0, TTI_MODULUS)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tti(u32);

impl Tti {
    /// Build a TTI from any raw counter value, reducing it modulo the wrap.
    pub fn new(raw: u32) -> Self {
        Self(raw % TTI_MODULUS)
    }

    /// Build a TTI from a system frame number and a subframe index.
    pub fn from_frame(frame: u32, subframe: u32) -> Self {
        Self::new(frame * SUBFRAMES_PER_FRAME + subframe % SUBFRAMES_PER_FRAME)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// The following subframe.
    pub fn next(self) -> Self {
        Self((self.0 + 1) % TTI_MODULUS)
    }

    /// Move to the following subframe in place and return the new value.
    pub fn advance(&mut self) -> Self {
        *self = self.next();
        *self
    }

    /// System frame number.
    pub fn frame(self) -> u32 {
        self.0 / SUBFRAMES_PER_FRAME
    }

    /// Subframe index within the frame.
    pub fn subframe(self) -> u32 {
        self.0 % SUBFRAMES_PER_FRAME
    }
}

impl From<Tti> for u32 {
    fn from(tti: Tti) -> Self {
        tti.0
    }
}

impl fmt::Display for Tti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (sfn {}, sf {})", self.0, self.frame(), self.subframe())
    }
}
