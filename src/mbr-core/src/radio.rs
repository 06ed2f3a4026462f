// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Radio front-end abstraction.

use crate::params::RuntimeParameters;
use crate::{DynResult, Sample};

/// A source of complex baseband samples that can be retuned.
///
/// Implementations are driven exclusively by the receiver control thread.
pub trait RadioSource: Send {
    /// Short name used in log lines.
    fn name(&self) -> &str;

    /// Start streaming samples.
    fn start(&mut self) -> DynResult<()>;

    /// Stop streaming. Stopping a stopped source is a no-op.
    fn stop(&mut self);

    /// Drop any samples buffered but not yet read.
    fn clear_buffer(&mut self);

    /// Apply frequency, sample rate, filter bandwidth, gain, antenna and AGC.
    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()>;

    /// Fill `buf` with the next samples. Returns how many were written;
    /// fewer than `buf.len()` means the stream underran.
    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize>;

    /// Enable or disable writing received samples to a capture file.
    /// Sources without a recorder ignore this.
    fn set_recording(&mut self, _enabled: bool) {}
}

impl<T: RadioSource + ?Sized> RadioSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn start(&mut self) -> DynResult<()> {
        (**self).start()
    }

    fn stop(&mut self) {
        (**self).stop()
    }

    fn clear_buffer(&mut self) {
        (**self).clear_buffer()
    }

    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()> {
        (**self).tune(params)
    }

    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize> {
        (**self).read_samples(buf)
    }

    fn set_recording(&mut self, enabled: bool) {
        (**self).set_recording(enabled)
    }
}
