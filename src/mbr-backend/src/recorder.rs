// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Writes received samples to a capture file while recording is enabled.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use mbr_core::params::RuntimeParameters;
use mbr_core::radio::RadioSource;
use mbr_core::{DynResult, Sample};

/// Wraps another radio source and tees its samples to disk in the same
/// format [`FileSource`](crate::FileSource) reads.
pub struct SampleRecorder {
    inner: Box<dyn RadioSource>,
    path: PathBuf,
    writer: BufWriter<File>,
    enabled: bool,
    written: u64,
}

impl SampleRecorder {
    pub fn create(inner: Box<dyn RadioSource>, path: &Path) -> DynResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)
            .map_err(|e| format!("create sample file '{}': {}", path.display(), e))?;
        Ok(Self {
            inner,
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            enabled: false,
            written: 0,
        })
    }

    /// Samples written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    fn write(&mut self, samples: &[Sample]) -> std::io::Result<()> {
        for s in samples {
            self.writer.write_all(&s.re.to_le_bytes())?;
            self.writer.write_all(&s.im.to_le_bytes())?;
        }
        self.written += samples.len() as u64;
        Ok(())
    }
}

impl RadioSource for SampleRecorder {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn start(&mut self) -> DynResult<()> {
        self.inner.start()
    }

    fn stop(&mut self) {
        self.inner.stop();
        let _ = self.writer.flush();
    }

    fn clear_buffer(&mut self) {
        self.inner.clear_buffer()
    }

    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()> {
        self.inner.tune(params)
    }

    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize> {
        let n = self.inner.read_samples(buf)?;
        if self.enabled {
            if let Err(e) = self.write(&buf[..n]) {
                warn!("Writing {} failed, recording stopped: {}", self.path.display(), e);
                self.enabled = false;
            }
        }
        Ok(n)
    }

    fn set_recording(&mut self, enabled: bool) {
        if enabled == self.enabled {
            return;
        }
        self.enabled = enabled;
        if enabled {
            info!("Recording samples to {}", self.path.display());
        } else {
            let _ = self.writer.flush();
            info!("Sample recording paused after {} samples", self.written);
        }
    }
}

impl Drop for SampleRecorder {
    fn drop(&mut self) {
        let _ = self.writer.flush();
    }
}
