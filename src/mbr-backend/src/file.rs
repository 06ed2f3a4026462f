// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample file playback.
//!
//! Files hold interleaved little-endian `f32` I/Q pairs, eight bytes per
//! sample. Playback loops: the file is rewound when its end is reached.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use mbr_core::params::RuntimeParameters;
use mbr_core::radio::RadioSource;
use mbr_core::{DynResult, Sample};

/// Bytes per stored sample.
pub const BYTES_PER_SAMPLE: usize = 8;

pub struct FileSource {
    path: PathBuf,
    reader: BufReader<File>,
    /// Bytes of whole samples in the file.
    usable: u64,
    remaining: u64,
    bytes: Vec<u8>,
    rewinds: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> DynResult<Self> {
        let file = File::open(path)
            .map_err(|e| format!("open sample file '{}': {}", path.display(), e))?;
        let len = file.metadata()?.len();
        let usable = len - len % BYTES_PER_SAMPLE as u64;
        if usable == 0 {
            return Err(format!("sample file '{}' holds no samples", path.display()).into());
        }
        info!(
            "Reading samples from {} ({} samples)",
            path.display(),
            usable / BYTES_PER_SAMPLE as u64
        );
        Ok(Self {
            path: path.to_path_buf(),
            reader: BufReader::new(file),
            usable,
            remaining: usable,
            bytes: Vec::new(),
            rewinds: 0,
        })
    }

    /// How many times playback wrapped around.
    pub fn rewinds(&self) -> u64 {
        self.rewinds
    }

    fn rewind(&mut self) -> DynResult<()> {
        self.reader.seek(SeekFrom::Start(0))?;
        self.remaining = self.usable;
        self.rewinds += 1;
        debug!("Rewinding {}", self.path.display());
        Ok(())
    }
}

impl RadioSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn start(&mut self) -> DynResult<()> {
        Ok(())
    }

    fn stop(&mut self) {}

    fn clear_buffer(&mut self) {}

    /// Recorded captures have a fixed rate; tuning only gets logged.
    fn tune(&mut self, params: &RuntimeParameters) -> DynResult<()> {
        debug!(
            "file: ignoring tune to {} Hz at {} Hz",
            params.center_frequency_hz, params.sample_rate_hz
        );
        Ok(())
    }

    fn read_samples(&mut self, buf: &mut [Sample]) -> DynResult<usize> {
        let need = buf.len() * BYTES_PER_SAMPLE;
        self.bytes.resize(need, 0);
        let mut filled = 0;
        while filled < need {
            if self.remaining == 0 {
                self.rewind()?;
            }
            let chunk = (need - filled).min(self.remaining as usize);
            self.reader.read_exact(&mut self.bytes[filled..filled + chunk])?;
            filled += chunk;
            self.remaining -= chunk as u64;
        }
        for (sample, raw) in buf.iter_mut().zip(self.bytes.chunks_exact(BYTES_PER_SAMPLE)) {
            let re = f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
            let im = f32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
            *sample = Sample::new(re, im);
        }
        Ok(buf.len())
    }
}
