// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Fixed-size pool of real-time decode threads.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Sender};
use tracing::{debug, error};

use crate::error::ReceiverError;
use crate::sched;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Threads are created once and live until the pool is dropped.
/// Jobs run in submission order per thread; a panicking job is logged and
/// does not take its thread down.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    threads: Vec<JoinHandle<()>>,
    completed: Arc<AtomicU64>,
}

impl WorkerPool {
    /// Spawn `size` threads named `phy-worker-N`, each promoted to
    /// `rt_priority` when given.
    pub fn new(size: usize, rt_priority: Option<i32>) -> Result<Self, ReceiverError> {
        if size == 0 {
            return Err(ReceiverError::NoWorkers);
        }
        let (tx, rx) = channel::unbounded::<Job>();
        let completed = Arc::new(AtomicU64::new(0));
        let mut threads = Vec::with_capacity(size);

        for n in 0..size {
            let rx = rx.clone();
            let completed = Arc::clone(&completed);
            let name = format!("phy-worker-{n}");
            let label = name.clone();
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    if let Some(priority) = rt_priority {
                        sched::promote_or_warn(&label, priority);
                    }
                    for job in rx.iter() {
                        if catch_unwind(AssertUnwindSafe(job)).is_err() {
                            error!("{}: decode job panicked", label);
                        }
                        completed.fetch_add(1, Ordering::Relaxed);
                    }
                    debug!("{} exiting", label);
                })
                .map_err(|e| ReceiverError::Spawn(name, e))?;
            threads.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            threads,
            completed,
        })
    }

    pub fn size(&self) -> usize {
        self.threads.len()
    }

    /// Number of jobs that have finished running.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub fn submit<F>(&self, job: F) -> Result<(), ReceiverError>
    where
        F: FnOnce() + Send + 'static,
    {
        let tx = self.tx.as_ref().ok_or(ReceiverError::PoolClosed)?;
        tx.send(Box::new(job)).map_err(|_| ReceiverError::PoolClosed)
    }

    /// Stop accepting jobs, let queued ones finish and join every thread.
    pub fn shutdown(&mut self) {
        if self.tx.take().is_none() {
            return;
        }
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                error!("worker thread panicked during shutdown");
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
