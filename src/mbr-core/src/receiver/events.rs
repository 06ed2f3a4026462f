// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Receiver event notification.
//!
//! Listeners are called synchronously on the control thread and must
//! return quickly.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::params::RuntimeParameters;

use super::machine::{FailureCause, ReceiverState};

/// Unique identifier for a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// All methods default to no-ops; override the ones of interest.
pub trait ReceiverListener: Send + Sync {
    fn on_state_change(&self, _old: ReceiverState, _new: ReceiverState) {}

    /// The radio was retuned to new settings.
    fn on_retune(&self, _params: &RuntimeParameters) {}

    fn on_recovery(&self, _cause: FailureCause) {}

    /// A worker was still busy when its turn came round again.
    fn on_overrun(&self, _worker: usize) {}
}

#[derive(Default)]
pub struct ReceiverEventEmitter {
    listeners: Vec<(ListenerId, Arc<dyn ReceiverListener>)>,
}

impl ReceiverEventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Arc<dyn ReceiverListener>) -> ListenerId {
        let id = ListenerId::new();
        self.listeners.push((id, listener));
        id
    }

    pub fn unregister(&mut self, id: ListenerId) {
        self.listeners.retain(|(lid, _)| *lid != id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn notify_state_change(&self, old: ReceiverState, new: ReceiverState) {
        for (_, listener) in &self.listeners {
            listener.on_state_change(old, new);
        }
    }

    pub fn notify_retune(&self, params: &RuntimeParameters) {
        for (_, listener) in &self.listeners {
            listener.on_retune(params);
        }
    }

    pub fn notify_recovery(&self, cause: FailureCause) {
        for (_, listener) in &self.listeners {
            listener.on_recovery(cause);
        }
    }

    pub fn notify_overrun(&self, worker: usize) {
        for (_, listener) in &self.listeners {
            listener.on_overrun(worker);
        }
    }
}
