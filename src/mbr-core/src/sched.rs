// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Real-time scheduling for the control and worker threads.

use tracing::{info, warn};

use crate::error::ReceiverError;

/// Switch the calling thread to round-robin real-time scheduling.
#[cfg(unix)]
pub fn promote_current_thread(priority: i32) -> Result<(), ReceiverError> {
    // SAFETY: sched_param is plain old data; zeroing it is a valid value on
    // every platform, and we only pass a pointer to our own stack copy.
    let rc = unsafe {
        let mut param: libc::sched_param = std::mem::zeroed();
        param.sched_priority = priority;
        libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_RR, &param)
    };
    if rc == 0 {
        Ok(())
    } else {
        Err(ReceiverError::Priority {
            priority,
            reason: std::io::Error::from_raw_os_error(rc).to_string(),
        })
    }
}

#[cfg(not(unix))]
pub fn promote_current_thread(priority: i32) -> Result<(), ReceiverError> {
    Err(ReceiverError::Priority {
        priority,
        reason: "not supported on this platform".to_string(),
    })
}

/// Promote the calling thread, logging instead of failing when the
/// process lacks the privilege.
pub fn promote_or_warn(label: &str, priority: i32) -> bool {
    match promote_current_thread(priority) {
        Ok(()) => {
            info!("{} running at real-time priority {}", label, priority);
            true
        }
        Err(e) => {
            warn!("{}: {}. Thread will run at default priority", label, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_priority_is_an_error() {
        // Out of range for SCHED_RR regardless of privileges.
        let result = std::thread::spawn(|| promote_current_thread(10_000))
            .join()
            .unwrap();
        assert!(matches!(
            result,
            Err(ReceiverError::Priority {
                priority: 10_000,
                ..
            })
        ));
    }

    #[test]
    fn warn_path_does_not_panic() {
        let promoted = std::thread::spawn(|| promote_or_warn("test", 10_000))
            .join()
            .unwrap();
        assert!(!promoted);
    }
}
