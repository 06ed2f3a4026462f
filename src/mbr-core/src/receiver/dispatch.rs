// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Selection of the broadcast worker for each broadcast-slot subframe.
//!
//! The cursor moves on every broadcast-slot subframe, including those
//! discarded before the schedule is known, and wraps after the last worker.

/// Round-robin selector over the broadcast-channel workers.
#[derive(Debug, Clone)]
pub struct DispatchCursor {
    position: usize,
    len: usize,
}

impl DispatchCursor {
    /// A cursor over `len` workers, starting at 0. `len` of 0 is treated as 1.
    pub fn new(len: usize) -> Self {
        Self {
            position: 0,
            len: len.max(1),
        }
    }

    pub fn current(&self) -> usize {
        self.position
    }

    /// Move to the next worker, returning the one just used.
    pub fn advance(&mut self) -> usize {
        let used = self.position;
        self.position = (self.position + 1) % self.len;
        used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycles_through_workers() {
        let mut cursor = DispatchCursor::new(3);
        let seen: Vec<usize> = (0..7).map(|_| cursor.advance()).collect();
        assert_eq!(seen, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(cursor.current(), 1);
    }

    #[test]
    fn single_worker_always_zero() {
        let mut cursor = DispatchCursor::new(1);
        assert!((0..5).all(|_| cursor.advance() == 0));
        assert_eq!(DispatchCursor::new(0).current(), 0);
    }
}
