// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Counters describing what a worker pool has done so far.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters, updated by submitters and workers.
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    pub(crate) submitted: AtomicU64,
    pub(crate) completed: AtomicU64,
    pub(crate) panicked: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) rejected: AtomicU64,
}

impl PoolCounters {
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, workers: usize, queued: usize) -> PoolStats {
        PoolStats {
            workers,
            queued,
            submitted: self.submitted.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// A snapshot of a pool's counters.
///
/// Counters are read independently with relaxed ordering, so a snapshot taken
/// while work is in flight is approximate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of worker threads the pool was started with.
    pub workers: usize,
    /// Work items waiting in the queue.
    pub queued: usize,
    /// Work items accepted by `submit`.
    pub submitted: u64,
    /// Work items that ran to completion.
    pub completed: u64,
    /// Work items that panicked. The worker survived each of them.
    pub panicked: u64,
    /// Work items dropped unexecuted because the pool shut down.
    pub discarded: u64,
    /// Submissions refused because the pool was shut down.
    pub rejected: u64,
}

impl PoolStats {
    /// Work items accepted but not yet finished or discarded.
    pub fn in_flight(&self) -> u64 {
        self.submitted
            .saturating_sub(self.completed)
            .saturating_sub(self.panicked)
            .saturating_sub(self.discarded)
    }

    /// Fraction of finished work items that did not panic. `1.0` when nothing ran.
    pub fn success_rate(&self) -> f64 {
        let finished = self.completed + self.panicked;
        if finished == 0 {
            return 1.0;
        }
        self.completed as f64 / finished as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derived_metrics() {
        let stats = PoolStats {
            workers: 2,
            queued: 1,
            submitted: 10,
            completed: 6,
            panicked: 2,
            discarded: 1,
            rejected: 3,
        };
        assert_eq!(stats.in_flight(), 1);
        assert!((stats.success_rate() - 0.75).abs() < f64::EPSILON);
        assert!((PoolStats::default().success_rate() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn snapshot_reads_every_counter() {
        let counters = PoolCounters::default();
        PoolCounters::bump(&counters.submitted);
        PoolCounters::bump(&counters.submitted);
        PoolCounters::bump(&counters.completed);
        PoolCounters::bump(&counters.rejected);

        let stats = counters.snapshot(4, 1);
        assert_eq!(stats.workers, 4);
        assert_eq!(stats.queued, 1);
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.rejected, 1);
        assert_eq!(stats.in_flight(), 1);
    }
}
