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

//! Fixed-size worker pool executor.

use crate::error::PoolError;
use crate::stats::{PoolCounters, PoolStats};
use crossbeam_channel::{select, Receiver, SendError, Sender};
use gatherer_core::utils::panic::panic_message;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

/// An opaque unit of deferred work, executed exactly once by one worker.
pub type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// Configuration for a [`WorkerPool`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of worker threads. Zero is raised to one.
    pub num_threads: usize,
    /// Worker threads are named `"{prefix}-{index}"`.
    pub thread_name_prefix: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            num_threads: num_cpus::get().max(1),
            thread_name_prefix: "gatherer-worker".to_string(),
        }
    }
}

/// State shared by the pool, its handles and its workers.
struct Shared {
    /// Held for reading by every submission and for writing while the stop
    /// flag is committed, so no send can straddle the commit.
    gate: RwLock<()>,
    stopped: AtomicBool,
    counters: PoolCounters,
    workers: usize,
}

/// A cheap, cloneable submission handle to a [`WorkerPool`].
///
/// Handles may outlive the pool; submissions made after shutdown are
/// refused with [`PoolError::ShutDown`].
#[derive(Clone)]
pub struct PoolHandle {
    jobs: Sender<WorkItem>,
    shared: Arc<Shared>,
}

impl PoolHandle {
    /// Enqueues `work` for execution by exactly one worker thread.
    ///
    /// Never blocks. Items submitted from one thread start in submission
    /// order; there is no ordering between different submitting threads.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] once the pool has begun shutting down.
    pub fn submit<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.try_submit(Box::new(work))
            .map_err(|_| PoolError::ShutDown)
    }

    /// Like [`submit`](Self::submit), but hands the work item back when it
    /// is refused so the caller can run it some other way.
    pub fn try_submit(&self, work: WorkItem) -> Result<(), WorkItem> {
        let _gate = self
            .shared
            .gate
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        if self.shared.stopped.load(Ordering::Acquire) {
            PoolCounters::bump(&self.shared.counters.rejected);
            return Err(work);
        }

        match self.jobs.send(work) {
            Ok(()) => {
                PoolCounters::bump(&self.shared.counters.submitted);
                Ok(())
            }
            Err(SendError(work)) => {
                PoolCounters::bump(&self.shared.counters.rejected);
                Err(work)
            }
        }
    }

    /// Returns `true` once the pool's stop flag has been committed.
    pub fn is_shut_down(&self) -> bool {
        self.shared.stopped.load(Ordering::Acquire)
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        self.shared
            .counters
            .snapshot(self.shared.workers, self.jobs.len())
    }
}

impl fmt::Debug for PoolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolHandle")
            .field("workers", &self.shared.workers)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// A fixed set of long-lived worker threads draining a shared FIFO queue.
///
/// Dropping the pool shuts it down. Shutdown discards whatever is still
/// queued: items already running finish, nothing else starts.
pub struct WorkerPool {
    handle: PoolHandle,
    jobs: Receiver<WorkItem>,
    stop: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns the worker threads described by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Spawn`] if a thread cannot be created. Workers
    /// spawned before the failure are shut down again.
    pub fn new(config: &PoolConfig) -> Result<Self, PoolError> {
        let num_threads = if config.num_threads == 0 {
            log::warn!("WorkerPool: num_threads = 0, using 1 worker instead");
            1
        } else {
            config.num_threads
        };

        let (jobs_tx, jobs_rx) = crossbeam_channel::unbounded::<WorkItem>();
        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let shared = Arc::new(Shared {
            gate: RwLock::new(()),
            stopped: AtomicBool::new(false),
            counters: PoolCounters::default(),
            workers: num_threads,
        });

        let mut pool = Self {
            handle: PoolHandle {
                jobs: jobs_tx,
                shared: Arc::clone(&shared),
            },
            jobs: jobs_rx.clone(),
            stop: Some(stop_tx),
            workers: Vec::with_capacity(num_threads),
        };

        for index in 0..num_threads {
            let jobs = jobs_rx.clone();
            let stop = stop_rx.clone();
            let shared = Arc::clone(&shared);
            let spawned = thread::Builder::new()
                .name(format!("{}-{index}", config.thread_name_prefix))
                .spawn(move || worker_loop(index, &jobs, &stop, &shared));

            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(source) => {
                    log::error!("WorkerPool: failed to spawn worker {index}: {source}");
                    pool.shutdown();
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }

        log::info!("WorkerPool started with {num_threads} workers.");
        Ok(pool)
    }

    /// Returns a submission handle to this pool.
    pub fn handle(&self) -> PoolHandle {
        self.handle.clone()
    }

    /// Enqueues `work`. See [`PoolHandle::submit`].
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::ShutDown`] after [`shutdown`](Self::shutdown).
    pub fn submit<F>(&self, work: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        self.handle.submit(work)
    }

    /// Returns a snapshot of the pool's counters.
    pub fn stats(&self) -> PoolStats {
        self.handle.stats()
    }

    /// Number of worker threads.
    pub fn num_threads(&self) -> usize {
        self.handle.shared.workers
    }

    /// Stops the pool and waits for every worker to exit.
    ///
    /// Commits the stop flag, wakes all workers, joins them, then drops
    /// every item still queued. Calling it again is a no-op.
    pub fn shutdown(&mut self) {
        let Some(stop) = self.stop.take() else {
            return;
        };

        {
            // Waits out submissions already past the check; later ones see the flag.
            let _gate = self
                .handle
                .shared
                .gate
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            self.handle.shared.stopped.store(true, Ordering::Release);
        }
        // Disconnecting the stop channel wakes every worker blocked in `select!`.
        drop(stop);

        let current = thread::current().id();
        for worker in self.workers.drain(..) {
            if worker.thread().id() == current {
                log::warn!("WorkerPool: shutdown called from a worker, detaching it");
                continue;
            }
            if worker.join().is_err() {
                log::error!("WorkerPool: a worker thread terminated abnormally");
            }
        }

        let leftover = self.jobs.try_iter().count() as u64;
        let counters = &self.handle.shared.counters;
        counters.discarded.fetch_add(leftover, Ordering::Relaxed);

        let stats = self.stats();
        if stats.discarded > 0 {
            log::warn!(
                "WorkerPool stopped: {} completed, {} panicked, {} discarded unexecuted.",
                stats.completed,
                stats.panicked,
                stats.discarded
            );
        } else {
            log::info!(
                "WorkerPool stopped: {} completed, {} panicked.",
                stats.completed,
                stats.panicked
            );
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("handle", &self.handle)
            .field("running_workers", &self.workers.len())
            .finish()
    }
}

fn worker_loop(index: usize, jobs: &Receiver<WorkItem>, stop: &Receiver<()>, shared: &Shared) {
    log::debug!("Worker {index} started.");

    loop {
        select! {
            recv(stop) -> _ => break,
            recv(jobs) -> job => {
                let Ok(job) = job else { break };
                // Nothing dequeued after the stop flag is committed may run.
                if shared.stopped.load(Ordering::Acquire) {
                    PoolCounters::bump(&shared.counters.discarded);
                    break;
                }
                run_job(index, job, &shared.counters);
            }
        }
    }

    log::debug!("Worker {index} stopped.");
}

fn run_job(index: usize, job: WorkItem, counters: &PoolCounters) {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(()) => PoolCounters::bump(&counters.completed),
        Err(payload) => {
            PoolCounters::bump(&counters.panicked);
            log::error!(
                "Worker {index}: work item panicked: {}",
                panic_message(payload.as_ref())
            );
        }
    }
}
