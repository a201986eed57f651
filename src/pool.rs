//! Fixed-size worker pool.
//!
//! The pool decouples request acceptance from request processing: the accept
//! loop stays cheap while decoding and caching run on a bounded set of OS
//! threads pulling from a shared queue.
//!
//! # Queue
//!
//! Tasks travel over an unbounded [`std::sync::mpsc`] channel whose receiver
//! is shared by all workers behind a mutex. Submission therefore never
//! blocks, which also means nothing pushes back on a burst of slow tasks;
//! that backpressure gap is inherited from the service's design and is
//! documented rather than papered over with admission control.
//!
//! # Shutdown
//!
//! Dropping the sender closes the queue. Workers drain whatever is still
//! queued, finish their in-flight task, and exit when `recv` reports the
//! channel closed. [`WorkerPool::shutdown`] then joins every thread. The
//! server itself runs indefinitely; shutdown is exercised by tests.

use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::{debug, error};

use crate::error::PoolError;

/// Worker count used when available parallelism cannot be determined.
pub const FALLBACK_WORKER_COUNT: usize = 4;

/// A deferred unit of work, executed exactly once on exactly one worker.
type Task = Box<dyn FnOnce() + Send + 'static>;

/// Pick a worker count from the machine's available parallelism.
pub fn default_worker_count() -> usize {
    thread::available_parallelism()
        .map(NonZeroUsize::get)
        .unwrap_or(FALLBACK_WORKER_COUNT)
}

// =============================================================================
// Worker Pool
// =============================================================================

/// A fixed set of worker threads consuming a shared task queue.
///
/// Each submitted task is claimed by exactly one free worker. Tasks leave
/// the queue in FIFO order, but concurrent submitters get no cross-task
/// ordering promise beyond that.
///
/// # Example
///
/// ```
/// use imgserve::pool::WorkerPool;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(2).unwrap();
/// let counter = Arc::new(AtomicUsize::new(0));
///
/// for _ in 0..8 {
///     let counter = Arc::clone(&counter);
///     pool.submit(move || {
///         counter.fetch_add(1, Ordering::SeqCst);
///     })
///     .unwrap();
/// }
///
/// drop(pool); // drains the queue and joins the workers
/// assert_eq!(counter.load(Ordering::SeqCst), 8);
/// ```
pub struct WorkerPool {
    /// Submission side of the queue; `None` once shut down
    sender: Option<Sender<Task>>,

    /// Worker threads, joined on shutdown
    workers: Vec<Worker>,
}

impl WorkerPool {
    /// Spawn a pool with `size` worker threads.
    ///
    /// A size of 0 is clamped to 1. Returns an error if a worker thread
    /// cannot be spawned.
    pub fn new(size: usize) -> std::io::Result<Self> {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));

        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            workers.push(Worker::spawn(id, Arc::clone(&receiver))?);
        }

        debug!(workers = size, "worker pool started");

        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Enqueue a task for execution by any free worker.
    ///
    /// Never blocks; the queue is unbounded. Fails only after
    /// [`WorkerPool::shutdown`] has closed the submission path.
    pub fn submit<F>(&self, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let sender = self.sender.as_ref().ok_or(PoolError::Shutdown)?;
        sender.send(Box::new(task)).map_err(|_| PoolError::Shutdown)
    }

    /// Close the queue, let workers drain it, and join them.
    ///
    /// Safe to call more than once; also invoked on drop.
    pub fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        debug!("worker pool shutting down");

        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    error!(worker = worker.id, "worker thread panicked during shutdown");
                }
            }
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// =============================================================================
// Worker
// =============================================================================

/// One thread in the pool.
struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(id: usize, receiver: Arc<Mutex<Receiver<Task>>>) -> std::io::Result<Self> {
        let handle = thread::Builder::new()
            .name(format!("imgserve-worker-{id}"))
            .spawn(move || Self::run(id, receiver))?;

        Ok(Self {
            id,
            handle: Some(handle),
        })
    }

    /// Pull tasks until the queue closes.
    ///
    /// The receiver lock is released before the task runs, so a slow task
    /// blocks only the worker executing it.
    fn run(id: usize, receiver: Arc<Mutex<Receiver<Task>>>) {
        loop {
            let task = {
                let guard = receiver.lock().unwrap_or_else(PoisonError::into_inner);
                guard.recv()
            };

            match task {
                Ok(task) => {
                    // A panicking task must not take the worker down with it.
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!(worker = id, "task panicked; worker continuing");
                    }
                }
                Err(_) => {
                    debug!(worker = id, "queue closed; worker exiting");
                    break;
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
