//! Bounded worker pool
//!
//! A fixed set of OS threads pulls tasks from one unbounded queue, so
//! submitting never blocks. Each worker owns a single staging buffer that it
//! reuses for every task it runs, which bounds staging memory to
//! `max_workers * per_worker_buffer_size`.

use crate::config::{HashAlgorithm, TransferManagerConfig};
use crate::core::qos::{Admission, AdmissionContext, Qos};
use crate::core::TransferStatus;
use crate::error::{Result, XferError};
use crate::fs::BandwidthLimiter;
use crate::storage::ObjectStorage;
use crossbeam::channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use tracing::{debug, info};

/// Everything a worker lends to the task it is running
pub struct WorkerContext {
    pub(crate) buffer: Vec<u8>,
    pub(crate) storage: Arc<dyn ObjectStorage>,
    pub(crate) limiter: Option<BandwidthLimiter>,
    pub(crate) checksum: Option<HashAlgorithm>,
    pub(crate) worker_id: usize,
}

/// A queued unit of work, type-erased over download and upload
pub(crate) trait Runnable: Send {
    /// Object size, if known before starting
    fn size_hint(&self) -> Option<u64>;

    /// Whether the owning job was cancelled
    fn is_cancelled(&self) -> bool;

    /// Run to completion and report the result
    fn run(self: Box<Self>, ctx: &mut WorkerContext);

    /// Report a result without running
    fn resolve(self: Box<Self>, status: TransferStatus, cause: XferError);
}

struct Shared {
    qos: Arc<dyn Qos>,
    /// Serializes the gate decision with the `in_flight` reservation
    admission: Mutex<()>,
    in_flight: AtomicUsize,
    max_workers: usize,
    buffer_size: usize,
}

/// Pool of transfer workers
pub(crate) struct WorkerPool {
    sender: Option<Sender<Box<dyn Runnable>>>,
    workers: Vec<thread::JoinHandle<()>>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Spawn `config.max_workers()` workers sharing `storage`
    pub(crate) fn new(
        config: &TransferManagerConfig,
        storage: Arc<dyn ObjectStorage>,
        qos: Arc<dyn Qos>,
    ) -> Result<Self> {
        let (sender, receiver) = unbounded::<Box<dyn Runnable>>();
        let shared = Arc::new(Shared {
            qos,
            admission: Mutex::new(()),
            in_flight: AtomicUsize::new(0),
            max_workers: config.max_workers(),
            buffer_size: config.per_worker_buffer_size(),
        });
        let limiter = config.bandwidth_limit().map(BandwidthLimiter::new);

        let mut pool = Self {
            sender: Some(sender),
            workers: Vec::with_capacity(config.max_workers()),
            shared,
        };

        for worker_id in 0..config.max_workers() {
            let receiver = receiver.clone();
            let shared = Arc::clone(&pool.shared);
            let ctx = WorkerContext {
                buffer: Vec::new(),
                storage: Arc::clone(&storage),
                limiter: limiter.clone(),
                checksum: config.checksum(),
                worker_id,
            };

            let handle = thread::Builder::new()
                .name(format!("xfer-worker-{}", worker_id))
                .spawn(move || worker_loop(ctx, receiver, shared))
                .map_err(|e| XferError::ThreadPool(format!("failed to spawn worker {}: {}", worker_id, e)));

            match handle {
                Ok(handle) => pool.workers.push(handle),
                Err(e) => {
                    pool.shutdown();
                    return Err(e);
                }
            }
        }

        debug!(
            "Started {} workers with {} byte buffers",
            config.max_workers(),
            config.per_worker_buffer_size()
        );
        Ok(pool)
    }

    /// Queue a task; after shutdown it resolves as failed-to-start at once
    pub(crate) fn submit(&self, task: Box<dyn Runnable>) {
        match &self.sender {
            Some(sender) => {
                if let Err(rejected) = sender.send(task) {
                    rejected.0.resolve(TransferStatus::FailedToStart, XferError::PoolShutdown);
                }
            }
            None => task.resolve(TransferStatus::FailedToStart, XferError::PoolShutdown),
        }
    }

    /// Tasks currently running
    pub(crate) fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::SeqCst)
    }

    /// Whether the pool still accepts work
    pub(crate) fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Stop accepting work, let workers drain the queue, and join them
    pub(crate) fn shutdown(&mut self) {
        if self.sender.take().is_none() {
            return;
        }
        let workers = std::mem::take(&mut self.workers);
        let count = workers.len();
        for handle in workers {
            if handle.join().is_err() {
                tracing::warn!("A worker thread panicked outside a task");
            }
        }
        info!("Worker pool shut down ({} workers)", count);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn worker_loop(mut ctx: WorkerContext, receiver: Receiver<Box<dyn Runnable>>, shared: Arc<Shared>) {
    debug!("Worker {} started", ctx.worker_id);

    'tasks: for task in receiver.iter() {
        loop {
            if task.is_cancelled() {
                task.resolve(TransferStatus::Cancelled, XferError::Cancelled);
                continue 'tasks;
            }

            let admission = {
                let _gate = shared.admission.lock().unwrap_or_else(PoisonError::into_inner);
                let admission = shared.qos.admit(&AdmissionContext {
                    in_flight: shared.in_flight.load(Ordering::SeqCst),
                    max_workers: shared.max_workers,
                    buffer_size: shared.buffer_size,
                    object_size: task.size_hint(),
                });
                if admission == Admission::Admit {
                    shared.in_flight.fetch_add(1, Ordering::SeqCst);
                }
                admission
            };

            match admission {
                Admission::Admit => break,
                Admission::Delay(wait) => {
                    debug!("Worker {} held back by QoS for {:?}", ctx.worker_id, wait);
                    thread::sleep(wait);
                }
                Admission::Reject(reason) => {
                    task.resolve(TransferStatus::FailedToStart, XferError::Rejected(reason));
                    continue 'tasks;
                }
            }
        }

        if ctx.buffer.len() != shared.buffer_size {
            ctx.buffer = vec![0u8; shared.buffer_size];
        }

        task.run(&mut ctx);
        shared.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    debug!("Worker {} shutting down", ctx.worker_id);
}
