//! Job handles collecting one result per submitted item
//!
//! Workers report `(slot, result)` pairs over a channel. The handle drains
//! the channel into a slot array sized at submission, so results come back
//! in submission order no matter which worker finished first.

use crate::core::{DownloadResult, UploadResult};
use crate::error::{Result, XferError};
use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Write side of a job, shared by all of its tasks
///
/// The job's channel disconnects once every sink is gone, which is how the
/// handle notices tasks that vanished without reporting.
pub(crate) struct ResultSink<R> {
    sender: Sender<(usize, R)>,
    delivered: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
}

impl<R> ResultSink<R> {
    /// Hand over the result for `slot`
    pub(crate) fn deliver(&self, slot: usize, result: R) {
        if self.sender.send((slot, result)).is_ok() {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        } else {
            debug!("Result for slot {} dropped, job handle is gone", slot);
        }
    }

    /// Whether the job was cancelled
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

struct Slots<R> {
    slots: Vec<Option<R>>,
    filled: usize,
    /// A caller is blocked on the channel on behalf of everyone else
    draining: bool,
    disconnected: bool,
}

impl<R: Clone> Slots<R> {
    fn absorb(&mut self, slot: usize, result: R) {
        match self.slots.get_mut(slot) {
            Some(entry @ None) => {
                *entry = Some(result);
                self.filled += 1;
            }
            Some(Some(_)) => warn!("Duplicate result for slot {} ignored", slot),
            None => warn!("Result for unknown slot {} ignored", slot),
        }
    }

    fn is_full(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn aborted(&self) -> XferError {
        XferError::JobAborted {
            expected: self.slots.len(),
            received: self.filled,
        }
    }

    fn collect(&self) -> Result<Vec<R>> {
        self.slots
            .iter()
            .cloned()
            .collect::<Option<Vec<R>>>()
            .ok_or_else(|| self.aborted())
    }
}

/// Handle for one submitted batch
///
/// The slot mutex is only held to absorb or copy results, never across a
/// blocking receive. At most one caller drains the channel at a time; the
/// others wait on `ready`.
pub struct JobHandle<R> {
    slots: Mutex<Slots<R>>,
    ready: Condvar,
    receiver: Receiver<(usize, R)>,
    delivered: Arc<AtomicUsize>,
    cancelled: Arc<AtomicBool>,
    len: usize,
}

/// Handle returned by [`TransferManager::download_blobs`](crate::core::TransferManager::download_blobs)
pub type DownloadJob = JobHandle<DownloadResult>;

/// Handle returned by [`TransferManager::upload_files`](crate::core::TransferManager::upload_files)
pub type UploadJob = JobHandle<UploadResult>;

impl<R: Clone> JobHandle<R> {
    /// A handle for `len` items and the sink its tasks report into
    pub(crate) fn new(len: usize) -> (Self, Arc<ResultSink<R>>) {
        let (sender, receiver) = unbounded();
        let delivered = Arc::new(AtomicUsize::new(0));
        let cancelled = Arc::new(AtomicBool::new(false));

        let mut slots = Vec::with_capacity(len);
        slots.resize_with(len, || None);

        let handle = Self {
            slots: Mutex::new(Slots {
                slots,
                filled: 0,
                draining: false,
                disconnected: false,
            }),
            ready: Condvar::new(),
            receiver,
            delivered: Arc::clone(&delivered),
            cancelled: Arc::clone(&cancelled),
            len,
        };
        let sink = Arc::new(ResultSink {
            sender,
            delivered,
            cancelled,
        });
        (handle, sink)
    }

    fn lock(&self) -> MutexGuard<'_, Slots<R>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait until every slot is filled; `Ok(false)` when the deadline passed first
    fn wait(&self, deadline: Option<Instant>) -> Result<bool> {
        let mut slots = self.lock();
        loop {
            if slots.is_full() {
                return Ok(true);
            }
            if slots.disconnected {
                return Err(slots.aborted());
            }

            if slots.draining {
                slots = match deadline {
                    None => self.ready.wait(slots).unwrap_or_else(PoisonError::into_inner),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Ok(false);
                        }
                        match self.ready.wait_timeout(slots, deadline - now) {
                            Ok((guard, _)) => guard,
                            Err(poisoned) => poisoned.into_inner().0,
                        }
                    }
                };
                continue;
            }

            slots.draining = true;
            drop(slots);
            let next = match deadline {
                None => self.receiver.recv().map_err(|_| RecvTimeoutError::Disconnected),
                Some(deadline) => self.receiver.recv_deadline(deadline),
            };
            slots = self.lock();
            slots.draining = false;
            self.ready.notify_all();

            match next {
                Ok((slot, result)) => slots.absorb(slot, result),
                Err(RecvTimeoutError::Timeout) => return Ok(slots.is_full()),
                Err(RecvTimeoutError::Disconnected) => slots.disconnected = true,
            }
        }
    }

    /// Number of submitted items
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for an empty batch
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Items resolved so far
    pub fn completed(&self) -> usize {
        self.delivered.load(Ordering::SeqCst).min(self.len)
    }

    /// True once every item has resolved
    pub fn is_done(&self) -> bool {
        self.completed() == self.len
    }

    /// Block until every item has resolved, then return all results
    ///
    /// Results are in submission order. Calling this again returns the same
    /// results. Fails only if the pool went away before every item reported.
    pub fn results(&self) -> Result<Vec<R>> {
        self.wait(None)?;
        self.lock().collect()
    }

    /// All results if every item has already resolved
    ///
    /// Never blocks, even while another thread waits in [`results`](Self::results).
    pub fn try_results(&self) -> Result<Option<Vec<R>>> {
        let mut slots = self.lock();
        let mut absorbed = false;
        while !slots.is_full() {
            match self.receiver.try_recv() {
                Ok((slot, result)) => {
                    slots.absorb(slot, result);
                    absorbed = true;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    slots.disconnected = true;
                    break;
                }
            }
        }
        if absorbed || slots.disconnected {
            self.ready.notify_all();
        }

        if slots.is_full() {
            slots.collect().map(Some)
        } else if slots.disconnected {
            Err(slots.aborted())
        } else {
            Ok(None)
        }
    }

    /// Like [`results`](Self::results) but gives up after `timeout`
    pub fn results_timeout(&self, timeout: Duration) -> Result<Option<Vec<R>>> {
        if self.wait(Some(Instant::now() + timeout))? {
            self.lock().collect().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Stop starting items of this job; running items finish normally
    ///
    /// Items that had not started resolve as cancelled.
    pub fn cancel(&self) {
        debug!("Job of {} items cancelled", self.len);
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) was called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl JobHandle<DownloadResult> {
    /// Block until every download has resolved
    pub fn download_results(&self) -> Result<Vec<DownloadResult>> {
        self.results()
    }
}

impl JobHandle<UploadResult> {
    /// Block until every upload has resolved
    pub fn upload_results(&self) -> Result<Vec<UploadResult>> {
        self.results()
    }
}

impl<R> std::fmt::Debug for JobHandle<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle")
            .field("len", &self.len)
            .field("delivered", &self.delivered.load(Ordering::SeqCst))
            .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
            .finish()
    }
}
