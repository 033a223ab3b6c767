//! Admission control for transfer tasks
//!
//! A worker asks the gate before starting each task. The gate is advisory:
//! it can hold a task back or refuse it, but the pool size stays the hard
//! bound on concurrency.

use governor::{clock::DefaultClock, state::{InMemoryState, NotKeyed}, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::time::Duration;

/// What a worker knows when it asks to start a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionContext {
    /// Tasks currently running across the pool
    pub in_flight: usize,
    /// Size of the pool
    pub max_workers: usize,
    /// Staging buffer held by each running task
    pub buffer_size: usize,
    /// Object size, when known up front
    pub object_size: Option<u64>,
}

impl AdmissionContext {
    /// Staging memory in use if one more task starts
    pub fn staging_bytes_with_one_more(&self) -> u64 {
        (self.in_flight as u64 + 1) * self.buffer_size as u64
    }
}

/// Decision of the gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Start the task now
    Admit,
    /// Ask again after sleeping this long
    Delay(Duration),
    /// Never start the task; it resolves as failed-to-start
    Reject(String),
}

/// Gate consulted before each task starts
pub trait Qos: Send + Sync {
    /// Decide whether the next task may start
    fn admit(&self, ctx: &AdmissionContext) -> Admission;
}

/// Admits everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopQos;

impl Qos for NoopQos {
    fn admit(&self, _ctx: &AdmissionContext) -> Admission {
        Admission::Admit
    }
}

/// Holds tasks back while running tasks would stage more than a byte budget
///
/// A task is always admitted when nothing else is running, so a budget
/// smaller than one buffer slows the pool to one task at a time instead of
/// stalling it.
#[derive(Debug, Clone, Copy)]
pub struct MemoryBudgetQos {
    budget: u64,
    retry_after: Duration,
}

impl MemoryBudgetQos {
    /// Budget in bytes of staging memory
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            retry_after: Duration::from_millis(10),
        }
    }

    /// How long a held-back task waits before asking again
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }
}

impl Qos for MemoryBudgetQos {
    fn admit(&self, ctx: &AdmissionContext) -> Admission {
        if ctx.in_flight == 0 || ctx.staging_bytes_with_one_more() <= self.budget {
            Admission::Admit
        } else {
            Admission::Delay(self.retry_after)
        }
    }
}

/// Caps how many tasks may start per second, across the whole pool
pub struct StartRateQos {
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    retry_after: Duration,
}

impl StartRateQos {
    /// Allow `starts_per_second` task starts per second (bursting up to that many)
    pub fn new(starts_per_second: NonZeroU32) -> Self {
        let retry_after = (Duration::from_secs(1) / starts_per_second.get()).max(Duration::from_millis(1));
        Self {
            limiter: RateLimiter::direct(Quota::per_second(starts_per_second)),
            retry_after,
        }
    }
}

impl Qos for StartRateQos {
    fn admit(&self, _ctx: &AdmissionContext) -> Admission {
        match self.limiter.check() {
            Ok(()) => Admission::Admit,
            Err(_) => Admission::Delay(self.retry_after),
        }
    }
}

impl std::fmt::Debug for StartRateQos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartRateQos")
            .field("retry_after", &self.retry_after)
            .finish_non_exhaustive()
    }
}
