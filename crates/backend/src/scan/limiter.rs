//! Global bound on in-flight filesystem work.
//!
//! One limiter is shared by every scanner and by on-demand resolution, so the
//! ceiling applies to the whole process rather than per domain. Slots are
//! handed out by a tokio [`Semaphore`], which queues waiters in FIFO order.

use std::{
  future::Future,
  sync::{
    Arc,
    atomic::{AtomicU64, AtomicUsize, Ordering},
  },
};

use serde::Serialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::LimiterError;

/// Default ceiling when none is configured
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

#[derive(Debug)]
struct Inner {
  semaphore: Arc<Semaphore>,
  capacity: usize,
  in_flight: AtomicUsize,
  waiting: AtomicUsize,
  peak: AtomicUsize,
  admitted: AtomicU64,
}

/// Shared concurrency ceiling. Cloning yields another handle to the same slots.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
  inner: Arc<Inner>,
}

/// Point-in-time counters for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimiterStats {
  pub capacity: usize,
  pub in_flight: usize,
  pub waiting: usize,
  /// Highest `in_flight` observed since creation
  pub peak: usize,
  /// Total slots ever granted
  pub admitted: u64,
  pub closed: bool,
}

/// An acquired slot. Dropping it releases the slot.
#[derive(Debug)]
pub struct LimiterPermit {
  inner: Arc<Inner>,
  _permit: OwnedSemaphorePermit,
}

impl Drop for LimiterPermit {
  fn drop(&mut self) {
    // Runs before `_permit` is dropped, so the counter never exceeds capacity.
    self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);
  }
}

struct WaitGuard<'a>(&'a Inner);

impl Drop for WaitGuard<'_> {
  fn drop(&mut self) {
    self.0.waiting.fetch_sub(1, Ordering::SeqCst);
  }
}

impl ConcurrencyLimiter {
  /// Create a limiter admitting at most `capacity` units (minimum 1).
  pub fn new(capacity: usize) -> Self {
    let capacity = capacity.max(1);
    Self {
      inner: Arc::new(Inner {
        semaphore: Arc::new(Semaphore::new(capacity)),
        capacity,
        in_flight: AtomicUsize::new(0),
        waiting: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        admitted: AtomicU64::new(0),
      }),
    }
  }

  /// Wait for a free slot.
  ///
  /// Fails only once the limiter has been closed. Cancel-safe: dropping the
  /// future before it resolves gives up the place in the queue.
  pub async fn acquire(&self) -> Result<LimiterPermit, LimiterError> {
    self.inner.waiting.fetch_add(1, Ordering::SeqCst);
    let waiting = WaitGuard(&self.inner);

    let permit = self
      .inner
      .semaphore
      .clone()
      .acquire_owned()
      .await
      .map_err(|_| LimiterError::Closed)?;
    drop(waiting);

    let now = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    self.inner.peak.fetch_max(now, Ordering::SeqCst);
    self.inner.admitted.fetch_add(1, Ordering::SeqCst);

    Ok(LimiterPermit {
      inner: self.inner.clone(),
      _permit: permit,
    })
  }

  /// Run a future while holding a slot.
  pub async fn run<F: Future>(&self, fut: F) -> Result<F::Output, LimiterError> {
    let _permit = self.acquire().await?;
    Ok(fut.await)
  }

  /// Refuse new acquisitions. Slots already held stay valid until dropped.
  pub fn close(&self) {
    self.inner.semaphore.close();
  }

  pub fn is_closed(&self) -> bool {
    self.inner.semaphore.is_closed()
  }

  pub fn capacity(&self) -> usize {
    self.inner.capacity
  }

  pub fn in_flight(&self) -> usize {
    self.inner.in_flight.load(Ordering::SeqCst)
  }

  pub fn stats(&self) -> LimiterStats {
    LimiterStats {
      capacity: self.inner.capacity,
      in_flight: self.inner.in_flight.load(Ordering::SeqCst),
      waiting: self.inner.waiting.load(Ordering::SeqCst),
      peak: self.inner.peak.load(Ordering::SeqCst),
      admitted: self.inner.admitted.load(Ordering::SeqCst),
      closed: self.is_closed(),
    }
  }
}

impl Default for ConcurrencyLimiter {
  fn default() -> Self {
    Self::new(DEFAULT_MAX_CONCURRENT)
  }
}
