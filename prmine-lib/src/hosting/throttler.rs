use chrono::{DateTime, Utc};
use core::time::Duration;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::Instant;

const LOG_TARGET: &str = "  throttle";

/// Limits concurrent requests and lets any caller pause dispatch until a rate limit resets.
///
/// Call [`Throttler::acquire`] before each request and hold the permit for its duration.
/// When several callers pause concurrently, the latest resume time wins.
#[derive(Debug)]
pub struct Throttler {
    semaphore: Arc<Semaphore>,
    resume_at: Mutex<Option<Instant>>,
}

impl Throttler {
    /// Create a throttler that allows at most `max_concurrent` requests in flight.
    #[must_use]
    pub fn new(max_concurrent: usize) -> Arc<Self> {
        Arc::new(Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            resume_at: Mutex::new(None),
        })
    }

    /// Wait out any active pause, then take a concurrency slot.
    pub async fn acquire(&self) -> OwnedSemaphorePermit {
        loop {
            if let Some(resume_at) = self.pending_resume() {
                tokio::time::sleep_until(resume_at).await;
                continue;
            }

            let permit = Arc::clone(&self.semaphore)
                .acquire_owned()
                .await
                .expect("semaphore is never closed");

            // A pause may have started while we were queued for the permit
            if self.pending_resume().is_none() {
                return permit;
            }
        }
    }

    /// Returns whether new requests are currently held back.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.pending_resume().is_some()
    }

    /// Hold back new requests for `duration`. Returns `false` if a pause that lasts
    /// at least as long is already in effect.
    pub fn pause_for(&self, duration: Duration) -> bool {
        let new_resume_at = Instant::now() + duration;
        let mut guard = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);

        if guard.is_some_and(|existing| existing >= new_resume_at) {
            return false;
        }

        *guard = Some(new_resume_at);
        log::debug!(target: LOG_TARGET, "Pausing requests for {}s", duration.as_secs());
        true
    }

    /// Hold back new requests until the wall-clock instant `reset_at`, capped at `max_wait`.
    ///
    /// Returns the pause actually applied.
    pub fn pause_until(&self, reset_at: DateTime<Utc>, max_wait: Duration) -> Duration {
        let wait = (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO).min(max_wait);
        let _ = self.pause_for(wait);
        wait
    }

    fn pending_resume(&self) -> Option<Instant> {
        let mut guard = self.resume_at.lock().unwrap_or_else(PoisonError::into_inner);
        match *guard {
            Some(t) if t > Instant::now() => Some(t),
            Some(_) => {
                *guard = None;
                None
            }
            None => None,
        }
    }
}
