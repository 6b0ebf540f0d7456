//! Rate governor for outbound API calls
//!
//! Every platform request runs through [`RateGovernor::execute`]. When the API
//! reports an exhausted quota the governor parks the caller until the reset
//! time plus a small buffer, then replays the same request. Callers that hit
//! the same quota window share one deadline instead of stacking sleeps.

use crate::Result;
use chrono::Utc;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Classified outcome of one API call
#[derive(Debug)]
pub enum ApiResponse<T> {
    /// The call succeeded
    Success(T),

    /// Quota used up until `reset_epoch` (unix seconds)
    QuotaExhausted { reset_epoch: i64 },

    /// Access blocked or legally restricted; treated as an empty result
    Blocked,
}

#[derive(Debug, Default)]
struct SuspensionWindow {
    /// Instant at which calls may resume
    resume_at: Option<Instant>,

    /// Reset epoch of the window that set `resume_at`
    reset_epoch: Option<i64>,
}

/// Serializes sleep-on-exhaustion across concurrent callers
#[derive(Debug)]
pub struct RateGovernor {
    buffer: Duration,
    window: Mutex<SuspensionWindow>,
    suspensions: AtomicU64,
}

impl RateGovernor {
    /// Creates a governor that sleeps `buffer` past every reset time
    pub fn new(buffer: Duration) -> Self {
        Self {
            buffer,
            window: Mutex::new(SuspensionWindow::default()),
            suspensions: AtomicU64::new(0),
        }
    }

    /// Number of distinct suspensions so far
    pub fn suspension_count(&self) -> u64 {
        self.suspensions.load(Ordering::Relaxed)
    }

    /// Runs `op` until it produces a non-exhausted response
    ///
    /// # Returns
    ///
    /// * `Ok(Some(T))` - The call succeeded
    /// * `Ok(None)` - The resource is blocked or legally restricted
    /// * `Err(SponsorGraphError)` - The call failed for another reason
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<Option<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<ApiResponse<T>>>,
    {
        loop {
            self.wait_for_resume().await;

            match op().await? {
                ApiResponse::Success(value) => return Ok(Some(value)),
                ApiResponse::Blocked => return Ok(None),
                ApiResponse::QuotaExhausted { reset_epoch } => self.suspend_until(reset_epoch),
            }
        }
    }

    fn lock_window(&self) -> MutexGuard<'_, SuspensionWindow> {
        // The window is plain data, so a poisoned lock is still usable
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn wait_for_resume(&self) {
        let resume_at = self.lock_window().resume_at;
        if let Some(deadline) = resume_at {
            if deadline > Instant::now() {
                tokio::time::sleep_until(deadline).await;
            }
        }
    }

    /// Records an exhausted quota, joining the current window if one is open
    fn suspend_until(&self, reset_epoch: i64) {
        let now = Instant::now();
        let mut window = self.lock_window();

        let open = window.resume_at.is_some_and(|deadline| deadline > now);
        if open && window.reset_epoch.is_some_and(|known| reset_epoch <= known) {
            tracing::debug!("Quota window {} already suspended, sharing deadline", reset_epoch);
            return;
        }

        let wait_secs = (reset_epoch - Utc::now().timestamp()).max(0) as u64;
        let wait = Duration::from_secs(wait_secs) + self.buffer;

        window.resume_at = Some(now + wait);
        window.reset_epoch = Some(reset_epoch);
        self.suspensions.fetch_add(1, Ordering::Relaxed);

        tracing::warn!(
            "API quota exhausted, suspending for {}s (reset at {})",
            wait.as_secs(),
            reset_epoch
        );
    }
}
