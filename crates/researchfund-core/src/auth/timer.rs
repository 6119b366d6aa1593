use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

/// Forced logout happens this long after the timer is (re)started,
/// regardless of activity.
pub const TOKEN_EXPIRY: Duration = Duration::from_secs(10 * 60);

struct Pending {
    handle: JoinHandle<()>,
    deadline: Instant,
}

/// One-shot countdown with at most one pending callback.
///
/// Starting the timer aborts any earlier countdown first, so two callbacks
/// can never be pending together. Dropping the timer cancels it.
pub struct ExpiryTimer {
    duration: Duration,
    pending: Mutex<Option<Pending>>,
}

impl ExpiryTimer {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cancel any running countdown and schedule `on_expire` to run once
    /// after the full duration. Must be called within a tokio runtime.
    pub fn start<F>(&self, on_expire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            previous.handle.abort();
            debug!("Replaced running expiry timer");
        }

        let duration = self.duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            on_expire.await;
        });

        *pending = Some(Pending {
            handle,
            deadline: Instant::now() + duration,
        });
        debug!(secs = duration.as_secs(), "Expiry timer started");
    }

    /// Cancel the pending countdown. Returns false if nothing was pending.
    pub fn cancel(&self) -> bool {
        match self.pending().take() {
            Some(previous) => {
                let was_running = !previous.handle.is_finished();
                previous.handle.abort();
                if was_running {
                    debug!("Expiry timer cancelled");
                }
                was_running
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending()
            .as_ref()
            .map(|p| !p.handle.is_finished())
            .unwrap_or(false)
    }

    /// Time left before the pending callback fires.
    pub fn remaining(&self) -> Option<Duration> {
        self.pending()
            .as_ref()
            .filter(|p| !p.handle.is_finished())
            .map(|p| p.deadline.saturating_duration_since(Instant::now()))
    }
}

impl Drop for ExpiryTimer {
    fn drop(&mut self) {
        if let Some(previous) = self.pending().take() {
            previous.handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let counter = Arc::clone(counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_once_at_duration() {
        let timer = ExpiryTimer::new(TOKEN_EXPIRY);
        let fired = Arc::new(AtomicUsize::new(0));
        timer.start(counting(&fired));

        tokio::time::sleep(TOKEN_EXPIRY - Duration::from_millis(1)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(timer.is_pending());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());

        tokio::time::sleep(TOKEN_EXPIRY * 2).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_replaces_pending_callback() {
        let timer = ExpiryTimer::new(TOKEN_EXPIRY);
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        timer.start(counting(&first));
        tokio::time::sleep(Duration::from_secs(300)).await;
        timer.start(counting(&second));

        // The first deadline passes without firing anything
        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 0);

        // The second fires a full duration after its own start
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let timer = ExpiryTimer::new(Duration::from_secs(60));
        assert!(!timer.cancel());

        let fired = Arc::new(AtomicUsize::new(0));
        timer.start(counting(&fired));
        assert!(timer.cancel());
        assert!(!timer.cancel());

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remaining() {
        let timer = ExpiryTimer::new(Duration::from_secs(60));
        assert_eq!(timer.remaining(), None);

        timer.start(async {});
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(timer.remaining(), Some(Duration::from_secs(40)));
    }
}
