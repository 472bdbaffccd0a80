use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Tracks fire-and-forget work so shutdown can wait for it.
#[derive(Clone, Default)]
pub struct BackgroundTasks {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    in_flight: AtomicUsize,
    idle: Notify,
}

struct InFlight(Arc<Inner>);

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` on the runtime without blocking the caller. Errors and
    /// panics are logged, never propagated.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.inner.in_flight.fetch_add(1, Ordering::AcqRel);
        let guard = InFlight(self.inner.clone());

        let handle = tokio::spawn(task);
        tokio::spawn(async move {
            match handle.await {
                Ok(Ok(())) => tracing::debug!(task = name, "background task finished"),
                Ok(Err(e)) => tracing::error!(task = name, error = %e, "background task failed"),
                Err(e) if e.is_panic() => tracing::error!(task = name, "background task panicked"),
                Err(e) => tracing::warn!(task = name, error = %e, "background task cancelled"),
            }
            drop(guard);
        });
    }

    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }

    /// Resolves once no tracked task is running.
    pub async fn wait(&self) {
        loop {
            let idle = self.inner.idle.notified();
            if self.in_flight() == 0 {
                return;
            }
            idle.await;
        }
    }
}
