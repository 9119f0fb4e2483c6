use crate::error::Result;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};

pub type FetchFuture<T> = Pin<Box<dyn Future<Output = Result<T>> + Send>>;
type FetchFn<T> = Box<dyn Fn() -> FetchFuture<T> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Nothing cached yet and no fetch running
    Idle,
    /// A fetch is in flight
    Refreshing,
    /// Data cached (possibly stale after a failed refresh)
    Ready,
}

struct RefreshBook {
    last_success: Option<Instant>,
    last_outcome: Result<()>,
}

impl RefreshBook {
    fn is_fresh(&self, interval: Duration) -> bool {
        self.last_success
            .map(|at| at.elapsed() < interval)
            .unwrap_or(false)
    }
}

/// Interval-driven cache around one remote fetch
///
/// Shared by reference between every consumer. The cached payload is only written
/// inside a refresh, and at most one fetch runs at a time: callers arriving while a
/// fetch is in flight wait for it and receive its outcome instead of fetching again.
pub struct RefreshCoordinator<T> {
    name: String,
    interval: Duration,
    fetch: FetchFn<T>,
    data: RwLock<Option<Arc<T>>>,
    book: Mutex<RefreshBook>,
    completed: AtomicU64,
    updates: watch::Sender<u64>,
}

impl<T: Send + Sync + 'static> RefreshCoordinator<T> {
    pub fn new<F>(name: impl Into<String>, interval: Duration, fetch: F) -> Self
    where
        F: Fn() -> FetchFuture<T> + Send + Sync + 'static,
    {
        let (updates, _) = watch::channel(0);

        Self {
            name: name.into(),
            interval,
            fetch: Box::new(fetch),
            data: RwLock::new(None),
            book: Mutex::new(RefreshBook {
                last_success: None,
                last_outcome: Ok(()),
            }),
            completed: AtomicU64::new(0),
            updates,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Fetch if the interval has elapsed since the last successful refresh
    pub async fn ensure_fresh(&self) -> Result<()> {
        self.refresh(false).await
    }

    /// Fetch regardless of the interval, e.g. right after a trade
    pub async fn force_refresh(&self) -> Result<()> {
        self.refresh(true).await
    }

    async fn refresh(&self, force: bool) -> Result<()> {
        let seen = self.completed.load(Ordering::Acquire);
        let mut book = self.book.lock().await;

        // Someone else finished a refresh while we were waiting on the lock.
        if self.completed.load(Ordering::Acquire) != seen {
            return book.last_outcome.clone();
        }

        if !force && book.is_fresh(self.interval) {
            return Ok(());
        }

        tracing::debug!(coordinator = %self.name, force, "Fetching new data");

        let outcome = match (self.fetch)().await {
            Ok(data) => {
                *self.data.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(data));
                book.last_success = Some(Instant::now());
                Ok(())
            }
            Err(e) => {
                tracing::debug!(coordinator = %self.name, "Fetch failed, keeping cached data: {}", e);
                Err(e)
            }
        };

        book.last_outcome = outcome.clone();
        let generation = self.completed.fetch_add(1, Ordering::AcqRel) + 1;
        if outcome.is_ok() {
            self.updates.send_replace(generation);
        }

        outcome
    }

    /// Last successfully fetched payload; never triggers a fetch
    pub fn current_data(&self) -> Option<Arc<T>> {
        self.data
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> RefreshState {
        if self.book.try_lock().is_err() {
            RefreshState::Refreshing
        } else if self.current_data().is_some() {
            RefreshState::Ready
        } else {
            RefreshState::Idle
        }
    }

    /// Ticks after every successful refresh
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// When the next scheduled refresh is due: one interval after the last success
    async fn next_due(&self) -> Instant {
        let book = self.book.lock().await;
        book.last_success.unwrap_or_else(Instant::now) + self.interval
    }

    /// Keep the cache fresh on the coordinator's own interval
    ///
    /// The first refresh runs immediately and each following one is due an interval
    /// after the previous success, forced refreshes included. Failures are logged,
    /// the previous payload stays visible and the next attempt waits a full interval.
    pub fn spawn_periodic(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let next = match self.ensure_fresh().await {
                    Ok(()) => self.next_due().await,
                    Err(e) => {
                        tracing::warn!(
                            coordinator = %self.name,
                            "Scheduled refresh failed, serving previous data: {}",
                            e
                        );
                        Instant::now() + self.interval
                    }
                };

                tokio::time::sleep_until(next).await;
            }
        })
    }
}
