//! Async query abstraction for view-facing data fetching.
//!
//! A `Query<T>` encapsulates async data fetching, loading states, and error
//! handling for a view, polled from the event loop tick. It distinguishes
//! the initial load (`is_loading`, no data yet) from a background refresh
//! (`is_fetching`, previous data still rendered), and can re-issue its fetch
//! on a fixed interval for near-real-time list views. A failed refresh never
//! discards data already served: the error is noted alongside it and the
//! next interval retries.
//!
//! # Example
//!
//! ```ignore
//! let client = client.clone();
//! let mut query = Query::new(move || {
//!     let client = client.clone();
//!     async move { client.tasks(1, None).await.map_err(|e| e.to_string()) }
//! })
//! .with_refetch_interval(Duration::from_secs(300));
//!
//! query.fetch();
//!
//! // In event loop tick
//! query.tick();
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Query has not been started
  Idle,
  /// Query is fetching and has no previous data to show
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A boxed future that returns a Result<T, String>
type BoxFuture<T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send>>;

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<T> + Send + Sync>;

/// Async query for data fetching with state management.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  fetched_at: Option<Instant>,
  /// Error from the last background refresh, kept next to the data it
  /// failed to replace
  refresh_error: Option<String>,
  refetch_interval: Option<Duration>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
      refresh_error: None,
      refetch_interval: None,
    }
  }

  /// Re-issue the fetch on a fixed interval (driven by `tick()`), continuing
  /// to serve the previous data while the refresh is in flight.
  pub fn with_refetch_interval(mut self, duration: Duration) -> Self {
    self.refetch_interval = Some(duration);
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Get the data if the query succeeded.
  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  /// Check if the query is loading with nothing to render yet.
  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  /// Check if a fetch is in flight (initial load or background refresh).
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Check if the query succeeded.
  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  /// Check if the query failed.
  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Get the error message if the query failed with no data to show.
  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Error from the most recent background refresh, if it failed. The
  /// previously fetched data is still being served.
  pub fn refresh_error(&self) -> Option<&str> {
    self.refresh_error.as_deref()
  }

  /// Start fetching data if not already fetching.
  pub fn fetch(&mut self) {
    if self.is_fetching() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already fetching or data exists.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Drive the background refresh. Call on every event loop tick; re-issues
  /// the fetch when the refetch interval has elapsed since the last result.
  pub fn tick(&mut self) {
    let Some(interval) = self.refetch_interval else {
      return;
    };
    if self.is_fetching() || !self.state.is_success() {
      return;
    }
    if self.fetched_at.map(|t| t.elapsed() >= interval).unwrap_or(false) {
      self.start_fetch();
    }
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed (data arrived or error occurred).
  /// Call this in your event loop tick handler.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.refresh_error = None;
        self.fetched_at = Some(Instant::now());
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.fail(error);
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.fail("Query was cancelled".to_string());
        true
      }
    }
  }

  /// Record a failed fetch. Data already served stays; the error rides
  /// alongside it and `fetched_at` is stamped so the interval retries.
  fn fail(&mut self, error: String) {
    if self.state.is_success() {
      self.refresh_error = Some(error);
      self.fetched_at = Some(Instant::now());
    } else {
      self.state = QueryState::Error(error);
    }
    self.receiver = None;
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    // Keep serving the previous data during a background refresh
    if !self.state.is_success() {
      self.state = QueryState::Loading;
    }

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

// Query is not Clone because the fetcher is boxed and receiver is owned.
// If you need to share a query, wrap it in Arc<Mutex<Query<T>>>.

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("fetched_at", &self.fetched_at)
      .field("refresh_error", &self.refresh_error)
      .field("refetch_interval", &self.refetch_interval)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|| async { Ok::<_, String>(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_error());
    assert_eq!(query.error(), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_previous_data() {
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let calls_clone = calls.clone();

    let mut query = Query::new(move || {
      let calls = calls_clone.clone();
      async move {
        match calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) {
          0 => Ok(7),
          _ => Err("backend unreachable".to_string()),
        }
      }
    })
    .with_refetch_interval(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&7));

    // Background refresh fails: the served data survives, the error is
    // reported alongside it
    query.tick();
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&7));
    assert!(query.is_success());
    assert_eq!(query.refresh_error(), Some("backend unreachable"));
  }

  #[tokio::test]
  async fn test_refetch_interval_retries_after_failed_refresh() {
    let calls = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let calls_clone = calls.clone();

    let mut query = Query::new(move || {
      let calls = calls_clone.clone();
      async move {
        match calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst) {
          0 => Ok(1),
          _ => Err("flaky".to_string()),
        }
      }
    })
    .with_refetch_interval(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    // Each failed interval refresh still schedules the next one
    for _ in 0..3 {
      query.tick();
      assert!(query.is_fetching());
      tokio::time::sleep(Duration::from_millis(10)).await;
      query.poll();
    }

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert_eq!(query.data(), Some(&1));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok::<_, String>(42)
    });

    query.fetch();
    assert!(query.is_loading());

    // Second fetch should be no-op
    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_background_refresh_keeps_previous_data() {
    let mut query = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(50)).await;
      Ok::<_, String>(7)
    })
    .with_refetch_interval(Duration::ZERO);

    query.fetch();
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&7));

    // Interval elapsed: tick starts a refresh without dropping the data
    query.tick();
    assert!(query.is_fetching());
    assert!(!query.is_loading());
    assert_eq!(query.data(), Some(&7));

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(query.poll());
    assert_eq!(query.data(), Some(&7));
  }

  #[tokio::test]
  async fn test_tick_without_interval_is_noop() {
    let mut query = Query::new(|| async { Ok::<_, String>(1) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;
    query.poll();

    query.tick();
    assert!(!query.is_fetching());
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok::<_, String>(counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refetch should cancel the first and start a new one
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch should have completed and been received
    assert_eq!(query.data(), Some(&1));
  }
}
