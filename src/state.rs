//! Loading/error state shared between a store and whoever observes it.
//!
//! Every store owns a [`StatusHandle`]. Each operation goes through
//! [`StatusHandle::track`], which moves the state through
//! `Idle -> Loading -> {Success, Error}` and clears the loading flag on every
//! exit path, including cancellation (the future being dropped).
//!
//! # Example
//!
//! ```ignore
//! let status = StatusHandle::default();
//! let books = status.track(async { backend.select(&query).await }).await?;
//! assert!(!status.is_loading());
//! ```

use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

/// Outcome of the most recent operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
  /// No operation has run, or the last one was cancelled
  #[default]
  Idle,
  /// An operation is in flight
  Loading,
  /// The last operation completed successfully
  Success,
  /// The last operation failed
  Error,
}

/// Snapshot of a store's observable flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchState {
  pub phase: Phase,
  pub is_loading: bool,
  pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Tracked {
  state: FetchState,
  /// Operations started and not yet finished
  in_flight: usize,
}

/// Cloneable handle to a store's [`FetchState`].
///
/// Operations may overlap. The store counts as loading until the last one
/// ends; each one still records its own outcome as it finishes.
#[derive(Debug, Clone, Default)]
pub struct StatusHandle {
  inner: Arc<Mutex<Tracked>>,
}

impl StatusHandle {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn snapshot(&self) -> FetchState {
    self.lock().state.clone()
  }

  pub fn is_loading(&self) -> bool {
    self.lock().state.is_loading
  }

  pub fn error(&self) -> Option<String> {
    self.lock().state.last_error.clone()
  }

  /// Enter `Loading`, resetting the previous error.
  pub fn begin(&self) -> LoadGuard {
    {
      let mut tracked = self.lock();
      tracked.in_flight += 1;
      tracked.state.phase = Phase::Loading;
      tracked.state.is_loading = true;
      tracked.state.last_error = None;
    }
    LoadGuard {
      handle: self.clone(),
      finished: false,
    }
  }

  /// Run `operation` with the loading flag raised, recording its outcome.
  pub async fn track<T, E, Fut>(&self, operation: Fut) -> Result<T, E>
  where
    E: Display,
    Fut: Future<Output = Result<T, E>>,
  {
    let guard = self.begin();
    let result = operation.await;
    match &result {
      Ok(_) => guard.succeed(),
      Err(e) => guard.fail(e.to_string()),
    }
    result
  }

  fn lock(&self) -> MutexGuard<'_, Tracked> {
    // A panic while holding this lock leaves plain flags behind; keep going.
    self.inner.lock().unwrap_or_else(|p| p.into_inner())
  }
}

/// Clears the loading flag when the operation ends, however it ends.
#[must_use = "dropping the guard immediately ends the loading state"]
pub struct LoadGuard {
  handle: StatusHandle,
  finished: bool,
}

impl LoadGuard {
  pub fn succeed(mut self) {
    self.finish(Phase::Success, None);
  }

  pub fn fail(mut self, message: impl Into<String>) {
    self.finish(Phase::Error, Some(message.into()));
  }

  fn finish(&mut self, phase: Phase, error: Option<String>) {
    self.finished = true;
    let mut tracked = self.handle.lock();
    tracked.in_flight = tracked.in_flight.saturating_sub(1);
    let still_running = tracked.in_flight > 0;
    tracked.state.phase = if still_running { Phase::Loading } else { phase };
    tracked.state.is_loading = still_running;
    if error.is_some() || !still_running {
      tracked.state.last_error = error;
    }
  }
}

impl Drop for LoadGuard {
  fn drop(&mut self) {
    if !self.finished {
      let mut tracked = self.handle.lock();
      tracked.in_flight = tracked.in_flight.saturating_sub(1);
      if tracked.in_flight == 0 {
        tracked.state.phase = Phase::Idle;
        tracked.state.is_loading = false;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_track_success() {
    let status = StatusHandle::new();
    assert_eq!(status.snapshot().phase, Phase::Idle);

    let value = status
      .track(async { Ok::<_, String>(vec![1, 2, 3]) })
      .await
      .unwrap();

    assert_eq!(value, vec![1, 2, 3]);
    let state = status.snapshot();
    assert_eq!(state.phase, Phase::Success);
    assert!(!state.is_loading);
    assert!(state.last_error.is_none());
  }

  #[tokio::test]
  async fn test_track_error() {
    let status = StatusHandle::new();
    let result: Result<i32, String> = status
      .track(async { Err("Something went wrong".to_string()) })
      .await;

    assert!(result.is_err());
    assert_eq!(status.error().as_deref(), Some("Something went wrong"));
    assert_eq!(status.snapshot().phase, Phase::Error);
    assert!(!status.is_loading());
  }

  #[tokio::test]
  async fn test_new_operation_resets_error() {
    let status = StatusHandle::new();
    let _ = status.track(async { Err::<(), _>("boom") }).await;
    assert!(status.error().is_some());

    let guard = status.begin();
    assert!(status.error().is_none());
    assert!(status.is_loading());
    guard.succeed();
  }

  #[tokio::test]
  async fn test_loading_while_pending_then_cleared_on_cancel() {
    let status = StatusHandle::new();
    let task_status = status.clone();

    let handle = tokio::spawn(async move {
      task_status
        .track(futures::future::pending::<Result<(), String>>())
        .await
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(status.is_loading());
    assert_eq!(status.snapshot().phase, Phase::Loading);

    handle.abort();
    let _ = handle.await;
    assert!(!status.is_loading());
    assert_eq!(status.snapshot().phase, Phase::Idle);
  }

  #[tokio::test]
  async fn test_immediate_operation_returns_flag_to_false() {
    let status = StatusHandle::new();
    status.track(async { Ok::<_, String>(()) }).await.unwrap();
    assert!(!status.is_loading());
  }

  #[tokio::test]
  async fn test_overlapping_operations_keep_loading_until_last_ends() {
    let status = StatusHandle::new();
    let task_status = status.clone();
    let (release, released) = tokio::sync::oneshot::channel::<()>();

    let slow = tokio::spawn(async move {
      task_status
        .track(async {
          let _ = released.await;
          Ok::<_, String>(())
        })
        .await
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    status.track(async { Ok::<_, String>(()) }).await.unwrap();
    assert!(status.is_loading());
    assert_eq!(status.snapshot().phase, Phase::Loading);

    let _ = release.send(());
    slow.await.unwrap().unwrap();
    assert!(!status.is_loading());
    assert_eq!(status.snapshot().phase, Phase::Success);
  }

  #[tokio::test]
  async fn test_failure_during_overlap_is_kept() {
    let status = StatusHandle::new();
    let slow = status.begin();

    let _ = status.track(async { Err::<(), _>("boom") }).await;
    assert!(status.is_loading());
    assert_eq!(status.error().as_deref(), Some("boom"));

    slow.succeed();
    assert!(!status.is_loading());
    assert!(status.error().is_none());
  }
}
