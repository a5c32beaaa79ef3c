//! Begin/end handles for asynchronous operations.
//!
//! Every `begin_*` operation returns an [`AsyncResult`]. The operation future
//! is polled once when it is begun; if it finishes right away the handle
//! records the result and reports [`AsyncResult::completed_synchronously`],
//! so callers skip a suspension. Otherwise [`AsyncResult::end`] drives the
//! remaining work.

use std::future::Future;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::task::noop_waker_ref;
use futures::FutureExt;

use crate::error::Result;

enum State<T> {
    Ready(Result<T>),
    Pending(BoxFuture<'static, Result<T>>),
}

#[must_use = "an AsyncResult does nothing further unless ended or given a callback"]
pub struct AsyncResult<T> {
    state: State<T>,
}

impl<T: Send + 'static> AsyncResult<T> {
    /// Starts `operation` and polls it once.
    ///
    /// The first poll happens on the calling thread. An operation that uses
    /// tokio timers or I/O, such as every listener and acceptor `begin_*`
    /// method, therefore has to be begun from within a tokio runtime.
    pub fn begin<F>(operation: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let mut operation = operation.boxed();
        let mut cx = Context::from_waker(noop_waker_ref());
        match operation.as_mut().poll(&mut cx) {
            Poll::Ready(result) => Self::completed(result),
            Poll::Pending => Self {
                state: State::Pending(operation),
            },
        }
    }

    pub fn completed(result: Result<T>) -> Self {
        Self {
            state: State::Ready(result),
        }
    }

    pub fn completed_synchronously(&self) -> bool {
        matches!(self.state, State::Ready(_))
    }

    /// Waits for the operation and returns its outcome.
    pub async fn end(self) -> Result<T> {
        match self.state {
            State::Ready(result) => result,
            State::Pending(operation) => operation.await,
        }
    }

    /// Hands the outcome to `callback` exactly once.
    ///
    /// A synchronously completed operation invokes the callback inline with
    /// `true`; a pending one is driven on a tokio task and invokes it with
    /// `false` when done, so a runtime must be present in that case.
    pub fn on_complete<F>(self, callback: F)
    where
        F: FnOnce(Result<T>, bool) + Send + 'static,
    {
        match self.state {
            State::Ready(result) => callback(result, true),
            State::Pending(operation) => {
                tokio::spawn(async move {
                    let result = operation.await;
                    callback(result, false);
                });
            }
        }
    }

    pub fn map<U, F>(self, f: F) -> AsyncResult<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self.state {
            State::Ready(result) => AsyncResult::completed(result.map(f)),
            State::Pending(operation) => AsyncResult {
                state: State::Pending(async move { operation.await.map(f) }.boxed()),
            },
        }
    }
}

impl<T> std::fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match self.state {
            State::Ready(_) => "ready",
            State::Pending(_) => "pending",
        };
        f.debug_struct("AsyncResult").field("state", &state).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn test_ready_future_completes_synchronously() {
        let result = AsyncResult::begin(async { Ok(7u32) });
        assert!(result.completed_synchronously());
        assert_eq!(result.end().await.unwrap(), 7);
    }

    #[test]
    fn test_runtime_free_operation_begins_outside_tokio() {
        let result = AsyncResult::begin(async { Ok::<_, Error>("plain") });
        assert!(result.completed_synchronously());
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        result.on_complete(move |value, sync| {
            assert_eq!(value.unwrap(), "plain");
            assert!(sync);
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pending_future_completes_on_end() {
        let (tx, rx) = oneshot::channel::<u32>();
        let result = AsyncResult::begin(async move { rx.await.map_err(|_| Error::Closed) });
        assert!(!result.completed_synchronously());

        tx.send(3).unwrap();
        assert_eq!(result.end().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_callback_runs_once_for_sync_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        AsyncResult::<()>::begin(async { Err(Error::invalid_operation("not configured")) })
            .on_complete(move |result, sync| {
                assert!(sync);
                assert!(matches!(result, Err(Error::InvalidOperation(_))));
                seen.fetch_add(1, Ordering::SeqCst);
            });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_callback_runs_once_for_async_completion() {
        let (done_tx, done_rx) = oneshot::channel();
        AsyncResult::begin(async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Ok("late")
        })
        .on_complete(move |result, sync| {
            let _ = done_tx.send((result.ok(), sync));
        });

        let (value, sync) = done_rx.await.unwrap();
        assert_eq!(value, Some("late"));
        assert!(!sync);
    }

    #[tokio::test]
    async fn test_map_preserves_sync_flag() {
        let mapped = AsyncResult::begin(async { Ok(2u8) }).map(|v| v * 2);
        assert!(mapped.completed_synchronously());
        assert_eq!(mapped.end().await.unwrap(), 4);
    }
}
