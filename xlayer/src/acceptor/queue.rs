//! Acceptor fed by an in-process queue of channels.

use std::time::Duration;

use async_trait::async_trait;
use log::trace;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

use super::ChannelAcceptor;
use crate::config::Timeouts;
use crate::error::{Error, Result};

/// Producer half of a channel queue.
///
/// The queue is exhausted once every supply handle is dropped or closed and
/// the queued channels have been accepted.
#[derive(Debug)]
pub struct ChannelSupply<C> {
    tx: mpsc::Sender<C>,
    shutdown: CancellationToken,
}

impl<C> Clone for ChannelSupply<C> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            shutdown: self.shutdown.clone(),
        }
    }
}

impl<C: Send + 'static> ChannelSupply<C> {
    /// Queues a channel, waiting while the queue is full.
    pub async fn offer(&self, channel: C) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.tx.send(channel).await.map_err(|_| Error::Closed)
    }

    pub fn try_offer(&self, channel: C) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        self.tx.try_send(channel).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => {
                Error::invalid_operation("channel queue is full")
            }
            mpsc::error::TrySendError::Closed(_) => Error::Closed,
        })
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.tx.is_closed()
    }
}

struct QueueState<C> {
    rx: mpsc::Receiver<C>,
    /// Channel received by `wait_for_channel` but not yet accepted.
    peeked: Option<C>,
}

pub struct QueueAcceptor<C> {
    state: Mutex<QueueState<C>>,
    shutdown: CancellationToken,
    timeouts: Timeouts,
}

/// Creates a bounded channel queue and the acceptor draining it.
pub fn channel_queue<C: Send + 'static>(
    capacity: usize,
    timeouts: Timeouts,
) -> (ChannelSupply<C>, QueueAcceptor<C>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let shutdown = CancellationToken::new();
    let acceptor = QueueAcceptor {
        state: Mutex::new(QueueState { rx, peeked: None }),
        shutdown: shutdown.clone(),
        timeouts,
    };
    (ChannelSupply { tx, shutdown }, acceptor)
}

impl<C: Send + 'static> QueueAcceptor<C> {
    /// Exhausts the queue: pending and future accepts yield `None` and
    /// queued channels are dropped.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
        if let Ok(mut state) = self.state.try_lock() {
            state.peeked = None;
            state.rx.close();
        }
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[async_trait]
impl<C: Send + 'static> ChannelAcceptor<C> for QueueAcceptor<C> {
    fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>> {
        let accept = async {
            let mut state = self.state.lock().await;
            if let Some(channel) = state.peeked.take() {
                return Some(channel);
            }
            state.rx.recv().await
        };
        let accept = async {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                channel = accept => channel,
            }
        };
        let channel = tokio::time::timeout(timeout, accept)
            .await
            .map_err(|_| Error::timeout("accept channel", timeout))?;
        match &channel {
            Some(_) => trace!("queue acceptor accepted a channel"),
            None => trace!("queue acceptor exhausted"),
        }
        Ok(channel)
    }

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool> {
        let wait = async {
            let mut state = self.state.lock().await;
            if state.peeked.is_some() {
                return true;
            }
            match state.rx.recv().await {
                Some(channel) => {
                    state.peeked = Some(channel);
                    true
                }
                None => false,
            }
        };
        let wait = async {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => false,
                available = wait => available,
            }
        };
        tokio::time::timeout(timeout, wait)
            .await
            .map_err(|_| Error::timeout("wait for channel", timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const T: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_accept_in_order_then_exhausted() {
        let (supply, acceptor) = channel_queue::<u32>(4, Timeouts::default());
        supply.offer(1).await.unwrap();
        supply.offer(2).await.unwrap();
        drop(supply);

        assert_eq!(acceptor.accept_channel(T).await.unwrap(), Some(1));
        assert_eq!(acceptor.accept_channel(T).await.unwrap(), Some(2));
        assert_eq!(acceptor.accept_channel(T).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_accept_times_out_when_empty() {
        let (_supply, acceptor) = channel_queue::<u32>(4, Timeouts::default());
        let err = acceptor
            .accept_channel(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_does_not_consume() {
        let (supply, acceptor) = channel_queue::<&'static str>(4, Timeouts::default());
        supply.offer("a").await.unwrap();

        assert!(acceptor.wait_for_channel(T).await.unwrap());
        assert!(acceptor.wait_for_channel(T).await.unwrap());
        assert_eq!(acceptor.accept_channel(T).await.unwrap(), Some("a"));

        drop(supply);
        assert!(!acceptor.wait_for_channel(T).await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_exhausts_queue() {
        let (supply, acceptor) = channel_queue::<u8>(4, Timeouts::default());
        supply.offer(9).await.unwrap();
        acceptor.shutdown();

        assert!(supply.is_closed());
        assert!(matches!(supply.try_offer(10), Err(Error::Closed)));
        assert_eq!(acceptor.accept_channel(T).await.unwrap(), None);
        assert!(!acceptor.wait_for_channel(T).await.unwrap());
    }

    #[tokio::test]
    async fn test_shutdown_releases_pending_accept() {
        let (_supply, acceptor) = channel_queue::<u8>(4, Timeouts::default());
        let acceptor = Arc::new(acceptor);
        let pending = Arc::clone(&acceptor).begin_accept_channel(T);
        assert!(!pending.completed_synchronously());

        acceptor.shutdown();
        assert_eq!(pending.end().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_begin_accept_with_queued_channel_is_synchronous() {
        let (supply, acceptor) = channel_queue::<u8>(4, Timeouts::default());
        supply.offer(5).await.unwrap();
        let acceptor = Arc::new(acceptor);

        let pending = Arc::clone(&acceptor).begin_accept_channel(T);
        assert!(pending.completed_synchronously());
        assert_eq!(pending.end().await.unwrap(), Some(5));

        let pending = acceptor.begin_accept_channel(Duration::from_millis(10));
        assert!(!pending.completed_synchronously());
        assert!(pending.end().await.unwrap_err().is_timeout());
    }

    #[test]
    fn test_default_timeouts_come_from_manager() {
        let timeouts = Timeouts::default().with_open_timeout(Duration::from_secs(3));
        let (_supply, acceptor) = channel_queue::<u8>(1, timeouts);
        assert_eq!(acceptor.default_open_timeout(), Duration::from_secs(3));
        assert_eq!(acceptor.default_close_timeout(), timeouts.close);
    }
}
