//! Channel acceptors.
//!
//! An acceptor produces channels of one type for the listener that owns it.
//! Synchronous-style callers await [`ChannelAcceptor::accept_channel`];
//! begin/end callers use [`ChannelAcceptor::begin_accept_channel`] and
//! [`AsyncResult::end`].

mod layered;
mod queue;

pub use layered::{ChannelWrapper, LayeredChannelAcceptor};
pub use queue::{channel_queue, ChannelSupply, QueueAcceptor};

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::async_result::AsyncResult;
use crate::config::Timeouts;
use crate::error::Result;
use crate::listener::ChannelListener;

#[async_trait]
pub trait ChannelAcceptor<C: Send + 'static>: Send + Sync + 'static {
    /// Timeouts configured on the owning channel manager.
    fn timeouts(&self) -> &Timeouts;

    fn default_open_timeout(&self) -> Duration {
        self.timeouts().open
    }

    fn default_close_timeout(&self) -> Duration {
        self.timeouts().close
    }

    async fn open(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn close(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    fn abort(&self) {}

    /// Returns the next channel, or `None` once the supply is exhausted.
    ///
    /// Fails with [`Error::Timeout`](crate::Error::Timeout) if neither
    /// happens within `timeout`.
    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>>;

    /// Returns `true` when a channel can be accepted without waiting, and
    /// `false` once the supply is exhausted. Does not consume the channel.
    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool>;

    /// Starts an accept and polls it once. Must be called within a tokio
    /// runtime, since the accept timeout uses the runtime's timer.
    fn begin_accept_channel(self: Arc<Self>, timeout: Duration) -> AsyncResult<Option<C>> {
        AsyncResult::begin(async move { self.accept_channel(timeout).await })
    }

    fn begin_wait_for_channel(self: Arc<Self>, timeout: Duration) -> AsyncResult<bool> {
        AsyncResult::begin(async move { self.wait_for_channel(timeout).await })
    }
}

/// Presents a listener as the acceptor an outer layer pulls from.
pub struct ListenerAcceptor<C: Send + 'static> {
    listener: Arc<dyn ChannelListener<C>>,
    timeouts: Timeouts,
}

impl<C: Send + 'static> ListenerAcceptor<C> {
    pub fn new(listener: Arc<dyn ChannelListener<C>>) -> Self {
        let timeouts = *listener.timeouts();
        Self { listener, timeouts }
    }
}

#[async_trait]
impl<C: Send + 'static> ChannelAcceptor<C> for ListenerAcceptor<C> {
    fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>> {
        self.listener.accept_channel(timeout).await
    }

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool> {
        self.listener.wait_for_channel(timeout).await
    }
}
