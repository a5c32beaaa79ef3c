//! In-process listener whose channels are offered through a [`ChannelSupply`].

use std::any::TypeId;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;

use super::{ChannelListener, Listener};
use crate::acceptor::{channel_queue, ChannelAcceptor, ChannelSupply, QueueAcceptor};
use crate::config::{ListenerConfig, Timeouts};
use crate::error::Result;
use crate::event::{FaultHandler, Subscription};
use crate::properties::{Properties, PropertyValue};
use crate::state::{CommunicationObject, CommunicationState};

pub struct QueueChannelListener<C> {
    config: ListenerConfig,
    lifecycle: CommunicationObject,
    properties: Properties,
    acceptor: QueueAcceptor<C>,
}

impl<C: Send + 'static> QueueChannelListener<C> {
    /// Creates the listener and the supply that feeds it.
    pub fn new(config: ListenerConfig, capacity: usize) -> (ChannelSupply<C>, Self) {
        let (supply, acceptor) = channel_queue(capacity, config.timeouts);
        let listener = Self {
            lifecycle: CommunicationObject::new(format!("queue listener {}", config.uri)),
            config,
            properties: Properties::new(),
            acceptor,
        };
        (supply, listener)
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Faults the listener, as a transport failure would.
    pub fn fault(&self) {
        self.lifecycle.fault();
        self.acceptor.shutdown();
    }
}

#[async_trait]
impl<C: Send + 'static> Listener for QueueChannelListener<C> {
    fn uri(&self) -> &str {
        &self.config.uri
    }

    fn state(&self) -> CommunicationState {
        self.lifecycle.state()
    }

    fn timeouts(&self) -> &Timeouts {
        &self.config.timeouts
    }

    fn property(&self, type_id: TypeId) -> Option<PropertyValue> {
        self.properties.get_any(type_id)
    }

    fn on_faulted(&self, handler: FaultHandler) -> Subscription {
        self.lifecycle.subscribe_faulted(handler)
    }

    async fn open(&self, timeout: Duration) -> Result<()> {
        self.lifecycle
            .open_with(timeout, self.acceptor.open(timeout))
            .await
    }

    async fn close(&self, timeout: Duration) -> Result<()> {
        self.lifecycle
            .close_with(
                timeout,
                async {
                    self.acceptor.shutdown();
                    self.acceptor.close(timeout).await
                },
                || self.acceptor.shutdown(),
            )
            .await
    }

    fn abort(&self) {
        if self.lifecycle.abort() {
            self.acceptor.shutdown();
            self.acceptor.abort();
            debug!("queue listener {} aborted", self.config.uri);
        }
    }
}

#[async_trait]
impl<C: Send + 'static> ChannelListener<C> for QueueChannelListener<C> {
    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>> {
        self.lifecycle.ensure_opened()?;
        self.acceptor.accept_channel(timeout).await
    }

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool> {
        self.lifecycle.ensure_opened()?;
        self.acceptor.wait_for_channel(timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::listener::ListenerExt;
    use std::sync::Arc;

    const T: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn test_accept_requires_open() {
        let (supply, listener) = QueueChannelListener::<u8>::new(ListenerConfig::new("mem://a"), 4);
        supply.offer(1).await.unwrap();

        let err = listener.accept_channel(T).await.unwrap_err();
        assert!(matches!(err, Error::InvalidOperation(_)));

        listener.open(T).await.unwrap();
        assert_eq!(listener.accept_channel(T).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn test_close_exhausts_and_blocks_accepts() {
        let (supply, listener) = QueueChannelListener::<u8>::new(ListenerConfig::new("mem://a"), 4);
        listener.open(T).await.unwrap();
        listener.close(T).await.unwrap();

        assert!(supply.is_closed());
        assert_eq!(listener.state(), CommunicationState::Closed);
        assert!(matches!(listener.accept_channel(T).await, Err(Error::Closed)));
    }

    #[tokio::test]
    async fn test_fault_is_surfaced_on_accept() {
        let (_supply, listener) = QueueChannelListener::<u8>::new(ListenerConfig::new("mem://a"), 4);
        listener.open(T).await.unwrap();
        listener.fault();

        assert_eq!(listener.state(), CommunicationState::Faulted);
        assert!(matches!(listener.accept_channel(T).await, Err(Error::Faulted)));
        assert!(matches!(listener.open(T).await, Err(Error::Faulted)));
    }

    #[tokio::test]
    async fn test_begin_open_completes_synchronously() {
        let (_supply, listener) = QueueChannelListener::<u8>::new(ListenerConfig::new("mem://a"), 4);
        let listener = Arc::new(listener);
        let opening = Arc::clone(&listener).begin_open(T);
        assert!(opening.completed_synchronously());
        opening.end().await.unwrap();
        assert_eq!(listener.state(), CommunicationState::Opened);
    }

    #[test]
    #[should_panic]
    fn test_begin_open_needs_a_runtime() {
        let (_supply, listener) = QueueChannelListener::<u8>::new(ListenerConfig::new("mem://a"), 4);
        let _ = Arc::new(listener).begin_open(T);
    }

    #[test]
    fn test_properties() {
        let (_supply, listener) = QueueChannelListener::<u8>::new(ListenerConfig::new("mem://a"), 4);
        let listener = listener.with_properties(Properties::new().with(42u16));
        assert_eq!(*listener.get_property::<u16>().unwrap(), 42);
        assert!(listener.get_property::<u32>().is_none());
    }
}
