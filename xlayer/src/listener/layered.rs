//! Listener composed on top of an inner listener.
//!
//! The layer owns its inner listener unless it was built with
//! `shared_inner`, in which case some other party drives the inner
//! lifecycle and the layer only reads from it. Either way an inner fault
//! faults the layer. The fault subscription is dropped before the inner
//! listener is closed or aborted, so the inner's own shutdown never faults
//! the layer.

use std::any::TypeId;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;

use super::{ChannelListener, Listener};
use crate::acceptor::{ChannelAcceptor, ChannelWrapper, LayeredChannelAcceptor, ListenerAcceptor};
use crate::config::{ListenerConfig, Timeouts};
use crate::error::{Error, Result};
use crate::event::{FaultHandler, Subscription};
use crate::properties::{Properties, PropertyValue};
use crate::state::{CommunicationObject, CommunicationState};

struct InnerBinding<C, I: Send + 'static> {
    listener: Arc<dyn ChannelListener<I>>,
    acceptor: Arc<LayeredChannelAcceptor<C, I>>,
}

impl<C, I: Send + 'static> Clone for InnerBinding<C, I> {
    fn clone(&self) -> Self {
        Self {
            listener: Arc::clone(&self.listener),
            acceptor: Arc::clone(&self.acceptor),
        }
    }
}

pub struct LayeredChannelListener<C, I: Send + 'static> {
    config: ListenerConfig,
    lifecycle: Arc<CommunicationObject>,
    properties: Properties,
    shared_inner: bool,
    wrapper: Arc<dyn ChannelWrapper<I, C>>,
    inner: Mutex<Option<InnerBinding<C, I>>>,
    fault_subscription: Mutex<Option<Subscription>>,
}

impl<C, I> LayeredChannelListener<C, I>
where
    C: Send + 'static,
    I: Send + 'static,
{
    pub fn new<W>(
        config: ListenerConfig,
        inner: Option<Arc<dyn ChannelListener<I>>>,
        shared_inner: bool,
        wrapper: W,
    ) -> Self
    where
        W: ChannelWrapper<I, C>,
    {
        let listener = Self {
            lifecycle: Arc::new(CommunicationObject::new(format!(
                "layered listener {}",
                config.uri
            ))),
            config,
            properties: Properties::new(),
            shared_inner,
            wrapper: Arc::new(wrapper),
            inner: Mutex::new(None),
            fault_subscription: Mutex::new(None),
        };
        if let Some(inner) = inner {
            listener.bind_inner(inner);
        }
        listener
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Assigns the inner listener. Only allowed before the layer is opened.
    pub fn set_inner_listener(&self, inner: Arc<dyn ChannelListener<I>>) -> Result<()> {
        self.lifecycle.ensure_created()?;
        self.bind_inner(inner);
        Ok(())
    }

    pub fn inner_listener(&self) -> Option<Arc<dyn ChannelListener<I>>> {
        self.inner.lock().as_ref().map(|b| Arc::clone(&b.listener))
    }

    pub fn is_shared_inner(&self) -> bool {
        self.shared_inner
    }

    fn bind_inner(&self, listener: Arc<dyn ChannelListener<I>>) {
        let outer = Arc::downgrade(&self.lifecycle);
        let uri = self.config.uri.clone();
        let handler: FaultHandler = Arc::new(move || {
            if let Some(outer) = outer.upgrade() {
                warn!("inner listener of {} faulted", uri);
                outer.fault();
            }
        });
        let subscription = listener.on_faulted(handler);

        let acceptor = LayeredChannelAcceptor::new(
            Arc::new(ListenerAcceptor::new(Arc::clone(&listener))),
            Arc::clone(&self.wrapper),
            self.config.timeouts,
        );
        *self.inner.lock() = Some(InnerBinding {
            listener,
            acceptor: Arc::new(acceptor),
        });
        // Replacing an earlier subscription drops it, which unsubscribes.
        *self.fault_subscription.lock() = Some(subscription);
    }

    fn binding(&self) -> Result<InnerBinding<C, I>> {
        self.inner
            .lock()
            .clone()
            .ok_or_else(|| Error::invalid_operation("inner listener not configured"))
    }

    fn unsubscribe_inner_fault(&self) {
        if let Some(subscription) = self.fault_subscription.lock().take() {
            subscription.unsubscribe();
        }
    }

    fn abort_inner(&self) {
        self.unsubscribe_inner_fault();
        if self.shared_inner {
            return;
        }
        let Some(inner) = self.inner_listener() else {
            return;
        };
        if catch_unwind(AssertUnwindSafe(|| inner.abort())).is_err() {
            warn!(
                "inner listener {} panicked while aborting under {}",
                inner.uri(),
                self.config.uri
            );
        }
    }
}

#[async_trait]
impl<C, I> Listener for LayeredChannelListener<C, I>
where
    C: Send + 'static,
    I: Send + 'static,
{
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
        self.properties.get_any(type_id).or_else(|| {
            self.inner_listener()
                .and_then(|inner| inner.property(type_id))
        })
    }

    fn on_faulted(&self, handler: FaultHandler) -> Subscription {
        self.lifecycle.subscribe_faulted(handler)
    }

    async fn open(&self, timeout: Duration) -> Result<()> {
        let binding = self.binding()?;
        let shared = self.shared_inner;
        self.lifecycle
            .open_with(timeout, async move {
                if shared {
                    debug!("inner listener {} is shared, not opening it", binding.listener.uri());
                    return Ok(());
                }
                binding.listener.open(timeout).await
            })
            .await
    }

    async fn close(&self, timeout: Duration) -> Result<()> {
        self.lifecycle
            .close_with(
                timeout,
                async {
                    self.unsubscribe_inner_fault();
                    match self.inner_listener() {
                        Some(inner) if !self.shared_inner => inner.close(timeout).await,
                        _ => Ok(()),
                    }
                },
                || self.abort_inner(),
            )
            .await
    }

    fn abort(&self) {
        if self.lifecycle.abort() {
            self.abort_inner();
        }
    }
}

#[async_trait]
impl<C, I> ChannelListener<C> for LayeredChannelListener<C, I>
where
    C: Send + 'static,
    I: Send + 'static,
{
    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>> {
        self.lifecycle.ensure_opened()?;
        let binding = self.binding()?;
        binding.acceptor.accept_channel(timeout).await
    }

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool> {
        self.lifecycle.ensure_opened()?;
        let binding = self.binding()?;
        binding.acceptor.wait_for_channel(timeout).await
    }
}
