//! Channel listeners.
//!
//! A listener is a communication object bound to an address that hands out
//! incoming channels. [`LayeredChannelListener`] composes one listener on top
//! of another; [`QueueChannelListener`] and
//! [`SocketChannelListener`](crate::transport::SocketChannelListener) are the
//! bottom layers.

mod layered;
mod queue;

pub use layered::LayeredChannelListener;
pub use queue::QueueChannelListener;

use std::any::{Any, TypeId};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::async_result::AsyncResult;
use crate::config::Timeouts;
use crate::error::Result;
use crate::event::{FaultHandler, Subscription};
use crate::properties::{downcast, PropertyValue};
use crate::state::CommunicationState;

#[async_trait]
pub trait Listener: Send + Sync + 'static {
    fn uri(&self) -> &str;

    fn state(&self) -> CommunicationState;

    fn timeouts(&self) -> &Timeouts;

    /// Looks up a property by type; see [`ListenerExt::get_property`].
    fn property(&self, type_id: TypeId) -> Option<PropertyValue>;

    /// Registers `handler` to run when this listener faults.
    fn on_faulted(&self, handler: FaultHandler) -> Subscription;

    async fn open(&self, timeout: Duration) -> Result<()>;

    async fn close(&self, timeout: Duration) -> Result<()>;

    /// Tears the listener down immediately. Never fails.
    fn abort(&self);

    /// Begin/end form of [`open`](Listener::open).
    ///
    /// Must be called within a tokio runtime: the operation is polled once
    /// right away and its timeout needs the runtime's timer.
    fn begin_open(self: Arc<Self>, timeout: Duration) -> AsyncResult<()> {
        AsyncResult::begin(async move { self.open(timeout).await })
    }

    /// Begin/end form of [`close`](Listener::close). Needs a tokio runtime,
    /// as [`begin_open`](Listener::begin_open) does.
    fn begin_close(self: Arc<Self>, timeout: Duration) -> AsyncResult<()> {
        AsyncResult::begin(async move { self.close(timeout).await })
    }
}

#[async_trait]
pub trait ChannelListener<C: Send + 'static>: Listener {
    /// Returns the next channel, or `None` once no more will arrive.
    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>>;

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool>;

    /// Begin/end forms of accept and wait. Like every `begin_*` operation
    /// these need a tokio runtime.
    fn begin_accept_channel(self: Arc<Self>, timeout: Duration) -> AsyncResult<Option<C>> {
        AsyncResult::begin(async move { self.accept_channel(timeout).await })
    }

    fn begin_wait_for_channel(self: Arc<Self>, timeout: Duration) -> AsyncResult<bool> {
        AsyncResult::begin(async move { self.wait_for_channel(timeout).await })
    }
}

pub trait ListenerExt: Listener {
    /// Typed property lookup. `None` stands for the type's default.
    fn get_property<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        downcast(self.property(TypeId::of::<T>()))
    }
}

impl<L: Listener + ?Sized> ListenerExt for L {}
