//! Acceptor that wraps the channels of an inner acceptor.

use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::trace;

use super::ChannelAcceptor;
use crate::config::Timeouts;
use crate::error::Result;

/// Turns an inner channel into the outer channel type of a layer.
///
/// Any `Fn(I) -> Result<C>` closure is a wrapper.
pub trait ChannelWrapper<I, C>: Send + Sync + 'static {
    fn wrap(&self, inner: I) -> Result<C>;
}

impl<I, C, F> ChannelWrapper<I, C> for F
where
    F: Fn(I) -> Result<C> + Send + Sync + 'static,
{
    fn wrap(&self, inner: I) -> Result<C> {
        self(inner)
    }
}

pub struct LayeredChannelAcceptor<C, I: Send + 'static> {
    inner: Arc<dyn ChannelAcceptor<I>>,
    wrapper: Arc<dyn ChannelWrapper<I, C>>,
    timeouts: Timeouts,
    _outer: PhantomData<fn() -> C>,
}

impl<C, I> LayeredChannelAcceptor<C, I>
where
    C: Send + 'static,
    I: Send + 'static,
{
    pub fn new(
        inner: Arc<dyn ChannelAcceptor<I>>,
        wrapper: Arc<dyn ChannelWrapper<I, C>>,
        timeouts: Timeouts,
    ) -> Self {
        Self {
            inner,
            wrapper,
            timeouts,
            _outer: PhantomData,
        }
    }
}

#[async_trait]
impl<C, I> ChannelAcceptor<C> for LayeredChannelAcceptor<C, I>
where
    C: Send + 'static,
    I: Send + 'static,
{
    fn timeouts(&self) -> &Timeouts {
        &self.timeouts
    }

    async fn accept_channel(&self, timeout: Duration) -> Result<Option<C>> {
        match self.inner.accept_channel(timeout).await? {
            Some(inner) => {
                trace!("wrapping accepted inner channel");
                self.wrapper.wrap(inner).map(Some)
            }
            None => Ok(None),
        }
    }

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool> {
        self.inner.wait_for_channel(timeout).await
    }

    fn begin_wait_for_channel(self: Arc<Self>, timeout: Duration) -> crate::AsyncResult<bool> {
        Arc::clone(&self.inner).begin_wait_for_channel(timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acceptor::channel_queue;
    use crate::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const T: Duration = Duration::from_secs(1);

    #[derive(Debug, PartialEq)]
    struct Outer(u32);

    fn layered(
        inner: Arc<dyn ChannelAcceptor<u32>>,
        wraps: Arc<AtomicUsize>,
    ) -> Arc<LayeredChannelAcceptor<Outer, u32>> {
        let wrapper = move |n: u32| {
            wraps.fetch_add(1, Ordering::SeqCst);
            if n == 0 {
                Err(Error::Wrap("zero is not a channel".into()))
            } else {
                Ok(Outer(n))
            }
        };
        Arc::new(LayeredChannelAcceptor::new(
            inner,
            Arc::new(wrapper),
            Timeouts::default(),
        ))
    }

    #[tokio::test]
    async fn test_accept_wraps_inner_channel() {
        let (supply, inner) = channel_queue::<u32>(4, Timeouts::default());
        let wraps = Arc::new(AtomicUsize::new(0));
        let acceptor = layered(Arc::new(inner), Arc::clone(&wraps));

        supply.offer(7).await.unwrap();
        assert_eq!(acceptor.accept_channel(T).await.unwrap(), Some(Outer(7)));
        assert_eq!(wraps.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_inner_skips_wrap() {
        let (supply, inner) = channel_queue::<u32>(4, Timeouts::default());
        let wraps = Arc::new(AtomicUsize::new(0));
        let acceptor = layered(Arc::new(inner), Arc::clone(&wraps));
        drop(supply);

        assert_eq!(acceptor.accept_channel(T).await.unwrap(), None);
        let result = Arc::clone(&acceptor).begin_accept_channel(T);
        assert!(result.completed_synchronously());
        assert_eq!(result.end().await.unwrap(), None);
        assert_eq!(wraps.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_wrap_error_propagates_unchanged() {
        let (supply, inner) = channel_queue::<u32>(4, Timeouts::default());
        let acceptor = layered(Arc::new(inner), Arc::new(AtomicUsize::new(0)));

        supply.offer(0).await.unwrap();
        let err = acceptor.accept_channel(T).await.unwrap_err();
        assert!(matches!(err, Error::Wrap(_)));
    }

    #[tokio::test]
    async fn test_inner_timeout_propagates_unchanged() {
        let (_supply, inner) = channel_queue::<u32>(4, Timeouts::default());
        let acceptor = layered(Arc::new(inner), Arc::new(AtomicUsize::new(0)));

        let err = acceptor
            .accept_channel(Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_wait_passes_through_without_wrapping() {
        let (supply, inner) = channel_queue::<u32>(4, Timeouts::default());
        let wraps = Arc::new(AtomicUsize::new(0));
        let acceptor = layered(Arc::new(inner), Arc::clone(&wraps));

        supply.offer(3).await.unwrap();
        assert!(acceptor.wait_for_channel(T).await.unwrap());
        let waited = Arc::clone(&acceptor).begin_wait_for_channel(T);
        assert!(waited.end().await.unwrap());
        assert_eq!(wraps.load(Ordering::SeqCst), 0);

        assert_eq!(acceptor.accept_channel(T).await.unwrap(), Some(Outer(3)));
        assert_eq!(wraps.load(Ordering::SeqCst), 1);
    }
}
