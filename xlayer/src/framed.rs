//! Message framing layered over byte-stream channels.
//!
//! Each message travels as a 4-byte big-endian length followed by its
//! payload. [`framed_listener`] layers this on top of any listener whose
//! channels are byte streams, e.g. a
//! [`SocketChannelListener`](crate::transport::SocketChannelListener).

use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::bytes::Bytes;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::config::{FramingConfig, ListenerConfig};
use crate::error::Result;
use crate::listener::{ChannelListener, LayeredChannelListener};
use crate::properties::Properties;

/// Duplex message channel over a byte stream.
#[derive(Debug)]
pub struct FramedChannel<S> {
    inner: Framed<S, LengthDelimitedCodec>,
}

impl<S> FramedChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, config: &FramingConfig) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(config.max_frame_length)
            .new_codec();
        Self {
            inner: Framed::new(stream, codec),
        }
    }

    pub async fn send(&mut self, message: impl Into<Bytes>) -> Result<()> {
        let message = message.into();
        log::trace!("sending framed message: {} bytes", message.len());
        self.inner.send(message).await?;
        Ok(())
    }

    /// Receives the next message, or `None` once the peer has closed.
    pub async fn recv(&mut self) -> Result<Option<Bytes>> {
        match self.inner.next().await {
            Some(Ok(frame)) => {
                log::trace!("received framed message: {} bytes", frame.len());
                Ok(Some(frame.freeze()))
            }
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// Flushes pending messages and shuts down the write half.
    pub async fn close(&mut self) -> Result<()> {
        SinkExt::<Bytes>::close(&mut self.inner).await?;
        Ok(())
    }

    pub fn get_ref(&self) -> &S {
        self.inner.get_ref()
    }
}

/// Layers message framing over `inner`.
///
/// The framing settings are exposed as a [`FramingConfig`] property of the
/// returned listener.
pub fn framed_listener<S>(
    config: ListenerConfig,
    inner: Arc<dyn ChannelListener<S>>,
    shared_inner: bool,
    framing: FramingConfig,
) -> LayeredChannelListener<FramedChannel<S>, S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    LayeredChannelListener::new(
        config,
        Some(inner),
        shared_inner,
        move |stream: S| -> Result<FramedChannel<S>> { Ok(FramedChannel::new(stream, &framing)) },
    )
    .with_properties(Properties::new().with(framing))
}
