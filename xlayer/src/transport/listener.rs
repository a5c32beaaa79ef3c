//! Listener accepting raw socket streams.

use std::any::{Any, TypeId};
use std::io;
use std::os::unix::fs::FileTypeExt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, info, trace, warn};
use parking_lot::Mutex;
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tokio_vsock::{VsockAddr, VsockListener};

use super::{ListenTarget, SocketStream};
use crate::config::{ListenerConfig, Timeouts};
use crate::error::{Error, Result};
use crate::event::{FaultHandler, Subscription};
use crate::listener::{ChannelListener, Listener};
use crate::properties::{Properties, PropertyValue};
use crate::state::{CommunicationObject, CommunicationState};

/// Address a [`SocketChannelListener`] is actually bound to.
///
/// Available as a listener property once the listener is open; a TCP
/// target bound to port 0 reports the assigned port here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAddress(pub ListenTarget);

enum BoundSocket {
    Tcp(TcpListener),
    Unix(UnixListener),
    Vsock(VsockListener),
}

impl BoundSocket {
    async fn bind(target: &ListenTarget) -> io::Result<(Self, ListenTarget)> {
        match target {
            ListenTarget::Tcp(addr) => {
                let listener = TcpListener::bind(addr).await?;
                let local = ListenTarget::Tcp(listener.local_addr()?);
                Ok((BoundSocket::Tcp(listener), local))
            }
            ListenTarget::Unix(path) => {
                // Only a leftover socket is cleared; any other file makes bind fail.
                if let Ok(meta) = tokio::fs::symlink_metadata(path).await {
                    if meta.file_type().is_socket() {
                        debug!("removing stale socket file {:?}", path);
                        tokio::fs::remove_file(path).await?;
                    }
                }
                let listener = UnixListener::bind(path)?;
                Ok((BoundSocket::Unix(listener), target.clone()))
            }
            ListenTarget::Vsock { cid, port } => {
                let listener = VsockListener::bind(VsockAddr::new(*cid, *port))?;
                Ok((BoundSocket::Vsock(listener), target.clone()))
            }
        }
    }

    async fn accept(&self) -> io::Result<SocketStream> {
        match self {
            BoundSocket::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                stream.set_nodelay(true)?;
                trace!("accepted TCP connection from {:?}", peer);
                Ok(SocketStream::Tcp(stream))
            }
            BoundSocket::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                trace!("accepted Unix connection");
                Ok(SocketStream::Unix(stream))
            }
            BoundSocket::Vsock(listener) => {
                let (stream, peer) = listener.accept().await?;
                trace!("accepted Vsock connection from {:?}", peer);
                Ok(SocketStream::Vsock(stream))
            }
        }
    }
}

/// Bottom-layer listener over a TCP, Unix or vsock socket.
pub struct SocketChannelListener {
    config: ListenerConfig,
    target: ListenTarget,
    lifecycle: CommunicationObject,
    properties: Properties,
    bound: Mutex<Option<(Arc<BoundSocket>, ListenTarget)>>,
    /// Stream accepted by `wait_for_channel` and not yet handed out.
    pending: tokio::sync::Mutex<Option<SocketStream>>,
    shutdown: CancellationToken,
}

impl SocketChannelListener {
    pub fn new(target: ListenTarget, timeouts: Timeouts) -> Self {
        let config = ListenerConfig::new(target.to_string()).with_timeouts(timeouts);
        Self {
            lifecycle: CommunicationObject::new(format!("socket listener {}", target)),
            config,
            target,
            properties: Properties::new(),
            bound: Mutex::new(None),
            pending: tokio::sync::Mutex::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    pub fn local_address(&self) -> Option<LocalAddress> {
        self.bound
            .lock()
            .as_ref()
            .map(|(_, local)| LocalAddress(local.clone()))
    }

    fn socket(&self) -> Result<Arc<BoundSocket>> {
        self.bound
            .lock()
            .as_ref()
            .map(|(socket, _)| Arc::clone(socket))
            .ok_or(Error::Closed)
    }

    async fn bind(&self) -> Result<()> {
        let (socket, local) = BoundSocket::bind(&self.target).await?;
        info!("listening on {}", local);
        *self.bound.lock() = Some((Arc::new(socket), local));
        Ok(())
    }

    async fn next_stream(&self) -> Result<Option<SocketStream>> {
        let socket = self.socket()?;
        tokio::select! {
            biased;
            _ = self.shutdown.cancelled() => Ok(None),
            accepted = socket.accept() => accepted.map(Some).map_err(Error::from),
        }
    }

    async fn take_stream(&self) -> Result<Option<SocketStream>> {
        let mut pending = self.pending.lock().await;
        if let Some(stream) = pending.take() {
            return Ok(Some(stream));
        }
        self.next_stream().await
    }

    async fn peek_stream(&self) -> Result<bool> {
        let mut pending = self.pending.lock().await;
        if pending.is_some() {
            return Ok(true);
        }
        match self.next_stream().await? {
            Some(stream) => {
                *pending = Some(stream);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Stops accepting and releases the socket. Idempotent.
    fn release(&self) {
        self.shutdown.cancel();
        if self.bound.lock().take().is_none() {
            return;
        }
        if let ListenTarget::Unix(path) = &self.target {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("failed to remove socket file {:?}: {}", path, e);
            }
        }
        debug!("released {}", self.target);
    }
}

#[async_trait]
impl Listener for SocketChannelListener {
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
        if type_id == TypeId::of::<LocalAddress>() {
            return self
                .local_address()
                .map(|addr| Arc::new(addr) as Arc<dyn Any + Send + Sync>);
        }
        self.properties.get_any(type_id)
    }

    fn on_faulted(&self, handler: FaultHandler) -> Subscription {
        self.lifecycle.subscribe_faulted(handler)
    }

    async fn open(&self, timeout: Duration) -> Result<()> {
        self.lifecycle.open_with(timeout, self.bind()).await
    }

    async fn close(&self, timeout: Duration) -> Result<()> {
        self.lifecycle
            .close_with(
                timeout,
                async {
                    self.release();
                    Ok(())
                },
                || self.release(),
            )
            .await
    }

    fn abort(&self) {
        if self.lifecycle.abort() {
            self.release();
        }
    }
}

#[async_trait]
impl ChannelListener<SocketStream> for SocketChannelListener {
    async fn accept_channel(&self, timeout: Duration) -> Result<Option<SocketStream>> {
        self.lifecycle.ensure_opened()?;
        tokio::time::timeout(timeout, self.take_stream())
            .await
            .map_err(|_| Error::timeout("accept channel", timeout))?
    }

    async fn wait_for_channel(&self, timeout: Duration) -> Result<bool> {
        self.lifecycle.ensure_opened()?;
        tokio::time::timeout(timeout, self.peek_stream())
            .await
            .map_err(|_| Error::timeout("wait for channel", timeout))?
    }
}
