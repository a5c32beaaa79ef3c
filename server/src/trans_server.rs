use std::sync::Arc;
use std::time::{Duration, Instant};

use log::*;
use xlayer::{
    framed_listener, ChannelListener, ErrorKind, FramedChannel, FramingConfig,
    LayeredChannelListener, ListenTarget, Listener, ListenerConfig, SocketChannelListener,
    SocketStream, Timeouts,
};

/// Pause after a failed accept, so a persistent error such as descriptor
/// exhaustion does not spin the loop.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(10);

type EchoListener = LayeredChannelListener<FramedChannel<SocketStream>, SocketStream>;

pub struct TransServer {
    target: ListenTarget,
    timeouts: Timeouts,
    framing: FramingConfig,
}

impl TransServer {
    pub fn new(target: ListenTarget, timeouts: Timeouts, framing: FramingConfig) -> Self {
        Self {
            target,
            timeouts,
            framing,
        }
    }

    pub async fn run(&self) -> xlayer::Result<()> {
        let sockets: Arc<dyn ChannelListener<SocketStream>> =
            Arc::new(SocketChannelListener::new(self.target.clone(), self.timeouts));
        let listener: Arc<EchoListener> = Arc::new(framed_listener(
            ListenerConfig::new(format!("framed+{}", self.target)).with_timeouts(self.timeouts),
            sockets,
            false,
            self.framing,
        ));
        listener.open(self.timeouts.open).await?;
        info!("Server listening on {}", self.target);

        tokio::select! {
            result = Self::accept_loop(Arc::clone(&listener), self.timeouts) => {
                if let Err(e) = &result {
                    error!("Accept loop failed: {}", e);
                }
                listener.abort();
                result
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                listener.close(self.timeouts.close).await
            }
        }
    }

    async fn accept_loop(listener: Arc<EchoListener>, timeouts: Timeouts) -> xlayer::Result<()> {
        loop {
            match listener.accept_channel(timeouts.receive).await {
                Ok(Some(channel)) => {
                    info!("Accepted framed channel");
                    tokio::spawn(async move {
                        if let Err(e) = Self::handle_channel(channel).await {
                            error!("[Echo] Channel error: {}", e);
                        }
                    });
                }
                Ok(None) => {
                    info!("Listener exhausted");
                    return Ok(());
                }
                Err(e) if e.is_timeout() => {
                    trace!("No connection within {:?}", timeouts.receive);
                }
                Err(e) if !is_fatal(&e) => {
                    warn!("Dropped incoming connection: {}", e);
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Echoes every message back until the peer closes its side.
    async fn handle_channel(mut channel: FramedChannel<SocketStream>) -> xlayer::Result<()> {
        let mut total = 0usize;
        let start = Instant::now();
        while let Some(message) = channel.recv().await? {
            total += message.len();
            debug!("[Echo] {} bytes", message.len());
            channel.send(message).await?;
        }
        channel.close().await?;

        let elapsed = start.elapsed();
        let speed = (total as f64 / 1024.0) / elapsed.as_secs_f64();
        info!("=== Channel Complete ===");
        info!("Total echoed: {} KB", total / 1024);
        info!("Time: {:.2} seconds", elapsed.as_secs_f64());
        info!("Speed: {:.2} KB/s", speed);
        Ok(())
    }
}

/// Whether an accept error ends the accept loop.
///
/// I/O errors belong to a single connection (reset, aborted, out of
/// descriptors); lifecycle and configuration errors mean the listener itself
/// is gone.
fn is_fatal(err: &xlayer::Error) -> bool {
    !matches!(err.kind(), ErrorKind::Io | ErrorKind::Timeout | ErrorKind::Wrap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use xlayer::Error;

    #[test]
    fn test_connection_errors_keep_accepting() {
        let aborted = Error::from(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(!is_fatal(&aborted));
        assert!(!is_fatal(&Error::Wrap("bad handshake".into())));
        assert!(!is_fatal(&Error::timeout("accept channel", Duration::from_secs(1))));
    }

    #[test]
    fn test_listener_errors_stop_accepting() {
        assert!(is_fatal(&Error::Closed));
        assert!(is_fatal(&Error::Faulted));
        assert!(is_fatal(&Error::invalid_operation("not opened")));
    }
}
