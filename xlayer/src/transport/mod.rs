//! Socket transports at the bottom of a listener stack.
//!
//! # Targets
//!
//! - `tcp:ADDR`: TCP socket, e.g. `tcp:127.0.0.1:7000`
//! - `unix:PATH`: Unix domain socket
//! - `vsock:CID:PORT`: virtio socket between a guest and its host
//!
//! Every target yields [`SocketStream`] channels.

mod listener;

pub use listener::{LocalAddress, SocketChannelListener};

use std::fmt;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpStream, UnixStream};
use tokio_vsock::{VsockAddr, VsockStream};

use crate::error::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListenTarget {
    Tcp(SocketAddr),
    Unix(PathBuf),
    Vsock { cid: u32, port: u32 },
}

impl fmt::Display for ListenTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ListenTarget::Tcp(addr) => write!(f, "tcp:{}", addr),
            ListenTarget::Unix(path) => write!(f, "unix:{}", path.display()),
            ListenTarget::Vsock { cid, port } => write!(f, "vsock:{}:{}", cid, port),
        }
    }
}

impl FromStr for ListenTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Error::InvalidTarget(s.to_string());
        let (scheme, rest) = s.split_once(':').ok_or_else(invalid)?;
        match scheme {
            "tcp" => rest.parse().map(ListenTarget::Tcp).map_err(|_| invalid()),
            "unix" if !rest.is_empty() => Ok(ListenTarget::Unix(PathBuf::from(rest))),
            "vsock" => {
                let (cid, port) = rest.split_once(':').ok_or_else(invalid)?;
                Ok(ListenTarget::Vsock {
                    cid: cid.parse().map_err(|_| invalid())?,
                    port: port.parse().map_err(|_| invalid())?,
                })
            }
            _ => Err(invalid()),
        }
    }
}

/// A connected byte stream over any [`ListenTarget`] transport.
pub enum SocketStream {
    Tcp(TcpStream),
    Unix(UnixStream),
    Vsock(VsockStream),
}

impl fmt::Debug for SocketStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocketStream::Tcp(s) => f.debug_tuple("Tcp").field(&s.peer_addr().ok()).finish(),
            SocketStream::Unix(_) => f.write_str("Unix"),
            SocketStream::Vsock(_) => f.write_str("Vsock"),
        }
    }
}

impl SocketStream {
    /// Connects to a listener at `target`.
    pub async fn connect(target: &ListenTarget) -> io::Result<Self> {
        let stream = match target {
            ListenTarget::Tcp(addr) => {
                let stream = TcpStream::connect(addr).await?;
                stream.set_nodelay(true)?;
                SocketStream::Tcp(stream)
            }
            ListenTarget::Unix(path) => SocketStream::Unix(UnixStream::connect(path).await?),
            ListenTarget::Vsock { cid, port } => {
                SocketStream::Vsock(VsockStream::connect(VsockAddr::new(*cid, *port)).await?)
            }
        };
        log::debug!("connected to {}", target);
        Ok(stream)
    }
}

impl AsyncRead for SocketStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketStream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            SocketStream::Unix(s) => Pin::new(s).poll_read(cx, buf),
            SocketStream::Vsock(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            SocketStream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            SocketStream::Unix(s) => Pin::new(s).poll_write(cx, buf),
            SocketStream::Vsock(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketStream::Tcp(s) => Pin::new(s).poll_flush(cx),
            SocketStream::Unix(s) => Pin::new(s).poll_flush(cx),
            SocketStream::Vsock(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketStream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            SocketStream::Unix(s) => Pin::new(s).poll_shutdown(cx),
            SocketStream::Vsock(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_targets() {
        assert_eq!(
            "tcp:127.0.0.1:7000".parse::<ListenTarget>().unwrap(),
            ListenTarget::Tcp("127.0.0.1:7000".parse().unwrap())
        );
        assert_eq!(
            "unix:/tmp/x.sock".parse::<ListenTarget>().unwrap(),
            ListenTarget::Unix(PathBuf::from("/tmp/x.sock"))
        );
        assert_eq!(
            "vsock:3:1234".parse::<ListenTarget>().unwrap(),
            ListenTarget::Vsock { cid: 3, port: 1234 }
        );
    }

    #[test]
    fn test_reject_bad_targets() {
        for bad in ["", "tcp", "tcp:nowhere", "unix:", "vsock:3", "vsock:a:1", "udp:1.2.3.4:5"] {
            let err = bad.parse::<ListenTarget>().unwrap_err();
            assert!(matches!(err, Error::InvalidTarget(_)), "{bad}");
        }
    }

    #[test]
    fn test_display_round_trips() {
        let target = ListenTarget::Vsock { cid: 2, port: 9 };
        assert_eq!(target.to_string().parse::<ListenTarget>().unwrap(), target);
    }
}
