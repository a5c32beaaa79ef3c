//! # XLayer - Layered Channel Listeners
//!
//! XLayer composes channel listeners the way transport stacks compose
//! protocols: each layer wraps the channels of the layer beneath it and
//! shares one open/close/fault lifecycle with it.
//!
//! - **Lifecycle**: `Created → Opening → Opened → Closing → Closed`, with a
//!   sticky `Faulted` state reachable from any non-closed state
//! - **Acceptors**: accept or wait for channels with explicit timeouts, in
//!   awaitable or begin/end form
//! - **Layering**: a layered listener owns or shares its inner listener and
//!   forwards inner faults outward
//! - **Transports**: TCP, Unix socket and vsock listeners at the bottom of a
//!   stack, plus a length-delimited framing layer
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Application Layer                     │
//! ├─────────────────────────────────────────────────────────┤
//! │            LayeredChannelListener<C, I>                  │
//! │  ┌──────────────────┐ ┌──────────────┐ ┌─────────────┐  │
//! │  │ LayeredAcceptor  │ │ Fault relay  │ │  Lifecycle  │  │
//! │  └──────────────────┘ └──────────────┘ └─────────────┘  │
//! ├─────────────────────────────────────────────────────────┤
//! │                 Inner ChannelListener<I>                 │
//! │  ┌──────────────────┐ ┌──────────────────────────────┐  │
//! │  │ Queue (in-proc)  │ │  Socket (TCP / Unix / vsock) │  │
//! │  └──────────────────┘ └──────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use xlayer::{framed_listener, FramingConfig, ListenTarget, ListenerConfig,
//!              SocketChannelListener, Timeouts};
//! use xlayer::listener::{ChannelListener, Listener};
//!
//! let target: ListenTarget = "tcp:127.0.0.1:7000".parse()?;
//! let sockets = Arc::new(SocketChannelListener::new(target, Timeouts::default()));
//! let listener = framed_listener(ListenerConfig::new("framed"), sockets, false,
//!                                FramingConfig::default());
//!
//! listener.open(listener.timeouts().open).await?;
//! while let Some(mut channel) = listener.accept_channel(listener.timeouts().receive).await? {
//!     let message = channel.recv().await?;
//! }
//! ```

#![deny(unsafe_code)]

pub mod acceptor;
pub mod async_result;
pub mod config;
pub mod error;
pub mod event;
pub mod framed;
pub mod listener;
pub mod properties;
pub mod state;
pub mod transport;

// Re-export commonly used types
pub use acceptor::{ChannelAcceptor, ChannelWrapper, LayeredChannelAcceptor};
pub use async_result::AsyncResult;
pub use config::{FramingConfig, ListenerConfig, Timeouts};
pub use error::{Error, ErrorKind, Result};
pub use event::{FaultHandler, Subscription};
pub use framed::{framed_listener, FramedChannel};
pub use listener::{ChannelListener, LayeredChannelListener, Listener, ListenerExt};
pub use properties::Properties;
pub use state::{CommunicationObject, CommunicationState};
pub use transport::{ListenTarget, LocalAddress, SocketChannelListener, SocketStream};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
