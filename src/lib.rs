// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # selio - single-threaded non-blocking socket runtime
//!
//! A readiness-driven runtime that multiplexes many TCP and UDP sockets on
//! one owning thread, with a TLS record-layer adapter between raw socket
//! I/O and application-visible byte streams.
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                         Application Layer                           |
//! |        IoHandler (on_accept / on_receive / on_exception)            |
//! +---------------------------------------------------------------------+
//! |                          Session Layer                              |
//! |   Session | ByteChannel (app data) | HeartBeat | MessageSplitter    |
//! +---------------------------------------------------------------------+
//! |                           TLS Layer                                 |
//! |   TlsAdapter (handshake drive, record pump) | TlsEngine | rustls    |
//! +---------------------------------------------------------------------+
//! |                          Runtime Layer                              |
//! |   EventRunner (task pump) | SocketSelector (poll, scratch buffer)   |
//! +---------------------------------------------------------------------+
//! ```
//!
//! All selector work, registration, cancellation, TLS, and writes execute
//! on the one thread owned by the [`EventRunner`]; foreign threads only
//! submit tasks. That single ownership removes every lock from the hot
//! path except the release guards on shared buffers.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use selio::{EventRunner, IoHandler, Session, SocketConfig, SocketContext, SocketSelector};
//!
//! struct Echo;
//!
//! impl IoHandler for Echo {
//!     fn on_receive(&self, session: &Arc<Session>) {
//!         if let Some(mut view) = session.read_channel().byte_buffer() {
//!             let data = view.as_slice().to_vec();
//!             view.consume(data.len());
//!             drop(view);
//!             session.send(data);
//!         }
//!     }
//! }
//!
//! fn main() -> std::io::Result<()> {
//!     let runner = EventRunner::start(SocketSelector::new()?)?;
//!     let ctx = Arc::new(SocketContext::new(SocketConfig::default(), Arc::new(Echo)));
//!     let addr = runner.tcp_listen("127.0.0.1:7000".parse().unwrap(), ctx)?;
//!     println!("echo server on {}", addr);
//!     loop {
//!         std::thread::park();
//!     }
//! }
//! ```
//!
//! ## Key types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EventRunner`] | Task pump owning the selector thread |
//! | [`SocketSelector`] | Poll cycle, reads, bounded writes, exception policy |
//! | [`Session`] | One logical connection with its application channel |
//! | [`ByteChannel`] | Bounded growable byte queue with view/compact reads |
//! | [`TlsAdapter`] | Per-session handshake driver and record pump |
//! | [`TlsEngine`] | Status-code TLS engine contract ([`RustlsEngine`] built in) |

pub mod channel;
pub mod context;
pub mod hooks;
pub mod runner;
pub mod selector;
pub mod session;
pub mod tls;

mod prepare;

pub use channel::{ByteChannel, ChannelError, ChannelView};
pub use context::{SocketConfig, SocketContext, TlsEngineFactory};
pub use hooks::{HeartBeat, IoHandler, MessageSplitter};
pub use runner::EventRunner;
pub use selector::SocketSelector;
pub use session::{Session, StopType};
pub use tls::{
    EngineResult, EngineStatus, HandshakeStatus, RecordSink, RustlsEngine, SessionLink, TlsAdapter,
    TlsEngine, TlsError,
};
