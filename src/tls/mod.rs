// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! TLS record layer: the per-session adapter sitting between raw socket
//! bytes and application-visible plaintext.
//!
//! ```text
//! +-----------------------------------------------------------+
//! |                       TlsAdapter                           |
//! |  ciphertext inbox (ByteChannel)                            |
//! |        |                                                   |
//! |        v            +-----------+        +--------------+  |
//! |   unwrap pump  ---> | TlsEngine | <----  | wrap (sends) |  |
//! |        |            +-----------+        +--------------+  |
//! |        v                                        ^          |
//! |  application channel                     plaintext writes  |
//! +-----------------------------------------------------------+
//! ```
//!
//! The adapter owns two packet-sized plane buffers (application plane for
//! unwrap output, network plane for wrap output). Each is individually
//! release-guarded so a release racing an in-flight call yields `None`
//! instead of touching freed storage.

pub mod adapter;
pub mod engine;
pub mod rustls_engine;

pub use adapter::TlsAdapter;
pub use engine::{EngineResult, EngineStatus, EngineTask, HandshakeStatus, TlsEngine};
pub use rustls_engine::RustlsEngine;

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Errors produced by the TLS layer.
#[derive(Debug)]
pub enum TlsError {
    /// Handshake failed (protocol error, iteration cap, or disconnect).
    Handshake(String),

    /// Handshake made no progress within the read timeout.
    HandshakeTimeout(SocketAddr),

    /// The engine reported a fatal error.
    Engine(String),

    /// The engine or the peer closed the connection.
    Closed,

    /// I/O error while moving records.
    Io(io::Error),
}

impl fmt::Display for TlsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TlsError::Handshake(msg) => write!(f, "TLS handshake failed: {}", msg),
            TlsError::HandshakeTimeout(addr) => {
                write!(f, "TLS handshake on {} timed out", addr)
            }
            TlsError::Engine(msg) => write!(f, "TLS engine error: {}", msg),
            TlsError::Closed => write!(f, "TLS connection closed"),
            TlsError::Io(e) => write!(f, "TLS I/O error: {}", e),
        }
    }
}

impl std::error::Error for TlsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TlsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TlsError {
    fn from(e: io::Error) -> Self {
        TlsError::Io(e)
    }
}

impl From<TlsError> for io::Error {
    fn from(e: TlsError) -> Self {
        match e {
            TlsError::Io(inner) => inner,
            other => io::Error::other(other),
        }
    }
}

/// Connection liveness as seen by the TLS layer.
///
/// Implemented by the runtime session; kept as a seam so the adapter can be
/// exercised without sockets.
pub trait SessionLink {
    /// Whether the underlying connection is still up.
    fn is_connected(&self) -> bool;

    /// Remote address, for diagnostics.
    fn remote_addr(&self) -> SocketAddr;
}

/// Outbound path for produced records.
///
/// The runtime backs this with its bounded raw send loop; tests back it
/// with a byte sink.
pub trait RecordSink {
    /// Send one produced record, completely or with a bounded stall.
    fn send_record(&mut self, data: &[u8]) -> io::Result<usize>;
}
