// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Logical connection state.
//!
//! A [`Session`] is created on accept or connect (TCP), on connect
//! (datagram), or implicitly per remote address on an unconnected datagram
//! server. It is owned by its selector registration and handed to
//! application code as an `Arc`; `send` and `close` are safe from any
//! thread because both only submit tasks to the owning runner.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::Token;
use parking_lot::Mutex;

use crate::channel::ByteChannel;
use crate::context::SocketContext;
use crate::runner::EventRunner;
use crate::tls::{SessionLink, TlsAdapter};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopType {
    /// Still running.
    Running,

    /// The peer ended the stream (EOF or splitter-detected marker).
    StreamEnd,

    /// Closed locally or by the runtime (write timeout, shutdown).
    SocketClosed,

    /// Torn down after an error.
    Exception,
}

/// Transport flavor of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Tcp,
    UdpConnected,
    /// Implicit child of an unconnected datagram server.
    UdpPeer,
}

/// One logical connection.
pub struct Session {
    pub(crate) token: Token,

    /// Set for implicit datagram children; used to address sends and to
    /// key the parent's child map.
    pub(crate) peer: Option<SocketAddr>,

    pub(crate) kind: SessionKind,

    remote_addr: SocketAddr,
    read_channel: ByteChannel,
    tls: Option<Arc<TlsAdapter>>,
    ctx: Arc<SocketContext>,
    runner: EventRunner,
    connected: AtomicBool,
    stop_type: Mutex<StopType>,
}

impl Session {
    pub(crate) fn new(
        token: Token,
        peer: Option<SocketAddr>,
        remote_addr: SocketAddr,
        kind: SessionKind,
        ctx: Arc<SocketContext>,
        runner: EventRunner,
    ) -> Arc<Self> {
        let read_channel = ByteChannel::new(ctx.config.app_channel_size);
        let tls = ctx
            .tls_factory
            .as_ref()
            .map(|factory| Arc::new(TlsAdapter::new(factory(), ctx.config.read_timeout)));

        Arc::new(Self {
            token,
            peer,
            kind,
            remote_addr,
            read_channel,
            tls,
            ctx,
            runner,
            connected: AtomicBool::new(true),
            stop_type: Mutex::new(StopType::Running),
        })
    }

    /// Remote peer address.
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// The application-facing read channel (decrypted, heartbeat-filtered).
    pub fn read_channel(&self) -> &ByteChannel {
        &self.read_channel
    }

    /// The session's TLS adapter, when the context configures one.
    pub fn tls(&self) -> Option<&Arc<TlsAdapter>> {
        self.tls.as_ref()
    }

    /// True when there is no TLS or its handshake has completed.
    pub fn tls_handshake_done(&self) -> bool {
        self.tls.as_ref().map_or(true, |tls| tls.handshake_done())
    }

    /// Whether the session is still up.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Why the session stopped; `Running` while alive.
    pub fn stop_type(&self) -> StopType {
        *self.stop_type.lock()
    }

    pub(crate) fn context(&self) -> &Arc<SocketContext> {
        &self.ctx
    }

    /// Record the first stop cause and drop the connected flag.
    pub(crate) fn mark_disconnected(&self, stop: StopType) {
        self.connected.store(false, Ordering::Release);
        let mut current = self.stop_type.lock();
        if *current == StopType::Running {
            *current = stop;
        }
    }

    /// Queue `data` for sending on the owning runner thread.
    ///
    /// TLS sessions wrap after the handshake has completed. Returns whether
    /// the task was accepted (false once the session or runner is closed).
    pub fn send(self: &Arc<Self>, data: impl Into<Vec<u8>>) -> bool {
        if !self.is_connected() {
            return false;
        }
        let session = Arc::clone(self);
        let data = data.into();
        self.runner.add_event(move |selector| {
            let _ = selector.write(&session, &data);
        })
    }

    /// Close the session: the registration is removed on the next runner
    /// tick. Idempotent; safe from any thread.
    pub fn close(self: &Arc<Self>) {
        let session = Arc::clone(self);
        self.runner.add_event(move |selector| {
            selector.unregister(&session);
        });
    }
}

impl SessionLink for Session {
    fn is_connected(&self) -> bool {
        Session::is_connected(self)
    }

    fn remote_addr(&self) -> SocketAddr {
        Session::remote_addr(self)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("token", &self.token.0)
            .field("remote", &self.remote_addr)
            .field("kind", &self.kind)
            .field("connected", &self.is_connected())
            .field("stop_type", &self.stop_type())
            .finish()
    }
}
