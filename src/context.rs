// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Socket configuration and per-socket collaborator bundle.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::hooks::{HeartBeat, IoHandler, MessageSplitter};
use crate::tls::TlsEngine;

/// Builds one TLS engine per accepted or connected session.
pub type TlsEngineFactory = Arc<dyn Fn() -> Box<dyn TlsEngine> + Send + Sync>;

/// Tunables for one socket and the sessions it produces.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    /// Bounds handshake drives and backpressure waits.
    pub read_timeout: Duration,

    /// Bounds any single send loop without progress.
    pub send_timeout: Duration,

    /// Capacity threshold of the per-session application channel.
    pub app_channel_size: usize,

    /// TCP_NODELAY on stream sockets.
    pub nodelay: bool,

    /// SO_SNDBUF, when set.
    pub send_buffer_size: Option<usize>,

    /// SO_RCVBUF, when set.
    pub recv_buffer_size: Option<usize>,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(3),
            send_timeout: Duration::from_secs(5),
            app_channel_size: 256 * 1024,
            nodelay: true,
            send_buffer_size: None,
            recv_buffer_size: None,
        }
    }
}

/// Configuration plus collaborators for one socket.
///
/// Accepted child sessions share their server's context.
pub struct SocketContext {
    pub(crate) config: SocketConfig,
    pub(crate) handler: Arc<dyn IoHandler>,
    pub(crate) splitter: Option<Arc<dyn MessageSplitter>>,
    pub(crate) heartbeat: Option<Arc<dyn HeartBeat>>,
    pub(crate) tls_factory: Option<TlsEngineFactory>,
}

impl SocketContext {
    pub fn new(config: SocketConfig, handler: Arc<dyn IoHandler>) -> Self {
        Self {
            config,
            handler,
            splitter: None,
            heartbeat: None,
            tls_factory: None,
        }
    }

    /// Attach a message splitter.
    pub fn with_splitter(mut self, splitter: Arc<dyn MessageSplitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Attach a heartbeat interceptor.
    pub fn with_heartbeat(mut self, heartbeat: Arc<dyn HeartBeat>) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Enable TLS: every session from this socket gets an adapter around a
    /// freshly built engine.
    pub fn with_tls(mut self, factory: TlsEngineFactory) -> Self {
        self.tls_factory = Some(factory);
        self
    }

    pub fn config(&self) -> &SocketConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<dyn IoHandler> {
        &self.handler
    }
}

impl fmt::Debug for SocketContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketContext")
            .field("config", &self.config)
            .field("splitter", &self.splitter.is_some())
            .field("heartbeat", &self.heartbeat.is_some())
            .field("tls", &self.tls_factory.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
