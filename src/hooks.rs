// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Application-facing collaborator contracts.
//!
//! The runtime calls these on its owning thread; implementations must not
//! block for long, or the whole selector stalls.

use std::io;
use std::sync::Arc;

use crate::channel::ChannelView;
use crate::session::Session;

/// Receiver of session lifecycle and data events.
pub trait IoHandler: Send + Sync {
    /// A new session was accepted (TCP child, UDP implicit peer) or
    /// connected.
    fn on_accept(&self, _session: &Arc<Session>) {}

    /// The session's application channel holds new bytes.
    fn on_receive(&self, session: &Arc<Session>);

    /// An I/O error that is not a silent disconnect. The session is left
    /// open; close it here if the error is fatal for the application.
    fn on_exception(&self, session: &Arc<Session>, error: &io::Error) {
        log::error!(
            "[SESSION] unhandled I/O error peer={}: {}",
            session.remote_addr(),
            error
        );
    }
}

/// Message framing hooks owned by the application.
pub trait MessageSplitter: Send + Sync {
    /// Whether this chunk marks the end of the stream.
    fn is_stream_end(&self, data: &[u8]) -> bool;
}

/// Keep-alive interceptor.
///
/// Runs against a locked view of the application channel after decryption;
/// consuming bytes from the view removes control frames before the
/// application sees them.
pub trait HeartBeat: Send + Sync {
    fn intercept(&self, session: &Arc<Session>, app: &mut ChannelView<'_>);
}
