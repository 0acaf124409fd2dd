// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Inbound byte pipeline.
//!
//! Every successful read lands here with the scratch-buffer contents:
//! stream-end detection, best-effort backpressure against the application
//! channel, TLS routing (handshake drive or record pump), heartbeat
//! interception, and finally the receive notification.

use std::io;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::context::SocketContext;
use crate::session::{Session, StopType};
use crate::tls::RecordSink;

/// What the selector should do after a prepare pass.
pub(crate) enum PrepareOutcome {
    /// Bytes routed; keep reading.
    Continue,

    /// The stream ended; the session is marked and must be unregistered.
    StreamEnd,

    /// Fatal TLS failure: close the session, then surface the error.
    CloseAndReport(io::Error),

    /// Recoverable-by-application failure: surface without closing.
    Report(io::Error),
}

/// Route one read's bytes from the scratch buffer to the session.
///
/// `stream_end` is the transport's own end-of-stream signal (a zero-length
/// TCP read); the splitter may additionally declare an in-band marker.
pub(crate) fn prepare(
    session: &Arc<Session>,
    ctx: &SocketContext,
    data: &[u8],
    stream_end: bool,
    sink: &mut dyn RecordSink,
) -> PrepareOutcome {
    let marker_end = ctx
        .splitter
        .as_ref()
        .is_some_and(|splitter| splitter.is_stream_end(data));
    if stream_end || marker_end || !session.is_connected() {
        session.mark_disconnected(StopType::StreamEnd);
        return PrepareOutcome::StreamEnd;
    }
    if data.is_empty() {
        return PrepareOutcome::Continue;
    }

    let app = session.read_channel();

    // Wait for the reader to drain before an append that would hit
    // capacity. Best-effort: on timeout the bytes go in anyway, they are
    // never dropped.
    if app.would_overflow(data.len()) {
        let drained = wait_until(ctx.config.read_timeout, || !app.would_overflow(data.len()));
        if !drained {
            log::warn!(
                "[PREPARE] application channel saturated peer={}, appending past threshold",
                session.remote_addr()
            );
        }
    }

    match session.tls() {
        Some(tls) => {
            if tls.inbox().write_end(data).is_err() {
                session.mark_disconnected(StopType::StreamEnd);
                return PrepareOutcome::StreamEnd;
            }

            let mut pump = tls.handshake_done();
            if !pump {
                match tls.do_handshake(session.as_ref(), sink) {
                    // Completed with ciphertext left over (records that
                    // rode in behind the final handshake flight): decode
                    // them now instead of waiting for the next burst.
                    Ok(true) => pump = tls.inbox().size() > 0,
                    Ok(false) => return PrepareOutcome::Continue,
                    Err(e) => return PrepareOutcome::CloseAndReport(e.into()),
                }
            }
            if pump {
                if let Err(e) = tls.unwrap_channel(session.as_ref(), app) {
                    return PrepareOutcome::Report(e.into());
                }
            }
        }
        None => {
            if app.write_end(data).is_err() {
                session.mark_disconnected(StopType::StreamEnd);
                return PrepareOutcome::StreamEnd;
            }
        }
    }

    // The heartbeat may consume control frames before the application
    // sees them; the locked view compacts on drop.
    if let Some(heartbeat) = &ctx.heartbeat {
        if let Some(mut view) = app.byte_buffer() {
            heartbeat.intercept(session, &mut view);
        }
    }

    if app.size() > 0 {
        ctx.handler.on_receive(session);
    }

    PrepareOutcome::Continue
}

/// Poll `ready` about once a millisecond, bounded by `timeout`. Returns
/// whether the condition held before the deadline.
fn wait_until(timeout: Duration, mut ready: impl FnMut() -> bool) -> bool {
    let started = Instant::now();
    while !ready() {
        if started.elapsed() >= timeout {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
    true
}
