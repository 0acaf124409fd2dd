// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Readiness selector and I/O dispatch.
//!
//! One [`SocketSelector`] owns a poll, a scratch read buffer reused for
//! every read on any channel, and the registered endpoints. It runs
//! entirely on the thread of the [`crate::runner::EventRunner`] that owns
//! it.
//!
//! ```text
//! +--------------------------------------------------------------+
//! |                       SocketSelector                          |
//! |  +--------------------------------------------------------+  |
//! |  |                      mio::Poll                          |  |
//! |  |  - TCP listeners (accept)                              |  |
//! |  |  - TCP streams / UDP sockets (read)                    |  |
//! |  |  - Waker (task submitted from another thread)          |  |
//! |  +--------------------------------------------------------+  |
//! |                             |                                 |
//! |            +----------------+----------------+                |
//! |            v                v                v                |
//! |       accept drain     stream read      datagram read         |
//! |            |                |                |                |
//! |            v                +-------+--------+                |
//! |        on_accept                    v                         |
//! |                            prepare (TLS, heartbeat,           |
//! |                             backpressure, on_receive)         |
//! +--------------------------------------------------------------+
//! ```
//!
//! Dispatch runs accept before read for a key reporting both. A per-key
//! failure is scoped to that session; the cycle and the other keys keep
//! going. Writes are bounded-blocking: a send loop that makes no progress
//! for the configured send timeout closes the session.

use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use mio::net::{TcpListener, TcpStream, UdpSocket};
use mio::{Events, Interest, Poll, Token, Waker};

use crate::context::SocketContext;
use crate::prepare::{self, PrepareOutcome};
use crate::runner::{apply_buffer_sizes, EventRunner};
use crate::session::{Session, SessionKind, StopType};
use crate::tls::RecordSink;

/// Token reserved for the cross-thread waker.
pub(crate) const WAKER_TOKEN: Token = Token(0);

/// First token handed to registrations.
pub(crate) const TOKEN_START: usize = 1;

/// Poll deadline per cycle. The selector granularity is coarse anyway;
/// tasks interrupt the wait through the waker.
const POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Yield when a cycle saw nothing ready, and between attempts of a stalled
/// send. Prevents busy-spin without hurting throughput.
const IDLE_YIELD: Duration = Duration::from_millis(1);

/// Maximum events drained per poll.
const MAX_EVENTS: usize = 128;

/// Scratch read buffer size, shared by every read on this selector.
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Fallback message matches for peers that dropped without an error kind
/// the platform maps cleanly.
const BROKEN_PIPE: &str = "Broken pipe";
const CONNECTION_RESET: &str = "Connection reset by peer";

/// A registered socket.
pub(crate) enum Endpoint {
    TcpListener(TcpListener),
    Tcp(TcpStream),
    Udp(UdpSocket),
}

/// Map entry behind a token: the socket, its configuration, and the
/// session(s) attached to it. Removing the entry detaches everything
/// before the source is deregistered, so a racing dispatch observes a
/// missing token and drops the event.
struct Registration {
    endpoint: Endpoint,
    ctx: Arc<SocketContext>,

    /// The session for streams and connected datagram sockets; `None` for
    /// listeners and unconnected datagram servers.
    session: Option<Arc<Session>>,

    /// Implicit children of an unconnected datagram server, keyed by
    /// remote address.
    udp_children: HashMap<SocketAddr, Arc<Session>>,
}

#[derive(Clone, Copy)]
enum KindTag {
    Listener,
    Tcp,
    Udp,
}

impl Registration {
    fn kind_tag(&self) -> KindTag {
        match self.endpoint {
            Endpoint::TcpListener(_) => KindTag::Listener,
            Endpoint::Tcp(_) => KindTag::Tcp,
            Endpoint::Udp(_) => KindTag::Udp,
        }
    }
}

/// Outcome of one read dispatch step.
enum ReadStep {
    /// Bytes were read and prepared; more may be pending.
    Bytes(usize),

    /// Nothing to read right now.
    Idle,

    /// Interrupted; try again.
    Retry,

    /// Stream ended or session closed during prepare.
    Closed,

    /// Error, already routed through the exception policy.
    Failed(io::Error),
}

enum Verdict {
    Prepared(usize, PrepareOutcome),
    ReadError(io::Error),
}

/// Readiness selector bound to one runner thread.
pub struct SocketSelector {
    poll: Poll,
    events: Events,

    /// Reusable ready-token list populated from the poll events each
    /// cycle; cleared in place, never reallocated in steady state.
    ready: Vec<Token>,

    /// Scratch read buffer. Thread-confined; every dispatch leaves it
    /// logically empty.
    scratch: Box<[u8]>,

    registrations: HashMap<Token, Registration>,
    waker: Arc<Waker>,
    runner: Option<EventRunner>,
    closed: bool,
}

impl SocketSelector {
    pub fn new() -> io::Result<Self> {
        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER_TOKEN)?);

        Ok(Self {
            poll,
            events: Events::with_capacity(MAX_EVENTS),
            ready: Vec::with_capacity(MAX_EVENTS),
            scratch: vec![0u8; READ_BUFFER_SIZE].into_boxed_slice(),
            registrations: HashMap::new(),
            waker,
            runner: None,
            closed: false,
        })
    }

    pub(crate) fn waker(&self) -> Arc<Waker> {
        Arc::clone(&self.waker)
    }

    pub(crate) fn set_runner(&mut self, runner: EventRunner) {
        self.runner = Some(runner);
    }

    // ========================================================================
    // Event cycle
    // ========================================================================

    /// One selector cycle: poll with a short deadline, dispatch every ready
    /// key, yield briefly when idle. Per-key errors never stop the cycle;
    /// the runner loop re-enters it unconditionally.
    pub(crate) fn cycle(&mut self) {
        if self.closed {
            return;
        }

        if let Err(e) = self.poll.poll(&mut self.events, Some(POLL_TIMEOUT)) {
            if e.kind() != io::ErrorKind::Interrupted {
                log::error!("[SELECTOR] poll error: {}", e);
            }
            return;
        }

        let mut ready = std::mem::take(&mut self.ready);
        ready.clear();
        for event in self.events.iter() {
            let token = event.token();
            if token != WAKER_TOKEN {
                ready.push(token);
            }
        }

        if ready.is_empty() {
            let woken = !self.events.is_empty();
            self.ready = ready;
            if !woken {
                thread::sleep(IDLE_YIELD);
            }
            return;
        }

        for i in 0..ready.len() {
            let token = ready[i];
            // A cancel that raced this cycle already removed the entry.
            let kind = match self.registrations.get(&token) {
                Some(reg) => reg.kind_tag(),
                None => continue,
            };
            match kind {
                KindTag::Listener => self.accept_ready(token),
                KindTag::Tcp => self.tcp_ready(token),
                KindTag::Udp => self.udp_ready(token),
            }
        }

        ready.clear();
        self.ready = ready;
    }

    // ========================================================================
    // Registration
    // ========================================================================

    /// Install an endpoint under `token`. Runner thread only.
    pub(crate) fn install(
        &mut self,
        token: Token,
        mut endpoint: Endpoint,
        ctx: Arc<SocketContext>,
        session: Option<Arc<Session>>,
    ) -> io::Result<()> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "selector is closed",
            ));
        }

        let registry = self.poll.registry();
        match &mut endpoint {
            Endpoint::TcpListener(l) => registry.register(l, token, Interest::READABLE)?,
            Endpoint::Tcp(s) => registry.register(s, token, Interest::READABLE)?,
            Endpoint::Udp(s) => registry.register(s, token, Interest::READABLE)?,
        }

        self.registrations.insert(
            token,
            Registration {
                endpoint,
                ctx,
                session,
                udp_children: HashMap::new(),
            },
        );
        Ok(())
    }

    /// Remove the session's registration (or child entry) and release its
    /// resources. Runner thread only; foreign threads go through
    /// [`Session::close`].
    pub fn unregister(&mut self, session: &Arc<Session>) {
        self.close_session_of(session, StopType::SocketClosed);
    }

    /// Kick the session's TLS handshake, sending any produced records.
    pub(crate) fn drive_handshake(&mut self, session: &Arc<Session>) {
        let failure = {
            let Some(reg) = self.registrations.get_mut(&session.token) else {
                return;
            };
            let Registration { endpoint, ctx, .. } = reg;
            let Some(tls) = session.tls() else { return };
            let mut sink = RawSender::new(endpoint, session.peer, ctx.config.send_timeout, session);
            match tls.do_handshake(session.as_ref(), &mut sink) {
                Ok(_) => None,
                Err(e) => Some(io::Error::from(e)),
            }
        };

        if let Some(error) = failure {
            self.close_session_of(session, StopType::Exception);
            session.context().handler.on_exception(session, &error);
        }
    }

    // ========================================================================
    // Accept
    // ========================================================================

    /// Drain pending accepts on a listener. Accept failures are reported
    /// and do not close the server.
    fn accept_ready(&mut self, token: Token) {
        loop {
            let accepted = {
                let Some(reg) = self.registrations.get_mut(&token) else {
                    return;
                };
                let Endpoint::TcpListener(listener) = &mut reg.endpoint else {
                    return;
                };
                match listener.accept() {
                    Ok((stream, peer)) => Some((stream, peer, Arc::clone(&reg.ctx))),
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        log::error!("[SELECTOR] accept error: {}", e);
                        None
                    }
                }
            };

            let Some((mut stream, peer, ctx)) = accepted else {
                return;
            };
            let Some(runner) = self.runner.clone() else {
                return;
            };

            if ctx.config.nodelay {
                let _ = stream.set_nodelay(true);
            }
            apply_buffer_sizes(&socket2::SockRef::from(&stream), &ctx.config);

            let child_token = runner.alloc_token();
            if let Err(e) = self
                .poll
                .registry()
                .register(&mut stream, child_token, Interest::READABLE)
            {
                log::error!("[SELECTOR] register accepted peer={} failed: {}", peer, e);
                continue;
            }

            let session = Session::new(child_token, None, peer, SessionKind::Tcp, Arc::clone(&ctx), runner);
            self.registrations.insert(
                child_token,
                Registration {
                    endpoint: Endpoint::Tcp(stream),
                    ctx: Arc::clone(&ctx),
                    session: Some(Arc::clone(&session)),
                    udp_children: HashMap::new(),
                },
            );
            log::debug!("[SELECTOR] accepted peer={} token={}", peer, child_token.0);
            ctx.handler.on_accept(&session);
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Drain a readable stream; the poll is edge-triggered, so read until
    /// the socket would block.
    fn tcp_ready(&mut self, token: Token) {
        loop {
            match self.tcp_read_once(token) {
                ReadStep::Bytes(_) | ReadStep::Retry => continue,
                ReadStep::Idle | ReadStep::Closed | ReadStep::Failed(_) => return,
            }
        }
    }

    fn udp_ready(&mut self, token: Token) {
        loop {
            match self.udp_read_once(token) {
                ReadStep::Bytes(_) | ReadStep::Retry => continue,
                ReadStep::Idle | ReadStep::Closed | ReadStep::Failed(_) => return,
            }
        }
    }

    /// One non-blocking read on the session's channel through the scratch
    /// buffer, routed through the prepare stage. Runner thread only.
    pub fn read(&mut self, session: &Arc<Session>) -> io::Result<usize> {
        let step = match session.kind {
            SessionKind::Tcp => self.tcp_read_once(session.token),
            SessionKind::UdpConnected | SessionKind::UdpPeer => self.udp_read_once(session.token),
        };
        match step {
            ReadStep::Bytes(n) => Ok(n),
            ReadStep::Closed | ReadStep::Retry => Ok(0),
            ReadStep::Idle => Err(io::Error::new(io::ErrorKind::WouldBlock, "nothing to read")),
            ReadStep::Failed(e) => Err(e),
        }
    }

    fn tcp_read_once(&mut self, token: Token) -> ReadStep {
        let (session, verdict) = {
            let Some(reg) = self.registrations.get_mut(&token) else {
                return ReadStep::Idle;
            };
            let Registration {
                endpoint,
                ctx,
                session,
                ..
            } = reg;
            let Some(session) = session.as_ref().cloned() else {
                return ReadStep::Idle;
            };

            let read = {
                let Endpoint::Tcp(stream) = &mut *endpoint else {
                    return ReadStep::Idle;
                };
                stream.read(&mut self.scratch[..])
            };

            match read {
                Ok(n) => {
                    let mut sink =
                        RawSender::new(endpoint, None, ctx.config.send_timeout, session.as_ref());
                    let outcome =
                        prepare::prepare(&session, ctx, &self.scratch[..n], n == 0, &mut sink);
                    (session, Verdict::Prepared(n, outcome))
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadStep::Idle,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => return ReadStep::Retry,
                Err(e) => (session, Verdict::ReadError(e)),
            }
        };

        self.settle_read(&session, verdict)
    }

    fn udp_read_once(&mut self, token: Token) -> ReadStep {
        let (session, verdict) = {
            let Some(runner) = self.runner.clone() else {
                return ReadStep::Idle;
            };
            let Some(reg) = self.registrations.get_mut(&token) else {
                return ReadStep::Idle;
            };
            let Registration {
                endpoint,
                ctx,
                session,
                udp_children,
            } = reg;

            if let Some(session) = session.as_ref().cloned() {
                // Connected datagram socket: bytes carry no address.
                let read = {
                    let Endpoint::Udp(socket) = &mut *endpoint else {
                        return ReadStep::Idle;
                    };
                    socket.recv(&mut self.scratch[..])
                };
                match read {
                    Ok(n) => {
                        let mut sink = RawSender::new(
                            endpoint,
                            None,
                            ctx.config.send_timeout,
                            session.as_ref(),
                        );
                        let outcome =
                            prepare::prepare(&session, ctx, &self.scratch[..n], false, &mut sink);
                        (session, Verdict::Prepared(n, outcome))
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadStep::Idle,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => return ReadStep::Retry,
                    Err(e) => (session, Verdict::ReadError(e)),
                }
            } else {
                // Unconnected server socket: receive carries the sender
                // address; first sight of an address creates an implicit
                // child session.
                let received = {
                    let Endpoint::Udp(socket) = &mut *endpoint else {
                        return ReadStep::Idle;
                    };
                    socket.recv_from(&mut self.scratch[..])
                };
                match received {
                    Ok((n, peer)) => {
                        let (child, is_new) = match udp_children.get(&peer) {
                            Some(child) => (Arc::clone(child), false),
                            None => {
                                let child = Session::new(
                                    token,
                                    Some(peer),
                                    peer,
                                    SessionKind::UdpPeer,
                                    Arc::clone(ctx),
                                    runner,
                                );
                                udp_children.insert(peer, Arc::clone(&child));
                                (child, true)
                            }
                        };
                        if is_new {
                            log::debug!("[SELECTOR] udp session created peer={}", peer);
                            ctx.handler.on_accept(&child);
                        }

                        let mut sink = RawSender::new(
                            endpoint,
                            Some(peer),
                            ctx.config.send_timeout,
                            child.as_ref(),
                        );
                        let outcome =
                            prepare::prepare(&child, ctx, &self.scratch[..n], false, &mut sink);
                        (child, Verdict::Prepared(n, outcome))
                    }
                    Err(e) if e.kind() == io::ErrorKind::WouldBlock => return ReadStep::Idle,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => return ReadStep::Retry,
                    Err(e) => {
                        log::error!("[SELECTOR] udp receive error: {}", e);
                        return ReadStep::Failed(e);
                    }
                }
            }
        };

        self.settle_read(&session, verdict)
    }

    /// Apply the outcome of one read dispatch: close, report, or continue.
    fn settle_read(&mut self, session: &Arc<Session>, verdict: Verdict) -> ReadStep {
        match verdict {
            Verdict::Prepared(n, PrepareOutcome::Continue) => ReadStep::Bytes(n),
            Verdict::Prepared(_, PrepareOutcome::StreamEnd) => {
                self.close_session_of(session, StopType::StreamEnd);
                ReadStep::Closed
            }
            Verdict::Prepared(_, PrepareOutcome::CloseAndReport(error)) => {
                self.close_session_of(session, StopType::Exception);
                session.context().handler.on_exception(session, &error);
                ReadStep::Failed(error)
            }
            Verdict::Prepared(_, PrepareOutcome::Report(error)) => {
                session.context().handler.on_exception(session, &error);
                ReadStep::Failed(error)
            }
            Verdict::ReadError(error) => {
                self.deal_exception(Some(session), &error);
                ReadStep::Failed(error)
            }
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Send `buf` on the session's channel, wrapping through TLS when the
    /// session has a ready adapter. Bounded-blocking: a loop stalled for
    /// the send timeout closes the session and yields `TimedOut`. Runner
    /// thread only.
    pub fn write(&mut self, session: &Arc<Session>, buf: &[u8]) -> io::Result<usize> {
        let result = self.write_inner(session, buf);
        match &result {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                log::error!(
                    "[SELECTOR] send timeout peer={}, closing session",
                    session.remote_addr()
                );
                self.close_session_of(session, StopType::SocketClosed);
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::NotConnected => {}
            Err(e) => self.deal_exception(Some(session), e),
        }
        result
    }

    fn write_inner(&mut self, session: &Arc<Session>, buf: &[u8]) -> io::Result<usize> {
        if !session.is_connected() {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session is closed",
            ));
        }
        let Some(reg) = self.registrations.get_mut(&session.token) else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session is not registered",
            ));
        };
        let Registration { endpoint, ctx, .. } = reg;
        let mut sink = RawSender::new(endpoint, session.peer, ctx.config.send_timeout, session.as_ref());

        match session.tls() {
            Some(tls) => {
                if !tls.handshake_done() {
                    return Err(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        "TLS handshake still in progress",
                    ));
                }
                match tls.wrap_data(session.as_ref(), &mut sink, buf) {
                    Ok(Some(_)) => Ok(buf.len()),
                    Ok(None) => Err(io::Error::new(
                        io::ErrorKind::NotConnected,
                        "session closed during TLS write",
                    )),
                    Err(e) => Err(e.into()),
                }
            }
            None => sink.send_all(buf),
        }
    }

    // ========================================================================
    // Exception policy
    // ========================================================================

    /// Silent close for peers that dropped; everything else surfaces to
    /// the application through `on_exception`.
    fn deal_exception(&mut self, session: Option<&Arc<Session>>, error: &io::Error) {
        if is_silent_disconnect(error) {
            if let Some(session) = session {
                log::debug!(
                    "[SELECTOR] peer dropped {}: {}",
                    session.remote_addr(),
                    error
                );
                self.close_session_of(session, StopType::SocketClosed);
            }
            return;
        }

        match session {
            Some(session) => session.context().handler.on_exception(session, error),
            None => log::error!("[SELECTOR] I/O error on server socket: {}", error),
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    fn close_session_of(&mut self, session: &Arc<Session>, stop: StopType) {
        match session.peer {
            Some(peer) => {
                if let Some(reg) = self.registrations.get_mut(&session.token) {
                    if let Some(child) = reg.udp_children.remove(&peer) {
                        finalize_session(&child, stop);
                        return;
                    }
                }
                finalize_session(session, stop);
            }
            None => self.close_registration(session.token, stop),
        }
    }

    fn close_registration(&mut self, token: Token, stop: StopType) {
        let Some(mut reg) = self.registrations.remove(&token) else {
            return;
        };
        // The attachment leaves the map before the source is deregistered,
        // so readiness iteration never touches a freed context.
        let registry = self.poll.registry();
        let _ = match &mut reg.endpoint {
            Endpoint::TcpListener(l) => registry.deregister(l),
            Endpoint::Tcp(s) => registry.deregister(s),
            Endpoint::Udp(s) => registry.deregister(s),
        };
        if let Some(session) = &reg.session {
            finalize_session(session, stop);
        }
        for (_, child) in reg.udp_children.drain() {
            finalize_session(&child, stop);
        }
        log::debug!("[SELECTOR] unregistered token={}", token.0);
    }

    /// Close every registration and retire the selector.
    pub(crate) fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let tokens: Vec<Token> = self.registrations.keys().copied().collect();
        for token in tokens {
            self.close_registration(token, StopType::SocketClosed);
        }
    }
}

fn finalize_session(session: &Arc<Session>, stop: StopType) {
    session.mark_disconnected(stop);
    if let Some(tls) = session.tls() {
        tls.close_outbound();
        tls.release();
    }
    session.read_channel().release();
}

fn is_silent_disconnect(error: &io::Error) -> bool {
    if matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
    ) {
        return true;
    }
    // Fallback for platforms that only surface the message.
    let message = error.to_string();
    message.contains(BROKEN_PIPE) || message.contains(CONNECTION_RESET)
}

// ============================================================================
// Bounded raw send
// ============================================================================

/// Bounded-blocking writer over a registered endpoint.
///
/// Each attempt that makes no progress yields ~1 ms and checks elapsed
/// time against the send timeout; any progress resets the deadline. The
/// loop also exits once the session reports disconnected.
pub(crate) struct RawSender<'a> {
    endpoint: &'a mut Endpoint,
    peer: Option<SocketAddr>,
    send_timeout: Duration,
    session: &'a Session,
}

impl<'a> RawSender<'a> {
    pub(crate) fn new(
        endpoint: &'a mut Endpoint,
        peer: Option<SocketAddr>,
        send_timeout: Duration,
        session: &'a Session,
    ) -> Self {
        Self {
            endpoint,
            peer,
            send_timeout,
            session,
        }
    }

    fn stall(&self, last_progress: &Instant) -> io::Result<()> {
        thread::sleep(IDLE_YIELD);
        if last_progress.elapsed() >= self.send_timeout {
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                "send made no progress within the send timeout",
            ))
        } else {
            Ok(())
        }
    }

    /// Send all of `buf`, or as much as fits before disconnect/timeout.
    pub(crate) fn send_all(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut total = 0;
        let mut last_progress = Instant::now();

        while self.session.is_connected() && total < buf.len() {
            let attempt = match &mut *self.endpoint {
                Endpoint::Tcp(stream) => stream.write(&buf[total..]),
                Endpoint::Udp(socket) => match self.peer {
                    Some(addr) => socket.send_to(&buf[total..], addr),
                    None => socket.send(&buf[total..]),
                },
                Endpoint::TcpListener(_) => {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "cannot write to a listener",
                    ))
                }
            };

            match attempt {
                Ok(0) => self.stall(&last_progress)?,
                Ok(n) => {
                    total += n;
                    last_progress = Instant::now();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => self.stall(&last_progress)?,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(total)
    }
}

impl RecordSink for RawSender<'_> {
    fn send_record(&mut self, data: &[u8]) -> io::Result<usize> {
        self.send_all(data)
    }
}

// ============================================================================
// Tests
// ============================================================================
