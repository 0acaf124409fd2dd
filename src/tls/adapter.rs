// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-session TLS record adapter.
//!
//! Wraps a [`TlsEngine`] and drives it against the session's byte streams:
//!
//! - inbound ciphertext accumulates in the encrypted inbox
//!   ([`TlsAdapter::inbox`]); the record pump
//!   ([`TlsAdapter::unwrap_channel`]) decrypts it into the application
//!   channel, keeping undecodable leftovers buffered for the next burst;
//! - outbound plaintext flows through [`TlsAdapter::wrap_data`], which
//!   forwards each produced record to the session's raw send path;
//! - [`TlsAdapter::do_handshake`] advances the handshake from the
//!   engine-reported status after every step and parks (returns not-done)
//!   whenever the next step needs ciphertext that has not arrived yet.
//!
//! The adapter owns two packet-sized plane buffers. Both are tagged
//! alive/released under a lock so that [`TlsAdapter::release`] can race an
//! in-flight wrap or unwrap: the loser observes `None`, never freed memory.
//! `handshake_done` latches true exactly once for the adapter's lifetime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::channel::ByteChannel;
use crate::tls::engine::{EngineResult, EngineStatus, HandshakeStatus, TlsEngine};
use crate::tls::{RecordSink, SessionLink, TlsError};

/// Upper bound on handshake drive steps per [`TlsAdapter::do_handshake`]
/// call. A well-formed handshake converges in a handful of steps; hitting
/// the cap means the engine is looping and the session must go down.
const HANDSHAKE_MAX_STEPS: u32 = 20;

/// Yield between retries of a transient handshake wrap failure.
const RETRY_YIELD: Duration = Duration::from_millis(1);

/// Packet-sized scratch plane with a release tag.
struct PlaneBuffer {
    buf: Vec<u8>,
    released: bool,
}

impl PlaneBuffer {
    fn new(size: usize) -> Self {
        Self {
            buf: vec![0u8; size],
            released: false,
        }
    }

    /// Mutable access while alive; `None` after release.
    fn alive_mut(&mut self) -> Option<&mut [u8]> {
        if self.released {
            None
        } else {
            Some(&mut self.buf[..])
        }
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.buf = Vec::new();
        }
    }
}

/// TLS record adapter for one session.
pub struct TlsAdapter {
    engine: Mutex<Box<dyn TlsEngine>>,

    /// Destination of unwrap (decrypted plaintext).
    app_plane: Mutex<PlaneBuffer>,

    /// Destination of wrap (produced records).
    net_plane: Mutex<PlaneBuffer>,

    /// Inbound ciphertext not yet decoded.
    inbox: ByteChannel,

    /// Latches true when the engine reports NotHandshaking; never reverts.
    handshake_done: AtomicBool,

    /// Bounds each handshake drive call.
    read_timeout: Duration,
}

impl TlsAdapter {
    /// Build an adapter around `engine`, sizing both plane buffers to the
    /// engine's advertised packet size.
    pub fn new(engine: Box<dyn TlsEngine>, read_timeout: Duration) -> Self {
        let packet = engine.packet_size();
        Self {
            engine: Mutex::new(engine),
            app_plane: Mutex::new(PlaneBuffer::new(packet)),
            net_plane: Mutex::new(PlaneBuffer::new(packet)),
            inbox: ByteChannel::new(packet * 4),
            handshake_done: AtomicBool::new(false),
            read_timeout,
        }
    }

    /// Whether the handshake has completed.
    pub fn handshake_done(&self) -> bool {
        self.handshake_done.load(Ordering::Acquire)
    }

    /// The encrypted-byte inbox; inbound ciphertext is appended here.
    pub fn inbox(&self) -> &ByteChannel {
        &self.inbox
    }

    /// Drive the handshake as far as the buffered ciphertext allows.
    ///
    /// Returns `Ok(true)` once the engine reports it is no longer
    /// handshaking, `Ok(false)` when the drive parked waiting for more
    /// ciphertext. More than [`HANDSHAKE_MAX_STEPS`] steps or a drive
    /// exceeding the read timeout is an error; so is a disconnect
    /// mid-handshake.
    pub fn do_handshake(
        &self,
        link: &dyn SessionLink,
        sink: &mut dyn RecordSink,
    ) -> Result<bool, TlsError> {
        if self.handshake_done() {
            return Ok(true);
        }
        if !link.is_connected() {
            return Err(TlsError::Handshake("session disconnected".to_string()));
        }

        self.engine.lock().begin_handshake()?;

        let started = Instant::now();
        let mut steps: u32 = 0;
        let mut status = self.engine.lock().handshake_status();

        while !self.handshake_done() {
            steps += 1;
            if steps > HANDSHAKE_MAX_STEPS {
                return Err(TlsError::Handshake(format!(
                    "no completion after {} steps",
                    HANDSHAKE_MAX_STEPS
                )));
            }
            if started.elapsed() >= self.read_timeout {
                return Err(TlsError::HandshakeTimeout(link.remote_addr()));
            }

            match status {
                HandshakeStatus::NeedTask => {
                    self.run_delegated_tasks();
                    status = self.engine.lock().handshake_status();
                }
                HandshakeStatus::NeedWrap => {
                    status = self.handshake_wrap(link, sink, started)?;
                }
                HandshakeStatus::NeedUnwrap => match self.handshake_unwrap(link)? {
                    Some(next) => status = next,
                    // Parked: the next record has not arrived yet.
                    None => return Ok(false),
                },
                HandshakeStatus::Finished => {
                    status = self.engine.lock().handshake_status();
                }
                HandshakeStatus::NotHandshaking => {
                    self.handshake_done.store(true, Ordering::Release);
                }
            }
        }

        log::debug!("[TLS] handshake complete peer={}", link.remote_addr());
        Ok(true)
    }

    /// One NEED_WRAP step: wrap empty plaintext, send what comes out.
    ///
    /// Transient engine errors are retried after a short yield; the retry
    /// budget is the read timeout measured from the start of the drive.
    fn handshake_wrap(
        &self,
        link: &dyn SessionLink,
        sink: &mut dyn RecordSink,
        started: Instant,
    ) -> Result<HandshakeStatus, TlsError> {
        loop {
            if !link.is_connected() {
                return Err(TlsError::Handshake(
                    "session disconnected during handshake".to_string(),
                ));
            }
            if started.elapsed() >= self.read_timeout {
                return Err(TlsError::HandshakeTimeout(link.remote_addr()));
            }

            match self.wrap_step(link, sink) {
                Ok(()) => {
                    self.run_delegated_tasks();
                    return Ok(self.engine.lock().handshake_status());
                }
                Err(TlsError::Engine(msg)) => {
                    log::trace!("[TLS] handshake wrap retry: {}", msg);
                    thread::sleep(RETRY_YIELD);
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn wrap_step(&self, link: &dyn SessionLink, sink: &mut dyn RecordSink) -> Result<(), TlsError> {
        let mut plane = self.net_plane.lock();
        let buf = match plane.alive_mut() {
            Some(b) => b,
            None => return Err(TlsError::Closed),
        };
        let res = self.engine.lock().wrap(&[], buf)?;
        if link.is_connected() && res.produced > 0 {
            sink.send_record(&buf[..res.produced]).map_err(TlsError::Io)?;
        }
        Ok(())
    }

    /// One NEED_UNWRAP step against the inbox.
    ///
    /// `Ok(None)` parks the drive: no ciphertext buffered, or what is
    /// buffered is less than one record.
    fn handshake_unwrap(&self, link: &dyn SessionLink) -> Result<Option<HandshakeStatus>, TlsError> {
        if self.inbox.size() == 0 {
            return Ok(None);
        }

        let mut plane = self.app_plane.lock();
        let buf = match plane.alive_mut() {
            Some(b) => b,
            None => {
                return Err(TlsError::Handshake(
                    "buffers released during handshake".to_string(),
                ))
            }
        };
        let mut view = match self.inbox.byte_buffer() {
            Some(v) => v,
            None => {
                return Err(TlsError::Handshake(
                    "inbox released during handshake".to_string(),
                ))
            }
        };

        let res = self.engine.lock().unwrap(view.as_slice(), buf)?;
        view.consume(res.consumed);
        drop(view);
        // Plaintext surfaced during the handshake (if any) is discarded;
        // the plane is reused on the next step.

        match res.status {
            EngineStatus::Ok => Ok(Some(self.engine.lock().handshake_status())),
            EngineStatus::Closed => Err(TlsError::Closed),
            EngineStatus::BufferUnderflow | EngineStatus::BufferOverflow => {
                if res.consumed == 0 || self.inbox.size() == 0 {
                    Ok(None)
                } else {
                    Ok(Some(self.engine.lock().handshake_status()))
                }
            }
        }
    }

    fn run_delegated_tasks(&self) {
        loop {
            let task = self.engine.lock().delegated_task();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
    }

    /// Wrap outbound plaintext and forward every produced record to `sink`.
    ///
    /// Loops while the engine reports OK and plaintext remains. Returns the
    /// last engine result, or `None` when the session disconnected or the
    /// network plane was released mid-call.
    pub fn wrap_data(
        &self,
        link: &dyn SessionLink,
        sink: &mut dyn RecordSink,
        src: &[u8],
    ) -> Result<Option<EngineResult>, TlsError> {
        if !link.is_connected() {
            return Ok(None);
        }

        let mut offset = 0;
        loop {
            let mut plane = self.net_plane.lock();
            let buf = match plane.alive_mut() {
                Some(b) => b,
                None => return Ok(None),
            };

            let res = self.engine.lock().wrap(&src[offset..], buf)?;
            if link.is_connected() && res.produced > 0 {
                sink.send_record(&buf[..res.produced]).map_err(TlsError::Io)?;
            }
            offset += res.consumed;
            drop(plane);

            let keep_going = res.status == EngineStatus::Ok
                && offset < src.len()
                && (res.consumed > 0 || res.produced > 0);
            if !keep_going {
                return Ok(Some(res));
            }
        }
    }

    /// Single guarded unwrap into the application plane.
    ///
    /// Returns `None` when the session disconnected or the plane has been
    /// released; a release racing this call must observe absence, never a
    /// freed buffer.
    pub fn unwrap_data(
        &self,
        link: &dyn SessionLink,
        src: &[u8],
    ) -> Result<Option<EngineResult>, TlsError> {
        if !link.is_connected() {
            return Ok(None);
        }
        let mut plane = self.app_plane.lock();
        let buf = match plane.alive_mut() {
            Some(b) => b,
            None => return Ok(None),
        };
        let res = self.engine.lock().unwrap(src, buf)?;
        Ok(Some(res))
    }

    /// The record pump: decrypt the inbox into `app`.
    ///
    /// Each round clears the application plane, decodes as much as one
    /// engine call allows, compacts the inbox, and appends the plaintext.
    /// Exits when the inbox is drained with status OK, on underflow
    /// (partial record retained for the next burst), on close, or on an
    /// overflow that made no progress. Returns total plaintext produced.
    pub fn unwrap_channel(
        &self,
        link: &dyn SessionLink,
        app: &ByteChannel,
    ) -> Result<usize, TlsError> {
        let mut total = 0;
        if !link.is_connected() || self.inbox.size() == 0 {
            return Ok(total);
        }

        loop {
            let mut plane = self.app_plane.lock();
            let buf = match plane.alive_mut() {
                Some(b) => b,
                None => {
                    // Released mid-pump: graceful unless the socket is gone too.
                    if !link.is_connected() {
                        return Err(TlsError::Closed);
                    }
                    return Ok(total);
                }
            };
            let mut view = match self.inbox.byte_buffer() {
                Some(v) => v,
                None => {
                    if !link.is_connected() {
                        return Err(TlsError::Closed);
                    }
                    return Ok(total);
                }
            };

            let res = self.engine.lock().unwrap(view.as_slice(), buf)?;
            view.consume(res.consumed);
            let drained = view.remaining() == 0;
            drop(view);

            if res.produced > 0 {
                if app.write_end(&buf[..res.produced]).is_err() {
                    if !link.is_connected() {
                        return Err(TlsError::Closed);
                    }
                    return Ok(total);
                }
                total += res.produced;
            }
            drop(plane);

            match res.status {
                EngineStatus::Ok => {
                    if drained || (res.consumed == 0 && res.produced == 0) {
                        break;
                    }
                }
                // Plane was full but we made progress: it is clear again
                // next round, so keep pumping.
                EngineStatus::BufferOverflow if res.produced > 0 => {}
                EngineStatus::BufferOverflow
                | EngineStatus::BufferUnderflow
                | EngineStatus::Closed => break,
            }
        }

        Ok(total)
    }

    /// Queue the engine's closing record.
    pub fn close_outbound(&self) {
        self.engine.lock().close_outbound();
    }

    /// Release both plane buffers and the inbox. Idempotent.
    pub fn release(&self) {
        self.app_plane.lock().release();
        self.net_plane.lock().release();
        self.inbox.release();
    }
}

impl std::fmt::Debug for TlsAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsAdapter")
            .field("handshake_done", &self.handshake_done())
            .field("inbox_size", &self.inbox.size())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::engine::EngineTask;
    use std::net::SocketAddr;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    const XOR_KEY: u8 = 0x5A;

    struct StubLink {
        connected: AtomicBool,
    }

    impl StubLink {
        fn up() -> Self {
            Self {
                connected: AtomicBool::new(true),
            }
        }
    }

    impl SessionLink for StubLink {
        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::Relaxed)
        }

        fn remote_addr(&self) -> SocketAddr {
            "127.0.0.1:4433".parse().unwrap()
        }
    }

    #[derive(Default)]
    struct VecSink {
        out: Vec<u8>,
    }

    impl RecordSink for VecSink {
        fn send_record(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.out.extend_from_slice(data);
            Ok(data.len())
        }
    }

    /// Scripted server-side engine: consumes a hello, runs one delegated
    /// task, emits one flight, consumes a finish, then frames data as
    /// `[len u16 BE][payload ^ 0x5A]`.
    #[derive(Clone, Copy, PartialEq)]
    enum Phase {
        AwaitHello,
        Task,
        Flight,
        AwaitFinish,
        Data,
    }

    struct MockEngine {
        phase: Phase,
        task_pending: bool,
        tasks_run: Arc<AtomicUsize>,
    }

    impl MockEngine {
        fn server() -> (Self, Arc<AtomicUsize>) {
            let tasks = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    phase: Phase::AwaitHello,
                    task_pending: true,
                    tasks_run: tasks.clone(),
                },
                tasks,
            )
        }

        fn established() -> Self {
            Self {
                phase: Phase::Data,
                task_pending: false,
                tasks_run: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn result(
            &self,
            status: EngineStatus,
            consumed: usize,
            produced: usize,
        ) -> EngineResult {
            EngineResult {
                status,
                handshake: self.status_of(self.phase),
                consumed,
                produced,
            }
        }

        fn status_of(&self, phase: Phase) -> HandshakeStatus {
            match phase {
                Phase::AwaitHello | Phase::AwaitFinish => HandshakeStatus::NeedUnwrap,
                Phase::Task => HandshakeStatus::NeedTask,
                Phase::Flight => HandshakeStatus::NeedWrap,
                Phase::Data => HandshakeStatus::NotHandshaking,
            }
        }
    }

    impl TlsEngine for MockEngine {
        fn begin_handshake(&mut self) -> Result<(), TlsError> {
            Ok(())
        }

        fn wrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, TlsError> {
            match self.phase {
                Phase::Flight => {
                    dst[..10].copy_from_slice(b"SRV-FLIGHT");
                    self.phase = Phase::AwaitFinish;
                    Ok(EngineResult {
                        status: EngineStatus::Ok,
                        handshake: HandshakeStatus::Finished,
                        consumed: 0,
                        produced: 10,
                    })
                }
                Phase::Data => {
                    let take = src.len().min(dst.len().saturating_sub(2));
                    dst[..2].copy_from_slice(&(take as u16).to_be_bytes());
                    for (i, b) in src[..take].iter().enumerate() {
                        dst[2 + i] = b ^ XOR_KEY;
                    }
                    Ok(self.result(EngineStatus::Ok, take, 2 + take))
                }
                _ => Ok(self.result(EngineStatus::Ok, 0, 0)),
            }
        }

        fn unwrap(&mut self, src: &[u8], dst: &mut [u8]) -> Result<EngineResult, TlsError> {
            match self.phase {
                Phase::AwaitHello => {
                    if src.len() < 5 {
                        Ok(self.result(EngineStatus::BufferUnderflow, 0, 0))
                    } else {
                        self.phase = Phase::Task;
                        Ok(self.result(EngineStatus::Ok, src.len(), 0))
                    }
                }
                Phase::AwaitFinish => {
                    if src.len() < 3 {
                        Ok(self.result(EngineStatus::BufferUnderflow, 0, 0))
                    } else {
                        self.phase = Phase::Data;
                        Ok(self.result(EngineStatus::Ok, src.len(), 0))
                    }
                }
                Phase::Data => {
                    if src.len() < 2 {
                        return Ok(self.result(EngineStatus::BufferUnderflow, 0, 0));
                    }
                    let len = u16::from_be_bytes([src[0], src[1]]) as usize;
                    if src.len() < 2 + len {
                        return Ok(self.result(EngineStatus::BufferUnderflow, 0, 0));
                    }
                    for (i, b) in src[2..2 + len].iter().enumerate() {
                        dst[i] = b ^ XOR_KEY;
                    }
                    Ok(self.result(EngineStatus::Ok, 2 + len, len))
                }
                _ => Ok(self.result(EngineStatus::Ok, 0, 0)),
            }
        }

        fn delegated_task(&mut self) -> Option<EngineTask> {
            if self.phase == Phase::Task {
                if self.task_pending {
                    self.task_pending = false;
                    let counter = self.tasks_run.clone();
                    Some(Box::new(move || {
                        counter.fetch_add(1, Ordering::Relaxed);
                    }))
                } else {
                    self.phase = Phase::Flight;
                    None
                }
            } else {
                None
            }
        }

        fn handshake_status(&self) -> HandshakeStatus {
            self.status_of(self.phase)
        }

        fn packet_size(&self) -> usize {
            1024
        }

        fn close_outbound(&mut self) {}
    }

    fn adapter(engine: MockEngine) -> TlsAdapter {
        TlsAdapter::new(Box::new(engine), Duration::from_secs(2))
    }

    #[test]
    fn test_handshake_across_two_reads() {
        let (engine, tasks) = MockEngine::server();
        let tls = adapter(engine);
        let link = StubLink::up();
        let mut sink = VecSink::default();

        // First burst: client hello. Drive sends the server flight and
        // parks waiting for the finish record.
        tls.inbox().write_end(b"HELLO").unwrap();
        assert!(!tls.do_handshake(&link, &mut sink).unwrap());
        assert!(!tls.handshake_done());
        assert_eq!(sink.out, b"SRV-FLIGHT");
        assert_eq!(tasks.load(Ordering::Relaxed), 1);

        // Second burst: finish record completes the handshake.
        tls.inbox().write_end(b"FIN").unwrap();
        assert!(tls.do_handshake(&link, &mut sink).unwrap());
        assert!(tls.handshake_done());
    }

    #[test]
    fn test_handshake_done_latches() {
        let (engine, _) = MockEngine::server();
        let tls = adapter(engine);
        let link = StubLink::up();
        let mut sink = VecSink::default();

        tls.inbox().write_end(b"HELLO").unwrap();
        tls.do_handshake(&link, &mut sink).unwrap();
        tls.inbox().write_end(b"FIN").unwrap();
        assert!(tls.do_handshake(&link, &mut sink).unwrap());

        // Further drives are no-ops reporting done.
        assert!(tls.do_handshake(&link, &mut sink).unwrap());
        assert!(tls.handshake_done());
    }

    #[test]
    fn test_handshake_parks_on_partial_record() {
        let (engine, _) = MockEngine::server();
        let tls = adapter(engine);
        let link = StubLink::up();
        let mut sink = VecSink::default();

        // Less than one hello record: drive parks, bytes stay buffered.
        tls.inbox().write_end(b"HE").unwrap();
        assert!(!tls.do_handshake(&link, &mut sink).unwrap());
        assert_eq!(tls.inbox().size(), 2);

        tls.inbox().write_end(b"LLO").unwrap();
        assert!(!tls.do_handshake(&link, &mut sink).unwrap());
        assert_eq!(sink.out, b"SRV-FLIGHT");
    }

    /// Engine that reports NEED_WRAP forever without progress.
    struct SpinEngine;

    impl TlsEngine for SpinEngine {
        fn begin_handshake(&mut self) -> Result<(), TlsError> {
            Ok(())
        }
        fn wrap(&mut self, _src: &[u8], _dst: &mut [u8]) -> Result<EngineResult, TlsError> {
            Ok(EngineResult {
                status: EngineStatus::Ok,
                handshake: HandshakeStatus::NeedWrap,
                consumed: 0,
                produced: 0,
            })
        }
        fn unwrap(&mut self, _src: &[u8], _dst: &mut [u8]) -> Result<EngineResult, TlsError> {
            Ok(EngineResult {
                status: EngineStatus::Ok,
                handshake: HandshakeStatus::NeedWrap,
                consumed: 0,
                produced: 0,
            })
        }
        fn delegated_task(&mut self) -> Option<EngineTask> {
            None
        }
        fn handshake_status(&self) -> HandshakeStatus {
            HandshakeStatus::NeedWrap
        }
        fn packet_size(&self) -> usize {
            256
        }
        fn close_outbound(&mut self) {}
    }

    #[test]
    fn test_handshake_step_cap() {
        let tls = TlsAdapter::new(Box::new(SpinEngine), Duration::from_secs(5));
        let link = StubLink::up();
        let mut sink = VecSink::default();

        match tls.do_handshake(&link, &mut sink) {
            Err(TlsError::Handshake(msg)) => assert!(msg.contains("steps")),
            other => panic!("expected step-cap error, got {:?}", other.map(|_| ())),
        }
    }

    /// Engine whose wrap always fails with a transient error.
    struct FailingEngine;

    impl TlsEngine for FailingEngine {
        fn begin_handshake(&mut self) -> Result<(), TlsError> {
            Ok(())
        }
        fn wrap(&mut self, _src: &[u8], _dst: &mut [u8]) -> Result<EngineResult, TlsError> {
            Err(TlsError::Engine("bad record".to_string()))
        }
        fn unwrap(&mut self, _src: &[u8], _dst: &mut [u8]) -> Result<EngineResult, TlsError> {
            Err(TlsError::Engine("bad record".to_string()))
        }
        fn delegated_task(&mut self) -> Option<EngineTask> {
            None
        }
        fn handshake_status(&self) -> HandshakeStatus {
            HandshakeStatus::NeedWrap
        }
        fn packet_size(&self) -> usize {
            256
        }
        fn close_outbound(&mut self) {}
    }

    #[test]
    fn test_handshake_wrap_retry_capped_by_read_timeout() {
        let tls = TlsAdapter::new(Box::new(FailingEngine), Duration::from_millis(30));
        let link = StubLink::up();
        let mut sink = VecSink::default();

        let start = Instant::now();
        match tls.do_handshake(&link, &mut sink) {
            Err(TlsError::HandshakeTimeout(_)) => {}
            other => panic!("expected timeout, got {:?}", other.map(|_| ())),
        }
        // The retry loop must give up near the read timeout, not spin on.
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_wrap_unwrap_round_trip() {
        let sender = adapter(MockEngine::established());
        let receiver = adapter(MockEngine::established());
        let link = StubLink::up();
        let mut sink = VecSink::default();

        let res = sender
            .wrap_data(&link, &mut sink, b"ping over tls")
            .unwrap()
            .unwrap();
        assert_eq!(res.status, EngineStatus::Ok);
        assert!(!sink.out.is_empty());

        receiver.inbox().write_end(&sink.out).unwrap();
        let app = ByteChannel::new(4096);
        let produced = receiver.unwrap_channel(&link, &app).unwrap();
        assert_eq!(produced, 13);

        let view = app.byte_buffer().unwrap();
        assert_eq!(view.as_slice(), b"ping over tls");
    }

    #[test]
    fn test_unwrap_channel_keeps_partial_record() {
        let sender = adapter(MockEngine::established());
        let receiver = adapter(MockEngine::established());
        let link = StubLink::up();
        let mut sink = VecSink::default();

        sender.wrap_data(&link, &mut sink, b"split me").unwrap();
        let cut = sink.out.len() / 2;

        receiver.inbox().write_end(&sink.out[..cut]).unwrap();
        let app = ByteChannel::new(4096);
        assert_eq!(receiver.unwrap_channel(&link, &app).unwrap(), 0);
        assert_eq!(receiver.inbox().size(), cut);

        receiver.inbox().write_end(&sink.out[cut..]).unwrap();
        assert_eq!(receiver.unwrap_channel(&link, &app).unwrap(), 8);
        assert_eq!(app.byte_buffer().unwrap().as_slice(), b"split me");
    }

    #[test]
    fn test_release_then_unwrap_returns_none() {
        let tls = adapter(MockEngine::established());
        let link = StubLink::up();

        tls.release();
        tls.release(); // second release is a no-op

        assert!(tls.unwrap_data(&link, b"\x00\x02ab").unwrap().is_none());

        let mut sink = VecSink::default();
        assert!(tls.wrap_data(&link, &mut sink, b"x").unwrap().is_none());
        assert!(sink.out.is_empty());
    }

    #[test]
    fn test_wrap_data_disconnected_returns_none() {
        let tls = adapter(MockEngine::established());
        let link = StubLink::up();
        link.connected.store(false, Ordering::Relaxed);

        let mut sink = VecSink::default();
        assert!(tls.wrap_data(&link, &mut sink, b"x").unwrap().is_none());
    }
}
