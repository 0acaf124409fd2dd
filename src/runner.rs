// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Single-threaded task pump owning one [`SocketSelector`].
//!
//! All registration, cancellation, I/O, and TLS work executes on the one
//! worker thread that owns the selector state, so none of it needs locks.
//! Foreign threads interact by submitting tasks; a task receives exclusive
//! access to the selector and runs serialized with the event cycle:
//!
//! ```text
//! worker loop:
//!   drain queued tasks (arrival order)  ->  selector cycle (poll 100 ms)
//!        ^                                         |
//!        +------------- repeat --------------------+
//! ```
//!
//! `add_event` wakes the poll, so a submitted task does not wait out the
//! poll deadline. The runner refuses tasks after `close`, and `close` is
//! idempotent.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, JoinHandle, ThreadId};

use crossbeam::channel::{Receiver, Sender, TryRecvError};
use mio::{Token, Waker};
use parking_lot::Mutex;
use socket2::{Domain, Protocol, Socket, Type};

use crate::context::{SocketConfig, SocketContext};
use crate::selector::{Endpoint, SocketSelector, TOKEN_START};
use crate::session::{Session, SessionKind, StopType};

/// Work executed on the runner thread with exclusive selector access.
pub(crate) type Task = Box<dyn FnOnce(&mut SocketSelector) + Send + 'static>;

struct RunnerShared {
    tx: Sender<Task>,
    waker: Arc<Waker>,
    running: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,
    thread_id: OnceLock<ThreadId>,
    next_token: AtomicUsize,
}

/// Handle to the selector's owning thread. Cheap to clone; all clones share
/// the same worker.
#[derive(Clone)]
pub struct EventRunner {
    shared: Arc<RunnerShared>,
}

impl EventRunner {
    /// Take ownership of `selector` and start the worker thread.
    pub fn start(mut selector: SocketSelector) -> io::Result<EventRunner> {
        let (tx, rx) = crossbeam::channel::unbounded::<Task>();
        let waker = selector.waker();

        let shared = Arc::new(RunnerShared {
            tx,
            waker,
            running: AtomicBool::new(true),
            worker: Mutex::new(None),
            thread_id: OnceLock::new(),
            next_token: AtomicUsize::new(TOKEN_START),
        });

        let runner = EventRunner {
            shared: Arc::clone(&shared),
        };
        selector.set_runner(runner.clone());

        let loop_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name("selio-runner".to_string())
            .spawn(move || run_loop(selector, rx, loop_shared))?;

        let _ = shared.thread_id.set(handle.thread().id());
        *shared.worker.lock() = Some(handle);

        Ok(runner)
    }

    /// Enqueue a task. Tasks run strictly in submission order; a task may
    /// submit further tasks, which run after it completes. Returns `false`
    /// once the runner is closed.
    pub fn add_event(&self, task: impl FnOnce(&mut SocketSelector) + Send + 'static) -> bool {
        if !self.shared.running.load(Ordering::Acquire) {
            return false;
        }
        if self.shared.tx.send(Box::new(task)).is_err() {
            return false;
        }
        let _ = self.shared.waker.wake();
        true
    }

    /// Identity of the owning thread.
    pub fn thread_id(&self) -> Option<ThreadId> {
        self.shared.thread_id.get().copied()
    }

    /// Whether the calling thread is the owning thread.
    pub fn in_runner_thread(&self) -> bool {
        self.thread_id() == Some(thread::current().id())
    }

    /// Whether the runner still accepts tasks.
    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    /// Stop the worker and close the selector. Idempotent; joins the worker
    /// unless called from the worker itself.
    pub fn close(&self) {
        self.shared.running.store(false, Ordering::Release);
        let _ = self.shared.waker.wake();

        let handle = self.shared.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }

    pub(crate) fn alloc_token(&self) -> Token {
        Token(self.shared.next_token.fetch_add(1, Ordering::Relaxed))
    }

    // ========================================================================
    // Socket constructors
    // ========================================================================

    /// Bind a TCP server socket and register it for accepts. Returns the
    /// bound address (useful with port 0).
    pub fn tcp_listen(&self, addr: SocketAddr, ctx: Arc<SocketContext>) -> io::Result<SocketAddr> {
        let listener = mio::net::TcpListener::bind(addr)?;
        let local = listener.local_addr()?;
        let token = self.alloc_token();

        let accepted = self.add_event(move |selector| {
            if let Err(e) = selector.install(token, Endpoint::TcpListener(listener), ctx, None) {
                log::error!("[RUNNER] register listener failed: {}", e);
            }
        });
        if !accepted {
            return Err(runner_closed());
        }
        log::debug!("[RUNNER] tcp listening addr={}", local);
        Ok(local)
    }

    /// Connect a TCP client socket and register its session.
    ///
    /// The connect itself is blocking (OS default timeout); I/O on the
    /// resulting session is non-blocking. With TLS configured, the
    /// handshake starts on the runner thread right after registration.
    pub fn tcp_connect(&self, addr: SocketAddr, ctx: Arc<SocketContext>) -> io::Result<Arc<Session>> {
        let stream = std::net::TcpStream::connect(addr)?;
        stream.set_nonblocking(true)?;
        if ctx.config.nodelay {
            let _ = stream.set_nodelay(true);
        }
        apply_buffer_sizes(&socket2::SockRef::from(&stream), &ctx.config);

        let stream = mio::net::TcpStream::from_std(stream);
        let token = self.alloc_token();
        let session = Session::new(token, None, addr, SessionKind::Tcp, Arc::clone(&ctx), self.clone());

        let installed = Arc::clone(&session);
        let accepted = self.add_event(move |selector| {
            match selector.install(token, Endpoint::Tcp(stream), ctx, Some(Arc::clone(&installed))) {
                Ok(()) => selector.drive_handshake(&installed),
                Err(e) => {
                    log::error!("[RUNNER] register connection failed: {}", e);
                    installed.mark_disconnected(StopType::Exception);
                }
            }
        });
        if !accepted {
            return Err(runner_closed());
        }
        Ok(session)
    }

    /// Bind an unconnected UDP server socket. Each previously unseen remote
    /// address gets an implicit child session on first packet.
    pub fn udp_bind(&self, addr: SocketAddr, ctx: Arc<SocketContext>) -> io::Result<SocketAddr> {
        let socket = new_udp_socket(addr, &ctx.config)?;
        socket.bind(&addr.into())?;

        let socket: std::net::UdpSocket = socket.into();
        let local = socket.local_addr()?;
        let socket = mio::net::UdpSocket::from_std(socket);
        let token = self.alloc_token();

        let accepted = self.add_event(move |selector| {
            if let Err(e) = selector.install(token, Endpoint::Udp(socket), ctx, None) {
                log::error!("[RUNNER] register udp socket failed: {}", e);
            }
        });
        if !accepted {
            return Err(runner_closed());
        }
        log::debug!("[RUNNER] udp listening addr={}", local);
        Ok(local)
    }

    /// Create a connected UDP socket and register its session.
    pub fn udp_connect(&self, addr: SocketAddr, ctx: Arc<SocketContext>) -> io::Result<Arc<Session>> {
        let socket = new_udp_socket(addr, &ctx.config)?;
        let bind_addr: SocketAddr = if addr.is_ipv4() {
            "0.0.0.0:0".parse().map_err(invalid_addr)?
        } else {
            "[::]:0".parse().map_err(invalid_addr)?
        };
        socket.bind(&bind_addr.into())?;
        socket.connect(&addr.into())?;

        let socket: std::net::UdpSocket = socket.into();
        let socket = mio::net::UdpSocket::from_std(socket);
        let token = self.alloc_token();
        let session = Session::new(
            token,
            None,
            addr,
            SessionKind::UdpConnected,
            Arc::clone(&ctx),
            self.clone(),
        );

        let installed = Arc::clone(&session);
        let accepted = self.add_event(move |selector| {
            match selector.install(token, Endpoint::Udp(socket), ctx, Some(Arc::clone(&installed))) {
                // A client-role TLS engine owns the first flight; kick it
                // here, exactly like the stream connect path.
                Ok(()) => selector.drive_handshake(&installed),
                Err(e) => {
                    log::error!("[RUNNER] register udp socket failed: {}", e);
                    installed.mark_disconnected(StopType::Exception);
                }
            }
        });
        if !accepted {
            return Err(runner_closed());
        }
        Ok(session)
    }
}

/// Worker body: drain tasks, run one cycle, repeat.
fn run_loop(mut selector: SocketSelector, rx: Receiver<Task>, shared: Arc<RunnerShared>) {
    log::debug!("[RUNNER] event loop started");

    loop {
        loop {
            match rx.try_recv() {
                Ok(task) => task(&mut selector),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    shared.running.store(false, Ordering::Release);
                    break;
                }
            }
        }

        if !shared.running.load(Ordering::Acquire) {
            break;
        }

        selector.cycle();
    }

    selector.close();
    log::debug!("[RUNNER] event loop stopped");
}

fn new_udp_socket(addr: SocketAddr, config: &SocketConfig) -> io::Result<Socket> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    apply_buffer_sizes(&socket, config);
    socket.set_nonblocking(true)?;
    Ok(socket)
}

pub(crate) fn apply_buffer_sizes(socket: &Socket, config: &SocketConfig) {
    if let Some(size) = config.send_buffer_size {
        if let Err(e) = socket.set_send_buffer_size(size) {
            log::debug!("[RUNNER] SO_SNDBUF={} rejected: {}", size, e);
        }
    }
    if let Some(size) = config.recv_buffer_size {
        if let Err(e) = socket.set_recv_buffer_size(size) {
            log::debug!("[RUNNER] SO_RCVBUF={} rejected: {}", size, e);
        }
    }
}

fn runner_closed() -> io::Error {
    io::Error::new(io::ErrorKind::NotConnected, "event runner is closed")
}

fn invalid_addr(e: std::net::AddrParseError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, e)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn start_runner() -> EventRunner {
        let selector = SocketSelector::new().expect("selector");
        EventRunner::start(selector).expect("runner")
    }

    #[test]
    fn test_tasks_run_in_submission_order() {
        let runner = start_runner();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = crossbeam::channel::bounded(1);

        for i in 0..16 {
            let seen = Arc::clone(&seen);
            let done_tx = done_tx.clone();
            runner.add_event(move |_| {
                seen.lock().push(i);
                if i == 15 {
                    let _ = done_tx.send(());
                }
            });
        }

        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(*seen.lock(), (0..16).collect::<Vec<_>>());
        runner.close();
    }

    #[test]
    fn test_task_submitted_by_task_runs_after_it() {
        let runner = start_runner();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (done_tx, done_rx) = crossbeam::channel::bounded(1);

        let inner_seen = Arc::clone(&seen);
        let inner_runner = runner.clone();
        runner.add_event(move |_| {
            let seen = Arc::clone(&inner_seen);
            inner_runner.add_event(move |_| {
                seen.lock().push("second");
                let _ = done_tx.send(());
            });
            inner_seen.lock().push("first");
        });

        done_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(*seen.lock(), vec!["first", "second"]);
        runner.close();
    }

    #[test]
    fn test_owning_thread_identity() {
        let runner = start_runner();
        assert!(!runner.in_runner_thread());

        let (tx, rx) = crossbeam::channel::bounded(1);
        let probe = runner.clone();
        runner.add_event(move |_| {
            let _ = tx.send(probe.in_runner_thread());
        });

        assert!(rx.recv_timeout(Duration::from_secs(2)).unwrap());
        assert_eq!(
            runner.thread_id().is_some(),
            true,
            "thread id must be published after start"
        );
        runner.close();
    }

    #[test]
    fn test_close_refuses_new_tasks() {
        let runner = start_runner();
        runner.close();
        runner.close(); // idempotent

        assert!(!runner.is_running());
        assert!(!runner.add_event(|_| {}));
    }

    #[test]
    fn test_tokens_are_unique() {
        let runner = start_runner();
        let a = runner.alloc_token();
        let b = runner.alloc_token();
        assert_ne!(a, b);
        runner.close();
    }
}
