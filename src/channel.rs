// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Growable in-memory byte queue shared between the I/O thread and
//! application code.
//!
//! A [`ByteChannel`] is an ordered sequence of bytes with a capacity
//! threshold. Producers append with [`ByteChannel::write_end`]; consumers
//! take a locked readable view with [`ByteChannel::byte_buffer`], mark a
//! prefix consumed, and the consumed bytes are discarded when the view is
//! dropped (the compact step).
//!
//! The channel is a cheap cloneable handle; clones share the same storage.
//! [`ByteChannel::release`] permanently retires the storage: every later
//! write fails and every later view request returns `None`, so a consumer
//! racing a release observes absence instead of freed memory.
//!
//! `max_size` is the backpressure threshold, not a hard cap: the receive
//! pipeline waits on [`ByteChannel::would_overflow`] before appending, and
//! after a bounded wait it appends anyway rather than drop data.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};

/// Errors surfaced by channel operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The channel storage has been released.
    Released,
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Released => write!(f, "byte channel has been released"),
        }
    }
}

impl std::error::Error for ChannelError {}

/// Shared channel storage.
struct ChannelInner {
    /// Pending bytes, oldest first.
    buf: Vec<u8>,

    /// Backpressure threshold.
    max_size: usize,

    /// Set once by `release`; never cleared.
    released: bool,
}

/// Bounded growable byte queue.
///
/// Cloning the handle shares the underlying storage.
#[derive(Clone)]
pub struct ByteChannel {
    inner: Arc<Mutex<ChannelInner>>,
}

impl ByteChannel {
    /// Create a channel with the given backpressure threshold.
    pub fn new(max_size: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ChannelInner {
                buf: Vec::new(),
                max_size,
                released: false,
            })),
        }
    }

    /// Append `src` to the end of the queue.
    ///
    /// Returns the number of bytes appended. Fails only when the channel
    /// has been released; the capacity threshold is enforced by the
    /// caller's backpressure wait, not here.
    pub fn write_end(&self, src: &[u8]) -> Result<usize, ChannelError> {
        let mut inner = self.inner.lock();
        if inner.released {
            return Err(ChannelError::Released);
        }
        inner.buf.extend_from_slice(src);
        Ok(src.len())
    }

    /// Take a locked readable view of the pending bytes.
    ///
    /// Returns `None` once the channel has been released. The view holds
    /// the channel lock; keep its scope tight.
    pub fn byte_buffer(&self) -> Option<ChannelView<'_>> {
        let guard = self.inner.lock();
        if guard.released {
            return None;
        }
        Some(ChannelView { guard, consumed: 0 })
    }

    /// Number of pending bytes.
    pub fn size(&self) -> usize {
        self.inner.lock().buf.len()
    }

    /// The backpressure threshold.
    pub fn max_size(&self) -> usize {
        self.inner.lock().max_size
    }

    /// Whether appending `incoming` bytes would reach the threshold.
    ///
    /// Deliberately conservative: waits when the append *would hit*
    /// capacity, not only on strict overflow.
    pub fn would_overflow(&self, incoming: usize) -> bool {
        let inner = self.inner.lock();
        inner.buf.len() + incoming >= inner.max_size
    }

    /// Whether the channel has been released.
    pub fn is_released(&self) -> bool {
        self.inner.lock().released
    }

    /// Retire the channel. Idempotent; pending bytes are dropped.
    pub fn release(&self) {
        let mut inner = self.inner.lock();
        if !inner.released {
            inner.released = true;
            inner.buf = Vec::new();
        }
    }
}

impl fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ByteChannel")
            .field("size", &inner.buf.len())
            .field("max_size", &inner.max_size)
            .field("released", &inner.released)
            .finish()
    }
}

/// Locked readable view of a [`ByteChannel`].
///
/// [`ChannelView::consume`] marks a prefix as read; dropping the view
/// compacts the channel, discarding the consumed prefix.
pub struct ChannelView<'a> {
    guard: MutexGuard<'a, ChannelInner>,
    consumed: usize,
}

impl ChannelView<'_> {
    /// The bytes not yet consumed through this view.
    pub fn as_slice(&self) -> &[u8] {
        &self.guard.buf[self.consumed..]
    }

    /// Mark a further `n` bytes as consumed.
    pub fn consume(&mut self, n: usize) {
        self.consumed = (self.consumed + n).min(self.guard.buf.len());
    }

    /// Bytes remaining in the view.
    pub fn remaining(&self) -> usize {
        self.guard.buf.len() - self.consumed
    }
}

impl Drop for ChannelView<'_> {
    fn drop(&mut self) {
        if self.consumed > 0 {
            self.guard.buf.drain(..self.consumed);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
