use std::io;
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use super::registry::{room_to_write, ConsumerCursor, ConsumerRegistry, MAX_CONSUMERS};
use super::Buffer::RingBuffer;
use crate::Core::waitqueue::{InterruptFlag, WaitHub};

/// Readiness of one consumer's view of a channel, as computed by
/// [`poll`](crate::Broadcast::Session::poll).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Readiness {
    /// A read would currently transfer at least one byte.
    pub readable: bool,
    /// A write would currently transfer at least one byte.
    pub writable: bool,
}

/// Wakeup registration issued by `poll`: both notification generations,
/// captured while the poll snapshot was taken. Waiting on the ticket
/// returns as soon as either side has fired since.
#[derive(Clone, Copy, Debug)]
pub struct PollTicket {
    data: u64,
    room: u64,
}

/// One broadcast channel: a ring buffer, the live consumer set, and the
/// wait/notify hub coordinating them.
///
/// Lock order within a channel is registry → buffer → hub state, always.
/// The directory lock, when needed, is taken before any of these.
pub struct Channel {
    capacity: usize,
    registry: ConsumerRegistry,
    buffer: RwLock<RingBuffer>,
    waiters: WaitHub,
}

impl Channel {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity,
            registry: ConsumerRegistry::new(),
            buffer: RwLock::new(RingBuffer::new(capacity)),
            waiters: WaitHub::new(),
        }
    }

    /// Register a new consumer, cursor snapshotted at the current `end`.
    ///
    /// Holding the registry lock across the `end` snapshot and the insert
    /// keeps registration atomic against in-flight writes: a writer owns
    /// both the registry lock and the exclusive buffer lock for its whole
    /// room-check/copy/advance sequence, so a joiner sees either all of a
    /// write or none of it.
    pub(crate) fn join(&self) -> io::Result<Arc<ConsumerCursor>> {
        let mut cursors = self.registry.lock();
        if cursors.len() >= MAX_CONSUMERS {
            return Err(io::Error::new(
                io::ErrorKind::OutOfMemory,
                "maximum number of consumers reached",
            ));
        }
        let end = self.buffer.read().end();
        let cursor = Arc::new(ConsumerCursor::new(self.registry.allocate_id(), end));
        cursors.insert(cursor.id(), cursor.clone());
        Ok(cursor)
    }

    /// Remove a consumer's cursor; returns true when the registry is now
    /// empty and the channel should be destroyed.
    pub(crate) fn leave(&self, id: u64) -> bool {
        let empty = {
            let mut cursors = self.registry.lock();
            let removed = cursors.remove(&id);
            assert!(removed.is_some(), "consumer {id} is not registered here");
            cursors.is_empty()
        };
        // the departed consumer may have been the slowest one
        self.waiters.notify_room();
        empty
    }

    /// Copy as many of `bytes` as currently fit, never more.
    ///
    /// Returns the count actually written, which may be less than
    /// requested; callers loop to send the remainder. With zero room the
    /// call fails with `WouldBlock` (non-blocking) or suspends until room
    /// appears or the wait is interrupted.
    pub(crate) fn write(
        &self,
        bytes: &[u8],
        nonblocking: bool,
        intr: &InterruptFlag,
    ) -> io::Result<usize> {
        if bytes.is_empty() {
            return Ok(0);
        }
        loop {
            let seen = {
                let cursors = self.registry.lock();
                let mut buf = self.buffer.write();
                let room = room_to_write(&cursors, buf.end(), self.capacity);
                if room > 0 {
                    let count = room.min(bytes.len());
                    buf.push_back(&bytes[..count]);
                    trace!(
                        "write: wrote {count} of {}, end={}",
                        bytes.len(),
                        buf.end()
                    );
                    drop(buf);
                    drop(cursors);
                    self.waiters.notify_data();
                    return Ok(count);
                }
                // snapshot while still holding the locks that proved
                // room == 0, so a read completing after this line bumps
                // the generation and the wait below returns immediately
                self.waiters.room_generation()
            };
            if nonblocking {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "no room available for writing",
                ));
            }
            trace!("write: no room, waiting");
            self.waiters.wait_room(seen, intr)?;
        }
    }

    /// Copy up to `out.len()` unread bytes for `cursor`, advancing it.
    ///
    /// Distinct consumers read concurrently under the shared buffer lock;
    /// each touches only its own cursor. With nothing unread the call
    /// fails with `WouldBlock` (non-blocking) or suspends until data
    /// arrives or the wait is interrupted.
    pub(crate) fn read(
        &self,
        cursor: &ConsumerCursor,
        out: &mut [u8],
        nonblocking: bool,
        intr: &InterruptFlag,
    ) -> io::Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        loop {
            let seen = {
                let buf = self.buffer.read();
                let unread = buf.unread_from(cursor.offset());
                if unread > 0 {
                    let count = unread.min(out.len());
                    buf.copy_to(cursor.offset(), &mut out[..count]);
                    cursor.advance(count, self.capacity);
                    trace!("read: read {count} of {unread} unread, offset={}", cursor.offset());
                    drop(buf);
                    // the slowest offset may have moved; writers re-check
                    self.waiters.notify_room();
                    return Ok(count);
                }
                self.waiters.data_generation()
            };
            if nonblocking {
                return Err(io::Error::new(
                    io::ErrorKind::WouldBlock,
                    "no data available for reading",
                ));
            }
            trace!("read: no data, waiting");
            self.waiters.wait_data(seen, intr)?;
        }
    }

    /// Recompute both readiness conditions for `cursor` without
    /// transferring anything, and register for wakeup on both
    /// notification channels.
    ///
    /// The exclusive buffer lock spans both checks: the room scan walks
    /// every consumer's offset and must not observe one advancing
    /// mid-scan. The ticket is captured under the same locks, so no event
    /// can slip between the snapshot and a later [`wait_ready`].
    ///
    /// [`wait_ready`]: Channel::wait_ready
    pub(crate) fn poll(&self, cursor: &ConsumerCursor) -> (Readiness, PollTicket) {
        let cursors = self.registry.lock();
        let buf = self.buffer.write();
        let readiness = Readiness {
            readable: buf.unread_from(cursor.offset()) > 0,
            writable: room_to_write(&cursors, buf.end(), self.capacity) > 0,
        };
        let (data, room) = self.waiters.generations();
        trace!("poll: {readiness:?}");
        (readiness, PollTicket { data, room })
    }

    /// Block until either notification channel has fired since `ticket`
    /// was issued, or the wait is interrupted.
    pub(crate) fn wait_ready(&self, ticket: PollTicket, intr: &InterruptFlag) -> io::Result<()> {
        self.waiters.wait_either((ticket.data, ticket.room), intr)
    }

    /// Force every blocked reader, writer, and poll waiter on this
    /// channel to re-check its condition (and its interrupt flag).
    pub(crate) fn wake_waiters(&self) {
        self.waiters.wake_all();
    }
}
