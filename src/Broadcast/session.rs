use std::io;
use std::sync::Arc;

use log::debug;

use super::channel::{Channel, PollTicket, Readiness};
use super::directory::ChannelDirectory;
use super::registry::ConsumerCursor;
use crate::Core::waitqueue::InterruptFlag;

/// The state shared by every handle duplicated from one open call.
/// Dropping the last handle runs `leave`, exactly once.
struct SessionInner {
    directory: Arc<ChannelDirectory>,
    identity: String,
    channel: Arc<Channel>,
    cursor: Arc<ConsumerCursor>,
    interrupt: InterruptFlag,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        debug!("close: releasing consumer on {:?}", self.identity);
        self.directory
            .leave(&self.identity, &self.channel, self.cursor.id());
    }
}

/// An open handle onto one channel, bound to one consumer cursor.
///
/// A session is created by [`Session::open`] (or [`SessionBuilder`] for
/// non-default modes) and released by dropping it, or explicitly with
/// [`close`](Session::close). [`try_clone`](Session::try_clone) duplicates
/// the handle without creating a new consumer: clones alias one cursor,
/// and the consumer leaves its channel only when the last handle goes.
///
/// The non-blocking flag is fixed at open time and applies to every
/// `read`/`write` made through this handle.
pub struct Session {
    inner: Option<Arc<SessionInner>>,
    nonblocking: bool,
}

/// Cancels blocked calls on one session from another thread.
///
/// Raising the interrupt latches: every blocking call on the session
/// fails with `ErrorKind::Interrupted` until [`reset`](Interrupter::reset)
/// is called. Calls that can make progress are unaffected.
#[derive(Clone)]
pub struct Interrupter {
    channel: Arc<Channel>,
    flag: InterruptFlag,
}

impl Interrupter {
    pub fn interrupt(&self) {
        self.flag.raise();
        self.channel.wake_waiters();
    }

    pub fn reset(&self) {
        self.flag.reset();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Session");
        match &self.inner {
            Some(inner) => {
                s.field("identity", &inner.identity);
                s.field("cursor", &inner.cursor.id());
            }
            None => {
                s.field("closed", &true);
            }
        }
        s.field("nonblocking", &self.nonblocking).finish()
    }
}

impl Session {
    /// Open a blocking session on the global directory, creating the
    /// channel for `identity` if it does not exist yet.
    pub fn open(identity: &str) -> io::Result<Session> {
        super::builder::SessionBuilder::new(identity).open()
    }

    pub(crate) fn open_with(
        directory: Arc<ChannelDirectory>,
        identity: &str,
        nonblocking: bool,
    ) -> io::Result<Session> {
        let (channel, cursor) = directory.join(identity)?;
        debug!("open: bound consumer {} on {identity:?}", cursor.id());
        Ok(Session {
            inner: Some(Arc::new(SessionInner {
                directory,
                identity: identity.to_owned(),
                channel,
                cursor,
                interrupt: InterruptFlag::new(),
            })),
            nonblocking,
        })
    }

    fn bound(&self) -> io::Result<&Arc<SessionInner>> {
        self.inner.as_ref().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotConnected, "session has no bound consumer")
        })
    }

    /// Read up to `out.len()` bytes written after this consumer joined.
    /// Returns the count transferred; callers loop for a full buffer.
    pub fn read(&self, out: &mut [u8]) -> io::Result<usize> {
        let inner = self.bound()?;
        inner
            .channel
            .read(&inner.cursor, out, self.nonblocking, &inner.interrupt)
    }

    /// Write up to `bytes.len()` bytes, bounded by the room the slowest
    /// consumer leaves. Returns the count transferred; callers loop for
    /// the remainder, or use [`write_all`](Session::write_all).
    pub fn write(&self, bytes: &[u8]) -> io::Result<usize> {
        let inner = self.bound()?;
        inner.channel.write(bytes, self.nonblocking, &inner.interrupt)
    }

    /// Write the whole of `bytes`, looping over partial transfers.
    pub fn write_all(&self, mut bytes: &[u8]) -> io::Result<()> {
        while !bytes.is_empty() {
            let written = self.write(bytes)?;
            bytes = &bytes[written..];
        }
        Ok(())
    }

    /// Current readiness of this session, plus a wakeup registration for
    /// [`wait_ready`](Session::wait_ready). Transfers nothing.
    pub fn poll(&self) -> io::Result<(Readiness, PollTicket)> {
        let inner = self.bound()?;
        Ok(inner.channel.poll(&inner.cursor))
    }

    /// Block until the channel has signalled data- or room-availability
    /// since `ticket` was issued by [`poll`](Session::poll).
    pub fn wait_ready(&self, ticket: PollTicket) -> io::Result<()> {
        let inner = self.bound()?;
        inner.channel.wait_ready(ticket, &inner.interrupt)
    }

    /// Duplicate this handle. The clone shares the consumer cursor, the
    /// interrupt flag, and the blocking mode; the consumer leaves its
    /// channel only when the last duplicate is closed or dropped.
    ///
    /// Duplicates are not coordinated with each other: two handles
    /// reading the shared cursor at the same time will race on it. Use
    /// one reader at a time (a dedicated reader thread plus a writer
    /// thread is the intended split).
    pub fn try_clone(&self) -> io::Result<Session> {
        let inner = self.bound()?;
        Ok(Session {
            inner: Some(inner.clone()),
            nonblocking: self.nonblocking,
        })
    }

    /// Release this handle now. The bound consumer leaves its channel
    /// when the last duplicated handle is released; any further operation
    /// on this handle (including a second close) fails with
    /// `ErrorKind::NotConnected`.
    pub fn close(&mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(inner) => {
                drop(inner);
                Ok(())
            }
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "session has no bound consumer",
            )),
        }
    }

    /// A handle for cancelling this session's blocked calls from another
    /// thread.
    pub fn interrupter(&self) -> io::Result<Interrupter> {
        let inner = self.bound()?;
        Ok(Interrupter {
            channel: inner.channel.clone(),
            flag: inner.interrupt.clone(),
        })
    }

    pub fn is_nonblocking(&self) -> bool {
        self.nonblocking
    }

    /// The identity this session is bound to, if still bound.
    pub fn identity(&self) -> Option<&str> {
        self.inner.as_deref().map(|inner| inner.identity.as_str())
    }
}
