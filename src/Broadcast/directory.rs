use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use lazy_static::lazy_static;
use log::{error, info};
use parking_lot::Mutex;

use super::channel::Channel;
use super::registry::ConsumerCursor;
use super::Buffer::RING_CAPACITY;

/// Upper bound on live channels per directory. Creation past this is
/// reported as resource exhaustion.
pub const MAX_CHANNELS: usize = 256;

lazy_static! {
    static ref GLOBAL: Arc<ChannelDirectory> = Arc::new(ChannelDirectory::new());
}

/// Identity-keyed map of live channels with lazy creation and
/// destroy-when-empty lifecycle.
///
/// Creation and destruction happen under the directory lock, and so does
/// the join/leave that triggers them, so a channel can never be destroyed
/// while a join for its identity is in progress. This lock is always the
/// outermost one; see [`Channel`] for the per-channel order.
pub struct ChannelDirectory {
    ring_capacity: usize,
    channels: Mutex<HashMap<String, Arc<Channel>>>,
}

impl Default for ChannelDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelDirectory {
    /// A directory whose channels use the default ring capacity.
    pub fn new() -> Self {
        Self::with_ring_capacity(RING_CAPACITY)
    }

    /// A directory whose channels use `capacity`-byte rings.
    pub fn with_ring_capacity(capacity: usize) -> Self {
        Self {
            ring_capacity: capacity,
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide default directory, used by
    /// [`Session::open`](crate::Broadcast::Session::open).
    pub fn global() -> Arc<ChannelDirectory> {
        GLOBAL.clone()
    }

    /// Look up or create the channel for `identity` and register a new
    /// consumer on it, atomically.
    pub(crate) fn join(
        &self,
        identity: &str,
    ) -> io::Result<(Arc<Channel>, Arc<ConsumerCursor>)> {
        let mut channels = self.channels.lock();
        let (channel, created) = match channels.get(identity) {
            Some(existing) => (existing.clone(), false),
            None => {
                if channels.len() >= MAX_CHANNELS {
                    return Err(io::Error::new(
                        io::ErrorKind::OutOfMemory,
                        "maximum number of channels reached",
                    ));
                }
                info!("join: creating channel for {identity:?}");
                let fresh = Arc::new(Channel::new(self.ring_capacity));
                channels.insert(identity.to_owned(), fresh.clone());
                (fresh, true)
            }
        };
        match channel.join() {
            Ok(cursor) => Ok((channel, cursor)),
            Err(err) => {
                // unwind a channel we just created and nobody ever joined
                if created {
                    channels.remove(identity);
                }
                Err(err)
            }
        }
    }

    /// Remove one consumer; destroys the channel when its registry
    /// empties, atomically with respect to concurrent joins.
    pub(crate) fn leave(&self, identity: &str, channel: &Arc<Channel>, cursor_id: u64) {
        let mut channels = self.channels.lock();
        if channel.leave(cursor_id) {
            let removed = channels.remove(identity);
            debug_assert!(
                removed.is_some_and(|c| Arc::ptr_eq(&c, channel)),
                "directory entry for {identity:?} did not match the emptied channel"
            );
            info!("leave: destroying channel for {identity:?}");
        }
    }

    /// Number of live channels.
    pub fn channel_count(&self) -> usize {
        self.channels.lock().len()
    }

    /// Whether a channel currently exists for `identity`.
    pub fn contains(&self, identity: &str) -> bool {
        self.channels.lock().contains_key(identity)
    }
}

impl Drop for ChannelDirectory {
    fn drop(&mut self) {
        let channels = self.channels.get_mut();
        if !channels.is_empty() {
            error!(
                "directory dropped with {} channel(s) still open",
                channels.len()
            );
        }
    }
}
