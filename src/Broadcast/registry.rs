use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, MutexGuard};

use super::Buffer::ring_dist;

/// Upper bound on live consumers per channel. Registration past this is
/// reported as resource exhaustion.
pub const MAX_CONSUMERS: usize = 1024;

/// One consumer's private read cursor into a channel's ring.
///
/// Created equal to the channel's `end` at join time, so a new consumer
/// sees only future writes. The offset is mutated only by the owning
/// consumer's reads, always under the shared buffer lock; the writer scans
/// it under the exclusive lock. Padded so neighbouring cursors don't share
/// a cache line.
pub struct ConsumerCursor {
    id: u64,
    offset: CachePadded<AtomicUsize>,
}

impl ConsumerCursor {
    pub(crate) fn new(id: u64, offset: usize) -> Self {
        Self {
            id,
            offset: CachePadded::new(AtomicUsize::new(offset)),
        }
    }

    #[inline]
    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub(crate) fn offset(&self) -> usize {
        self.offset.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn advance(&self, by: usize, capacity: usize) {
        let next = (self.offset.load(Ordering::Relaxed) + by) % capacity;
        self.offset.store(next, Ordering::Release);
    }
}

/// The live set of consumer cursors for one channel.
///
/// Guards membership with its own mutex; any scan over the cursors (the
/// slowest-consumer search) happens while that mutex is held. Critical
/// sections are short and never block.
pub struct ConsumerRegistry {
    cursors: Mutex<HashMap<u64, Arc<ConsumerCursor>>>,
    next_id: AtomicU64,
}

impl ConsumerRegistry {
    pub(crate) fn new() -> Self {
        Self {
            cursors: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<u64, Arc<ConsumerCursor>>> {
        self.cursors.lock()
    }

    pub(crate) fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Offset of the consumer with the most unread bytes; `end` if the set is
/// empty. Among equal-unread cursors the first one encountered wins
/// (strict `>`), though equal unread against one shared `end` implies an
/// identical offset anyway.
pub(crate) fn slowest_offset(
    cursors: &HashMap<u64, Arc<ConsumerCursor>>,
    end: usize,
    capacity: usize,
) -> usize {
    let mut max_unread = 0;
    let mut offset = end;
    for cursor in cursors.values() {
        let unread = ring_dist(cursor.offset(), end, capacity);
        if unread > max_unread {
            max_unread = unread;
            offset = cursor.offset();
        }
    }
    offset
}

/// Bytes the writer may append without touching any consumer's unread
/// data: the distance from `end` to one slot before the slowest offset.
/// With no consumers this is `capacity - 1`; the sentinel slot keeps
/// "empty" distinguishable from "full".
pub(crate) fn room_to_write(
    cursors: &HashMap<u64, Arc<ConsumerCursor>>,
    end: usize,
    capacity: usize,
) -> usize {
    let ceiling = (slowest_offset(cursors, end, capacity) + capacity - 1) % capacity;
    ring_dist(end, ceiling, capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with(offsets: &[usize]) -> HashMap<u64, Arc<ConsumerCursor>> {
        offsets
            .iter()
            .enumerate()
            .map(|(i, &off)| (i as u64, Arc::new(ConsumerCursor::new(i as u64, off))))
            .collect()
    }

    #[test]
    fn empty_registry_leaves_one_sentinel_slot() {
        let cursors = registry_with(&[]);
        assert_eq!(slowest_offset(&cursors, 5, 8), 5);
        assert_eq!(room_to_write(&cursors, 5, 8), 7);
    }

    #[test]
    fn caught_up_consumer_does_not_shrink_room() {
        let cursors = registry_with(&[5]);
        assert_eq!(room_to_write(&cursors, 5, 8), 7);
    }

    #[test]
    fn room_shrinks_with_the_slowest_consumer() {
        // end=4: consumer at 0 has 4 unread, consumer at 3 has 1
        let cursors = registry_with(&[0, 3]);
        assert_eq!(slowest_offset(&cursors, 4, 8), 0);
        assert_eq!(room_to_write(&cursors, 4, 8), 3);
    }

    #[test]
    fn room_handles_wrapped_cursors() {
        // end wrapped past 0; slowest is at 6 with dist(6, 2) = 4 unread
        let cursors = registry_with(&[6, 1]);
        assert_eq!(slowest_offset(&cursors, 2, 8), 6);
        assert_eq!(room_to_write(&cursors, 2, 8), 3);
    }

    #[test]
    fn zero_room_when_writer_is_one_shy_of_slowest() {
        // end=7, slowest at 0: ceiling is 7, dist(7, 7) = 0
        let cursors = registry_with(&[0]);
        assert_eq!(room_to_write(&cursors, 7, 8), 0);
    }

    #[test]
    fn advance_wraps_modulo_capacity() {
        let cursor = ConsumerCursor::new(0, 6);
        cursor.advance(5, 8);
        assert_eq!(cursor.offset(), 3);
    }
}
