use super::Buffer::{ring_dist, RingBuffer};

impl RingBuffer {
    /// Create a ring buffer of `capacity` bytes, write cursor at 0.
    ///
    /// # Panics
    /// Panics if `capacity < 2`; one slot is reserved as the empty/full
    /// sentinel, so anything smaller cannot hold data at all.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 2, "ring capacity must be at least 2");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            end: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of bytes a reader at `offset` has not yet consumed.
    #[inline]
    pub fn unread_from(&self, offset: usize) -> usize {
        ring_dist(offset, self.end, self.capacity())
    }

    /// Copy all of `src` into the ring at `end` and advance `end`.
    ///
    /// The caller must have already clamped `src` to the available room;
    /// this copy never checks against any reader's offset.
    pub fn push_back(&mut self, src: &[u8]) {
        debug_assert!(src.len() < self.capacity());
        let cap = self.capacity();
        let first = src.len().min(cap - self.end);
        self.storage[self.end..self.end + first].copy_from_slice(&src[..first]);
        if first < src.len() {
            // wrapped: remainder lands at the start of the ring
            let rest = src.len() - first;
            self.storage[..rest].copy_from_slice(&src[first..]);
        }
        self.end = (self.end + src.len()) % cap;
    }

    /// Copy `dst.len()` bytes out of the ring starting at `offset`.
    ///
    /// The caller must have already clamped `dst` to the unread count for
    /// that offset. Does not advance any cursor.
    pub fn copy_to(&self, offset: usize, dst: &mut [u8]) {
        debug_assert!(dst.len() <= self.unread_from(offset));
        let cap = self.capacity();
        let first = dst.len().min(cap - offset);
        dst[..first].copy_from_slice(&self.storage[offset..offset + first]);
        if first < dst.len() {
            let rest = dst.len() - first;
            dst[first..].copy_from_slice(&self.storage[..rest]);
        }
    }
}
