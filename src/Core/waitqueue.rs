use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

/// Cancellation flag for blocked channel operations.
///
/// Cloned handles share one flag. Once raised it stays raised until
/// [`reset`](InterruptFlag::reset). Like a pending signal: every blocking
/// call on the owning session fails with `ErrorKind::Interrupted` while the
/// flag is up. Raising the flag does not wake sleepers by itself; the owner
/// of the [`WaitHub`] must also call [`WaitHub::wake_all`].
#[derive(Clone, Debug, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.raised.store(false, Ordering::Release);
    }
}

struct WaitState {
    /// Bumped after every completed write ("data became available").
    data_seq: u64,
    /// Bumped after every completed read or consumer departure
    /// ("room became available").
    room_seq: u64,
    /// Number of poll waiters currently parked; room events cross-wake
    /// the data queue while this is non-zero.
    poll_waiters: u32,
}

/// The wait/notify hub for one channel: two notification channels
/// (data-ready and room-ready) as generation counters under a single lock.
///
/// The protocol is snapshot-then-wait: a caller snapshots the relevant
/// generation *while still holding the buffer lock that proved its
/// condition false*, releases that lock, and sleeps only while the
/// generation is unchanged. Any state change that could satisfy the
/// condition bumps the generation after the mutator releases its locks, so
/// a wakeup between snapshot and sleep is never lost. Wakeups are
/// broadcast, not selective; woken callers re-check their condition.
pub struct WaitHub {
    state: Mutex<WaitState>,
    data_ready: Condvar,
    room_ready: Condvar,
}

impl Default for WaitHub {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitHub {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(WaitState {
                data_seq: 0,
                room_seq: 0,
                poll_waiters: 0,
            }),
            data_ready: Condvar::new(),
            room_ready: Condvar::new(),
        }
    }

    pub fn data_generation(&self) -> u64 {
        self.state.lock().data_seq
    }

    pub fn room_generation(&self) -> u64 {
        self.state.lock().room_seq
    }

    /// Snapshot both generations at once, for poll registration.
    pub fn generations(&self) -> (u64, u64) {
        let s = self.state.lock();
        (s.data_seq, s.room_seq)
    }

    /// Signal "data became available": wake every reader and poll waiter.
    pub fn notify_data(&self) {
        let mut s = self.state.lock();
        s.data_seq += 1;
        self.data_ready.notify_all();
    }

    /// Signal "room became available": wake every writer and poll waiter.
    pub fn notify_room(&self) {
        let mut s = self.state.lock();
        s.room_seq += 1;
        self.room_ready.notify_all();
        if s.poll_waiters > 0 {
            // poll waiters park on the data queue; a room event must reach
            // them too
            self.data_ready.notify_all();
        }
    }

    /// Wake every waiter without signalling either condition, forcing a
    /// re-check. Used when an interrupt flag has been raised.
    pub fn wake_all(&self) {
        let _s = self.state.lock();
        self.data_ready.notify_all();
        self.room_ready.notify_all();
    }

    /// Sleep until the data generation moves past `seen` or `intr` is
    /// raised.
    pub fn wait_data(&self, seen: u64, intr: &InterruptFlag) -> io::Result<()> {
        let mut s = self.state.lock();
        while s.data_seq == seen {
            if intr.is_raised() {
                return Err(interrupted());
            }
            self.data_ready.wait(&mut s);
        }
        Ok(())
    }

    /// Sleep until the room generation moves past `seen` or `intr` is
    /// raised.
    pub fn wait_room(&self, seen: u64, intr: &InterruptFlag) -> io::Result<()> {
        let mut s = self.state.lock();
        while s.room_seq == seen {
            if intr.is_raised() {
                return Err(interrupted());
            }
            self.room_ready.wait(&mut s);
        }
        Ok(())
    }

    /// Sleep until *either* generation moves past its snapshot, or `intr`
    /// is raised. This is the wakeup half of poll registration.
    pub fn wait_either(&self, seen: (u64, u64), intr: &InterruptFlag) -> io::Result<()> {
        let mut s = self.state.lock();
        s.poll_waiters += 1;
        let outcome = loop {
            if s.data_seq != seen.0 || s.room_seq != seen.1 {
                break Ok(());
            }
            if intr.is_raised() {
                break Err(interrupted());
            }
            self.data_ready.wait(&mut s);
        };
        s.poll_waiters -= 1;
        outcome
    }
}

fn interrupted() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "blocked call interrupted")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn notify_data_bumps_generation_and_wakes() {
        let hub = Arc::new(WaitHub::new());
        let seen = hub.data_generation();

        let waiter = {
            let hub = hub.clone();
            thread::spawn(move || hub.wait_data(seen, &InterruptFlag::new()))
        };

        thread::sleep(Duration::from_millis(20));
        hub.notify_data();
        waiter.join().unwrap().unwrap();
        assert_ne!(hub.data_generation(), seen);
    }

    #[test]
    fn stale_snapshot_returns_without_sleeping() {
        let hub = WaitHub::new();
        let seen = hub.room_generation();
        hub.notify_room();
        // generation already moved on; must not block
        hub.wait_room(seen, &InterruptFlag::new()).unwrap();
    }

    #[test]
    fn interrupt_aborts_waiter() {
        let hub = Arc::new(WaitHub::new());
        let intr = InterruptFlag::new();
        let seen = hub.data_generation();

        let waiter = {
            let hub = hub.clone();
            let intr = intr.clone();
            thread::spawn(move || hub.wait_data(seen, &intr))
        };

        thread::sleep(Duration::from_millis(20));
        intr.raise();
        hub.wake_all();
        let err = waiter.join().unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
    }

    #[test]
    fn poll_waiter_woken_by_room_event() {
        let hub = Arc::new(WaitHub::new());
        let seen = hub.generations();

        let waiter = {
            let hub = hub.clone();
            thread::spawn(move || hub.wait_either(seen, &InterruptFlag::new()))
        };

        thread::sleep(Duration::from_millis(20));
        hub.notify_room();
        waiter.join().unwrap().unwrap();
    }
}
