// Module naming follows project convention (Broadcast = bounded-history broadcast channel)
#[allow(non_snake_case)]
pub mod Broadcast {
    pub mod Buffer {
        pub mod Buffer;
        pub mod Buffer_impl;
        pub use Buffer::{ring_dist, RingBuffer, RING_CAPACITY}; // re-export for stable path
    }
    pub mod builder;
    pub mod channel;
    pub mod directory;
    pub mod registry;
    pub mod session;
    pub use builder::SessionBuilder;
    pub use Buffer::{RingBuffer, RING_CAPACITY};
    pub use channel::{Channel, PollTicket, Readiness};
    pub use directory::{ChannelDirectory, MAX_CHANNELS};
    pub use registry::MAX_CONSUMERS;
    pub use session::{Interrupter, Session};
}
#[allow(non_snake_case)]
pub mod Core {
    pub mod waitqueue;
    pub use waitqueue::{InterruptFlag, WaitHub};
}
