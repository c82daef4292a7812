use std::io;
use std::sync::Arc;

use super::directory::ChannelDirectory;
use super::session::Session;

pub struct SessionBuilder {
    identity: String,
    nonblocking: bool,
    directory: Option<Arc<ChannelDirectory>>,
}

impl SessionBuilder {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            nonblocking: false,
            directory: None,
        }
    }

    /// Fail with `WouldBlock` instead of suspending when a read or write
    /// cannot make progress. Fixed for the lifetime of the session.
    pub fn with_nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Use `directory` instead of the process-global one.
    pub fn with_directory(mut self, directory: Arc<ChannelDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    pub fn open(self) -> io::Result<Session> {
        let directory = self.directory.unwrap_or_else(ChannelDirectory::global);
        Session::open_with(directory, &self.identity, self.nonblocking)
    }
}
