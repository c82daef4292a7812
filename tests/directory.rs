use std::io::ErrorKind;
use std::sync::Arc;

use serial_test::serial;

use ringcast::Broadcast::{ChannelDirectory, Session, SessionBuilder, MAX_CHANNELS, MAX_CONSUMERS};

fn open(dir: &Arc<ChannelDirectory>, identity: &str) -> Session {
    SessionBuilder::new(identity)
        .with_directory(dir.clone())
        .open()
        .unwrap()
}

#[test]
fn channel_is_destroyed_on_last_leave() {
    let dir = Arc::new(ChannelDirectory::new());
    let session = open(&dir, "room");
    assert!(dir.contains("room"));
    assert_eq!(dir.channel_count(), 1);

    drop(session);
    assert!(!dir.contains("room"));
    assert_eq!(dir.channel_count(), 0);
}

#[test]
fn duplicated_handles_defer_destruction() {
    let dir = Arc::new(ChannelDirectory::new());
    let session = open(&dir, "room");
    let alias = session.try_clone().unwrap();

    drop(session);
    assert!(dir.contains("room"), "a live duplicate must keep the channel");

    drop(alias);
    assert!(!dir.contains("room"));
}

#[test]
fn identities_are_independent_channels() {
    let dir = Arc::new(ChannelDirectory::new());
    let a_writer = open(&dir, "a");
    let b_consumer = SessionBuilder::new("b")
        .with_directory(dir.clone())
        .with_nonblocking(true)
        .open()
        .unwrap();

    a_writer.write_all(b"only for a").unwrap();
    assert_eq!(dir.channel_count(), 2);

    // nothing crosses between identities
    let err = b_consumer.read(&mut [0u8; 8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WouldBlock);
}

#[test]
fn reopened_identity_starts_from_scratch() {
    let dir = Arc::new(ChannelDirectory::with_ring_capacity(8));
    let first = open(&dir, "room");
    first.write_all(b"stale").unwrap();
    drop(first);
    assert!(!dir.contains("room"));

    let second = SessionBuilder::new("room")
        .with_directory(dir.clone())
        .with_nonblocking(true)
        .open()
        .unwrap();
    // no history survives the destroy/create cycle
    let err = second.read(&mut [0u8; 8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::WouldBlock);
    // and the fresh ring has its full usable capacity again
    assert_eq!(second.write(b"01234567").unwrap(), 7);
}

#[test]
fn channel_table_is_bounded() {
    let dir = Arc::new(ChannelDirectory::with_ring_capacity(8));
    let mut sessions = Vec::with_capacity(MAX_CHANNELS);
    for i in 0..MAX_CHANNELS {
        sessions.push(open(&dir, &format!("chan-{i}")));
    }
    let err = SessionBuilder::new("one-too-many")
        .with_directory(dir.clone())
        .open()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    assert!(!dir.contains("one-too-many"));
}

#[test]
fn consumer_set_is_bounded() {
    let dir = Arc::new(ChannelDirectory::with_ring_capacity(8));
    let mut sessions = Vec::with_capacity(MAX_CONSUMERS);
    for _ in 0..MAX_CONSUMERS {
        sessions.push(open(&dir, "crowded"));
    }
    let err = SessionBuilder::new("crowded")
        .with_directory(dir.clone())
        .open()
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::OutOfMemory);
    // the failed join must not tear down the populated channel
    assert!(dir.contains("crowded"));
}

#[test]
#[serial]
fn global_directory_backs_plain_open() {
    let writer = Session::open("global-room").unwrap();
    let reader = Session::open("global-room").unwrap();
    assert!(ChannelDirectory::global().contains("global-room"));

    writer.write_all(b"hi").unwrap();
    let mut buf = [0u8; 8];
    assert_eq!(reader.read(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"hi");

    drop(writer);
    drop(reader);
    assert!(!ChannelDirectory::global().contains("global-room"));
}
