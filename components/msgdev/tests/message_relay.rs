//! Integration tests for the message relay as seen by client programs
//!
//! Each test loads the device into the mock host and talks to it only
//! through `/dev/hubert_dev` handles, the way a user-space program would.

use std::sync::Arc;
use std::thread;

use host_platform::mock::{MockHost, UserBuffer};
use host_platform::Errno;
use msgdev::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn loaded(host: &MockHost) -> MessageDevice<&MockHost> {
    init_logging();
    MessageDevice::load(host, DeviceConfig::default()).expect("load failed")
}

/// Test the hello scenario end to end
#[test]
fn test_hello_scenario() {
    let host = MockHost::new();
    let device = loaded(&host);
    let mut file = host.open("/dev/hubert_dev").unwrap();

    assert_eq!(file.write(b"hello").unwrap(), 5);
    assert_eq!(file.read(256).unwrap(), b"hello");
    assert!(file.read(256).unwrap().is_empty());

    // Existing content survives a rejected oversized write
    file.write(b"hello").unwrap();
    let oversized = b"toolong".repeat(40);
    assert_eq!(file.write(&oversized), Err(Errno::EINVAL));
    assert_eq!(device.sessions().buffer().contents(), b"hello");
    assert_eq!(file.read(256).unwrap(), b"hello");

    file.close().unwrap();
}

/// Test every write of n bytes is followed by a read of n bytes, then 0
#[test]
fn test_read_drains_for_all_lengths() {
    let host = MockHost::new();
    let _device = loaded(&host);
    let mut file = host.open("/dev/hubert_dev").unwrap();

    for len in [0, 1, 7, 128, 255, MESSAGE_CAPACITY] {
        let message: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
        assert_eq!(file.write(&message).unwrap(), len);

        let first = file.read(MESSAGE_CAPACITY).unwrap();
        assert_eq!(first, message, "round trip of {len} bytes");
        assert!(file.read(MESSAGE_CAPACITY).unwrap().is_empty());
    }
}

/// Test writes above capacity are rejected and leave the buffer alone
#[test]
fn test_capacity_bound() {
    let host = MockHost::new();
    let device = loaded(&host);
    let mut file = host.open("/dev/hubert_dev").unwrap();
    file.write(b"resident").unwrap();

    for len in [MESSAGE_CAPACITY + 1, 300, 4096] {
        let bytes = vec![0xEE; len];
        assert_eq!(file.write(&bytes), Err(Errno::EINVAL));
        assert_eq!(device.sessions().buffer().contents(), b"resident");
    }

    // A client claiming a huge length with a tiny buffer is also rejected
    assert_eq!(file.write_claiming(b"x", 1 << 20), Err(Errno::EINVAL));
    assert_eq!(device.stats().message_len, 8);
}

/// Test the open counter over interleaved sessions
#[test]
fn test_open_counter_monotonic() {
    let host = MockHost::new();
    let device = loaded(&host);
    let before = device.stats().opens;

    let mut writer = host.open("/dev/hubert_dev").unwrap();
    writer.write(b"one").unwrap();
    let mut reader = host.open("/dev/hubert_dev").unwrap();
    reader.read(256).unwrap();
    writer.close().unwrap();
    let third = host.open("/dev/hubert_dev").unwrap();
    drop(third);
    reader.close().unwrap();

    assert_eq!(device.stats().opens, before + 3);
}

/// Test sessions share one buffer: one handle writes, another reads
#[test]
fn test_sessions_share_buffer() {
    let host = MockHost::new();
    let _device = loaded(&host);

    let mut writer = host.open("/dev/hubert_dev").unwrap();
    let mut reader = host.open("/dev/hubert_dev").unwrap();

    writer.write(b"first").unwrap();
    writer.write(b"second").unwrap();

    // The later write replaced the earlier one
    assert_eq!(reader.read(256).unwrap(), b"second");
    assert!(writer.read(256).unwrap().is_empty());
}

/// Test a failed read keeps the message and a later cycle behaves normally
#[test]
fn test_failed_read_then_round_trip() {
    let host = MockHost::new();
    let device = loaded(&host);
    let mut file = host.open("/dev/hubert_dev").unwrap();
    file.write(b"survivor").unwrap();

    let mut unmapped = UserBuffer::with_capacity(256).faulting();
    assert_eq!(
        file.read_into(&mut unmapped, 256).map_err(Errno::as_negative),
        Err(-14)
    );
    assert_eq!(device.stats().message_len, 8);

    // Client buffer too small for the message is a bad address as well
    assert_eq!(file.read(2), Err(Errno::EFAULT));
    assert_eq!(device.stats().message_len, 8);

    assert_eq!(file.read(256).unwrap(), b"survivor");
    file.write(b"next").unwrap();
    assert_eq!(file.read(256).unwrap(), b"next");
}

/// Test a faulting write source never reaches the buffer
#[test]
fn test_faulting_write_source() {
    let host = MockHost::new();
    let device = loaded(&host);
    let mut file = host.open("/dev/hubert_dev").unwrap();
    file.write(b"kept").unwrap();

    let src = UserBuffer::from_bytes(b"lost").faulting();
    assert_eq!(file.write_from(&src, 4), Err(Errno::EFAULT));
    assert_eq!(device.sessions().buffer().contents(), b"kept");
}

/// Test concurrent writers and readers never observe a torn message
#[test]
fn test_concurrent_clients_see_whole_messages() {
    init_logging();
    let host = Arc::new(MockHost::new());
    let device = MessageDevice::load(host.clone(), DeviceConfig::default()).unwrap();
    let path = device.node_path();

    const CLIENTS: usize = 8;
    const ROUNDS: usize = 200;

    let handles: Vec<_> = (0..CLIENTS)
        .map(|id| {
            let host = host.clone();
            let path = path.clone();
            thread::spawn(move || {
                // Client `id` writes messages of `id + 1` copies of byte `id`
                let message = vec![id as u8; id + 1];
                let mut file = host.open(&path).unwrap();
                for _ in 0..ROUNDS {
                    file.write(&message).unwrap();
                    let got = file.read(MESSAGE_CAPACITY).unwrap();
                    if let Some(&first) = got.first() {
                        assert_eq!(got.len(), first as usize + 1);
                        assert!(got.iter().all(|&b| b == first));
                    }
                }
                file.close().unwrap();
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(device.stats().opens, CLIENTS);
}
