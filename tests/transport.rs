use std::{sync::Arc, thread, time::Duration};

use bytes::BufMut;
use polytune_primitives::transport::{
    ChannelId, HANDSHAKE_SIZE, Link, Socket, SocketListener, TransportConfig, TransportError,
    connect, encode_frame, listen,
};

const PARTY: u32 = 1;

fn config() -> TransportConfig {
    TransportConfig {
        receive_timeout: Some(Duration::from_secs(10)),
        poll_interval: Duration::from_millis(10),
        ..Default::default()
    }
}

fn link_pair(num_channels: usize) -> Result<(Link, Link), TransportError> {
    let config = config();
    let listener = SocketListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let listen_config = config.clone();
    let server = thread::spawn(move || listen(&listener, &[PARTY], num_channels, &listen_config));
    let client = Link::new(connect(addr, PARTY, num_channels, &config)?, &config)?;
    let mut sockets = server.join().unwrap()?;
    let server = Link::new(sockets.remove(&PARTY).unwrap(), &config)?;
    Ok((client, server))
}

fn handshake(party_id: u32, index: u32) -> Vec<u8> {
    let mut hello = Vec::with_capacity(HANDSHAKE_SIZE);
    hello.put_u32_le(party_id);
    hello.put_u32_le(index);
    hello
}

fn ch(id: u8) -> ChannelId {
    ChannelId::new(id).unwrap()
}

#[test]
fn frames_arrive_in_order() -> Result<(), TransportError> {
    let (client, server) = link_pair(1)?;
    client.send(ch(0), b"hello")?;
    client.send_framed(ch(0), 42, b"world")?;
    let hello = server.receive(ch(0))?;
    assert_eq!(0, hello.start_id);
    assert_eq!(&b"hello"[..], hello.payload);
    let world = server.receive(ch(0))?;
    assert_eq!(42, world.start_id);
    assert_eq!(&b"world"[..], world.payload);

    server.send(ch(0), b"")?;
    assert!(client.receive(ch(0))?.is_empty());
    Ok(())
}

#[test]
fn channels_are_independent() -> Result<(), TransportError> {
    let (client, server) = link_pair(4)?;
    assert_eq!(4, client.num_channels());
    for round in 0..50_u32 {
        for id in 0..4 {
            let mut payload = vec![id; 100];
            payload.extend_from_slice(&round.to_le_bytes());
            client.send(ch(id), &payload)?;
        }
    }
    for id in (0..4).rev() {
        for round in 0..50_u32 {
            let payload = server.receive_exact(ch(id), 104)?;
            assert!(payload[..100].iter().all(|b| *b == id));
            assert_eq!(round.to_le_bytes(), payload[100..]);
        }
    }
    assert!(matches!(
        client.send(ch(4), b"nope"),
        Err(TransportError::UnknownChannel(_))
    ));
    Ok(())
}

#[test]
fn shutdown_drains_queued_frames() -> Result<(), TransportError> {
    let (mut client, server) = link_pair(2)?;
    let frames = 1000_u64;
    for i in 0..frames {
        client.send_framed(ch(1), i, &i.to_le_bytes().repeat(32))?;
    }
    client.shutdown()?;
    for i in 0..frames {
        let frame = server.receive(ch(1))?;
        assert_eq!(i, frame.start_id);
        assert_eq!(256, frame.len());
    }
    assert!(matches!(
        server.receive(ch(1)),
        Err(TransportError::ChannelClosed(_))
    ));
    assert!(matches!(
        server.receive(ch(0)),
        Err(TransportError::ChannelClosed(_))
    ));
    assert!(matches!(
        client.send(ch(0), b"late"),
        Err(TransportError::Stopped)
    ));
    Ok(())
}

#[test]
fn link_is_shared_between_threads() -> Result<(), TransportError> {
    let (client, server) = link_pair(2)?;
    let client = Arc::new(client);
    let senders: Vec<_> = (0..2)
        .map(|id| {
            let client = Arc::clone(&client);
            thread::spawn(move || client.send(ch(id), &[id; 8]))
        })
        .collect();
    for sender in senders {
        sender.join().unwrap()?;
    }
    assert_eq!(&[0; 8][..], server.receive_exact(ch(0), 8)?);
    assert_eq!(&[1; 8][..], server.receive_exact(ch(1), 8)?);
    Ok(())
}

#[test]
fn send_notification_resolves_after_write() -> Result<(), TransportError> {
    let (client, server) = link_pair(1)?;
    let notification = client.send_notify(ch(0), 7, &[1; 4096])?;
    notification.wait_timeout(Duration::from_secs(10))?;
    assert_eq!(4096, server.receive_exact(ch(0), 4096)?.len());
    Ok(())
}

#[test]
fn receive_exact_keeps_short_frames() -> Result<(), TransportError> {
    let (client, server) = link_pair(1)?;
    client.send(ch(0), b"abc")?;
    client.send(ch(0), &[4, 5, 6])?;
    assert!(matches!(
        server.receive_exact(ch(0), 4),
        Err(TransportError::ShortFrame {
            expected: 4,
            actual: 3
        })
    ));
    assert_eq!(&b"abc"[..], server.receive(ch(0))?.payload);
    assert_eq!(&[4, 5][..], server.receive_exact(ch(0), 2)?);
    Ok(())
}

#[test]
fn removed_listener_drops_frames() -> Result<(), TransportError> {
    let (client, server) = link_pair(1)?;
    server.remove_listener(ch(0))?;
    client.send(ch(0), b"dropped")?;
    client.send_notify(ch(0), 0, b"dropped too")?.wait()?;
    // the receive worker may still be decoding
    thread::sleep(Duration::from_millis(200));
    server.add_listener(ch(0))?;
    client.send(ch(0), b"kept")?;
    assert_eq!(&b"kept"[..], server.receive(ch(0))?.payload);
    assert_eq!(0, server.flush_queue(ch(0))?);
    Ok(())
}

#[test]
fn receive_times_out() -> Result<(), TransportError> {
    let (_client, server) = link_pair(1)?;
    let timeout = Duration::from_millis(50);
    assert!(matches!(
        server.queue(ch(0))?.receive(Some(timeout)),
        Err(TransportError::Timeout(t)) if t == timeout
    ));
    Ok(())
}

#[test]
fn listen_places_sockets_by_handshake() -> Result<(), TransportError> {
    let listener = SocketListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = thread::spawn(move || listen(&listener, &[PARTY], 2, &config()));

    let mut second = Socket::connect(addr, Duration::from_secs(5))?;
    second.send(&handshake(PARTY, 1))?;
    let mut first = Socket::connect(addr, Duration::from_secs(5))?;
    first.send(&handshake(PARTY, 0))?;

    let mut sockets = server.join().unwrap()?;
    let server = Link::new(sockets.remove(&PARTY).unwrap(), &config())?;
    second.send(&encode_frame(1, b"on channel one"))?;
    first.send(&encode_frame(0, b"on channel zero"))?;
    assert_eq!(&b"on channel one"[..], server.receive(ch(1))?.payload);
    assert_eq!(&b"on channel zero"[..], server.receive(ch(0))?.payload);
    Ok(())
}

#[test]
fn listen_rejects_unknown_party() -> Result<(), TransportError> {
    let listener = SocketListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = thread::spawn(move || listen(&listener, &[PARTY], 1, &config()));
    let mut socket = Socket::connect(addr, Duration::from_secs(5))?;
    socket.send(&handshake(9, 0))?;
    assert!(matches!(
        server.join().unwrap(),
        Err(TransportError::Handshake(_))
    ));
    Ok(())
}

#[test]
fn listen_rejects_duplicate_channel() -> Result<(), TransportError> {
    let listener = SocketListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let server = thread::spawn(move || listen(&listener, &[PARTY], 2, &config()));
    let mut a = Socket::connect(addr, Duration::from_secs(5))?;
    a.send(&handshake(PARTY, 0))?;
    let mut b = Socket::connect(addr, Duration::from_secs(5))?;
    b.send(&handshake(PARTY, 0))?;
    assert!(matches!(
        server.join().unwrap(),
        Err(TransportError::Handshake(_))
    ));
    Ok(())
}

#[test]
fn oversized_frame_closes_channel() -> Result<(), TransportError> {
    let config = TransportConfig {
        max_frame_len: 1024,
        ..config()
    };
    let listener = SocketListener::bind("127.0.0.1:0")?;
    let addr = listener.local_addr()?;
    let listen_config = config.clone();
    let server = thread::spawn(move || listen(&listener, &[PARTY], 1, &listen_config));
    let mut socket = Socket::connect(addr, Duration::from_secs(5))?;
    socket.send(&handshake(PARTY, 0))?;
    let mut sockets = server.join().unwrap()?;
    let server = Link::new(sockets.remove(&PARTY).unwrap(), &config)?;

    socket.send(&encode_frame(0, &[0; 2048]))?;
    assert!(matches!(
        server.receive(ch(0)),
        Err(TransportError::FrameTooLarge { len: 2048, max: 1024 })
    ));
    Ok(())
}

#[test]
fn connect_to_closed_port_fails() -> Result<(), TransportError> {
    let addr = SocketListener::bind("127.0.0.1:0")?.local_addr()?;
    assert!(matches!(
        connect(addr, PARTY, 1, &config()),
        Err(TransportError::Connect { .. })
    ));
    Ok(())
}

#[test]
fn channel_counts_are_checked() -> Result<(), TransportError> {
    assert!(matches!(
        connect("127.0.0.1:1", PARTY, 0, &config()),
        Err(TransportError::NoChannels)
    ));
    assert!(matches!(
        connect("127.0.0.1:1", PARTY, 256, &config()),
        Err(TransportError::TooManyChannels { requested: 256, .. })
    ));
    assert!(matches!(
        ChannelId::new(255),
        Err(TransportError::ReservedChannel(255))
    ));
    Ok(())
}
