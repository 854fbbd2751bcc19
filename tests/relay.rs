//! End-to-end tests driving the relay over real localhost sockets.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use tracker_relay::config::{EndpointConfig, RelayConfig};
use tracker_relay::listener;

const COMMAND: [u8; 8] = [0xAA, 0xBB, 0x05, 0x00, 0x03, 0x11, 0x22, 0x33];
const REPLY: [u8; 7] = [0xAA, 0xBB, 0x05, 0x00, 0x02, 0x55, 0x66];
const GPS: [u8; 7] = [0xAA, 0xBB, 0x02, 0x00, 0x02, 0x01, 0x02];

fn config_for(sinks: &[SocketAddr]) -> RelayConfig {
    RelayConfig {
        accept_timeout_ms: 1_000,
        read_timeout_ms: 2_000,
        endpoints: sinks
            .iter()
            .map(|addr| EndpointConfig {
                host: addr.ip().to_string(),
                port: addr.port(),
            })
            .collect(),
        debug: false,
    }
}

/// Bind the relay on an ephemeral port and serve in the background.
async fn start_relay(config: RelayConfig) -> (SocketAddr, tokio::task::JoinHandle<()>) {
    let socket = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    let server = tokio::spawn(listener::serve(socket, config));
    (addr, server)
}

#[tokio::test]
async fn command_reply_is_relayed_from_the_first_endpoint() {
    let sink0 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sink1 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addrs = [sink0.local_addr().unwrap(), sink1.local_addr().unwrap()];
    let (relay_addr, server) = start_relay(config_for(&addrs)).await;

    // The privileged endpoint receives the command and answers it.
    let responder = tokio::spawn(async move {
        let (mut conn, _) = sink0.accept().await.unwrap();
        let mut buf = [0u8; 8];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, COMMAND);
        conn.write_all(&REPLY).await.unwrap();
        conn
    });
    // The second endpoint is a pure sink.
    let archiver = tokio::spawn(async move {
        let (mut conn, _) = sink1.accept().await.unwrap();
        let mut buf = [0u8; 8];
        conn.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, COMMAND);
        conn
    });

    let mut device = TcpStream::connect(relay_addr).await.unwrap();
    device.write_all(&COMMAND).await.unwrap();

    let mut reply = [0u8; 7];
    timeout(Duration::from_secs(2), device.read_exact(&mut reply))
        .await
        .expect("reply within the read timeout")
        .unwrap();
    assert_eq!(reply, REPLY);

    responder.await.unwrap();
    archiver.await.unwrap();
    server.abort();
}

#[tokio::test]
async fn gps_packet_fans_out_without_a_reply() {
    let sink0 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let sink1 = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addrs = [sink0.local_addr().unwrap(), sink1.local_addr().unwrap()];
    let (relay_addr, server) = start_relay(config_for(&addrs)).await;

    let sinks = [sink0, sink1].map(|listener| {
        tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 7];
            conn.read_exact(&mut buf).await.unwrap();
            assert_eq!(buf, GPS);
            conn
        })
    });

    let mut device = TcpStream::connect(relay_addr).await.unwrap();
    device.write_all(&GPS).await.unwrap();

    for sink in sinks {
        sink.await.unwrap();
    }

    // Telemetry never produces a response.
    let mut one = [0u8; 1];
    let silent = timeout(Duration::from_millis(300), device.read_exact(&mut one)).await;
    assert!(silent.is_err());

    server.abort();
}

#[tokio::test]
async fn relay_accepts_the_next_client_after_a_session_ends() {
    let sink = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addrs = [sink.local_addr().unwrap()];
    let (relay_addr, server) = start_relay(config_for(&addrs)).await;

    // Each session opens its own downstream connection.
    let consumer = tokio::spawn(async move {
        let (mut first, _) = sink.accept().await.unwrap();
        let mut rest = Vec::new();
        first.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());

        let (mut second, _) = sink.accept().await.unwrap();
        let mut buf = [0u8; 7];
        second.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, GPS);
        second
    });

    // First device connects and hangs up without sending anything.
    let first = TcpStream::connect(relay_addr).await.unwrap();
    drop(first);

    // The loop re-accepts; the second device is served normally.
    let mut second = TcpStream::connect(relay_addr).await.unwrap();
    second.write_all(&GPS).await.unwrap();

    timeout(Duration::from_secs(5), consumer)
        .await
        .expect("both sessions reach the downstream")
        .unwrap();
    server.abort();
}

#[tokio::test]
async fn unreachable_downstream_closes_the_client() {
    // Grab an ephemeral port, then free it so connecting is refused.
    let parked = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = parked.local_addr().unwrap();
    drop(parked);

    let (relay_addr, server) = start_relay(config_for(&[dead])).await;

    let mut device = TcpStream::connect(relay_addr).await.unwrap();
    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(2), device.read(&mut buf))
        .await
        .expect("relay hangs up promptly");
    assert_eq!(read.unwrap(), 0);

    server.abort();
}
