use std::net::SocketAddr;
use std::time::Duration;

use rand::Rng;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tunnel::{SessionOpts, TcpSocketOpts};
use udptunnel::relay::client::{self, Client};
use udptunnel::relay::server::{self, Server};
use udptunnel::relay::Error;

const WAIT: Duration = Duration::from_secs(2);

fn session_opts(keepalive: Duration) -> SessionOpts {
    SessionOpts {
        verbose: true,
        keepalive,
    }
}

fn tcp_opts() -> TcpSocketOpts {
    TcpSocketOpts {
        nodelay: true,
        keepalive: None,
    }
}

async fn echo_server() -> SocketAddr {
    let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();

    tokio::spawn(async move {
        let mut buf = vec![0u8; 65536];
        loop {
            let (n, from) = socket.recv_from(&mut buf).await.unwrap();
            socket.send_to(&buf[..n], from).await.unwrap();
        }
    });

    addr
}

async fn start_server(target: SocketAddr, keepalive: Duration) -> (SocketAddr, CancellationToken) {
    let server = Server::bind(server::Config {
        listen: "127.0.0.1:0".to_string(),
        udp: target.to_string(),
        session: session_opts(keepalive),
        tcp: tcp_opts(),
    })
    .await
    .unwrap();
    let addr = server.local_addr().unwrap();

    let shutdown = CancellationToken::new();
    tokio::spawn(server.serve(shutdown.clone()));

    (addr, shutdown)
}

async fn connect_client(server: SocketAddr, keepalive: Duration) -> Client {
    Client::connect(client::Config {
        connect: server.to_string(),
        udp: "127.0.0.1:0".to_string(),
        session: session_opts(keepalive),
        tcp: tcp_opts(),
    })
    .await
    .unwrap()
}

fn spawn_client(
    client: Client,
    shutdown: &CancellationToken,
) -> JoinHandle<Result<(), Error>> {
    let shutdown = shutdown.clone();
    tokio::spawn(async move { client.run(&shutdown).await })
}

async fn round_trip(app: &UdpSocket, local: SocketAddr, payload: &[u8]) {
    app.send_to(payload, local).await.unwrap();

    let mut buf = vec![0u8; 4096];
    let (n, from) = timeout(WAIT, app.recv_from(&mut buf))
        .await
        .expect("echo timeout")
        .unwrap();

    assert_eq!(&buf[..n], payload);
    assert_eq!(from, local);
}

#[tokio::test]
async fn echo_random_payloads() {
    let target = echo_server().await;
    let (server, _server_shutdown) = start_server(target, Duration::from_secs(30)).await;

    let client = connect_client(server, Duration::from_secs(30)).await;
    let local = client.local_addr().unwrap();
    let stat = client.flow_stat();
    let shutdown = CancellationToken::new();
    let handle = spawn_client(client, &shutdown);

    let payloads = {
        let mut rng = rand::thread_rng();
        (0..100)
            .map(|_| {
                let mut payload = vec![0u8; rng.gen_range(0..=2000)];
                rng.fill(&mut payload[..]);
                payload
            })
            .collect::<Vec<_>>()
    };

    let app = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    for payload in &payloads {
        round_trip(&app, local, payload).await;
    }

    shutdown.cancel();
    timeout(WAIT, handle).await.unwrap().unwrap().unwrap();

    let flow = stat.load();
    assert_eq!(flow.tcp_frames_sent, 100);
    assert_eq!(flow.udp_datagrams_sent, 100);
    assert_eq!(
        flow.tcp_bytes_sent,
        payloads.iter().map(|p| p.len() as u64).sum::<u64>()
    );
}

#[tokio::test]
async fn first_sender_is_pinned() {
    let target = echo_server().await;
    let (server, _server_shutdown) = start_server(target, Duration::from_secs(30)).await;

    let client = connect_client(server, Duration::from_secs(30)).await;
    let local = client.local_addr().unwrap();
    let stat = client.flow_stat();
    let shutdown = CancellationToken::new();
    let _handle = spawn_client(client, &shutdown);

    let first = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    round_trip(&first, local, b"first").await;

    let second = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    second.send_to(b"second", local).await.unwrap();

    let mut buf = [0u8; 64];
    let result = timeout(Duration::from_millis(300), second.recv_from(&mut buf)).await;
    assert!(result.is_err(), "datagram from another port must be dropped");

    round_trip(&first, local, b"again").await;

    let flow = stat.load();
    assert_eq!(flow.datagrams_dropped, 1);
    assert_eq!(flow.tcp_frames_sent, 2);

    shutdown.cancel();
}

#[tokio::test]
async fn idle_tunnel_keeps_working() {
    let keepalive = Duration::from_millis(100);
    let target = echo_server().await;
    let (server, _server_shutdown) = start_server(target, keepalive).await;

    let client = connect_client(server, keepalive).await;
    let local = client.local_addr().unwrap();
    let stat = client.flow_stat();
    let shutdown = CancellationToken::new();
    let _handle = spawn_client(client, &shutdown);

    let app = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    round_trip(&app, local, b"before").await;

    tokio::time::sleep(Duration::from_millis(350)).await;

    round_trip(&app, local, b"after").await;

    let flow = stat.load();
    assert!(flow.keepalives_sent >= 1);
    // the server idles as well, and its keepalives are skipped by the client
    assert!(flow.keepalives_received >= 1);
    assert_eq!(flow.udp_datagrams_sent, 2);

    shutdown.cancel();
}

#[tokio::test]
async fn server_survives_bad_connection() {
    let target = echo_server().await;
    let (server, _server_shutdown) = start_server(target, Duration::from_secs(30)).await;

    // a length above the payload limit kills this connection only
    let mut raw = TcpStream::connect(server).await.unwrap();
    raw.write_all(&[0x30, 0x00]).await.unwrap();

    let mut rest = Vec::new();
    let n = timeout(WAIT, raw.read_to_end(&mut rest))
        .await
        .expect("server should close the connection")
        .unwrap_or(0);
    assert_eq!(n, 0);

    let client = connect_client(server, Duration::from_secs(30)).await;
    let local = client.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let _handle = spawn_client(client, &shutdown);

    let app = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    round_trip(&app, local, b"still serving").await;

    shutdown.cancel();
}

#[tokio::test]
async fn client_fails_when_server_goes_away() {
    let target = echo_server().await;
    let (server, server_shutdown) = start_server(target, Duration::from_secs(30)).await;

    let client = connect_client(server, Duration::from_secs(30)).await;
    let local = client.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let handle = spawn_client(client, &shutdown);

    let app = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    round_trip(&app, local, b"hello").await;

    server_shutdown.cancel();

    let result = timeout(WAIT, handle).await.unwrap().unwrap();
    assert!(matches!(result, Err(Error::Session(err)) if err.is_closed()));
}

#[tokio::test]
async fn client_connect_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let result = Client::connect(client::Config {
        connect: addr.to_string(),
        udp: "127.0.0.1:0".to_string(),
        session: SessionOpts::default(),
        tcp: tcp_opts(),
    })
    .await;

    assert!(matches!(result, Err(Error::Connect { .. })));
}
