pub mod client;
pub mod server;

use std::io;
use std::net::SocketAddr;

use resolver::ResolveError;
use tunnel::FlowSnapshot;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bind {addr} failed, {err}")]
    Bind {
        addr: String,
        #[source]
        err: io::Error,
    },

    #[error("connect {addr} failed, {err}")]
    Connect {
        addr: String,
        #[source]
        err: io::Error,
    },

    #[error("create udp socket failed, {0}")]
    UdpSocket(#[source] io::Error),

    #[error("resolve failed, {0}")]
    Resolve(#[from] ResolveError),

    #[error("session terminated, {0}")]
    Session(#[from] tunnel::Error),
}

fn log_flow(peer: SocketAddr, udp: SocketAddr, flow: &FlowSnapshot) {
    info!(
        message = "session closed",
        %peer,
        %udp,
        tcp_frames_sent = flow.tcp_frames_sent,
        tcp_bytes_sent = flow.tcp_bytes_sent,
        udp_datagrams_sent = flow.udp_datagrams_sent,
        udp_bytes_sent = flow.udp_bytes_sent,
        keepalives_sent = flow.keepalives_sent,
        keepalives_received = flow.keepalives_received,
        dropped = flow.datagrams_dropped,
        udp_errors = flow.udp_errors,
    );
}
