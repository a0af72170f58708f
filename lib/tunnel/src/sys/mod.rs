use std::io::{self, ErrorKind};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, TcpKeepalive, Type};
use tokio::net::{TcpSocket, TcpStream, UdpSocket};
use tracing::{debug, warn};

use crate::option::TcpSocketOpts;

/// Address family `AF_INET`, `AF_INET6`
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AddrFamily {
    /// `AF_INET`
    Ipv4,
    /// `AF_INET6`
    Ipv6,
}

impl From<&SocketAddr> for AddrFamily {
    fn from(addr: &SocketAddr) -> AddrFamily {
        match *addr {
            SocketAddr::V4(..) => AddrFamily::Ipv4,
            SocketAddr::V6(..) => AddrFamily::Ipv6,
        }
    }
}

impl From<SocketAddr> for AddrFamily {
    fn from(addr: SocketAddr) -> AddrFamily {
        AddrFamily::from(&addr)
    }
}

/// Try to call `bind()` with dual-stack enabled, falls back to
/// `IPV6_V6ONLY` when the port is already taken by an IPv4 socket.
fn socket_bind_dual_stack(socket: &Socket, addr: &SocketAddr) -> io::Result<()> {
    let saddr = SockAddr::from(*addr);

    if let Err(err) = socket.set_only_v6(false) {
        warn!(message = "failed to set IPV6_V6ONLY: false for socket", ?err);
    }

    match socket.bind(&saddr) {
        Ok(..) => Ok(()),
        Err(ref err) if err.kind() == ErrorKind::AddrInUse => {
            debug!(
                message = "port may have already been occupied, retry with IPV6_V6ONLY",
                port = addr.port()
            );

            if let Err(err) = socket.set_only_v6(true) {
                warn!(message = "failed to set IPV6_V6ONLY: true for socket", ?err);
            }

            socket.bind(&saddr)
        }
        Err(err) => Err(err),
    }
}

/// Create an ephemeral `UdpSocket` for talking to peers of the given family,
/// bound to the unspecified address and an OS chosen port.
pub async fn create_udp_socket(af: AddrFamily) -> io::Result<UdpSocket> {
    match af {
        AddrFamily::Ipv4 => UdpSocket::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), 0)).await,
        AddrFamily::Ipv6 => {
            let bind_addr = SocketAddr::new(Ipv6Addr::UNSPECIFIED.into(), 0);
            let socket = Socket::new(
                Domain::for_address(bind_addr),
                Type::DGRAM,
                Some(Protocol::UDP),
            )?;
            socket_bind_dual_stack(&socket, &bind_addr)?;

            // UdpSocket::from_std requires socket to be non-blocked
            socket.set_nonblocking(true)?;
            UdpSocket::from_std(socket.into())
        }
    }
}

/// Connect to `addr` and apply `opts` to the established stream.
pub async fn connect_tcp(addr: SocketAddr, opts: &TcpSocketOpts) -> io::Result<TcpStream> {
    let socket = match addr {
        SocketAddr::V4(..) => TcpSocket::new_v4()?,
        SocketAddr::V6(..) => TcpSocket::new_v6()?,
    };

    let stream = socket.connect(addr).await?;
    set_tcp_opts(&stream, opts)?;

    Ok(stream)
}

pub fn set_tcp_opts(stream: &TcpStream, opts: &TcpSocketOpts) -> io::Result<()> {
    if opts.nodelay {
        stream.set_nodelay(true)?;
    }

    if let Some(duration) = opts.keepalive {
        let keepalive = TcpKeepalive::new()
            .with_time(duration)
            .with_interval(duration);

        SockRef::from(stream).set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn ephemeral_udp() {
        let socket = create_udp_socket(AddrFamily::Ipv4).await.unwrap();
        let local = socket.local_addr().unwrap();
        assert!(local.is_ipv4());
        assert_ne!(local.port(), 0);
    }

    #[tokio::test]
    async fn connect_with_opts() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let opts = TcpSocketOpts {
            nodelay: true,
            keepalive: Some(Duration::from_secs(60)),
        };
        let (stream, accepted) = tokio::join!(connect_tcp(addr, &opts), listener.accept());
        let stream = stream.unwrap();
        accepted.unwrap();

        assert!(stream.nodelay().unwrap());
        assert!(SockRef::from(&stream).keepalive().unwrap());
    }
}
