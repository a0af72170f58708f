use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;
use tunnel::{connect_tcp, EndpointBinding, FlowStat, Session, SessionOpts, TcpSocketOpts};

use super::{log_flow, Error};

#[derive(Clone, Debug)]
pub struct Config {
    /// TCP address of the tunnel server
    pub connect: String,

    /// Local UDP address applications send their datagrams to
    pub udp: String,

    pub session: SessionOpts,

    pub tcp: TcpSocketOpts,
}

/// A connected tunnel client, owning exactly one session.
pub struct Client {
    session: Session<TcpStream>,
    server: SocketAddr,
    local: SocketAddr,
}

impl Client {
    /// Connect to the server, then bind the local UDP address.
    pub async fn connect(config: Config) -> Result<Self, Error> {
        let server = resolver::resolve(&config.connect).await?;
        let stream = connect_tcp(server, &config.tcp)
            .await
            .map_err(|err| Error::Connect {
                addr: config.connect.clone(),
                err,
            })?;

        let udp = resolver::resolve(&config.udp).await?;
        let socket = UdpSocket::bind(udp).await.map_err(|err| Error::Bind {
            addr: config.udp.clone(),
            err,
        })?;
        let local = socket.local_addr().map_err(Error::UdpSocket)?;

        info!(message = "connected to udp tunnel server", %server, udp = %local);

        let session =
            Session::new(stream, socket, EndpointBinding::unbound()).with_opts(config.session);

        Ok(Self {
            session,
            server,
            local,
        })
    }

    /// The UDP address local applications should send to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        Ok(self.local)
    }

    pub fn flow_stat(&self) -> Arc<FlowStat> {
        self.session.flow_stat()
    }

    /// Relay until the session ends. Any termination other than `shutdown`
    /// is reported as an error.
    pub async fn run(self, shutdown: &CancellationToken) -> Result<(), Error> {
        let stat = self.session.flow_stat();

        let result = self.session.run(shutdown).await;
        log_flow(self.server, self.local, &stat.load());

        result.map_err(Error::Session)
    }
}
