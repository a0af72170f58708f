use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tunnel::{
    create_udp_socket, set_tcp_opts, AddrFamily, EndpointBinding, Session, SessionOpts,
    TcpSocketOpts,
};

use super::{log_flow, Error};

/// Pause after a failed accept before trying again.
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Clone, Debug)]
pub struct Config {
    /// TCP address accepting tunnel connections
    pub listen: String,

    /// UDP target every tunnel connection is forwarded to, resolved once
    /// per connection
    pub udp: String,

    pub session: SessionOpts,

    pub tcp: TcpSocketOpts,
}

pub struct Server {
    listener: TcpListener,
    config: Arc<Config>,
}

impl Server {
    pub async fn bind(config: Config) -> Result<Self, Error> {
        let listen = resolver::resolve(&config.listen).await?;
        let listener = TcpListener::bind(listen).await.map_err(|err| Error::Bind {
            addr: config.listen.clone(),
            err,
        })?;

        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept tunnel connections until `shutdown` is cancelled. Failures of a
    /// single connection never stop the listener.
    pub async fn serve(self, shutdown: CancellationToken) -> Result<(), Error> {
        info!(
            message = "start udp tunnel server",
            listen = ?self.listener.local_addr().ok(),
            udp = %self.config.udp,
        );

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown.cancelled() => {
                    info!(message = "udp tunnel server stopped");
                    return Ok(());
                },
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(err) => {
                        warn!(message = "accept tcp connection failed", ?err);

                        // errors like EMFILE persist for a while
                        tokio::select! {
                            _ = shutdown.cancelled() => {},
                            _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {},
                        }
                        continue;
                    }
                },
            };

            if self.config.session.verbose {
                info!(message = "new tunnel connection", %peer);
            }

            let config = Arc::clone(&self.config);
            let shutdown = shutdown.clone();
            tokio::spawn(
                async move {
                    if let Err(err) = handle(stream, peer, &config, &shutdown).await {
                        warn!(message = "tunnel connection failed", %peer, %err);
                    }
                }
                .with_current_subscriber(),
            );
        }
    }
}

async fn handle(
    stream: TcpStream,
    peer: SocketAddr,
    config: &Config,
    shutdown: &CancellationToken,
) -> Result<(), Error> {
    if let Err(err) = set_tcp_opts(&stream, &config.tcp) {
        warn!(message = "set tcp socket options failed", %peer, ?err);
    }

    let target = resolver::resolve(&config.udp).await?;
    let socket = create_udp_socket(AddrFamily::from(target))
        .await
        .map_err(Error::UdpSocket)?;

    debug!(
        message = "forwarding tunnel connection",
        %peer,
        %target,
        local = ?socket.local_addr().ok(),
    );

    let session = Session::new(stream, socket, EndpointBinding::fixed(target))
        .with_opts(config.session.clone());
    let stat = session.flow_stat();

    let result = session.run(shutdown).await;
    log_flow(peer, target, &stat.load());

    match result {
        Err(err) if err.is_closed() => Ok(()),
        result => result.map_err(Error::Session),
    }
}

#[cfg(test)]
mod tests {
    use tunnel::{SessionOpts, TcpSocketOpts};

    use super::*;

    #[tokio::test]
    async fn serve_stops_on_shutdown() {
        let server = Server::bind(Config {
            listen: ":0".to_string(),
            udp: "127.0.0.1:20000".to_string(),
            session: SessionOpts::default(),
            tcp: TcpSocketOpts::default(),
        })
        .await
        .unwrap();
        assert!(server.local_addr().unwrap().ip().is_unspecified());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server.serve(shutdown.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}
