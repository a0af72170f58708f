use std::io;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error};

use crate::binding::EndpointBinding;
use crate::error::Error;
use crate::flow::FlowStat;
use crate::option::SessionOpts;
use crate::pump::{egress, ingress};

/// One stream paired with one UDP socket.
pub struct Session<S> {
    stream: S,
    socket: UdpSocket,
    binding: EndpointBinding,
    opts: SessionOpts,
    stat: Arc<FlowStat>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new(stream: S, socket: UdpSocket, binding: EndpointBinding) -> Self {
        Self {
            stream,
            socket,
            binding,
            opts: SessionOpts::default(),
            stat: Arc::new(FlowStat::default()),
        }
    }

    pub fn with_opts(mut self, opts: SessionOpts) -> Self {
        self.opts = opts;
        self
    }

    /// Counters of this session, readable while and after it runs.
    pub fn flow_stat(&self) -> Arc<FlowStat> {
        Arc::clone(&self.stat)
    }

    /// Relay in both directions until either pump fails or `shutdown` is
    /// cancelled.
    ///
    /// The pumps run as two tasks under a child token of `shutdown`. Whichever
    /// finishes first cancels the other, and the stream and the UDP socket are
    /// closed once both are gone. The first error wins.
    pub async fn run(self, shutdown: &CancellationToken) -> Result<(), Error> {
        let Session {
            stream,
            socket,
            binding,
            opts,
            stat,
        } = self;

        let cancel = shutdown.child_token();
        let socket = Arc::new(socket);
        let binding = Arc::new(binding);
        let (mut reader, mut writer) = tokio::io::split(stream);

        // egress needs a destination, which is unknown until learned
        let (learned_tx, learned_rx) = oneshot::channel();
        let (learned_tx, fixed) = match binding.addr() {
            Some(addr) if binding.is_fixed() => (None, Some(addr)),
            _ => (Some(learned_tx), None),
        };

        let mut tasks = JoinSet::new();

        {
            let socket = Arc::clone(&socket);
            let binding = Arc::clone(&binding);
            let opts = opts.clone();
            let stat = Arc::clone(&stat);
            let cancel = cancel.clone();

            tasks.spawn(
                async move {
                    let result = ingress(
                        &socket,
                        &mut writer,
                        &binding,
                        learned_tx,
                        &opts,
                        &stat,
                        &cancel,
                    )
                    .await;

                    debug!(message = "ingress pump stopped", ok = result.is_ok());
                    cancel.cancel();
                    result
                }
                .with_current_subscriber(),
            );
        }

        {
            let socket = Arc::clone(&socket);
            let stat = Arc::clone(&stat);
            let cancel = cancel.clone();

            tasks.spawn(
                async move {
                    let peer = match fixed {
                        Some(peer) => peer,
                        None => tokio::select! {
                            _ = cancel.cancelled() => return Ok(()),
                            learned = learned_rx => match learned {
                                Ok(peer) => peer,
                                // ingress is gone without learning anything
                                Err(_) => return Ok(()),
                            },
                        },
                    };

                    let result = egress(&mut reader, &socket, peer, &opts, &stat, &cancel).await;

                    debug!(message = "egress pump stopped", ok = result.is_ok());
                    cancel.cancel();
                    result
                }
                .with_current_subscriber(),
            );
        }

        let mut result = Ok(());
        while let Some(joined) = tasks.join_next().await {
            cancel.cancel();

            let err = match joined {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => err,
                Err(err) => {
                    error!(message = "session pump task join failed", ?err);
                    Error::Io(io::Error::new(io::ErrorKind::Other, err))
                }
            };

            if result.is_ok() {
                result = Err(err);
            }
        }

        result
    }
}
