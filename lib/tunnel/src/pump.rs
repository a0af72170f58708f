//! The two forwarding loops of a session.
//!
//! The ingress pump owns the write side of the stream, the egress pump owns
//! the read side. Both share the UDP socket and the endpoint binding.

use std::io;
use std::net::SocketAddr;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binding::{EndpointBinding, Observation};
use crate::error::Error;
use crate::flow::FlowStat;
use crate::frame::{encode_data, encode_keepalive, read_frame, Frame, HEADER_SIZE};
use crate::option::SessionOpts;
use crate::MAX_PAYLOAD_SIZE;

/// UDP -> TCP. Reads datagrams, frames them onto `writer`, and sends a
/// keepalive whenever no datagram arrived within `opts.keepalive`.
///
/// `learned` fires with the peer address when the binding learns it.
pub async fn ingress<W>(
    socket: &UdpSocket,
    writer: &mut W,
    binding: &EndpointBinding,
    mut learned: Option<oneshot::Sender<SocketAddr>>,
    opts: &SessionOpts,
    stat: &FlowStat,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut recv_buf = vec![0u8; MAX_PAYLOAD_SIZE].into_boxed_slice();
    let mut send_buf = BytesMut::with_capacity(HEADER_SIZE + MAX_PAYLOAD_SIZE);

    loop {
        let result = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(()),
            result = time::timeout(opts.keepalive, socket.recv_from(&mut recv_buf)) => result,
        };

        let (n, sender) = match result {
            Err(_elapsed) => {
                match write_or_cancel(writer, &encode_keepalive(), cancel).await {
                    Ok(true) => {}
                    Ok(false) => return Ok(()),
                    Err(err) => {
                        warn!(message = "write keepalive to tcp stream failed", ?err);
                        return Err(err.into());
                    }
                }

                stat.incr_keepalive_sent();
                if opts.verbose {
                    info!(message = "keepalive sent");
                }

                continue;
            }
            Ok(Err(err)) => {
                warn!(message = "udp recv failed", ?err);
                stat.incr_udp_error();
                continue;
            }
            Ok(Ok(received)) => received,
        };

        match binding.observe(sender) {
            Observation::Accepted => {}
            Observation::Learned => {
                info!(message = "udp peer learned", peer = %sender);

                if let Some(tx) = learned.take() {
                    // a closed receiver means the session is already tearing down
                    let _ = tx.send(sender);
                }
            }
            Observation::Rejected { bound } => {
                stat.incr_dropped();
                if opts.verbose {
                    warn!(
                        message = "ignoring datagram from unexpected peer",
                        %sender,
                        %bound,
                        len = n
                    );
                }

                continue;
            }
        }

        send_buf.clear();
        encode_data(&recv_buf[..n], &mut send_buf)?;

        match write_or_cancel(writer, &send_buf, cancel).await {
            Ok(true) => {}
            Ok(false) => return Ok(()),
            Err(err) => {
                warn!(message = "write frame to tcp stream failed", ?err);
                return Err(err.into());
            }
        }

        stat.incr_tcp_sent(n);
    }
}

/// Write and flush `buf`, unless `cancel` fires first. Returns `false` when
/// cancelled, even if the write is stuck on a peer that stopped reading.
async fn write_or_cancel<W>(
    writer: &mut W,
    buf: &[u8],
    cancel: &CancellationToken,
) -> io::Result<bool>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    tokio::select! {
        biased;

        _ = cancel.cancelled() => Ok(false),
        result = async {
            writer.write_all(buf).await?;
            writer.flush().await
        } => result.map(|_| true),
    }
}

/// TCP -> UDP. Reads frames from `reader` and sends each payload to `peer`.
pub async fn egress<R>(
    reader: &mut R,
    socket: &UdpSocket,
    peer: SocketAddr,
    opts: &SessionOpts,
    stat: &FlowStat,
    cancel: &CancellationToken,
) -> Result<(), Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = BytesMut::with_capacity(MAX_PAYLOAD_SIZE);

    loop {
        let frame = tokio::select! {
            biased;

            _ = cancel.cancelled() => return Ok(()),
            frame = read_frame(reader, &mut buf) => frame?,
        };

        let payload = match frame {
            Frame::Keepalive => {
                stat.incr_keepalive_received();
                if opts.verbose {
                    info!(message = "keepalive received");
                }

                continue;
            }
            Frame::Data(payload) => payload,
        };

        match socket.send_to(&payload, peer).await {
            Ok(n) => {
                if n != payload.len() {
                    debug!(
                        message = "udp send truncated",
                        %peer,
                        expected = payload.len(),
                        sent = n
                    );
                }

                stat.incr_udp_sent(n);
            }
            Err(err) => {
                warn!(message = "udp send failed", %peer, ?err);
                stat.incr_udp_error();
            }
        }
    }
}
