//! Wire framing of datagrams on the TCP stream.
//!
//! ```text
//! +--------+--------+-------------------------+
//! | length (u16 BE) |   payload (length bytes) |
//! +--------+--------+-------------------------+
//! ```
//!
//! A length of `0xFFFF` marks a keepalive frame without payload. Data frames
//! never exceed `MAX_PAYLOAD_SIZE`, so the marker can not collide with a real
//! length.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{Error, ProtocolError};
use crate::MAX_PAYLOAD_SIZE;

/// Size of the length/marker field.
pub const HEADER_SIZE: usize = 2;

/// Reserved length value announcing a keepalive frame.
pub const KEEPALIVE_MARKER: u16 = 0xFFFF;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Header {
    Keepalive,
    Data(usize),
}

impl Header {
    pub fn decode(buf: [u8; HEADER_SIZE]) -> Self {
        match u16::from_be_bytes(buf) {
            KEEPALIVE_MARKER => Header::Keepalive,
            n => Header::Data(n as usize),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Keepalive,
    Data(Bytes),
}

pub fn encode_keepalive() -> [u8; HEADER_SIZE] {
    KEEPALIVE_MARKER.to_be_bytes()
}

/// Append a data frame carrying `payload` to `dst`.
pub fn encode_data(payload: &[u8], dst: &mut BytesMut) -> Result<(), ProtocolError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedFrame(payload.len()));
    }

    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_u16(payload.len() as u16);
    dst.put_slice(payload);

    Ok(())
}

pub async fn read_header<R>(reader: &mut R) -> Result<Header, Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = [0u8; HEADER_SIZE];
    let n = read_full(reader, &mut buf).await?;

    match n {
        HEADER_SIZE => Ok(Header::decode(buf)),
        0 => Err(ProtocolError::ConnectionClosed.into()),
        n => Err(ProtocolError::MalformedFrame(n).into()),
    }
}

/// Read exactly `n` payload bytes into `buf`, replacing its content.
pub async fn read_data_body<R>(reader: &mut R, n: usize, buf: &mut BytesMut) -> Result<(), Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    if n > MAX_PAYLOAD_SIZE {
        return Err(ProtocolError::OversizedFrame(n).into());
    }

    buf.clear();
    buf.resize(n, 0);

    let actual = read_full(reader, &mut buf[..]).await?;
    if actual != n {
        return Err(ProtocolError::TruncatedStream {
            expected: n,
            actual,
        }
        .into());
    }

    Ok(())
}

/// Read the next frame. The returned payload is split off `buf`, so `buf`
/// keeps its allocation for the next call when the payload is dropped.
pub async fn read_frame<R>(reader: &mut R, buf: &mut BytesMut) -> Result<Frame, Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    match read_header(reader).await? {
        Header::Keepalive => Ok(Frame::Keepalive),
        Header::Data(n) => {
            read_data_body(reader, n, buf).await?;
            Ok(Frame::Data(buf.split().freeze()))
        }
    }
}

/// Like `read_exact`, but reports how many bytes arrived before EOF.
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<usize, Error>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        }
    }

    Ok(filled)
}
