use std::io;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Framing violations on the TCP stream, all of them fatal for the session.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("connection closed by peer")]
    ConnectionClosed,
    #[error("malformed frame header, only {0} of 2 bytes received")]
    MalformedFrame(usize),
    #[error("frame length {0} exceeds the maximum payload size {max}", max = crate::MAX_PAYLOAD_SIZE)]
    OversizedFrame(usize),
    #[error("unexpected end of stream, expecting {expected} bytes, but only got {actual} bytes")]
    TruncatedStream { expected: usize, actual: usize },
}

impl Error {
    /// True when the peer went away cleanly on a frame boundary.
    pub fn is_closed(&self) -> bool {
        matches!(self, Error::Protocol(ProtocolError::ConnectionClosed))
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            Error::Protocol(ProtocolError::ConnectionClosed) => {
                io::Error::new(io::ErrorKind::UnexpectedEof, ProtocolError::ConnectionClosed)
            }
            Error::Protocol(err) => io::Error::new(io::ErrorKind::InvalidData, err),
        }
    }
}
