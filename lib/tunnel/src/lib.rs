//! Relay engine carrying UDP datagrams over a TCP byte stream.
//!
//! A [`Session`] pairs one stream with one UDP socket and moves datagrams in
//! both directions with two pumps. Datagrams are length-prefixed on the
//! stream (see [`frame`]), idle periods are filled with keepalive frames, and
//! the UDP peer is either fixed up front or learned from the first datagram
//! (see [`EndpointBinding`]).

mod binding;
mod error;
mod flow;
pub mod frame;
mod option;
mod pump;
mod session;
mod sys;

pub use binding::{EndpointBinding, Observation};
pub use error::{Error, ProtocolError};
pub use flow::{FlowSnapshot, FlowStat};
pub use frame::Frame;
pub use option::{SessionOpts, TcpSocketOpts, DEFAULT_KEEPALIVE_INTERVAL};
pub use session::Session;
pub use sys::{connect_tcp, create_udp_socket, set_tcp_opts, AddrFamily};

/// The maximum payload of a data frame, datagrams are read into buffers of
/// this size.
pub const MAX_PAYLOAD_SIZE: usize = 8192;
