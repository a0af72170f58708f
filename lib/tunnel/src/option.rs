use std::time::Duration;

/// Idle period after which the ingress pump emits a keepalive frame.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct SessionOpts {
    /// Log per-packet events like dropped datagrams and received keepalives
    pub verbose: bool,

    /// UDP read deadline, a keepalive frame is sent every time it expires
    pub keepalive: Duration,
}

impl Default for SessionOpts {
    fn default() -> Self {
        Self {
            verbose: false,
            keepalive: DEFAULT_KEEPALIVE_INTERVAL,
        }
    }
}

/// Options applied to the TCP stream carrying the frames
#[derive(Debug, Clone, Default)]
pub struct TcpSocketOpts {
    /// `TCP_NODELAY`
    pub nodelay: bool,

    /// `SO_KEEPALIVE` and sets `TCP_KEEPIDLE`, `TCP_KEEPINTVL` respectively,
    /// enables keep-alive messages on connection-oriented sockets
    pub keepalive: Option<Duration>,
}
