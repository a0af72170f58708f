use std::net::SocketAddr;
use std::sync::OnceLock;

/// Outcome of `EndpointBinding::observe`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Observation {
    /// Sender matches the bound address.
    Accepted,
    /// Sender was just learned. Returned exactly once per binding.
    Learned,
    /// Sender differs from the bound address, drop its datagram.
    Rejected { bound: SocketAddr },
}

#[derive(Debug)]
enum Inner {
    Fixed(SocketAddr),
    Learning(OnceLock<SocketAddr>),
}

/// The UDP peer a session exchanges datagrams with.
///
/// Either known up front, or learned from the first datagram observed. A
/// learned address is pinned for the lifetime of the binding.
#[derive(Debug)]
pub struct EndpointBinding {
    inner: Inner,
}

impl EndpointBinding {
    pub fn fixed(addr: SocketAddr) -> Self {
        Self {
            inner: Inner::Fixed(addr),
        }
    }

    pub fn unbound() -> Self {
        Self {
            inner: Inner::Learning(OnceLock::new()),
        }
    }

    pub fn observe(&self, sender: SocketAddr) -> Observation {
        let bound = match &self.inner {
            Inner::Fixed(addr) => *addr,
            Inner::Learning(cell) => {
                let mut learned = false;
                let bound = *cell.get_or_init(|| {
                    learned = true;
                    sender
                });

                if learned {
                    return Observation::Learned;
                }

                bound
            }
        };

        if bound == sender {
            Observation::Accepted
        } else {
            Observation::Rejected { bound }
        }
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        match &self.inner {
            Inner::Fixed(addr) => Some(*addr),
            Inner::Learning(cell) => cell.get().copied(),
        }
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.inner, Inner::Fixed(_))
    }
}
