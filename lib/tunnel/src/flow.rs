use std::sync::atomic::{AtomicU64, Ordering};

/// Traffic counters of one session, shared by both pumps.
#[derive(Debug, Default)]
pub struct FlowStat {
    tcp_frames_sent: AtomicU64,
    tcp_bytes_sent: AtomicU64,
    udp_datagrams_sent: AtomicU64,
    udp_bytes_sent: AtomicU64,
    keepalives_sent: AtomicU64,
    keepalives_received: AtomicU64,
    datagrams_dropped: AtomicU64,
    udp_errors: AtomicU64,
}

/// Point-in-time copy of a `FlowStat`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FlowSnapshot {
    pub tcp_frames_sent: u64,
    pub tcp_bytes_sent: u64,
    pub udp_datagrams_sent: u64,
    pub udp_bytes_sent: u64,
    pub keepalives_sent: u64,
    pub keepalives_received: u64,
    pub datagrams_dropped: u64,
    pub udp_errors: u64,
}

impl FlowStat {
    pub fn incr_tcp_sent(&self, n: usize) {
        self.tcp_frames_sent.fetch_add(1, Ordering::Relaxed);
        self.tcp_bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn incr_udp_sent(&self, n: usize) {
        self.udp_datagrams_sent.fetch_add(1, Ordering::Relaxed);
        self.udp_bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn incr_keepalive_sent(&self) {
        self.keepalives_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_keepalive_received(&self) {
        self.keepalives_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_dropped(&self) {
        self.datagrams_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_udp_error(&self) {
        self.udp_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn load(&self) -> FlowSnapshot {
        FlowSnapshot {
            tcp_frames_sent: self.tcp_frames_sent.load(Ordering::Relaxed),
            tcp_bytes_sent: self.tcp_bytes_sent.load(Ordering::Relaxed),
            udp_datagrams_sent: self.udp_datagrams_sent.load(Ordering::Relaxed),
            udp_bytes_sent: self.udp_bytes_sent.load(Ordering::Relaxed),
            keepalives_sent: self.keepalives_sent.load(Ordering::Relaxed),
            keepalives_received: self.keepalives_received.load(Ordering::Relaxed),
            datagrams_dropped: self.datagrams_dropped.load(Ordering::Relaxed),
            udp_errors: self.udp_errors.load(Ordering::Relaxed),
        }
    }
}
