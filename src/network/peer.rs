use std::net::SocketAddr;
use std::time::{Duration, Instant};

use crate::protocol::{leap_of, LeapIndicator, NtpPacket};

/// Everything learned from one resolved server address during a check
#[derive(Debug, Clone)]
pub struct PeerSample {
    /// Address this record belongs to
    pub addr: SocketAddr,
    /// When the outstanding request was sent, if one is outstanding
    pub waiting_since: Option<Instant>,
    /// Offsets computed from each valid reply, in arrival order
    pub responses: Vec<f64>,
    /// Stratum from the latest reply, 0 before the first
    pub stratum: u8,
    /// Root dispersion from the latest reply (seconds)
    pub root_dispersion: f64,
    /// Root delay from the latest reply (seconds)
    pub root_delay: f64,
    /// Flags byte from the latest reply
    pub flags: u8,
}

impl PeerSample {
    /// Creates an empty record for a peer that has not been probed
    pub fn new(addr: SocketAddr, capacity: usize) -> Self {
        PeerSample {
            addr,
            waiting_since: None,
            responses: Vec::with_capacity(capacity),
            stratum: 0,
            root_dispersion: 0.0,
            root_delay: 0.0,
            flags: 0,
        }
    }

    /// Whether `target` samples have been collected
    pub fn is_complete(&self, target: usize) -> bool {
        self.responses.len() >= target
    }

    /// Whether a request should go out now: more samples are needed and no
    /// request is outstanding, or the outstanding one is older than
    /// `retransmit`.
    pub fn wants_request(&self, now: Instant, target: usize, retransmit: Duration) -> bool {
        if self.is_complete(target) {
            return false;
        }
        match self.waiting_since {
            None => true,
            Some(sent) => now.saturating_duration_since(sent) >= retransmit,
        }
    }

    /// Records a request sent at `now`
    pub fn mark_sent(&mut self, now: Instant) {
        self.waiting_since = Some(now);
    }

    /// Stores one valid reply and the offset computed from it.
    ///
    /// Replies past `target` are ignored.
    pub fn record(&mut self, reply: &NtpPacket, offset: f64, target: usize) {
        if self.is_complete(target) {
            return;
        }
        self.responses.push(offset);
        self.stratum = reply.stratum;
        self.root_dispersion = reply.root_dispersion.to_secs();
        self.root_delay = reply.root_delay.to_secs();
        self.flags = reply.flags;
        self.waiting_since = None;
    }

    /// Leap indicator from the latest reply
    pub fn leap(&self) -> LeapIndicator {
        leap_of(self.flags)
    }

    /// Whether at least one valid reply arrived
    pub fn has_replied(&self) -> bool {
        !self.responses.is_empty()
    }
}
