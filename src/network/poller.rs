use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant, SystemTime};

use futures::future::select_all;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use super::peer::PeerSample;
use crate::core::{CheckConfig, Error, Result};
use crate::protocol::{clock_offset, NtpCodec, NtpPacket, MAX_DATAGRAM_SIZE};
use crate::time;

/// Parameters for one polling run
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Samples wanted from each peer
    pub sample_target: usize,
    /// Polling stops once this instant has passed
    pub deadline: Instant,
    /// Overall invocation timeout, reported when the run is cancelled
    pub timeout: Duration,
    /// Correction added to every computed offset (seconds)
    pub time_offset: f64,
    /// Upper bound of one readiness wait
    pub poll_slice: Duration,
    /// Age after which an unanswered request is sent again
    pub retransmit_interval: Duration,
}

impl PollConfig {
    /// Derives polling parameters from a check configuration, with the
    /// deadline at half the timeout after `start`
    pub fn from_check(config: &CheckConfig, start: Instant) -> Self {
        PollConfig {
            sample_target: config.sample_target,
            deadline: config.poll_deadline(start),
            timeout: config.timeout,
            time_offset: config.time_offset,
            poll_slice: config.poll_slice,
            retransmit_interval: config.retransmit_interval,
        }
    }
}

/// One peer's socket and sample record
struct Slot {
    index: usize,
    /// `None` when the socket could not be associated with the peer
    socket: Option<UdpSocket>,
    sample: PeerSample,
}

impl Slot {
    fn needs_samples(&self, target: usize) -> bool {
        self.socket.is_some() && !self.sample.is_complete(target)
    }

    fn send_request(&mut self, codec: &mut NtpCodec, now: Instant) {
        let socket = match &self.socket {
            Some(socket) => socket,
            None => return,
        };

        if self.sample.waiting_since.is_some() {
            debug!("re-sending request to peer {} ({})", self.index, self.sample.addr);
        } else {
            debug!("sending request to peer {} ({})", self.index, self.sample.addr);
        }

        let request = codec.encode_packet(NtpPacket::client_request(SystemTime::now()));
        if let Err(e) = socket.try_send(&request) {
            debug!("send to peer {} failed: {}", self.index, e);
        }
        // Marked even on failure so the peer is retried at the retransmit cadence
        self.sample.mark_sent(now);
    }

    /// Reads at most one datagram. Returns whether a valid sample was stored.
    fn receive(&mut self, codec: &mut NtpCodec, buf: &mut [u8], config: &PollConfig) -> bool {
        if !self.needs_samples(config.sample_target) {
            return false;
        }
        let socket = match &self.socket {
            Some(socket) => socket,
            None => return false,
        };

        let len = match socket.try_recv(buf) {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => return false,
            Err(e) => {
                debug!("receive from peer {} failed: {}", self.index, e);
                return false;
            }
        };
        let local_receive = time::now_secs();

        let reply = match codec.decode_datagram(&buf[..len]) {
            Some(reply) => reply,
            None => {
                debug!("discarding {}-byte reply from peer {}", len, self.index);
                return false;
            }
        };
        trace!("response from peer {}: {}", self.index, reply);

        let offset = clock_offset(&reply, local_receive) + config.time_offset;
        debug!("response from peer {}: offset {:.10}", self.index, offset);
        self.sample.record(&reply, offset, config.sample_target);
        true
    }
}

/// Drives request/response cycles against every resolved peer.
///
/// All sockets live inside the engine and are closed when it is dropped,
/// whichever way [`PollingEngine::run`] returns.
pub struct PollingEngine {
    slots: Vec<Slot>,
    config: PollConfig,
    codec: NtpCodec,
    buf: Vec<u8>,
    iterations: usize,
    one_read: bool,
}

impl PollingEngine {
    /// Opens one connected UDP socket per address.
    ///
    /// Failing to create a socket is fatal. Failing to associate it with its
    /// peer only excludes that peer.
    pub fn open(addrs: &[SocketAddr], config: PollConfig) -> Result<Self> {
        let mut slots = Vec::with_capacity(addrs.len());
        for (index, &addr) in addrs.iter().enumerate() {
            slots.push(Slot {
                index,
                socket: open_socket(index, addr)?,
                sample: PeerSample::new(addr, config.sample_target),
            });
        }

        Ok(PollingEngine {
            slots,
            config,
            codec: NtpCodec::new(),
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
            iterations: 0,
            one_read: false,
        })
    }

    /// Number of peers that could be associated and will be polled
    pub fn active_peers(&self) -> usize {
        self.slots.iter().filter(|slot| slot.socket.is_some()).count()
    }

    /// Control loop iterations run so far
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Polls until every peer has its samples or the deadline passes.
    ///
    /// Returns the per-peer records in address order. Fails with
    /// [`Error::NoResponse`] when no valid reply arrived at all, and with
    /// [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn run(mut self, cancel: &CancellationToken) -> Result<Vec<PeerSample>> {
        while self.step(cancel).await? {}
        debug!("polling finished after {} iterations", self.iterations);

        if !self.one_read {
            return Err(Error::NoResponse);
        }

        Ok(self.slots.into_iter().map(|slot| slot.sample).collect())
    }

    /// One iteration of the control loop: at most one request, one bounded
    /// readiness wait, then at most one read per socket.
    ///
    /// Returns `false` once the deadline has passed or no peer needs samples.
    async fn step(&mut self, cancel: &CancellationToken) -> Result<bool> {
        let target = self.config.sample_target;
        let now = Instant::now();
        if now > self.config.deadline {
            debug!("polling deadline reached");
            return Ok(false);
        }
        if self.slots.iter().all(|slot| !slot.needs_samples(target)) {
            return Ok(false);
        }
        self.iterations += 1;

        // First eligible peer in address order
        let retransmit = self.config.retransmit_interval;
        if let Some(slot) = self.slots.iter_mut().find(|slot| {
            slot.socket.is_some() && slot.sample.wants_request(now, target, retransmit)
        }) {
            slot.send_request(&mut self.codec, now);
        }

        let slice = self
            .config
            .poll_slice
            .min(self.config.deadline.saturating_duration_since(Instant::now()));

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::Cancelled(self.config.timeout.as_secs()));
            }
            ready = wait_readable(&self.slots, target, slice) => {
                if let Err(e) = ready {
                    warn!("polling ntp sockets: {}", e);
                    return Err(e.into());
                }
            }
        }

        for slot in self.slots.iter_mut() {
            if slot.receive(&mut self.codec, &mut self.buf, &self.config) {
                self.one_read = true;
            }
        }
        Ok(true)
    }
}

/// Resolves, opens and runs in one call
pub async fn poll_peers(
    addrs: &[SocketAddr],
    config: PollConfig,
    cancel: &CancellationToken,
) -> Result<Vec<PeerSample>> {
    PollingEngine::open(addrs, config)?.run(cancel).await
}

fn open_socket(index: usize, addr: SocketAddr) -> Result<Option<UdpSocket>> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(Error::Socket)?;

    if let Err(e) = socket.connect(&addr.into()) {
        // Enough if one peer answers; dual-stack names often have an
        // unreachable family
        debug!("can't create socket connection on peer {} ({}): {}", index, addr, e);
        return Ok(None);
    }

    socket.set_nonblocking(true).map_err(Error::Socket)?;
    let socket = UdpSocket::from_std(socket.into()).map_err(Error::Socket)?;
    Ok(Some(socket))
}

/// Waits up to `slice` for a socket of a peer that still needs samples to
/// become readable
async fn wait_readable(slots: &[Slot], target: usize, slice: Duration) -> io::Result<()> {
    let waits: Vec<_> = slots
        .iter()
        .filter(|slot| slot.needs_samples(target))
        .filter_map(|slot| slot.socket.as_ref())
        .map(|socket| Box::pin(socket.readable()))
        .collect();

    if waits.is_empty() {
        tokio::time::sleep(slice).await;
        return Ok(());
    }

    match tokio::time::timeout(slice, select_all(waits)).await {
        Ok((ready, _, _)) => ready,
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::sim::{SimBehavior, SimPeer};
    use crate::protocol::LeapIndicator;

    fn poll_config(deadline_in: Duration) -> PollConfig {
        PollConfig {
            sample_target: 4,
            deadline: Instant::now() + deadline_in,
            timeout: deadline_in * 2,
            time_offset: 0.0,
            poll_slice: Duration::from_millis(100),
            retransmit_interval: Duration::from_secs(1),
        }
    }

    fn mean(values: &[f64]) -> f64 {
        values.iter().sum::<f64>() / values.len() as f64
    }

    #[tokio::test]
    async fn test_collects_target_samples_from_each_peer() {
        let first = SimPeer::spawn(SimBehavior::with_offsets(&[0.010, 0.012, 0.011, 0.009])).await;
        let second = SimPeer::spawn(SimBehavior::with_offsets(&[0.300, 0.302, 0.301, 0.299])).await;

        let cancel = CancellationToken::new();
        let started = Instant::now();
        let addrs = [first.addr, second.addr];
        let peers = poll_peers(&addrs, poll_config(Duration::from_secs(5)), &cancel)
            .await
            .unwrap();

        // Finished on sample count, long before the deadline
        assert!(started.elapsed() < Duration::from_secs(3));
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].addr, first.addr);
        assert_eq!(peers[0].responses.len(), 4);
        assert_eq!(peers[1].responses.len(), 4);
        assert!((mean(&peers[0].responses) - 0.0105).abs() < 0.002);
        assert!((mean(&peers[1].responses) - 0.3005).abs() < 0.002);
        assert_eq!(peers[0].stratum, 2);
        assert!(peers.iter().all(|peer| peer.waiting_since.is_none()));
    }

    #[tokio::test]
    async fn test_reply_fields_are_copied() {
        let behavior = SimBehavior {
            stratum: 3,
            leap: LeapIndicator::InsertSecond,
            root_delay: 0.0625,
            root_dispersion: 0.125,
            ..SimBehavior::with_offsets(&[0.0])
        };
        let peer = SimPeer::spawn(behavior).await;

        let cancel = CancellationToken::new();
        let peers = poll_peers(&[peer.addr], poll_config(Duration::from_secs(5)), &cancel)
            .await
            .unwrap();

        assert_eq!(peers[0].stratum, 3);
        assert_eq!(peers[0].leap(), LeapIndicator::InsertSecond);
        assert_eq!(peers[0].root_delay, 0.0625);
        assert_eq!(peers[0].root_dispersion, 0.125);
    }

    #[tokio::test]
    async fn test_time_offset_applied_to_every_sample() {
        let peer = SimPeer::spawn(SimBehavior::with_offsets(&[0.0])).await;

        let config = PollConfig {
            time_offset: 5.0,
            ..poll_config(Duration::from_secs(5))
        };
        let cancel = CancellationToken::new();
        let peers = poll_peers(&[peer.addr], config, &cancel).await.unwrap();

        assert_eq!(peers[0].responses.len(), 4);
        assert!(peers[0].responses.iter().all(|offset| (offset - 5.0).abs() < 0.002));
    }

    #[tokio::test]
    async fn test_short_replies_never_count() {
        let behavior = SimBehavior {
            short_reply_first: true,
            ..SimBehavior::with_offsets(&[0.020])
        };
        let peer = SimPeer::spawn(behavior).await;

        let cancel = CancellationToken::new();
        let peers = poll_peers(&[peer.addr], poll_config(Duration::from_secs(5)), &cancel)
            .await
            .unwrap();

        assert_eq!(peers[0].responses.len(), 4);
        assert!(peers[0].responses.iter().all(|offset| (offset - 0.020).abs() < 0.002));
    }

    #[tokio::test]
    async fn test_silent_peer_hits_deadline() {
        let peer = SimPeer::spawn(SimBehavior::silent()).await;

        let cancel = CancellationToken::new();
        let started = Instant::now();
        let config = poll_config(Duration::from_millis(500));
        let result = poll_peers(&[peer.addr], config, &cancel).await;

        assert!(matches!(result, Err(Error::NoResponse)));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(1500), "took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_silent_peer_does_not_block_others() {
        let silent = SimPeer::spawn(SimBehavior::silent()).await;
        let good = SimPeer::spawn(SimBehavior::with_offsets(&[0.001])).await;

        let cancel = CancellationToken::new();
        let addrs = [silent.addr, good.addr];
        let peers = poll_peers(&addrs, poll_config(Duration::from_millis(800)), &cancel)
            .await
            .unwrap();

        assert!(!peers[0].has_replied());
        assert_eq!(peers[0].stratum, 0);
        assert_eq!(peers[1].responses.len(), 4);
    }

    #[tokio::test]
    async fn test_no_addresses_is_no_response() {
        let cancel = CancellationToken::new();
        let result = poll_peers(&[], poll_config(Duration::from_secs(5)), &cancel).await;
        assert!(matches!(result, Err(Error::NoResponse)));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_run() {
        let peer = SimPeer::spawn(SimBehavior::silent()).await;

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result = poll_peers(&[peer.addr], poll_config(Duration::from_secs(5)), &cancel).await;

        assert!(matches!(result, Err(Error::Cancelled(10))));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_engine_counts_associated_peers() {
        let peer = SimPeer::spawn(SimBehavior::silent()).await;
        let config = poll_config(Duration::from_secs(1));
        let engine = PollingEngine::open(&[peer.addr], config).unwrap();
        assert_eq!(engine.active_peers(), 1);
        assert_eq!(engine.iterations(), 0);
    }

    #[tokio::test]
    async fn test_unassociable_peer_is_skipped() {
        let good = SimPeer::spawn(SimBehavior::with_offsets(&[0.004])).await;
        // Connecting to the broadcast address fails without SO_BROADCAST
        let broadcast: SocketAddr = "255.255.255.255:123".parse().unwrap();

        let config = poll_config(Duration::from_secs(5));
        let engine = PollingEngine::open(&[broadcast, good.addr], config).unwrap();
        assert_eq!(engine.active_peers(), 1);

        let peers = engine.run(&CancellationToken::new()).await.unwrap();
        assert_eq!(peers.len(), 2);
        assert_eq!(peers[0].addr, broadcast);
        assert!(!peers[0].has_replied());
        assert!(peers[0].waiting_since.is_none());
        assert_eq!(peers[1].responses.len(), 4);
    }

    #[tokio::test]
    async fn test_one_request_per_iteration() {
        let first = SimPeer::spawn(SimBehavior::silent()).await;
        let second = SimPeer::spawn(SimBehavior::silent()).await;

        let config = PollConfig {
            poll_slice: Duration::from_millis(10),
            ..poll_config(Duration::from_secs(5))
        };
        let mut engine = PollingEngine::open(&[first.addr, second.addr], config).unwrap();
        let cancel = CancellationToken::new();

        assert!(engine.step(&cancel).await.unwrap());
        assert!(engine.slots[0].sample.waiting_since.is_some());
        assert!(engine.slots[1].sample.waiting_since.is_none());

        assert!(engine.step(&cancel).await.unwrap());
        assert!(engine.slots[1].sample.waiting_since.is_some());

        // Both outstanding and younger than the retransmit interval
        assert!(engine.step(&cancel).await.unwrap());
        assert_eq!(engine.iterations(), 3);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(first.requests(), 1);
        assert_eq!(second.requests(), 1);
    }

    #[tokio::test]
    async fn test_silent_peer_resent_at_retransmit_cadence() {
        let peer = SimPeer::spawn(SimBehavior::silent()).await;

        let config = PollConfig {
            poll_slice: Duration::from_millis(20),
            retransmit_interval: Duration::from_millis(200),
            ..poll_config(Duration::from_secs(1))
        };
        let mut engine = PollingEngine::open(&[peer.addr], config).unwrap();
        let cancel = CancellationToken::new();
        while engine.step(&cancel).await.unwrap() {}

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Sent at roughly 0, 200, 400, 600 and 800 ms; never once per slice
        let requests = peer.requests();
        assert!((4..=6).contains(&requests), "{} requests", requests);

        // Each iteration waits out a full slice: about deadline / slice
        let iterations = engine.iterations();
        assert!((10..=60).contains(&iterations), "{} iterations", iterations);
    }
}
