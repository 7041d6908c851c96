//! Simulated NTP servers on loopback sockets, for tests

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::protocol::{pack_flags, LeapIndicator, Mode, NtpCodec, NtpPacket, NtpShort, NtpTimestamp};
use crate::time;

/// How a simulated server answers
#[derive(Debug, Clone)]
pub(crate) struct SimBehavior {
    pub stratum: u8,
    pub leap: LeapIndicator,
    pub root_delay: f64,
    pub root_dispersion: f64,
    /// Server clock offsets used for successive replies, cycling
    pub offsets: Vec<f64>,
    /// Send a truncated datagram before every real reply
    pub short_reply_first: bool,
    /// Count requests but never answer
    pub silent: bool,
}

impl SimBehavior {
    pub fn with_offsets(offsets: &[f64]) -> Self {
        SimBehavior {
            stratum: 2,
            leap: LeapIndicator::NoWarning,
            root_delay: 0.01,
            root_dispersion: 0.01,
            offsets: offsets.to_vec(),
            short_reply_first: false,
            silent: false,
        }
    }

    pub fn silent() -> Self {
        SimBehavior {
            silent: true,
            ..SimBehavior::with_offsets(&[0.0])
        }
    }
}

/// A running simulated server, stopped on drop
pub(crate) struct SimPeer {
    pub addr: SocketAddr,
    requests: Arc<AtomicUsize>,
    handle: JoinHandle<()>,
}

impl SimPeer {
    pub async fn spawn(behavior: SimBehavior) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let requests = Arc::new(AtomicUsize::new(0));
        let counter = requests.clone();

        let handle = tokio::spawn(async move {
            let mut codec = NtpCodec::new();
            let mut buf = [0u8; 1024];
            let mut served = 0usize;
            loop {
                let (len, from) = match socket.recv_from(&mut buf).await {
                    Ok(received) => received,
                    Err(_) => continue,
                };
                counter.fetch_add(1, Ordering::SeqCst);
                if behavior.silent {
                    continue;
                }
                let request = match codec.decode_datagram(&buf[..len]) {
                    Some(request) => request,
                    None => continue,
                };

                if behavior.short_reply_first {
                    let _ = socket.send_to(&[0x24; 20], from).await;
                }

                let offset = behavior.offsets[served % behavior.offsets.len()];
                served += 1;

                let server_now = NtpTimestamp::from_unix_secs(time::now_secs() + offset);
                let reply = NtpPacket {
                    flags: pack_flags(behavior.leap, 4, Mode::Server),
                    stratum: behavior.stratum,
                    poll: request.poll,
                    precision: -20,
                    root_delay: NtpShort::from_secs(behavior.root_delay),
                    root_dispersion: NtpShort::from_secs(behavior.root_dispersion),
                    reference_id: 0x7f00_0001,
                    reference: server_now,
                    origin: request.transmit,
                    receive: server_now,
                    transmit: server_now,
                };
                let _ = socket.send_to(&codec.encode_packet(reply), from).await;
            }
        });

        SimPeer {
            addr,
            requests,
            handle,
        }
    }

    /// Datagrams received so far, answered or not
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for SimPeer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
