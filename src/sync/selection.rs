use tracing::{debug, trace};

use crate::network::PeerSample;
use crate::protocol::LeapIndicator;

/// Whether a peer may be selected at all.
///
/// Stratum 0 belongs to reference clocks and never to a queried server; it
/// is also what a peer that never answered still holds. An alarm leap
/// indicator marks an unsynchronized server.
pub fn is_eligible(peer: &PeerSample) -> bool {
    peer.stratum != 0 && peer.leap() != LeapIndicator::Alarm
}

/// Whether `challenger` should replace the current `best` candidate.
///
/// Lower-or-equal stratum and dispersion, strictly lower delay. The strict
/// comparison on delay keeps the earlier peer when all three tie.
pub fn is_better(challenger: &PeerSample, best: &PeerSample) -> bool {
    challenger.stratum <= best.stratum
        && challenger.root_dispersion <= best.root_dispersion
        && challenger.root_delay < best.root_delay
}

/// Picks the most trustworthy peer, in resolution order.
///
/// Returns the index of the selected record, or `None` when every peer was
/// filtered out.
pub fn select_best(peers: &[PeerSample]) -> Option<usize> {
    let mut best: Option<usize> = None;

    for (index, peer) in peers.iter().enumerate() {
        if !is_eligible(peer) {
            debug!(
                "discarding peer {}: stratum={} li={}",
                index,
                peer.stratum,
                peer.leap().bits()
            );
            continue;
        }

        let current = match best {
            None => {
                trace!("using peer {} as our first candidate", index);
                best = Some(index);
                continue;
            }
            Some(current) => current,
        };

        trace!("comparing peer {} with peer {}", index, current);
        if is_better(peer, &peers[current]) {
            trace!("peer {} is now our best candidate", index);
            best = Some(index);
        }
    }

    match best {
        Some(index) => trace!("best server selected: peer {}", index),
        None => trace!("no peers meeting synchronization criteria"),
    }
    best
}
