//! Server selection and offset reduction
//!
//! Once polling has finished the records are read-only: the selector picks
//! one of them and the averager turns its samples into a single offset.

pub mod selection;

pub use self::selection::{is_better, is_eligible, select_best};

use crate::network::PeerSample;

/// Arithmetic mean of every offset collected from `peer`.
///
/// `None` when the peer has no samples.
pub fn average_offset(peer: &PeerSample) -> Option<f64> {
    if peer.responses.is_empty() {
        return None;
    }
    Some(peer.responses.iter().sum::<f64>() / peer.responses.len() as f64)
}

/// Selects the best peer and averages its offsets.
///
/// Returns the selected index with its mean offset, or `None` when no peer
/// qualified.
pub fn best_offset(peers: &[PeerSample]) -> Option<(usize, f64)> {
    let index = select_best(peers)?;
    average_offset(&peers[index]).map(|offset| (index, offset))
}
