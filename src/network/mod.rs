//! Server resolution and the polling engine
//!
//! A hostname resolves to one or more addresses. Each address gets its own
//! connected UDP socket and a [`PeerSample`] record, and a single control
//! loop drives them all until every peer has its samples or the deadline
//! passes.

mod peer;
mod poller;
mod resolver;

#[cfg(test)]
pub(crate) mod sim;

pub use self::peer::PeerSample;
pub use self::poller::{poll_peers, PollConfig, PollingEngine};
pub use self::resolver::resolve;
