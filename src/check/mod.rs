//! The offset check itself
//!
//! Ties resolution, polling and selection together and turns the result
//! into a plugin status and output line.

pub mod report;
pub mod thresholds;

pub use self::report::{error_line, format_significant, CheckReport, OffsetOutcome};
pub use self::thresholds::{Range, Thresholds};

use std::time::{Duration, Instant};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::{CheckConfig, Error, Result};
use crate::network::{poll_peers, resolve, PollConfig};
use crate::sync::best_offset;

/// Measures the offset of the configured server.
///
/// Every address the name resolves to is polled; the best of them is
/// selected and its samples averaged. `Unknown` means servers answered but
/// none qualified.
pub async fn offset_request(
    config: &CheckConfig,
    cancel: &CancellationToken,
) -> Result<OffsetOutcome> {
    let start = Instant::now();

    let addrs = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Error::Cancelled(config.timeout.as_secs())),
        resolved = resolve(&config.server_address, config.port, config.address_family) => resolved?,
    };
    debug!("{} resolved to {} address(es)", config.server_address, addrs.len());

    let peers = poll_peers(&addrs, PollConfig::from_check(config, start), cancel).await?;

    match best_offset(&peers) {
        Some((index, offset)) => {
            let peer = &peers[index];
            debug!(
                "overall average offset: {:.10} from {} ({} samples)",
                offset,
                peer.addr,
                peer.responses.len()
            );
            Ok(OffsetOutcome::Measured {
                offset,
                peer: peer.addr,
                samples: peer.responses.len(),
            })
        }
        None => Ok(OffsetOutcome::Unknown),
    }
}

/// Runs one complete check: validate, measure, classify.
pub async fn run(config: &CheckConfig, cancel: &CancellationToken) -> Result<CheckReport> {
    config.validate()?;
    let thresholds = Thresholds::parse(&config.warning, &config.critical)?;
    let outcome = offset_request(config, cancel).await?;
    Ok(CheckReport::evaluate(outcome, &thresholds, config.unknown_offset))
}

/// Timer that cancels a token once the full timeout has elapsed.
///
/// Dropping the alarm disarms it.
pub struct Alarm {
    handle: JoinHandle<()>,
}

impl Alarm {
    pub fn arm(timeout: Duration, cancel: CancellationToken) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            warn!("timeout of {:?} reached, cancelling check", timeout);
            cancel.cancel();
        });
        Alarm { handle }
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
