//! Firmware update coordinator.
//!
//! ```text
//!  remote_version ──none/empty/not newer──▶ NoneAvailable
//!        │ newer
//!        ▼
//!  suspend poller ─▶ take Updater token ─▶ open ─▶ begin ─▶ write ─▶ end ─▶ finished?
//!                                                                      │
//!        ┌────────────── any failure: abort, release, resume ◀─────────┤
//!        ▼                                                             ▼
//!  Failed(reason)                                     Applied (caller restarts;
//!                                                     polling stays suspended)
//! ```
//!
//! The transfer itself is uninterruptible; it runs to completion or to a
//! transport timeout before control returns to the driver loop.

use core::cmp::Ordering;

use log::{error, info, warn};

use crate::app::ports::{FirmwareFlasher, FirmwareSource, PollControl};
use crate::bus::{BusArbiter, BusOwner};
use crate::error::UpdateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    NoneAvailable,
    Applied,
    Failed(UpdateError),
}

pub struct UpdateCoordinator {
    current_version: &'static str,
    attempts: u32,
}

impl UpdateCoordinator {
    pub fn new(current_version: &'static str) -> Self {
        Self {
            current_version,
            attempts: 0,
        }
    }

    pub fn current_version(&self) -> &'static str {
        self.current_version
    }

    /// Number of transfers started since boot.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn check_and_apply(
        &mut self,
        source: &mut impl FirmwareSource,
        flasher: &mut impl FirmwareFlasher,
        poller: &mut impl PollControl,
        bus: &mut BusArbiter,
    ) -> UpdateOutcome {
        info!("Update: checking for new firmware (current {})", self.current_version);
        let Some(remote) = source.remote_version().filter(|v| !v.is_empty()) else {
            info!("Update: no firmware available");
            return UpdateOutcome::NoneAvailable;
        };
        if !is_newer(&remote, self.current_version) {
            info!("Update: remote {} is not newer, nothing to do", remote);
            return UpdateOutcome::NoneAvailable;
        }

        info!("Update: new firmware {} available, suspending polling", remote);
        poller.suspend();
        let token = match bus.acquire(BusOwner::Updater) {
            Ok(token) => token,
            Err(busy) => {
                warn!("Update: transport held by {:?}, giving up", busy.holder);
                poller.resume();
                return UpdateOutcome::Failed(UpdateError::Busy);
            }
        };

        self.attempts = self.attempts.wrapping_add(1);
        let result = transfer(source, flasher);
        bus.release(token);

        match result {
            Ok(()) => {
                info!("Update: {} written, restart required", remote);
                UpdateOutcome::Applied
            }
            Err(e) => {
                error!("Update: failed ({}), resuming polling", e);
                flasher.abort();
                poller.resume();
                UpdateOutcome::Failed(e)
            }
        }
    }
}

fn transfer(
    source: &mut impl FirmwareSource,
    flasher: &mut impl FirmwareFlasher,
) -> Result<(), UpdateError> {
    let expected = source.open_image()?;
    if expected == 0 {
        return Err(UpdateError::InvalidContentLength);
    }
    info!("Update: image is {} bytes", expected);

    if !flasher.begin(expected) {
        return Err(UpdateError::InsufficientSpace);
    }
    let written = flasher.write_stream(source);
    if written != expected {
        return Err(UpdateError::ShortWrite { written, expected });
    }
    if !flasher.end() {
        return Err(UpdateError::EndFailed(flasher.last_error()));
    }
    if !flasher.is_finished() {
        return Err(UpdateError::NotFinished);
    }
    Ok(())
}

/// `true` if `remote` is strictly newer than `current`.
///
/// Dot-separated numeric versions (`000.000.024`, `1.2.0`) compare
/// component-wise; anything else falls back to plain string order.
pub fn is_newer(remote: &str, current: &str) -> bool {
    match (parse_numeric(remote), parse_numeric(current)) {
        (Some(r), Some(c)) => compare_parts(&r, &c) == Ordering::Greater,
        _ => remote > current,
    }
}

fn parse_numeric(v: &str) -> Option<heapless::Vec<u32, 8>> {
    let mut parts = heapless::Vec::new();
    for part in v.trim().trim_start_matches(['v', 'V']).split('.') {
        parts.push(part.parse::<u32>().ok()?).ok()?;
    }
    Some(parts)
}

/// Missing trailing components count as zero, so `1.2` == `1.2.0`.
fn compare_parts(a: &[u32], b: &[u32]) -> Ordering {
    let len = a.len().max(b.len());
    (0..len)
        .map(|i| {
            let x = a.get(i).copied().unwrap_or(0);
            let y = b.get(i).copied().unwrap_or(0);
            x.cmp(&y)
        })
        .find(|o| *o != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}
