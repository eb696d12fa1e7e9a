//! Inactive-partition firmware writer, backed by the `esp-ota` crate.
//!
//! Implements [`FirmwareFlasher`]: `begin` → `write_stream` → `end`, with
//! `abort` discarding a partial image. The `esp-ota` crate wraps the
//! ESP-IDF OTA partition API; on the host an in-memory partition stands in.

use log::{info, warn};

use crate::app::ports::{FirmwareFlasher, FirmwareSource};

/// Bytes moved from the source to flash per write.
const STAGING_BUF_SIZE: usize = 4096;

#[cfg(not(target_os = "espidf"))]
const SIM_PARTITION_SIZE: usize = 1536 * 1024;

/// Error codes reported through [`FirmwareFlasher::last_error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum FlashError {
    None = 0,
    Write = 1,
    Read = 3,
    Space = 4,
    Size = 5,
    Activate = 9,
    NoPartition = 10,
    Abort = 12,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashState {
    Idle,
    Receiving { expected: usize, written: usize },
    Finished,
    Failed,
}

pub struct OtaFlasher {
    state: FlashState,
    error: FlashError,
    staging_buf: [u8; STAGING_BUF_SIZE],
    #[cfg(target_os = "espidf")]
    ota_update: Option<esp_ota::OtaUpdate>,
    #[cfg(not(target_os = "espidf"))]
    sim_image: Vec<u8>,
    #[cfg(not(target_os = "espidf"))]
    sim_partition_size: usize,
    #[cfg(not(target_os = "espidf"))]
    sim_fail_activate: bool,
}

impl Default for OtaFlasher {
    fn default() -> Self {
        Self::new()
    }
}

impl OtaFlasher {
    pub fn new() -> Self {
        Self {
            state: FlashState::Idle,
            error: FlashError::None,
            staging_buf: [0u8; STAGING_BUF_SIZE],
            #[cfg(target_os = "espidf")]
            ota_update: None,
            #[cfg(not(target_os = "espidf"))]
            sim_image: Vec::new(),
            #[cfg(not(target_os = "espidf"))]
            sim_partition_size: SIM_PARTITION_SIZE,
            #[cfg(not(target_os = "espidf"))]
            sim_fail_activate: false,
        }
    }

    pub fn state(&self) -> FlashState {
        self.state
    }

    fn fail(&mut self, error: FlashError) {
        warn!("OTA: {:?} error", error);
        self.error = error;
        self.state = FlashState::Failed;
    }

    // ── Platform-specific ─────────────────────────────────────

    /// Size of the partition the next image would land in.
    #[cfg(target_os = "espidf")]
    fn platform_partition_size(&self) -> Option<usize> {
        // SAFETY: a null start partition asks for the next slot after the
        // running one; the returned descriptor is static.
        let part = unsafe { esp_idf_svc::sys::esp_ota_get_next_update_partition(core::ptr::null()) };
        if part.is_null() {
            return None;
        }
        Some(unsafe { (*part).size } as usize)
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_partition_size(&self) -> Option<usize> {
        Some(self.sim_partition_size)
    }

    #[cfg(target_os = "espidf")]
    fn platform_begin(&mut self) -> bool {
        match esp_ota::OtaUpdate::begin() {
            Ok(update) => {
                self.ota_update = Some(update);
                true
            }
            Err(e) => {
                warn!("esp-ota begin failed: {:?}", e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_begin(&mut self) -> bool {
        self.sim_image.clear();
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_write(&mut self, len: usize) -> bool {
        let Some(update) = self.ota_update.as_mut() else {
            return false;
        };
        match update.write(&self.staging_buf[..len]) {
            Ok(()) => true,
            Err(e) => {
                warn!("esp-ota write failed: {:?}", e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_write(&mut self, len: usize) -> bool {
        self.sim_image.extend_from_slice(&self.staging_buf[..len]);
        true
    }

    #[cfg(target_os = "espidf")]
    fn platform_activate(&mut self) -> bool {
        let Some(update) = self.ota_update.take() else {
            return false;
        };
        let mut completed = match update.finalize() {
            Ok(c) => c,
            Err(e) => {
                warn!("esp-ota finalize failed: {:?}", e);
                return false;
            }
        };
        match completed.set_as_boot_partition() {
            Ok(()) => true,
            Err(e) => {
                warn!("esp-ota set_as_boot_partition failed: {:?}", e);
                false
            }
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_activate(&mut self) -> bool {
        !self.sim_fail_activate
    }

    #[cfg(target_os = "espidf")]
    fn platform_abort(&mut self) {
        // esp-ota aborts automatically when OtaUpdate is dropped
        self.ota_update.take();
    }

    #[cfg(not(target_os = "espidf"))]
    fn platform_abort(&mut self) {
        self.sim_image.clear();
    }

    // ── Simulation controls ───────────────────────────────────

    #[cfg(not(target_os = "espidf"))]
    pub fn set_partition_size(&mut self, bytes: usize) {
        self.sim_partition_size = bytes;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn fail_activation(&mut self, fail: bool) {
        self.sim_fail_activate = fail;
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn image(&self) -> &[u8] {
        &self.sim_image
    }
}

impl FirmwareFlasher for OtaFlasher {
    fn begin(&mut self, expected_size: usize) -> bool {
        if matches!(self.state, FlashState::Receiving { .. }) {
            self.platform_abort();
        }
        self.error = FlashError::None;
        let Some(capacity) = self.platform_partition_size() else {
            self.fail(FlashError::NoPartition);
            return false;
        };
        if expected_size == 0 || expected_size > capacity {
            warn!("OTA: image {} bytes, partition holds {}", expected_size, capacity);
            self.fail(FlashError::Space);
            return false;
        }
        if !self.platform_begin() {
            self.fail(FlashError::NoPartition);
            return false;
        }
        info!("OTA: begin ({} bytes)", expected_size);
        self.state = FlashState::Receiving { expected: expected_size, written: 0 };
        true
    }

    fn write_stream(&mut self, source: &mut dyn FirmwareSource) -> usize {
        let FlashState::Receiving { expected, mut written } = self.state else {
            return 0;
        };
        while written < expected {
            let want = (expected - written).min(STAGING_BUF_SIZE);
            let n = match source.read_chunk(&mut self.staging_buf[..want]) {
                Ok(0) => break,
                Ok(n) => n.min(want),
                Err(e) => {
                    warn!("OTA: stream read failed after {} bytes ({})", written, e);
                    self.error = FlashError::Read;
                    break;
                }
            };
            if !self.platform_write(n) {
                self.error = FlashError::Write;
                break;
            }
            written += n;
        }
        self.state = FlashState::Receiving { expected, written };
        if written != expected {
            warn!("OTA: written only {}/{} bytes", written, expected);
        } else {
            info!("OTA: written {} bytes", written);
        }
        written
    }

    fn end(&mut self) -> bool {
        let FlashState::Receiving { expected, written } = self.state else {
            return false;
        };
        if written != expected {
            self.fail(FlashError::Size);
            return false;
        }
        if !self.platform_activate() {
            self.fail(FlashError::Activate);
            return false;
        }
        self.state = FlashState::Finished;
        info!("OTA: image verified and set as boot partition");
        true
    }

    fn is_finished(&self) -> bool {
        self.state == FlashState::Finished
    }

    fn last_error(&self) -> i32 {
        self.error as i32
    }

    fn abort(&mut self) {
        self.platform_abort();
        // The first cause sticks.
        if self.error == FlashError::None {
            self.error = FlashError::Abort;
        }
        self.state = FlashState::Idle;
        warn!("OTA: aborted");
    }
}

// ── Boot validation ───────────────────────────────────────────

/// Mark the running image valid so the bootloader does not roll back.
#[cfg(target_os = "espidf")]
pub fn check_rollback() {
    match esp_ota::mark_app_valid() {
        Ok(()) => info!("OTA: firmware marked valid (rollback cancelled)"),
        Err(e) => warn!("OTA: mark_app_valid failed: {:?}", e),
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn check_rollback() {
    info!("OTA rollback check (simulation): skipped");
}

// ── Tests ─────────────────────────────────────────────────────
