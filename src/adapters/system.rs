//! ESP32 system services adapter.
//!
//! Implements [`SystemPort`]: monotonic uptime, free heap, and reboot.
//!
//! - **`target_os = "espidf"`**: `esp_timer_get_time()`,
//!   `esp_get_free_heap_size()` and `esp_restart()`.
//! - **all other targets**: `std::time::Instant` for uptime, a
//!   fixed heap figure, and a recorded restart request for tests.

use log::info;

use crate::app::ports::SystemPort;

pub struct EspSystem {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    #[cfg(not(target_os = "espidf"))]
    restart_requested: bool,
}

impl Default for EspSystem {
    fn default() -> Self {
        Self::new()
    }
}

impl EspSystem {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            #[cfg(not(target_os = "espidf"))]
            restart_requested: false,
        }
    }

    /// Simulation: whether [`SystemPort::restart`] was called.
    #[cfg(not(target_os = "espidf"))]
    pub fn restart_requested(&self) -> bool {
        self.restart_requested
    }
}

#[cfg(target_os = "espidf")]
impl SystemPort for EspSystem {
    fn uptime_ms(&self) -> u64 {
        // SAFETY: reads the high-resolution timer; no preconditions.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1000
    }

    fn free_heap(&self) -> u32 {
        // SAFETY: heap statistics query; no preconditions.
        unsafe { esp_idf_svc::sys::esp_get_free_heap_size() }
    }

    fn restart(&mut self) {
        info!("System: restarting");
        // SAFETY: does not return.
        unsafe { esp_idf_svc::sys::esp_restart() }
    }
}

#[cfg(not(target_os = "espidf"))]
impl SystemPort for EspSystem {
    fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    fn free_heap(&self) -> u32 {
        200_000
    }

    fn restart(&mut self) {
        info!("System(sim): restart requested");
        self.restart_requested = true;
    }
}
