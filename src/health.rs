//! Periodic health report published retained to `…/status`.

use serde::Serialize;

use crate::connectivity::{LinkState, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub free_heap: u32,
    /// Seconds since boot
    pub uptime: u64,
    pub link: LinkState,
    pub session: SessionState,
    pub cycles: u32,
    pub failed_reads: u32,
    pub firmware: &'static str,
}

impl HealthReport {
    pub fn to_json(&self) -> Vec<u8> {
        // Only plain numbers, unit enums and a str; serialization cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}
