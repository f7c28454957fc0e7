/*!
    tunable constants of a link

    values differ between module types without a documented reason, so each module type carries its own
    [LinkConfig] (see [crate::catalog::ModuleKind::config]) rather than sharing a global one.
*/

use crate::transport::CrcMode;


/// monotonic milliseconds provided by the system clock, wrapping
pub type Millis = u32;

/// milliseconds elapsed from `since` to `now`, correct across clock wrap
pub fn elapsed(now: Millis, since: Millis) -> u32 {
    now.wrapping_sub(since)
}

/// wall clock budget of every exchange state
pub const STATE_TIMEOUT_MS: u32 = 350;
/// time without successful exchange before a link is declared out of sync
pub const OUT_OF_SYNC_TIMEOUT_MS: u32 = 10_000;
/// bring-up handshake window
pub const SYNC_WINDOW_MS: u32 = 1000;
/// period of ready line polling during the handshake
pub const SYNC_POLL_MS: u32 = 1;


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LinkConfig {
    /// attempts of one command before it fails
    pub max_retries: u32,
    /// budget of each exchange state
    pub state_timeout_ms: u32,
    /// time without success before declaring the link desynchronized
    pub out_of_sync_timeout_ms: u32,
    /// period of state polling
    pub refresh_interval_ms: u32,
    /// period of state polling while the module streams data
    pub streaming_refresh_ms: u32,
    /// consecutive crc errors before escalation
    pub crc_error_threshold: u32,
    /// consecutive transfer errors before escalation
    pub transfer_error_threshold: u32,
    pub sync_window_ms: u32,
    pub sync_poll_ms: u32,
    pub crc_mode: CrcMode,
}

impl LinkConfig {
    /// modules with latency sensitive outputs, faults are reported quickly
    pub const fn latency_sensitive() -> Self {
        Self {
            max_retries: 10,
            state_timeout_ms: STATE_TIMEOUT_MS,
            out_of_sync_timeout_ms: OUT_OF_SYNC_TIMEOUT_MS,
            refresh_interval_ms: 250,
            streaming_refresh_ms: 50,
            crc_error_threshold: 10,
            transfer_error_threshold: 10,
            sync_window_ms: SYNC_WINDOW_MS,
            sync_poll_ms: SYNC_POLL_MS,
            crc_mode: CrcMode::Software,
        }
    }
    /// relay style modules, slow to switch and tolerant to long noise bursts
    pub const fn relay() -> Self {
        Self {
            max_retries: 100,
            state_timeout_ms: STATE_TIMEOUT_MS,
            out_of_sync_timeout_ms: OUT_OF_SYNC_TIMEOUT_MS,
            refresh_interval_ms: 1000,
            streaming_refresh_ms: 1000,
            crc_error_threshold: 100,
            transfer_error_threshold: 100,
            sync_window_ms: SYNC_WINDOW_MS,
            sync_poll_ms: SYNC_POLL_MS,
            crc_mode: CrcMode::Software,
        }
    }

    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
    pub const fn with_thresholds(mut self, crc: u32, transfer: u32) -> Self {
        self.crc_error_threshold = crc;
        self.transfer_error_threshold = transfer;
        self
    }
    pub const fn with_refresh(mut self, refresh_ms: u32, streaming_ms: u32) -> Self {
        self.refresh_interval_ms = refresh_ms;
        self.streaming_refresh_ms = streaming_ms;
        self
    }
    pub const fn with_timeouts(mut self, state_ms: u32, out_of_sync_ms: u32) -> Self {
        self.state_timeout_ms = state_ms;
        self.out_of_sync_timeout_ms = out_of_sync_ms;
        self
    }
    pub const fn with_crc_mode(mut self, mode: CrcMode) -> Self {
        self.crc_mode = mode;
        self
    }
}
impl Default for LinkConfig {
    fn default() -> Self {
        Self::latency_sensitive()
    }
}
