/*!
    turn repeated transfer failures into user visible faults

    bursts of SPI noise shorter than the module's threshold stay invisible, a link failing longer than
    that is desynchronized and reported once through the system event queue.
*/

use log::*;
use crate::{
    config::LinkConfig,
    exchange::Failure,
    link::SlotLink,
    };


/// kind of fault reported to the system layer
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// link desynchronized by timeout or transfer errors
    SyncError,
    /// link desynchronized by integrity errors
    CrcCheckError,
}

/// fault event pushed to the system event queue
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SystemEvent {
    pub kind: EventKind,
    pub slot: u8,
}

impl SlotLink {
    /// an exchange succeeded, consecutive counters start over
    pub fn clear_errors(&mut self) {
        self.crc_error_count = 0;
        self.transfer_error_count = 0;
    }

    /**
        count a failed attempt, returns the event to raise if a threshold is reached

        only a synchronized link escalates: a link that is already down keeps counting silently
        until the next successful `GET_INFO`
    */
    pub fn count_failure(&mut self, failure: Failure, config: &LinkConfig) -> Option<SystemEvent> {
        let (count, threshold, kind) = if failure.is_crc() {
            self.crc_error_count = self.crc_error_count.saturating_add(1);
            (self.crc_error_count, config.crc_error_threshold, EventKind::CrcCheckError)
        }
        else {
            self.transfer_error_count = self.transfer_error_count.saturating_add(1);
            (self.transfer_error_count, config.transfer_error_threshold, EventKind::SyncError)
        };
        if self.synchronized && count >= threshold {
            warn!("slot {}: {} consecutive failures, last {:?}, link desynchronized", self.slot, count, failure);
            self.desynchronize();
            return Some(SystemEvent {kind, slot: self.slot});
        }
        None
    }

    /// check the out of sync timeout, returns the event to raise if the link just expired
    pub fn check_out_of_sync(&mut self, now: crate::config::Millis, config: &LinkConfig) -> Option<SystemEvent> {
        if self.synchronized && self.since_success(now) >= config.out_of_sync_timeout_ms {
            warn!("slot {}: no successful exchange for {} ms, link desynchronized", self.slot, self.since_success(now));
            self.desynchronize();
            return Some(SystemEvent {kind: EventKind::SyncError, slot: self.slot});
        }
        None
    }
}
