use log::*;

use crate::{
    catalog::ModuleKind,
    config::{Millis, elapsed},
    frame::InfoBody,
    transport::{CrcMode, Identity},
    };


/// self test result reported to the user for a slot
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TestResult {
    /// no module, or never probed
    #[default]
    None,
    /// handshake or first `GET_INFO` in progress
    Connecting,
    Ok,
    Failed,
}

/**
    bookkeeping of the link to one slot

    created when the slot's module type is probed at boot, mutated by the exchange engine on every
    transfer outcome, and reset to an empty state when the module is removed.
*/
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotLink {
    pub slot: u8,
    pub kind: ModuleKind,
    /// a `GET_INFO` succeeded since the last desynchronization
    pub synchronized: bool,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    /// three identity words of the module hardware
    pub hardware_id: [u32; 3],
    /// integrity is checked by the SPI peripheral instead of a trailing crc word
    pub spi_crc_enabled: bool,
    /// time of the last successful exchange
    pub last_success: Millis,
    /// consecutive crc failures since the last successful exchange
    pub crc_error_count: u32,
    /// consecutive other transfer failures since the last successful exchange
    pub transfer_error_count: u32,
    pub test_result: TestResult,
}

impl SlotLink {
    pub fn new(slot: u8, kind: ModuleKind, crc_mode: CrcMode) -> Self {
        Self {
            slot,
            kind,
            synchronized: false,
            firmware_major: 0,
            firmware_minor: 0,
            hardware_id: [0; 3],
            spi_crc_enabled: crc_mode == CrcMode::Peripheral,
            last_success: 0,
            crc_error_count: 0,
            transfer_error_count: 0,
            test_result: TestResult::None,
        }
    }
    /// module removed from the slot, only the slot index survives
    pub fn reset(&mut self) {
        info!("slot {}: module removed", self.slot);
        *self = Self::new(self.slot, ModuleKind::None, CrcMode::Software);
    }

    pub fn firmware_version(&self) -> (u8, u8) {
        (self.firmware_major, self.firmware_minor)
    }
    /// milliseconds since the last successful exchange
    pub fn since_success(&self, now: Millis) -> u32 {
        elapsed(now, self.last_success)
    }

    /// identity returned by the bring-up handshake
    pub(crate) fn set_identity(&mut self, identity: &Identity) {
        self.firmware_major = identity.firmware_major;
        self.firmware_minor = identity.firmware_minor;
        self.hardware_id = identity.hardware_id;
    }
    /// identity returned by a `GET_INFO`
    pub(crate) fn apply_info(&mut self, info: &InfoBody) {
        self.firmware_major = info.firmware_major;
        self.firmware_minor = info.firmware_minor;
        self.hardware_id = info.hardware_id;
    }
    pub(crate) fn mark_synchronized(&mut self, now: Millis) {
        if !self.synchronized {
            info!("slot {}: synchronized with {:?} firmware {}.{}",
                self.slot, self.kind, self.firmware_major, self.firmware_minor);
        }
        self.synchronized = true;
        self.test_result = TestResult::Ok;
        self.last_success = now;
    }
    /// only a fresh `GET_INFO` can bring the link back
    pub(crate) fn desynchronize(&mut self) {
        self.synchronized = false;
        self.test_result = TestResult::Failed;
    }
}
