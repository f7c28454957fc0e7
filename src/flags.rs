/*!
    sticky flags set from interrupt context and consumed by the slot tick

    there is exactly one producer (the transport interrupts) and one consumer (the tick) per slot.
    The producer publishes with `Release`, the consumer takes with `Acquire`, so everything the
    interrupt wrote to the DMA buffer before raising a flag is visible to the tick after taking it.
*/

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering::*};
use crate::transport::TransferStatus;


/// no completion pending
const NO_COMPLETION: u8 = u8::MAX;

pub struct EventFlags {
    /// rising edge of the module "slave ready" line
    ready: AtomicBool,
    /// status of the last finished transfer, [NO_COMPLETION] if already consumed
    completion: AtomicU8,
}
impl EventFlags {
    pub const fn new() -> Self {
        Self {
            ready: AtomicBool::new(false),
            completion: AtomicU8::new(NO_COMPLETION),
        }
    }

    /// interrupt side: the module raised its ready line
    pub fn signal_ready(&self) {
        self.ready.store(true, Release);
    }
    /// interrupt side: the pending DMA transfer finished with the given status
    pub fn signal_completion(&self, status: TransferStatus) {
        self.completion.store(status as u8, Release);
    }

    /// tick side: consume a ready edge
    pub fn take_ready(&self) -> bool {
        self.ready.swap(false, Acquire)
    }
    /// tick side: consume a transfer completion
    pub fn take_completion(&self) -> Option<TransferStatus> {
        TransferStatus::from_raw(self.completion.swap(NO_COMPLETION, Acquire))
    }
    /// forget a completion that belongs to an aborted transfer
    pub fn clear_completion(&self) {
        self.completion.store(NO_COMPLETION, Release);
    }
    /// forget everything, used when a module is removed
    pub fn clear(&self) {
        self.ready.store(false, Release);
        self.clear_completion();
    }
}
impl Default for EventFlags {
    fn default() -> Self {
        Self::new()
    }
}
