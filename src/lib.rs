/*!
    master side of the slot communication protocol linking a controller board to its pluggable modules.

    Each physical slot is driven by one [slot::Slot], a generic engine combining

    - a [transport::Transport] moving fixed size frames (real SPI+DMA driver or [sim::SimTransport])
    - the [exchange::Exchange] state machine carrying one command/response pair at a time
    - the [scheduler] choosing the next command from link state, parameter changes and refresh cadence
    - the [escalation] policy turning repeated transfer failures into system events

    Module types only provide their frame layouts, their command enum and their callbacks, see [module::Module].
*/
#![no_std]
#[cfg(any(test, feature = "std"))]
extern crate std;

mod mutex;
mod utils;

pub mod frame;
pub mod flags;
pub mod transport;
pub mod config;
pub mod link;
pub mod catalog;
pub mod exchange;
pub mod escalation;
pub mod params;
pub mod scheduler;
pub mod module;
pub mod slot;
pub mod sim;
pub mod modules;
#[cfg(feature = "host")]
pub mod host;

pub use mutex::{BusyMutex, BusyMutexGuard};

use thiserror::Error;

/// error regarding the slot protocol
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("module did not answer the handshake in time")]
    HandshakeTimeout,
    #[error("transfer failed with status {0:?}")]
    Transfer(transport::TransferStatus),
    #[error("frame integrity check failed")]
    Crc,
    #[error("response does not echo the request command")]
    ResponseMismatch,
    #[error("command failed after exhausting its retries")]
    RetryExhausted,
    #[error("link is not synchronized with its module")]
    Desynchronized,
    #[error("parameters were not transferred in expected time")]
    ParamConfirmTimeout,
    #[error("slot is already populated")]
    SlotOccupied,
    #[error("no module in this slot")]
    SlotEmpty,
    #[error("frame is longer than maximum allowed frame")]
    FrameTooLarge,
}
