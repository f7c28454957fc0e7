/*!
    physical link to one slot

    The engine never touches chip select, SPI or DMA registers itself, it goes through a [Transport].
    The real firmware implements it on top of the SPI+DMA driver, host tests use [crate::sim::SimTransport].
*/

use packbytes::{FromBytes, ToBytes};
use crate::{
    Error,
    flags::EventFlags,
    frame,
    };


/// result of a transfer, or of the start of an asynchronous one
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TransferStatus {
    Ok = 0,
    Error = 1,
    Busy = 2,
    Timeout = 3,
    CrcError = 4,
}
impl TransferStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
    pub fn into_result(self) -> Result<(), Error> {
        match self {
            Self::Ok => Ok(()),
            Self::CrcError => Err(Error::Crc),
            other => Err(Error::Transfer(other)),
        }
    }
    pub(crate) fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Ok),
            1 => Some(Self::Error),
            2 => Some(Self::Busy),
            3 => Some(Self::Timeout),
            4 => Some(Self::CrcError),
            _ => None,
        }
    }
}

/// who computes and checks frame integrity
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CrcMode {
    /// trailing crc32 word computed and checked in software (or by the CRC peripheral over `len - 4` bytes)
    Software,
    /// the SPI peripheral appends and checks its own crc on the wire, frames carry no crc word
    Peripheral,
}

/// byte sent by the master to start a handshake
pub const HANDSHAKE: u8 = 0x53;

/// handshake frame sent by the master
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default)]
pub struct SyncRequest {
    pub handshake: u8,
    pub reserved: u8,
    /// module revision the master expects in this slot
    pub revision: u16,
}
/// handshake frame answered by the module
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    /// module protocol sync byte, zero when no module answered
    pub sync: u8,
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub reserved: u8,
    pub hardware_id: [u32; 3],
}

/**
    fixed size frame transport to the module of one slot

    the asynchronous path owns its DMA buffers: [Transport::start_transfer] copies the outgoing frame
    in, and once [EventFlags] reported the completion, [Transport::read_response] copies the received
    frame out. Request and response of a module type have the same size so one buffer pair is enough.
*/
pub trait Transport {
    /// flags raised by this transport's interrupts
    fn events(&self) -> &EventFlags;

    /**
        blocking handshake, only used once per cold bring-up

        sends [HANDSHAKE] and the expected module revision, then polls the ready line every `poll_ms`
        for at most `window_ms`. Fails with [Error::HandshakeTimeout] if the module never answers.
    */
    fn synchronize(&mut self, revision: u16, window_ms: u32, poll_ms: u32) -> Result<Identity, Error>;

    /// synchronous send/receive of `tx.len()` bytes, including integrity check
    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> TransferStatus;

    /// start a DMA transfer, the returned status only tells whether it started
    fn start_transfer(&mut self, tx: &[u8]) -> TransferStatus;

    /// copy the frame received by the last completed DMA transfer
    fn read_response(&mut self, rx: &mut [u8]);

    /// cancel the DMA transfer in flight if any, the transport is ready for a new start afterwards
    fn abort(&mut self);
}

/// copy an outgoing frame into a transport buffer, appending the crc word if computed in software
pub fn prepare(mode: CrcMode, tx: &[u8], buffer: &mut [u8]) -> Result<usize, Error> {
    if tx.len() > buffer.len()
        {return Err(Error::FrameTooLarge)}
    let buffer = &mut buffer[.. tx.len()];
    buffer.copy_from_slice(tx);
    if mode == CrcMode::Software {
        frame::seal(buffer);
    }
    Ok(tx.len())
}
/// integrity status of a received frame
pub fn check(mode: CrcMode, rx: &[u8]) -> TransferStatus {
    match mode {
        CrcMode::Software if !frame::verify(rx) => TransferStatus::CrcError,
        _ => TransferStatus::Ok,
    }
}
