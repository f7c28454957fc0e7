/*!
    logical framing shared by all module types.

    A frame is a fixed size byte buffer, identical in size for request and response of a module type:

    ```text
    | command word (u32 LE) | command specific payload ... | crc32 (u32 LE, software crc only) |
    ```

    A response is only valid if its command word echoes the request's one with [ACK_FLAG] set.
*/

use bilge::prelude::*;
use crc::{Crc, CRC_32_MPEG_2};
use packbytes::{FromBytes, ToBytes, ByteArray};

use crate::{Error, pack_bilge};


/// maximum frame size accepted by the engine buffers
pub const MAX_FRAME: usize = 1024;
/// bit set by the module in the echoed command word of a response
pub const ACK_FLAG: u32 = 0x8000;
/// size of the leading command word
pub const COMMAND_LEN: usize = 4;
/// size of the trailing software checksum
pub const CRC_LEN: usize = 4;

/// same polynomial and init as the STM32 CRC peripheral
const CRC_FRAME: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);


/// leading word of every frame
#[bitsize(32)]
#[derive(Copy, Clone, FromBits, DebugBits, PartialEq, Eq, Default)]
pub struct CommandWord {
    /// module specific opcode
    pub code: u15,
    /// set by the module when answering
    pub ack: bool,
    /// unused by current modules, must be echoed
    pub extended: u16,
}
pack_bilge!(CommandWord, u32);

impl CommandWord {
    /// command word for a module opcode, opcodes are below [ACK_FLAG]
    pub fn of(opcode: u16) -> Self {
        Self::from(u32::from(opcode & 0x7fff))
    }
    /// the word a module answers with
    pub fn acknowledged(self) -> Self {
        let mut word = self;
        word.set_ack(true);
        word
    }
    /// true if this response word is the acknowledge of `request`
    pub fn echoes(self, request: Self) -> bool {
        u32::from(self) == u32::from(request) | ACK_FLAG
    }
    pub fn opcode(self) -> u16 {
        self.code().value()
    }
}

/**
    body of the `GET_INFO` response, placed right after the command word for every module type

    it carries the same identity as the bring-up handshake, so a resynchronization refreshes it
*/
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct InfoBody {
    pub firmware_major: u8,
    pub firmware_minor: u8,
    pub reserved: u16,
    pub hardware_id: [u32; 3],
}

/// write the command word at the start of a frame
pub fn write_command(frame: &mut [u8], word: CommandWord) {
    frame[.. COMMAND_LEN].copy_from_slice(&u32::from(word).to_le_bytes());
}
/// read the command word at the start of a frame
pub fn read_command(frame: &[u8]) -> CommandWord {
    let mut raw = [0; COMMAND_LEN];
    raw.copy_from_slice(&frame[.. COMMAND_LEN]);
    CommandWord::from(u32::from_le_bytes(raw))
}

/// checksum of all bytes but the trailing crc word
pub fn checksum(frame: &[u8]) -> u32 {
    CRC_FRAME.checksum(&frame[.. frame.len().saturating_sub(CRC_LEN)])
}
/// write the trailing crc word
pub fn seal(frame: &mut [u8]) {
    let end = frame.len();
    if end < CRC_LEN
        {return}
    let crc = checksum(frame);
    frame[end - CRC_LEN ..].copy_from_slice(&crc.to_le_bytes());
}
/// check the trailing crc word
pub fn verify(frame: &[u8]) -> bool {
    if frame.len() < COMMAND_LEN + CRC_LEN
        {return false}
    let mut trailing = [0; CRC_LEN];
    trailing.copy_from_slice(&frame[frame.len() - CRC_LEN ..]);
    u32::from_le_bytes(trailing) == checksum(frame)
}

/// number of bytes of a packed value
pub fn packed_size<T: ToBytes>() -> usize {
    T::Bytes::SIZE
}
/// pack a value at the start of `dst`
pub fn encode<T: ToBytes>(value: T, dst: &mut [u8]) -> Result<usize, Error> {
    let bytes = value.to_le_bytes();
    let size = T::Bytes::SIZE;
    if size > dst.len()
        {return Err(Error::FrameTooLarge)}
    dst[.. size].copy_from_slice(bytes.as_ref());
    Ok(size)
}
/// unpack a value from the start of `src`
pub fn decode<T: FromBytes>(src: &[u8]) -> Result<T, Error> {
    let mut bytes = T::Bytes::zeroed();
    let size = T::Bytes::SIZE;
    if size > src.len()
        {return Err(Error::FrameTooLarge)}
    bytes.as_mut().copy_from_slice(&src[.. size]);
    Ok(T::from_le_bytes(bytes))
}
