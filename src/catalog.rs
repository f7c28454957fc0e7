/*!
    static description of module types and of their command sets

    every module type defines a closed command enum implementing [CommandSet], so the scheduler and the
    module callbacks match on it exhaustively. The [Descriptor] table of a command set maps opcodes back
    to commands for diagnostics.
*/

use core::fmt::Debug;
use crate::{
    config::LinkConfig,
    frame::CommandWord,
    transport::CrcMode,
    };


/// module types that can populate a slot
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    #[default]
    None,
    /// multi I/O module with data logging and disk access
    Mio168,
    /// six relays module
    Prel6,
    /// 4x6 matrix switch
    Smx46,
    /// relay multiplexer
    Mux14d,
}
impl ModuleKind {
    /// module revision expected during the handshake
    pub const fn revision(self) -> u16 {
        match self {
            Self::None => 0,
            Self::Mio168 => 0x0102,
            Self::Prel6 => 0x0101,
            Self::Smx46 => 0x0103,
            Self::Mux14d => 0x0101,
        }
    }
    pub const fn config(self) -> LinkConfig {
        match self {
            Self::Mio168 | Self::None => LinkConfig::latency_sensitive(),
            Self::Prel6 | Self::Mux14d => LinkConfig::relay(),
            Self::Smx46 => LinkConfig::relay().with_crc_mode(CrcMode::Peripheral),
        }
    }
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Mio168 => "MIO168",
            Self::Prel6 => "PREL6",
            Self::Smx46 => "SMX46",
            Self::Mux14d => "MUX14D",
        }
    }
}

/**
    closed set of commands understood by one module type

    the engine only needs to know the three commands every module implements, anything else comes from
    the module's own scheduling hooks
*/
pub trait CommandSet: Copy + Eq + Debug + 'static {
    /// opcode of the no-op request used to fetch a pending response
    const POLL: u16;
    const GET_INFO: Self;
    const GET_STATE: Self;
    const SET_PARAMS: Self;

    fn opcode(self) -> u16;
    fn catalog() -> &'static [Descriptor<Self>];

    fn word(self) -> CommandWord {
        CommandWord::of(self.opcode())
    }
    /// command carrying the given opcode
    fn find(opcode: u16) -> Option<Self> {
        Self::catalog().iter()
            .find(|descriptor| descriptor.opcode == opcode)
            .map(|descriptor| descriptor.command)
    }
    fn name(self) -> &'static str {
        Self::catalog().iter()
            .find(|descriptor| descriptor.command == self)
            .map_or("unknown", |descriptor| descriptor.name)
    }
}

/// one row of a module command table
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Descriptor<C> {
    pub command: C,
    pub opcode: u16,
    pub name: &'static str,
}
impl<C> Descriptor<C> {
    pub const fn new(command: C, opcode: u16, name: &'static str) -> Self {
        Self {command, opcode, name}
    }
}

/// true if no two commands share an opcode and none collides with the poll marker
pub fn is_consistent<C: CommandSet>() -> bool {
    let table = C::catalog();
    table.iter().enumerate().all(|(i, descriptor)| {
        descriptor.opcode != C::POLL
        && descriptor.opcode == descriptor.command.opcode()
        && table[i+1 ..].iter().all(|other| other.opcode != descriptor.opcode)
    })
}
