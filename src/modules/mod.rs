/*!
    module types that can populate a slot

    each module type only declares its frame layout, its command set, its parameter and state blocks, and
    reacts to command results. Parameter blocks live in a [crate::params::ParamsCell] reached through any
    `Deref` handle: a `&'static` cell on the firmware, an `Arc` on host.
*/

pub mod prel6;
pub mod smx46;
pub mod mux14d;
pub mod mio168;

pub use prel6::Prel6;
pub use smx46::Smx46;
pub use mux14d::Mux14d;
pub use mio168::Mio168;

/// opcodes shared by every module firmware
pub mod opcodes {
    pub const GET_INFO: u16 = 0x0001;
    pub const GET_STATE: u16 = 0x0002;
    pub const SET_PARAMS: u16 = 0x0003;
    /// no-op request fetching the pending response
    pub const POLL: u16 = 0x7fff;
}
