/*!
    callback surface between the protocol engine and module specific code

    a module type provides its frame layouts, its command set and a [Module] implementation. It holds no
    protocol logic: it fills requests, consumes responses and tells the scheduler what it wants next.
*/

use packbytes::{FromBytes, ToBytes};
use crate::{
    Error,
    catalog::{CommandSet, ModuleKind},
    config::LinkConfig,
    escalation::SystemEvent,
    link::SlotLink,
    };


/// work deferred out of the polling tick to a low priority thread
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Deferred {
    pub slot: u8,
    pub job: Job,
}
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Job {
    /// serve a disk sector read requested by the module
    DiskRead { sector: u32, count: u16 },
    /// store a disk sector sent by the module
    DiskWrite { sector: u32, count: u16 },
    /// flush a chunk of streamed data log samples
    DlogFlush { samples: u16 },
}

/// services of the system layer used by the engine
pub trait System {
    /// post a fault event to the system event queue
    fn push_event(&mut self, event: SystemEvent);
    /// run an expensive side effect outside of the tick
    fn defer(&mut self, work: Deferred);
}

/// module specific half of a slot
pub trait Module {
    type Command: CommandSet;
    /// request frame layout, starting with the command word
    type Request: FromBytes + ToBytes + Default;
    /// response frame layout, same packed size as the request
    type Response: FromBytes + ToBytes + Default;
    /// parameter block pushed with `SET_PARAMS`
    type Params: FromBytes + ToBytes + Copy;

    const KIND: ModuleKind;

    /// link tuning of this module, defaults to its kind's
    fn config(&self) -> LinkConfig {
        Self::KIND.config()
    }

    /**
        fill the request of `command`

        `params` is the snapshot the scheduler decided to push, it only matters for `SET_PARAMS`.
        The command word and the crc word are written by the engine.
    */
    fn fill_request(&mut self, command: Self::Command, link: &SlotLink, params: &Self::Params, request: &mut Self::Request) -> Result<(), Error>;

    /// consume the outcome of a command, `response` is meaningless when `success` is false
    fn on_result(&mut self, command: Self::Command, link: &SlotLink, response: &Self::Response, success: bool, system: &mut dyn System);

    /// current parameter block built from the module configuration
    fn live_params(&self) -> Self::Params;

    /// `params` was acknowledged by the module
    fn params_transferred(&mut self, _params: &Self::Params) {}

    /// command that must preempt periodic work, if any
    fn urgent_command(&mut self, _link: &SlotLink) -> Option<Self::Command> {
        None
    }
    /// lowest priority bulk transfer, if any is due
    fn data_pull(&mut self, _link: &SlotLink) -> Option<Self::Command> {
        None
    }
    /// state polling period, modules streaming data may poll faster
    fn refresh_interval(&self, config: &LinkConfig) -> u32 {
        config.refresh_interval_ms
    }
    /// the module was removed from its slot
    fn removed(&mut self) {}
}
