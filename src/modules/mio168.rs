/*!
    MIO168: multi I/O module with analog outputs, data logging and access to the controller's disk

    besides the three commands every module implements, this module asks the scheduler for

    - data log start/stop, urgent, whenever the requested logging (non zero [Params::dlog_period_ms])
      differs from what the module reports
    - a disk operation, urgent, whenever the module reports a disk request not yet served. The disk access
      itself is deferred to the low priority thread
    - data log chunks, lowest priority, while the module holds unread samples
*/

use core::ops::Deref;
use log::*;
use packbytes::{FromBytes, ToBytes};
use crate::{
    Error,
    pack_enum,
    catalog::{CommandSet, Descriptor, ModuleKind},
    config::LinkConfig,
    frame::{self, CommandWord},
    link::SlotLink,
    module::{Deferred, Job, Module, System},
    params::ParamsCell,
    };
use super::opcodes;


pub const ANALOG_OUTPUTS: usize = 4;
pub const ANALOG_INPUTS: usize = 8;
/// samples requested by one data log pull
pub const DLOG_CHUNK: u16 = 24;
const BODY: usize = 64;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    GetInfo = opcodes::GET_INFO,
    GetState = opcodes::GET_STATE,
    SetParams = opcodes::SET_PARAMS,
    DlogStart = 0x0010,
    DlogStop = 0x0011,
    DlogData = 0x0012,
    DiskRead = 0x0020,
    DiskWrite = 0x0021,
}
static CATALOG: [Descriptor<Command>; 8] = [
    Descriptor::new(Command::GetInfo, opcodes::GET_INFO, "get-info"),
    Descriptor::new(Command::GetState, opcodes::GET_STATE, "get-state"),
    Descriptor::new(Command::SetParams, opcodes::SET_PARAMS, "set-params"),
    Descriptor::new(Command::DlogStart, 0x0010, "dlog-start"),
    Descriptor::new(Command::DlogStop, 0x0011, "dlog-stop"),
    Descriptor::new(Command::DlogData, 0x0012, "dlog-data"),
    Descriptor::new(Command::DiskRead, 0x0020, "disk-read"),
    Descriptor::new(Command::DiskWrite, 0x0021, "disk-write"),
    ];
impl CommandSet for Command {
    const POLL: u16 = opcodes::POLL;
    const GET_INFO: Self = Self::GetInfo;
    const GET_STATE: Self = Self::GetState;
    const SET_PARAMS: Self = Self::SetParams;

    fn opcode(self) -> u16  {self as u16}
    fn catalog() -> &'static [Descriptor<Self>]  {&CATALOG}
}

/// request and response layout
#[derive(Copy, Clone, FromBytes, ToBytes, Debug)]
pub struct Frame {
    pub command: CommandWord,
    pub body: [u8; BODY],
    pub crc: u32,
}
impl Default for Frame {
    fn default() -> Self {
        Self {
            command: CommandWord::default(),
            body: [0; BODY],
            crc: 0,
        }
    }
}

#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct Params {
    /// digital outputs levels
    pub outputs: u8,
    /// bit `i` enables analog output `i`
    pub enables: u8,
    pub reserved: u16,
    /// analog outputs setpoints in DAC counts
    pub analog: [u16; ANALOG_OUTPUTS],
    /// sampling period of the data log, 0 stops logging
    pub dlog_period_ms: u16,
    /// bit `i` logs analog input `i`
    pub dlog_channels: u8,
    pub reserved2: u8,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum DiskOp {
    #[default]
    None = 0,
    Read = 1,
    Write = 2,
}
pack_enum!(DiskOp, DiskOp::None, [DiskOp::None, DiskOp::Read, DiskOp::Write]);

/// disk access requested by the module
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct DiskRequest {
    pub op: DiskOp,
    pub reserved: u8,
    pub count: u16,
    pub sector: u32,
}

#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub inputs: u8,
    pub outputs: u8,
    /// non zero while the data log runs
    pub dlog_running: u8,
    pub reserved: u8,
    pub analog: [u16; ANALOG_INPUTS],
    /// logged samples not pulled yet
    pub samples: u16,
    pub reserved2: u16,
    pub disk: DiskRequest,
}

/// body of a `DLOG_START` request
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct DlogConfig {
    pub period_ms: u16,
    pub channels: u8,
    pub reserved: u8,
}
/// body of a `DLOG_DATA` response, the request carries the number of samples wanted in `samples`
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct DlogChunk {
    pub samples: u16,
    pub channels: u8,
    pub reserved: u8,
    pub data: [u16; DLOG_CHUNK as usize],
}

pub struct Mio168<C = &'static ParamsCell<Params>> {
    params: C,
    state: Option<State>,
    /// module reported logging
    streaming: bool,
    /// samples waiting on the module
    samples: u16,
    /// disk request waiting to be served
    disk: Option<DiskRequest>,
    /// last disk request served, the module keeps reporting it until its next state update
    served: Option<DiskRequest>,
    pulled: u32,
}
impl<C: Deref<Target = ParamsCell<Params>>> Mio168<C> {
    pub fn new(params: C) -> Self {
        Self {
            params,
            state: None,
            streaming: false,
            samples: 0,
            disk: None,
            served: None,
            pulled: 0,
        }
    }
    pub fn params(&self) -> &ParamsCell<Params>  {&self.params}
    pub fn state(&self) -> Option<&State>  {self.state.as_ref()}
    pub fn is_streaming(&self) -> bool  {self.streaming}
    /// samples pulled since the module was inserted
    pub fn pulled(&self) -> u32  {self.pulled}
    pub fn pending_disk(&self) -> Option<DiskRequest>  {self.disk}

    fn update_state(&mut self, state: State) {
        self.streaming = state.dlog_running != 0;
        self.samples = state.samples;
        self.disk = match state.disk.op {
            DiskOp::None => {
                self.served = None;
                None
            },
            _ if self.served == Some(state.disk) => None,
            _ => Some(state.disk),
        };
        self.state = Some(state);
    }
}

impl<C: Deref<Target = ParamsCell<Params>>> Module for Mio168<C> {
    type Command = Command;
    type Request = Frame;
    type Response = Frame;
    type Params = Params;

    const KIND: ModuleKind = ModuleKind::Mio168;

    fn fill_request(&mut self, command: Command, _link: &SlotLink, params: &Params, request: &mut Frame) -> Result<(), Error> {
        match command {
            Command::SetParams => {
                frame::encode(*params, &mut request.body)?;
            },
            Command::DlogStart => {
                let config = DlogConfig {
                    period_ms: params.dlog_period_ms,
                    channels: params.dlog_channels,
                    reserved: 0,
                };
                frame::encode(config, &mut request.body)?;
            },
            Command::DlogData => {
                frame::encode(DLOG_CHUNK, &mut request.body)?;
            },
            Command::DiskRead | Command::DiskWrite => {
                frame::encode(self.disk.unwrap_or_default(), &mut request.body)?;
            },
            Command::GetInfo | Command::GetState | Command::DlogStop => {},
        }
        Ok(())
    }

    fn on_result(&mut self, command: Command, link: &SlotLink, response: &Frame, success: bool, system: &mut dyn System) {
        if !success
            {return}
        match command {
            Command::GetState => {
                if let Ok(state) = frame::decode::<State>(&response.body) {
                    self.update_state(state);
                }
            },
            Command::DlogStart => {
                info!("slot {}: data log started", link.slot);
                self.streaming = true;
            },
            Command::DlogStop => {
                info!("slot {}: data log stopped, {} samples pulled", link.slot, self.pulled);
                self.streaming = false;
                self.samples = 0;
            },
            Command::DlogData => {
                let Ok(chunk) = frame::decode::<DlogChunk>(&response.body)
                    else {return};
                let samples = chunk.samples.min(DLOG_CHUNK);
                self.samples = self.samples.saturating_sub(samples);
                self.pulled = self.pulled.wrapping_add(u32::from(samples));
                if samples != 0 {
                    system.defer(Deferred {slot: link.slot, job: Job::DlogFlush {samples}});
                }
            },
            Command::DiskRead | Command::DiskWrite => {
                let Some(request) = self.disk.take()
                    else {return};
                let job = match command {
                    Command::DiskRead => Job::DiskRead {sector: request.sector, count: request.count},
                    _ => Job::DiskWrite {sector: request.sector, count: request.count},
                };
                debug!("slot {}: deferring {:?}", link.slot, job);
                system.defer(Deferred {slot: link.slot, job});
                self.served = Some(request);
            },
            Command::GetInfo | Command::SetParams => {},
        }
    }

    fn live_params(&self) -> Params {
        self.params.snapshot()
    }
    fn params_transferred(&mut self, params: &Params) {
        self.params.mark_transferred(*params);
    }

    fn urgent_command(&mut self, _link: &SlotLink) -> Option<Command> {
        let wanted = self.params.snapshot().dlog_period_ms != 0;
        if wanted && !self.streaming
            {return Some(Command::DlogStart)}
        if !wanted && self.streaming
            {return Some(Command::DlogStop)}
        match self.disk?.op {
            DiskOp::Read => Some(Command::DiskRead),
            DiskOp::Write => Some(Command::DiskWrite),
            DiskOp::None => None,
        }
    }
    fn data_pull(&mut self, _link: &SlotLink) -> Option<Command> {
        (self.streaming && self.samples != 0).then_some(Command::DlogData)
    }
    fn refresh_interval(&self, config: &LinkConfig) -> u32 {
        if self.streaming {config.streaming_refresh_ms}
        else {config.refresh_interval_ms}
    }
    fn removed(&mut self) {
        self.params.forget_transferred();
        self.state = None;
        self.streaming = false;
        self.samples = 0;
        self.disk = None;
        self.served = None;
        self.pulled = 0;
    }
}
