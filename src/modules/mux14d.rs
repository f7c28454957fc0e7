/*!
    MUX14D: relay multiplexer routing one of 14 channels to one of two measurement buses
*/

use core::ops::Deref;
use packbytes::{FromBytes, ToBytes};
use crate::{
    Error,
    pack_enum,
    catalog::{CommandSet, Descriptor, ModuleKind},
    frame::{self, CommandWord},
    link::SlotLink,
    module::{Module, System},
    params::ParamsCell,
    };
use super::opcodes;


pub const CHANNELS: u8 = 14;
const BODY: usize = 16;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum Command {
    GetInfo = opcodes::GET_INFO,
    GetState = opcodes::GET_STATE,
    SetParams = opcodes::SET_PARAMS,
}
static CATALOG: [Descriptor<Command>; 3] = [
    Descriptor::new(Command::GetInfo, opcodes::GET_INFO, "get-info"),
    Descriptor::new(Command::GetState, opcodes::GET_STATE, "get-state"),
    Descriptor::new(Command::SetParams, opcodes::SET_PARAMS, "set-params"),
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
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default)]
pub struct Frame {
    pub command: CommandWord,
    pub body: [u8; BODY],
    pub crc: u32,
}

/// measurement bus a channel is routed to
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[repr(u8)]
pub enum Bus {
    #[default]
    Open = 0,
    A = 1,
    B = 2,
}
pack_enum!(Bus, Bus::Open, [Bus::Open, Bus::A, Bus::B]);

#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct Params {
    /// routed channel from 1 to [CHANNELS], 0 disconnects everything
    pub channel: u8,
    pub bus: Bus,
    /// break before make delay when changing channel
    pub settle_ms: u16,
}

#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub channel: u8,
    pub bus: Bus,
    /// the last switching is still settling
    pub settling: u8,
    pub reserved: u8,
    pub switch_count: u32,
}

pub struct Mux14d<C = &'static ParamsCell<Params>> {
    params: C,
    state: Option<State>,
}
impl<C: Deref<Target = ParamsCell<Params>>> Mux14d<C> {
    pub fn new(params: C) -> Self {
        Self {params, state: None}
    }
    pub fn params(&self) -> &ParamsCell<Params>  {&self.params}
    pub fn state(&self) -> Option<&State>  {self.state.as_ref()}
}

impl<C: Deref<Target = ParamsCell<Params>>> Module for Mux14d<C> {
    type Command = Command;
    type Request = Frame;
    type Response = Frame;
    type Params = Params;

    const KIND: ModuleKind = ModuleKind::Mux14d;

    fn fill_request(&mut self, command: Command, _link: &SlotLink, params: &Params, request: &mut Frame) -> Result<(), Error> {
        if command == Command::SetParams {
            // an out of range channel opens every relay
            let params = if params.channel > CHANNELS
                {Params {channel: 0, bus: Bus::Open, .. *params}}
                else {*params};
            frame::encode(params, &mut request.body)?;
        }
        Ok(())
    }
    fn on_result(&mut self, command: Command, _link: &SlotLink, response: &Frame, success: bool, _system: &mut dyn System) {
        if success && command == Command::GetState {
            self.state = frame::decode(&response.body).ok();
        }
    }
    fn live_params(&self) -> Params {
        self.params.snapshot()
    }
    fn params_transferred(&mut self, params: &Params) {
        self.params.mark_transferred(*params);
    }
    fn removed(&mut self) {
        self.params.forget_transferred();
        self.state = None;
    }
}
