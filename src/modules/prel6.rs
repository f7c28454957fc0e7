/*!
    PREL6: six independent power relays
*/

use core::ops::Deref;
use log::*;
use packbytes::{FromBytes, ToBytes};
use crate::{
    Error,
    catalog::{CommandSet, Descriptor, ModuleKind},
    frame::{self, CommandWord},
    link::SlotLink,
    module::{Module, System},
    params::ParamsCell,
    };
use super::opcodes;


pub const RELAYS: usize = 6;
const BODY: usize = 32;

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

/// relay outputs requested by the user
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct Params {
    /// bit `i` closes relay `i`
    pub closed: u8,
    pub reserved: u8,
    /// minimum time a relay stays in a state, protects contacts from chattering
    pub hold_ms: u16,
}
/// relay outputs reported by the module
#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub closed: u8,
    /// bit `i` set when relay `i` coil driver reports a fault
    pub faults: u8,
    pub reserved: u16,
    /// switching cycles of each relay since manufacturing
    pub cycles: [u32; RELAYS],
}

pub struct Prel6<C = &'static ParamsCell<Params>> {
    params: C,
    state: Option<State>,
}
impl<C: Deref<Target = ParamsCell<Params>>> Prel6<C> {
    pub fn new(params: C) -> Self {
        Self {params, state: None}
    }
    pub fn params(&self) -> &ParamsCell<Params>  {&self.params}
    /// last state reported, `None` until the first successful `GET_STATE`
    pub fn state(&self) -> Option<&State>  {self.state.as_ref()}
}

impl<C: Deref<Target = ParamsCell<Params>>> Module for Prel6<C> {
    type Command = Command;
    type Request = Frame;
    type Response = Frame;
    type Params = Params;

    const KIND: ModuleKind = ModuleKind::Prel6;

    fn fill_request(&mut self, command: Command, _link: &SlotLink, params: &Params, request: &mut Frame) -> Result<(), Error> {
        if command == Command::SetParams {
            frame::encode(*params, &mut request.body)?;
        }
        Ok(())
    }
    fn on_result(&mut self, command: Command, link: &SlotLink, response: &Frame, success: bool, _system: &mut dyn System) {
        if !success || command != Command::GetState
            {return}
        if let Ok(state) = frame::decode::<State>(&response.body) {
            if state.faults != 0 && self.state.is_none_or(|last| last.faults != state.faults) {
                warn!("slot {}: relay faults {:#08b}", link.slot, state.faults);
            }
            self.state = Some(state);
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
