/*!
    SMX46: 4x6 matrix switch with an auxiliary relay

    this module checks integrity with the CRC unit of its SPI peripheral, so its frames carry no crc word.
*/

use core::ops::Deref;
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


pub const ROWS: usize = 4;
pub const COLUMNS: usize = 6;
const COLUMN_MASK: u8 = (1 << COLUMNS) - 1;
const BODY: usize = 28;

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
}

#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct Params {
    /// bit `c` of row `r` connects row `r` to column `c`
    pub rows: [u8; ROWS],
    pub aux: u8,
    pub reserved: [u8; 3],
}
impl Params {
    pub fn connect(&mut self, row: usize, column: usize, closed: bool) {
        if row >= ROWS || column >= COLUMNS
            {return}
        if closed {self.rows[row] |= 1 << column}
        else {self.rows[row] &= !(1 << column)}
    }
    pub fn is_connected(&self, row: usize, column: usize) -> bool {
        row < ROWS && column < COLUMNS && self.rows[row] & (1 << column) != 0
    }
}

#[derive(Copy, Clone, FromBytes, ToBytes, Debug, Default, PartialEq, Eq)]
pub struct State {
    pub rows: [u8; ROWS],
    pub aux: u8,
    pub reserved: u8,
    /// board temperature in 0.1 degree Celsius
    pub temperature: i16,
}

pub struct Smx46<C = &'static ParamsCell<Params>> {
    params: C,
    state: Option<State>,
}
impl<C: Deref<Target = ParamsCell<Params>>> Smx46<C> {
    pub fn new(params: C) -> Self {
        Self {params, state: None}
    }
    pub fn params(&self) -> &ParamsCell<Params>  {&self.params}
    pub fn state(&self) -> Option<&State>  {self.state.as_ref()}
}

impl<C: Deref<Target = ParamsCell<Params>>> Module for Smx46<C> {
    type Command = Command;
    type Request = Frame;
    type Response = Frame;
    type Params = Params;

    const KIND: ModuleKind = ModuleKind::Smx46;

    fn fill_request(&mut self, command: Command, _link: &SlotLink, params: &Params, request: &mut Frame) -> Result<(), Error> {
        if command == Command::SetParams {
            let mut params = *params;
            for row in params.rows.iter_mut() {
                *row &= COLUMN_MASK;
            }
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
