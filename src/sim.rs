/*!
    deterministic simulated module behind a [Transport]

    The simulated module behaves like the firmware of a real one on a full duplex link: during each
    transfer it clocks out the response it prepared for the previous request while receiving the next
    frame. A request makes it prepare the acknowledged echo of that request, a poll makes it hand over
    that echo and go back to an idle frame. Completion and ready events are raised before
    [Transport::start_transfer] returns, so one tick of a slot completes a whole exchange.

    Faults can be scripted for the next transfers or made permanent, and the module can be killed to
    simulate an unplugged or dead board.
*/

use log::*;
use heapless::{Deque, Vec};
use crate::{
    Error,
    catalog::CommandSet,
    flags::EventFlags,
    frame::{self, CommandWord, InfoBody, COMMAND_LEN, MAX_FRAME},
    module::Module,
    transport::{self, CrcMode, Identity, TransferStatus, Transport, HANDSHAKE},
    };


/// number of faults that can be scripted ahead
const SCRIPT_DEPTH: usize = 256;
/// number of received request opcodes remembered
const HISTORY_DEPTH: usize = 64;

/// shapes the response prepared for a request, after the echo was written
pub type Responder = fn(request: &[u8], response: &mut [u8]);

/// fault applied to one transfer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Fault {
    /// the response is corrupted on the wire
    Crc,
    /// the transfer ends with a generic error, the module never sees the request
    Error,
    /// the transfer cannot start
    Busy,
    /// the module answers with a frame that does not echo the request
    Mismatch,
    /// the transfer starts but never completes
    Silent,
}

pub struct SimTransport {
    events: EventFlags,
    mode: CrcMode,
    identity: Identity,
    alive: bool,
    poll: u16,
    info: u16,
    responder: Option<Responder>,
    /// faults of the next transfers, `None` lets one transfer through
    script: Deque<Option<Fault>, SCRIPT_DEPTH>,
    permanent: Option<Fault>,
    /// frame the module will clock out on the next transfer
    pending: Vec<u8, MAX_FRAME>,
    /// frame received by the master on the last transfer
    received: Vec<u8, MAX_FRAME>,
    requests: Deque<u16, HISTORY_DEPTH>,
    transfers: u32,
    aborts: u32,
    handshakes: u32,
    last_revision: Option<u16>,
}

impl SimTransport {
    /// simulated module answering `info` requests with its identity and treating `poll` as the no-op marker
    pub fn new(mode: CrcMode, poll: u16, info: u16) -> Self {
        let transport = Self {
            events: EventFlags::new(),
            mode,
            identity: Identity {
                sync: HANDSHAKE,
                firmware_major: 1,
                firmware_minor: 0,
                reserved: 0,
                hardware_id: [0x5107_0001, 0x5107_0002, 0x5107_0003],
            },
            alive: true,
            poll,
            info,
            responder: None,
            script: Deque::new(),
            permanent: None,
            pending: Vec::new(),
            received: Vec::new(),
            requests: Deque::new(),
            transfers: 0,
            aborts: 0,
            handshakes: 0,
            last_revision: None,
        };
        transport.events.signal_ready();
        transport
    }
    /// simulated module speaking the protocol of `M`
    pub fn for_module<M: Module>() -> Self {
        Self::new(M::KIND.config().crc_mode, M::Command::POLL, M::Command::GET_INFO.opcode())
    }
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }
    pub fn with_responder(mut self, responder: Responder) -> Self {
        self.responder = Some(responder);
        self
    }
    pub fn set_responder(&mut self, responder: Option<Responder>) {
        self.responder = responder;
    }

    /// fail the next transfer not already scripted
    pub fn inject(&mut self, fault: Fault) {
        self.script_entry(Some(fault));
    }
    /// fail the next `count` transfers not already scripted
    pub fn inject_n(&mut self, fault: Fault, count: usize) {
        for _ in 0 .. count {
            self.inject(fault);
        }
    }
    /// let the next `count` transfers not already scripted through, even if a permanent fault is set
    pub fn pass(&mut self, count: usize) {
        for _ in 0 .. count {
            self.script_entry(None);
        }
    }
    /// fail every transfer once the script is exhausted, or stop failing with `None`
    pub fn fail_always(&mut self, fault: Option<Fault>) {
        self.permanent = fault;
    }
    pub fn clear_faults(&mut self) {
        self.script.clear();
        self.permanent = None;
    }

    /// the module stops answering: no handshake, no event
    pub fn kill(&mut self) {
        self.alive = false;
        self.events.clear();
    }
    /// the module boots again, with no response prepared
    pub fn revive(&mut self) {
        self.alive = true;
        self.pending.clear();
        self.events.signal_ready();
    }
    pub fn is_alive(&self) -> bool  {self.alive}

    /// number of transfer starts, including refused ones
    pub fn transfers(&self) -> u32  {self.transfers}
    pub fn aborts(&self) -> u32  {self.aborts}
    pub fn handshakes(&self) -> u32  {self.handshakes}
    /// module revision sent by the last handshake
    pub fn last_revision(&self) -> Option<u16>  {self.last_revision}
    /// opcodes of the requests the module received, polls excluded, oldest first
    pub fn requests(&self) -> impl Iterator<Item = u16> + '_ {
        self.requests.iter().copied()
    }
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    fn script_entry(&mut self, entry: Option<Fault>) {
        if self.script.push_back(entry).is_err() {
            warn!("simulated fault script full, {:?} dropped", entry);
        }
    }
    fn next_fault(&mut self) -> Option<Fault> {
        match self.script.pop_front() {
            Some(entry) => entry,
            None => self.permanent,
        }
    }

    /// one transfer on the wire, returns the completion status or `None` if it never completes
    fn exchange(&mut self, tx: &[u8]) -> Result<Option<TransferStatus>, TransferStatus> {
        self.transfers = self.transfers.wrapping_add(1);
        if tx.len() < COMMAND_LEN
            {return Err(TransferStatus::Error)}
        if !self.alive
            {return Ok(None)}
        let fault = self.next_fault();
        match fault {
            Some(Fault::Busy) => return Err(TransferStatus::Busy),
            Some(Fault::Silent) => return Ok(None),
            Some(Fault::Error) => return Ok(Some(TransferStatus::Error)),
            _ => {},
        }

        // the module clocks out its pending frame while receiving the request
        let mut outgoing = Vec::<u8, MAX_FRAME>::new();
        if outgoing.resize(tx.len(), 0).is_err()
            {return Err(TransferStatus::Error)}
        let shared = tx.len().min(self.pending.len());
        outgoing[.. shared].copy_from_slice(&self.pending[.. shared]);
        if fault == Some(Fault::Mismatch) {
            frame::write_command(&mut outgoing, CommandWord::of(self.poll));
        }
        self.received.clear();
        if self.received.resize(tx.len(), 0).is_err()
            || transport::prepare(self.mode, &outgoing, &mut self.received).is_err()
            {return Err(TransferStatus::Error)}

        self.process(tx);

        let status = match fault {
            Some(Fault::Crc) => {
                if let Some(byte) = self.received.first_mut() {
                    *byte ^= 0x5a;
                }
                TransferStatus::CrcError
            },
            _ => transport::check(self.mode, &self.received),
        };
        Ok(Some(status))
    }

    /// module firmware reaction to a received frame
    fn process(&mut self, tx: &[u8]) {
        let mut request = Vec::<u8, MAX_FRAME>::new();
        if request.resize(tx.len(), 0).is_err() || transport::prepare(self.mode, tx, &mut request).is_err()
            {return}
        let word = frame::read_command(&request);
        self.pending.clear();
        if word.opcode() == self.poll {
            // nothing left to hand over after a poll
            let _ = self.pending.resize(tx.len(), 0);
            return;
        }
        if self.requests.is_full() {
            self.requests.pop_front();
        }
        let _ = self.requests.push_back(word.opcode());

        if self.pending.extend_from_slice(&request).is_err()
            {return}
        frame::write_command(&mut self.pending, word.acknowledged());
        if word.opcode() == self.info {
            let info = InfoBody {
                firmware_major: self.identity.firmware_major,
                firmware_minor: self.identity.firmware_minor,
                reserved: 0,
                hardware_id: self.identity.hardware_id,
            };
            if frame::encode(info, &mut self.pending[COMMAND_LEN ..]).is_err() {
                debug!("simulated frame too short for module info");
            }
        }
        if let Some(responder) = self.responder {
            responder(&request, &mut self.pending);
        }
    }
}

impl Transport for SimTransport {
    fn events(&self) -> &EventFlags  {&self.events}

    fn synchronize(&mut self, revision: u16, _window_ms: u32, _poll_ms: u32) -> Result<Identity, Error> {
        self.handshakes += 1;
        self.last_revision = Some(revision);
        if !self.alive
            {return Err(Error::HandshakeTimeout)}
        self.events.signal_ready();
        Ok(self.identity)
    }

    fn transfer(&mut self, tx: &[u8], rx: &mut [u8]) -> TransferStatus {
        match self.exchange(tx) {
            Err(status) => status,
            Ok(None) => TransferStatus::Timeout,
            Ok(Some(status)) => {
                self.read_response(rx);
                status
            },
        }
    }

    fn start_transfer(&mut self, tx: &[u8]) -> TransferStatus {
        match self.exchange(tx) {
            Err(status) => status,
            Ok(None) => TransferStatus::Ok,
            Ok(Some(status)) => {
                self.events.signal_completion(status);
                self.events.signal_ready();
                TransferStatus::Ok
            },
        }
    }

    fn read_response(&mut self, rx: &mut [u8]) {
        let shared = rx.len().min(self.received.len());
        rx[.. shared].copy_from_slice(&self.received[.. shared]);
    }

    fn abort(&mut self) {
        self.aborts += 1;
        self.events.clear_completion();
        if self.alive {
            self.events.signal_ready();
        }
    }
}
