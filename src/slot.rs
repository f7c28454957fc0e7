/*!
    generic engine driving the link to one slot

    a [Slot] owns everything a slot needs: link bookkeeping, the exchange in flight, the parameter
    shadow, the module callbacks and the transport. Slots share no mutable state, so they can be ticked
    from one task iterating over all slots or from one task per slot.
*/

use log::*;
use heapless::Vec;
use crate::{
    Error,
    catalog::{CommandSet, ModuleKind},
    config::{LinkConfig, Millis},
    exchange::{Completion, Exchange, ExchangeIo, ExchangeState, Failure, Step},
    frame::{self, CommandWord, InfoBody, COMMAND_LEN, MAX_FRAME},
    link::{SlotLink, TestResult},
    module::{Module, System},
    params::ParamsShadow,
    scheduler::{Decision, Scheduler},
    transport::{Identity, TransferStatus, Transport},
    };


type Buffer = Vec<u8, MAX_FRAME>;

pub struct Slot<M: Module, T: Transport> {
    link: SlotLink,
    config: LinkConfig,
    exchange: Exchange<M::Command>,
    scheduler: Scheduler,
    shadow: ParamsShadow<M::Params>,
    /// snapshot carried by the `SET_PARAMS` in flight
    pushing: Option<M::Params>,
    module: M,
    transport: T,
    tx: Buffer,
    rx: Buffer,
}

impl<M: Module, T: Transport> Slot<M, T> {
    /// slot populated with a module of type `M`, request and response layouts must have the same size
    pub fn new(slot: u8, module: M, transport: T) -> Result<Self, Error> {
        let size = frame::packed_size::<M::Request>();
        if size != frame::packed_size::<M::Response>() || size < COMMAND_LEN
            {return Err(Error::FrameTooLarge)}
        let mut tx = Buffer::new();
        let mut rx = Buffer::new();
        tx.resize(size, 0).map_err(|_| Error::FrameTooLarge)?;
        rx.resize(size, 0).map_err(|_| Error::FrameTooLarge)?;

        let config = module.config();
        Ok(Self {
            link: SlotLink::new(slot, M::KIND, config.crc_mode),
            config,
            exchange: Exchange::new(),
            scheduler: Scheduler::new(),
            shadow: ParamsShadow::new(),
            pushing: None,
            module,
            transport,
            tx,
            rx,
        })
    }
    /// override the module's default tuning
    pub fn with_config(mut self, config: LinkConfig) -> Self {
        self.link.spi_crc_enabled = config.crc_mode == crate::transport::CrcMode::Peripheral;
        self.config = config;
        self
    }

    pub fn link(&self) -> &SlotLink  {&self.link}
    pub fn config(&self) -> &LinkConfig  {&self.config}
    pub fn module(&self) -> &M  {&self.module}
    pub fn module_mut(&mut self) -> &mut M  {&mut self.module}
    pub fn transport(&self) -> &T  {&self.transport}
    pub fn transport_mut(&mut self) -> &mut T  {&mut self.transport}
    pub fn shadow(&self) -> &ParamsShadow<M::Params>  {&self.shadow}
    pub fn exchange_state(&self) -> ExchangeState  {self.exchange.state()}
    pub fn current_command(&self) -> Option<M::Command>  {self.exchange.command()}
    pub fn retry_count(&self) -> u32  {self.exchange.retry_count()}

    /**
        blocking handshake performed once per cold bring-up

        the link stays unsynchronized until the first `GET_INFO` succeeds, the handshake only checks
        that a module answers and records its identity
    */
    pub fn bring_up(&mut self) -> Result<Identity, Error> {
        if self.link.kind == ModuleKind::None
            {return Err(Error::SlotEmpty)}
        self.link.test_result = TestResult::Connecting;
        match self.transport.synchronize(M::KIND.revision(), self.config.sync_window_ms, self.config.sync_poll_ms) {
            Ok(identity) => {
                info!("slot {}: {} answered handshake, firmware {}.{}",
                    self.link.slot, M::KIND.name(), identity.firmware_major, identity.firmware_minor);
                self.link.set_identity(&identity);
                Ok(identity)
            },
            Err(error) => {
                warn!("slot {}: {} handshake failed: {}", self.link.slot, M::KIND.name(), error);
                self.link.set_identity(&Identity::default());
                self.link.test_result = TestResult::Failed;
                Err(error)
            },
        }
    }

    /**
        one polling step: schedule a command if idle, then drive the exchange until it waits for an event

        returns the outcome of the exchange if it completed during this tick
    */
    pub fn tick(&mut self, now: Millis, system: &mut dyn System) -> Option<Completion<M::Command>> {
        if self.link.kind == ModuleKind::None
            {return None}
        if self.exchange.is_idle() {
            let live = self.module.live_params();
            match self.scheduler.decide(&mut self.link, &mut self.module, &self.shadow, live, now, &self.config) {
                Decision::Issue(command) => self.issue(command, live, now),
                Decision::Desynchronized(event) => system.push_event(event),
                Decision::Idle => {},
            }
        }
        self.drive(now, system)
    }

    /**
        single synchronous request/response round trip over [Transport::transfer]

        meant for diagnostics outside of the polling tick: no retry, no escalation, and refused while an
        exchange is in flight
    */
    pub fn execute_blocking(&mut self, command: M::Command) -> Result<M::Response, Error> {
        if !self.exchange.is_idle()
            {return Err(Error::Transfer(TransferStatus::Busy))}
        let params = self.module.live_params();
        fill_frame(&mut self.module, &self.link, command, &params, &mut self.tx)?;
        self.transport.transfer(&self.tx, &mut self.rx).into_result()?;
        frame::write_command(&mut self.tx, CommandWord::of(M::Command::POLL));
        self.transport.transfer(&self.tx, &mut self.rx).into_result()?;
        if !frame::read_command(&self.rx).echoes(command.word())
            {return Err(Error::ResponseMismatch)}
        frame::decode(&self.rx)
    }

    /// the module was unplugged, the slot goes back to an empty state
    pub fn remove(&mut self) {
        self.transport.abort();
        self.transport.events().clear();
        self.exchange.cancel();
        self.scheduler.reset();
        self.shadow.clear();
        self.pushing = None;
        self.link.reset();
        self.module.removed();
    }

    fn issue(&mut self, command: M::Command, live: M::Params, now: Millis) {
        debug!("slot {}: issue {}", self.link.slot, command.name());
        self.pushing = (command == M::Command::SET_PARAMS).then_some(live);
        self.transport.events().clear_completion();
        self.exchange.execute(command, now);
    }

    fn drive(&mut self, now: Millis, system: &mut dyn System) -> Option<Completion<M::Command>> {
        loop {
            let event = self.exchange.pending_event(self.transport.events(), now, self.config.state_timeout_ms)?;
            let mut io = SlotIo {
                link: &mut self.link,
                config: &self.config,
                module: &mut self.module,
                transport: &mut self.transport,
                pushing: self.pushing,
                tx: &mut self.tx,
                rx: &mut self.rx,
                system: &mut *system,
            };
            match self.exchange.handle(event, now, self.config.max_retries, &mut io) {
                Step::Blocked => return None,
                Step::Advanced => continue,
                Step::Done(completion) => {
                    self.complete(completion, now, system);
                    return Some(completion);
                },
            }
        }
    }

    fn complete(&mut self, completion: Completion<M::Command>, now: Millis, system: &mut dyn System) {
        let command = completion.command;
        let response = if completion.success {
            frame::decode::<M::Response>(&self.rx).unwrap_or_default()
        }
        else {
            M::Response::default()
        };

        if completion.success {
            self.link.clear_errors();
            self.link.last_success = now;
            if command == M::Command::GET_INFO {
                if let Ok(info) = frame::decode::<InfoBody>(&self.rx[COMMAND_LEN ..]) {
                    self.link.apply_info(&info);
                }
                self.link.mark_synchronized(now);
                self.shadow.force();
                self.scheduler.reset();
            }
            else if command == M::Command::SET_PARAMS {
                if let Some(sent) = self.pushing.take() {
                    self.shadow.acknowledge(sent);
                    self.module.params_transferred(&sent);
                }
            }
            if completion.retries != 0 {
                debug!("slot {}: {} succeeded after {} retries", self.link.slot, command.name(), completion.retries);
            }
        }
        else {
            self.pushing = None;
            if self.link.synchronized {
                warn!("slot {}: {} failed after {} attempts: {:?}",
                    self.link.slot, command.name(), completion.retries, completion.failure);
            }
            else {
                debug!("slot {}: {} failed while unsynchronized", self.link.slot, command.name());
            }
        }
        self.module.on_result(command, &self.link, &response, completion.success, system);
    }
}

/// write the request of `command` into a frame buffer
fn fill_frame<M: Module>(module: &mut M, link: &SlotLink, command: M::Command, params: &M::Params, buffer: &mut [u8]) -> Result<(), Error> {
    let mut request = M::Request::default();
    module.fill_request(command, link, params, &mut request)?;
    frame::encode(request, buffer)?;
    frame::write_command(buffer, command.word());
    Ok(())
}

/// borrowed view of a slot handed to the exchange state machine
struct SlotIo<'s, M: Module, T: Transport> {
    link: &'s mut SlotLink,
    config: &'s LinkConfig,
    module: &'s mut M,
    transport: &'s mut T,
    pushing: Option<M::Params>,
    tx: &'s mut Buffer,
    rx: &'s mut Buffer,
    system: &'s mut dyn System,
}
impl<M: Module, T: Transport> ExchangeIo<M::Command> for SlotIo<'_, M, T> {
    fn start_request(&mut self, command: M::Command) -> TransferStatus {
        let params = self.pushing.unwrap_or_else(|| self.module.live_params());
        if let Err(error) = fill_frame(self.module, self.link, command, &params, self.tx) {
            warn!("slot {}: cannot fill {}: {}", self.link.slot, command.name(), error);
            return TransferStatus::Error;
        }
        self.transport.start_transfer(self.tx)
    }
    fn start_poll(&mut self, _command: M::Command) -> TransferStatus {
        frame::write_command(self.tx, CommandWord::of(M::Command::POLL));
        self.transport.start_transfer(self.tx)
    }
    fn response_echoes(&mut self, command: M::Command) -> bool {
        self.transport.read_response(self.rx);
        frame::read_command(self.rx).echoes(command.word())
    }
    fn abort(&mut self) {
        self.transport.abort();
    }
    fn failed(&mut self, failure: Failure) -> bool {
        match self.link.count_failure(failure, self.config) {
            Some(event) => {
                self.system.push_event(event);
                true
            },
            None => false,
        }
    }
}

/// object safe view of any slot, so slots of different module types share one registry
pub trait SlotDriver {
    fn link(&self) -> &SlotLink;
    fn exchange_state(&self) -> ExchangeState;
    fn bring_up(&mut self) -> Result<(), Error>;
    fn tick(&mut self, now: Millis, system: &mut dyn System);
    fn remove(&mut self);
}
impl<M: Module, T: Transport> SlotDriver for Slot<M, T> {
    fn link(&self) -> &SlotLink {
        Slot::link(self)
    }
    fn exchange_state(&self) -> ExchangeState {
        Slot::exchange_state(self)
    }
    fn bring_up(&mut self) -> Result<(), Error> {
        Slot::bring_up(self).map(|_| ())
    }
    fn tick(&mut self, now: Millis, system: &mut dyn System) {
        Slot::tick(self, now, system);
    }
    fn remove(&mut self) {
        Slot::remove(self)
    }
}
