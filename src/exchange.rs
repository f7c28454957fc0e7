/*!
    state machine carrying one command through request and response transfers

    ```text
    Idle --execute--> WaitReadyForRequest --ready--> WaitTransferForRequest --done--> WaitReadyForResponse
                         ^                                                               | ready
                         |  retry (abort, count)                                         v
                         +------------- any failure or state timeout ----------- WaitTransferForResponse
                                                                                         | done + echo
                                                                                         v
                                                                                       Idle
    ```

    The machine does no I/O itself, it drives an [ExchangeIo] and is fed with [Event]s taken from the
    transport's [EventFlags] and from the clock.
*/

use log::*;
use crate::{
    Error,
    config::{Millis, elapsed},
    flags::EventFlags,
    transport::TransferStatus,
    };


#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ExchangeState {
    #[default]
    Idle,
    WaitReadyForRequest,
    WaitTransferForRequest,
    WaitReadyForResponse,
    WaitTransferForResponse,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// rising edge of the module ready line
    SlaveReady,
    TransferComplete,
    TransferFailed(TransferStatus),
    /// the current state exceeded its time budget
    Timeout,
}

/// cause of one failed attempt
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Failure {
    /// the transport refused to start a transfer
    Start(TransferStatus),
    /// the transfer finished with an error
    Transfer(TransferStatus),
    /// the response does not echo the request
    Mismatch,
    Timeout,
}
impl Failure {
    pub fn is_crc(self) -> bool {
        matches!(self, Self::Start(TransferStatus::CrcError) | Self::Transfer(TransferStatus::CrcError))
    }
    pub fn error(self) -> Error {
        match self {
            Self::Start(status) | Self::Transfer(status) => match status.into_result() {
                Err(error) => error,
                Ok(()) => Error::Transfer(status),
            },
            Self::Mismatch => Error::ResponseMismatch,
            Self::Timeout => Error::Transfer(TransferStatus::Timeout),
        }
    }
}

/// side effects requested by the state machine
pub trait ExchangeIo<C> {
    /// fill the request of `command` and start its transfer
    fn start_request(&mut self, command: C) -> TransferStatus;
    /// start the transfer fetching the pending response
    fn start_poll(&mut self, command: C) -> TransferStatus;
    /// read the received response and check that it echoes `command`
    fn response_echoes(&mut self, command: C) -> bool;
    /// cancel the transfer in flight if any
    fn abort(&mut self);
    /// report a failed attempt to fault escalation, returns true if the link went down and the exchange must stop
    fn failed(&mut self, failure: Failure) -> bool;
}

/// progress made by one call to [Exchange::handle]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step<C> {
    /// nothing to do until the next event
    Blocked,
    Advanced,
    Done(Completion<C>),
}
/// terminal outcome of an exchange
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Completion<C> {
    pub command: C,
    pub success: bool,
    /// number of failed attempts before the outcome
    pub retries: u32,
    /// last failure, if any attempt failed
    pub failure: Option<Failure>,
}
impl<C> Completion<C> {
    pub fn result(&self) -> Result<(), Error> {
        if self.success {Ok(())}
        else {Err(Error::RetryExhausted)}
    }
}

/// the single transaction in flight on a slot
#[derive(Clone, Debug)]
pub struct Exchange<C> {
    command: Option<C>,
    state: ExchangeState,
    retry_count: u32,
    entered_at: Millis,
    last_failure: Option<Failure>,
}

impl<C: Copy + core::fmt::Debug> Exchange<C> {
    pub const fn new() -> Self {
        Self {
            command: None,
            state: ExchangeState::Idle,
            retry_count: 0,
            entered_at: 0,
            last_failure: None,
        }
    }
    pub fn state(&self) -> ExchangeState  {self.state}
    pub fn command(&self) -> Option<C>  {self.command}
    pub fn retry_count(&self) -> u32  {self.retry_count}
    pub fn is_idle(&self) -> bool  {self.state == ExchangeState::Idle}

    /// begin a new exchange, refused while another one is in flight
    pub fn execute(&mut self, command: C, now: Millis) -> bool {
        if !self.is_idle()
            {return false}
        self.command = Some(command);
        self.retry_count = 0;
        self.last_failure = None;
        self.enter(ExchangeState::WaitReadyForRequest, now);
        true
    }
    /// drop the exchange in flight without completing it, used when the module disappears
    pub fn cancel(&mut self) {
        self.command = None;
        self.state = ExchangeState::Idle;
    }

    /// consume the event relevant to the current state, if any
    pub fn pending_event(&self, events: &EventFlags, now: Millis, timeout_ms: u32) -> Option<Event> {
        let event = match self.state {
            ExchangeState::Idle => return None,
            ExchangeState::WaitReadyForRequest | ExchangeState::WaitReadyForResponse =>
                events.take_ready().then_some(Event::SlaveReady),
            ExchangeState::WaitTransferForRequest | ExchangeState::WaitTransferForResponse =>
                events.take_completion().map(|status| match status {
                    TransferStatus::Ok => Event::TransferComplete,
                    failed => Event::TransferFailed(failed),
                }),
        };
        event.or_else(|| (elapsed(now, self.entered_at) >= timeout_ms).then_some(Event::Timeout))
    }

    /// apply one event
    pub fn handle(&mut self, event: Event, now: Millis, max_retries: u32, io: &mut impl ExchangeIo<C>) -> Step<C> {
        let Some(command) = self.command
            else {return Step::Blocked};
        match (self.state, event) {
            (ExchangeState::WaitReadyForRequest, Event::SlaveReady) => {
                match io.start_request(command) {
                    TransferStatus::Ok => self.advance(ExchangeState::WaitTransferForRequest, now),
                    status => self.retry(Failure::Start(status), now, max_retries, io),
                }
            },
            (ExchangeState::WaitTransferForRequest, Event::TransferComplete) =>
                self.advance(ExchangeState::WaitReadyForResponse, now),
            (ExchangeState::WaitReadyForResponse, Event::SlaveReady) => {
                match io.start_poll(command) {
                    TransferStatus::Ok => self.advance(ExchangeState::WaitTransferForResponse, now),
                    status => self.retry(Failure::Start(status), now, max_retries, io),
                }
            },
            (ExchangeState::WaitTransferForResponse, Event::TransferComplete) => {
                if io.response_echoes(command)
                    {self.finish(true)}
                else
                    {self.retry(Failure::Mismatch, now, max_retries, io)}
            },
            (ExchangeState::WaitTransferForRequest | ExchangeState::WaitTransferForResponse, Event::TransferFailed(status)) =>
                self.retry(Failure::Transfer(status), now, max_retries, io),
            (ExchangeState::Idle, _) => Step::Blocked,
            (_, Event::Timeout) =>
                self.retry(Failure::Timeout, now, max_retries, io),
            // events that do not belong to the current state are ignored
            _ => Step::Blocked,
        }
    }

    fn enter(&mut self, state: ExchangeState, now: Millis) {
        self.state = state;
        self.entered_at = now;
    }
    fn advance(&mut self, state: ExchangeState, now: Millis) -> Step<C> {
        self.enter(state, now);
        Step::Advanced
    }
    fn retry(&mut self, failure: Failure, now: Millis, max_retries: u32, io: &mut impl ExchangeIo<C>) -> Step<C> {
        io.abort();
        let escalated = io.failed(failure);
        self.last_failure = Some(failure);
        self.retry_count += 1;
        debug!("{:?} attempt {} failed in {:?}: {:?}", self.command, self.retry_count, self.state, failure);
        if !escalated && self.retry_count < max_retries {
            self.advance(ExchangeState::WaitReadyForRequest, now)
        }
        else {
            self.finish(false)
        }
    }
    fn finish(&mut self, success: bool) -> Step<C> {
        self.state = ExchangeState::Idle;
        match self.command.take() {
            Some(command) => Step::Done(Completion {
                command,
                success,
                retries: self.retry_count,
                failure: self.last_failure,
            }),
            None => Step::Blocked,
        }
    }
}
impl<C: Copy + core::fmt::Debug> Default for Exchange<C> {
    fn default() -> Self {
        Self::new()
    }
}
