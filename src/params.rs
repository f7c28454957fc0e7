/*!
    parameter block bookkeeping

    - [ParamsShadow] is the diff cache of the engine: the last block the module acknowledged, compared
      byte for byte with the live block on every tick to decide whether a `SET_PARAMS` is needed
    - [ParamsCell] is the live block shared with the control task: writers publish under a short
      critical section, the tick takes a snapshot, and a writer that must know its value reached the
      module waits on a [Confirmation]
*/

use core::task::Poll;
use packbytes::ToBytes;
use crate::{
    Error,
    BusyMutex,
    config::{Millis, elapsed},
    };


/// byte for byte equality of two packed parameter blocks
pub fn same_bytes<P: ToBytes + Copy>(a: P, b: P) -> bool {
    a.to_le_bytes().as_ref() == b.to_le_bytes().as_ref()
}

/// last parameter block acknowledged by the module
#[derive(Clone, Debug)]
pub struct ParamsShadow<P> {
    last: Option<P>,
    forced: bool,
}
impl<P: ToBytes + Copy> ParamsShadow<P> {
    pub const fn new() -> Self {
        Self {last: None, forced: false}
    }
    /// push on the next opportunity even if nothing changed, used after each (re)synchronization
    pub fn force(&mut self) {
        self.forced = true;
    }
    pub fn is_forced(&self) -> bool  {self.forced}
    pub fn last(&self) -> Option<P>  {self.last}

    /// true if `live` must be pushed to the module
    pub fn needs_push(&self, live: P) -> bool {
        self.forced || match self.last {
            Some(last) => !same_bytes(last, live),
            None => true,
        }
    }
    /// `sent` was acknowledged by the module
    pub fn acknowledge(&mut self, sent: P) {
        self.last = Some(sent);
        self.forced = false;
    }
    /// forget everything, the next module will get a full push
    pub fn clear(&mut self) {
        self.last = None;
        self.forced = false;
    }
}
impl<P: ToBytes + Copy> Default for ParamsShadow<P> {
    fn default() -> Self {
        Self::new()
    }
}


struct Published<P> {
    live: P,
    transferred: Option<P>,
}

/// live parameter block shared between a control task and the slot tick
pub struct ParamsCell<P> {
    inner: BusyMutex<Published<P>>,
}
/// value a writer published and may wait for
#[derive(Copy, Clone, Debug)]
pub struct Ticket<P> {
    pub intended: P,
}

impl<P: ToBytes + Copy> ParamsCell<P> {
    pub const fn new(initial: P) -> Self {
        Self {inner: BusyMutex::new(Published {live: initial, transferred: None})}
    }
    /// replace the live block
    pub fn publish(&self, value: P) -> Ticket<P> {
        self.inner.with(|published| published.live = value);
        Ticket {intended: value}
    }
    /// modify the live block in place
    pub fn update(&self, change: impl FnOnce(&mut P)) -> Ticket<P> {
        let intended = self.inner.with(|published| {
            change(&mut published.live);
            published.live
        });
        Ticket {intended}
    }
    /// consistent copy of the live block
    pub fn snapshot(&self) -> P {
        self.inner.with(|published| published.live)
    }
    /// called by the engine side once `value` was acknowledged by the module
    pub fn mark_transferred(&self, value: P) {
        self.inner.with(|published| published.transferred = Some(value));
    }
    pub fn transferred(&self) -> Option<P> {
        self.inner.with(|published| published.transferred)
    }
    /// forget the transferred value, the module is gone
    pub fn forget_transferred(&self) {
        self.inner.with(|published| published.transferred = None);
    }
    pub fn is_transferred(&self, ticket: &Ticket<P>) -> bool {
        self.transferred().is_some_and(|transferred| same_bytes(transferred, ticket.intended))
    }
    /// start waiting for a published value to reach the module
    pub fn confirmation(&self, ticket: Ticket<P>, now: Millis, timeout_ms: u32) -> Confirmation<'_, P> {
        Confirmation {cell: self, ticket, started: now, timeout_ms}
    }
}

/// pending "was this value transferred" question, answered within a timeout
pub struct Confirmation<'c, P> {
    cell: &'c ParamsCell<P>,
    ticket: Ticket<P>,
    started: Millis,
    timeout_ms: u32,
}
impl<P: ToBytes + Copy> Confirmation<'_, P> {
    /// `Ready(Ok)` once transferred, `Ready(Err)` once timed out
    pub fn poll(&self, now: Millis) -> Poll<Result<(), Error>> {
        if self.cell.is_transferred(&self.ticket)
            {Poll::Ready(Ok(()))}
        else if elapsed(now, self.started) >= self.timeout_ms
            {Poll::Ready(Err(Error::ParamConfirmTimeout))}
        else
            {Poll::Pending}
    }
    pub fn ticket(&self) -> &Ticket<P>  {&self.ticket}
}
