/*!
    choice of the next command of an idle slot

    first match wins:

    1. not synchronized: `GET_INFO`
    2. urgent module command (streaming start/stop, disk operation)
    3. out of sync timeout expired: desynchronize and report, no command this tick
    4. forced push or live parameters differ from the shadow: `SET_PARAMS`
    5. refresh interval elapsed: `GET_STATE`
    6. bulk data pull
    7. nothing
*/

use log::*;
use crate::{
    catalog::CommandSet,
    config::{LinkConfig, Millis, elapsed},
    escalation::SystemEvent,
    link::SlotLink,
    module::Module,
    params::ParamsShadow,
    };


#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Decision<C> {
    Issue(C),
    /// the link just expired, the event must be raised
    Desynchronized(SystemEvent),
    Idle,
}

/// scheduling memory of one slot
#[derive(Clone, Debug, Default)]
pub struct Scheduler {
    /// time `GET_STATE` was last issued, `None` until the first one
    last_refresh: Option<Millis>,
}

impl Scheduler {
    pub const fn new() -> Self {
        Self {last_refresh: None}
    }
    /// next state poll is due immediately
    pub fn reset(&mut self) {
        self.last_refresh = None;
    }
    pub fn last_refresh(&self) -> Option<Millis>  {self.last_refresh}

    pub fn decide<M: Module>(
        &mut self,
        link: &mut SlotLink,
        module: &mut M,
        shadow: &ParamsShadow<M::Params>,
        live: M::Params,
        now: Millis,
        config: &LinkConfig,
        ) -> Decision<M::Command>
    {
        if !link.synchronized
            {return Decision::Issue(M::Command::GET_INFO)}

        if let Some(command) = module.urgent_command(link) {
            debug!("slot {}: urgent {:?}", link.slot, command);
            return Decision::Issue(command);
        }

        if let Some(event) = link.check_out_of_sync(now, config)
            {return Decision::Desynchronized(event)}

        if shadow.needs_push(live)
            {return Decision::Issue(M::Command::SET_PARAMS)}

        let refresh = module.refresh_interval(config);
        if self.last_refresh.is_none_or(|last| elapsed(now, last) >= refresh) {
            self.last_refresh = Some(now);
            return Decision::Issue(M::Command::GET_STATE);
        }

        match module.data_pull(link) {
            Some(command) => Decision::Issue(command),
            None => Decision::Idle,
        }
    }
}
