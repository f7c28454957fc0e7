#![allow(unused)]

use std::sync::Arc;
use slotlink::{
    config::LinkConfig,
    escalation::SystemEvent,
    exchange::Completion,
    module::{Deferred, Module, System},
    modules::{prel6, Prel6},
    params::ParamsCell,
    sim::SimTransport,
    slot::Slot,
    };


pub type Prel6Slot = Slot<Prel6<Arc<ParamsCell<prel6::Params>>>, SimTransport>;

/// system layer keeping everything it receives
#[derive(Default, Debug)]
pub struct Recorder {
    pub events: Vec<SystemEvent>,
    pub deferred: Vec<Deferred>,
}
impl System for Recorder {
    fn push_event(&mut self, event: SystemEvent) {
        self.events.push(event);
    }
    fn defer(&mut self, work: Deferred) {
        self.deferred.push(work);
    }
}

pub fn init_log() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn prel6_params() -> Arc<ParamsCell<prel6::Params>> {
    Arc::new(ParamsCell::new(prel6::Params {closed: 0b000011, reserved: 0, hold_ms: 20}))
}

/// PREL6 slot on a simulated module, not brought up
pub fn prel6_slot(index: u8, config: LinkConfig) -> (Prel6Slot, Arc<ParamsCell<prel6::Params>>) {
    let params = prel6_params();
    let slot = Slot::new(index, Prel6::new(params.clone()), SimTransport::for_module::<Prel6>())
        .expect("frame layout")
        .with_config(config);
    (slot, params)
}

/// tick and expect an exchange to complete
pub fn complete<M: Module>(slot: &mut Slot<M, SimTransport>, now: u32, system: &mut Recorder) -> Completion<M::Command> {
    slot.tick(now, system).expect("no exchange completed during tick")
}

/// bring up, then synchronize and push the parameters at time 0
pub fn synchronized<M: Module>(slot: &mut Slot<M, SimTransport>, system: &mut Recorder) {
    slot.bring_up().expect("handshake");
    let completion = complete(slot, 0, system);
    assert!(completion.success);
    assert!(slot.link().synchronized);
    let completion = complete(slot, 0, system);
    assert!(completion.success);
    let completion = complete(slot, 0, system);
    assert!(completion.success);
    slot.transport_mut().clear_requests();
}
