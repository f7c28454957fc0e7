mod common;

use std::{
    sync::Arc,
    time::Duration,
    };
use futures_concurrency::future::Race;
use slotlink::{
    Error,
    catalog::ModuleKind,
    config::LinkConfig,
    escalation::{EventKind, SystemEvent},
    frame::{self, COMMAND_LEN},
    host::{self, BoxedSlot, Runtime, SlotRegistry},
    link::TestResult,
    module::{Deferred, Job},
    modules::{opcodes, mio168, mux14d, prel6, smx46, Mio168, Mux14d, Smx46},
    params::ParamsCell,
    sim::{Fault, SimTransport},
    slot::Slot,
    };
use common::*;


/// run a test body against a runtime ticking every millisecond
fn test<T, F>(registry: SlotRegistry, jobs: impl Fn(Deferred) + Send + Sync + 'static, test: T)
where
    T: FnOnce(Arc<Runtime>) -> F,
    F: Future,
{
    init_log();
    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async move {
        let runtime = Arc::new(Runtime::new(registry, jobs));
        runtime.bring_up_all().await;
        (
            async {
                tokio::time::timeout(Duration::from_secs(10), test(runtime.clone()))
                .await.expect("aborted test because took too long");
            },
            async {
                runtime.run(Duration::from_millis(1)).await;
            },
        ).race().await;
        runtime.stop();
    });
}

fn ignore(_: Deferred) {}

fn boxed(slot: Prel6Slot) -> BoxedSlot {
    Box::new(slot)
}

async fn until_synchronized(runtime: &Runtime, index: u8) {
    while !runtime.with_registry(|registry| registry.link(index).is_some_and(|link| link.synchronized)).await {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
}


#[test]
fn confirm_reaches_module() {
    let (slot, params) = prel6_slot(0, LinkConfig::relay());
    let mut registry = SlotRegistry::new(4);
    registry.insert(boxed(slot)).unwrap();

    test(registry, ignore, |runtime| async move {
        let value = prel6::Params {closed: 0b101010, reserved: 0, hold_ms: 50};
        host::confirm(&params, value, Duration::from_secs(2)).await.unwrap();
        assert_eq!(params.transferred(), Some(value));
        host::confirm_update(&params, |params| params.closed = 0, Duration::from_secs(2)).await.unwrap();
        assert_eq!(params.transferred().map(|params| params.closed), Some(0));
        assert!(runtime.with_registry(|registry| registry.link(0).unwrap().synchronized).await);
    });
}

#[test]
fn confirm_times_out_on_dead_module() {
    let (mut slot, params) = prel6_slot(1, LinkConfig::relay());
    slot.transport_mut().kill();
    let mut registry = SlotRegistry::new(4);
    registry.insert(boxed(slot)).unwrap();

    test(registry, ignore, |_runtime| async move {
        let value = prel6::Params {closed: 1, reserved: 0, hold_ms: 0};
        assert_eq!(host::confirm(&params, value, Duration::from_millis(100)).await, Err(Error::ParamConfirmTimeout));
        // the value stays published
        assert_eq!(params.snapshot(), value);
    });
}

#[test]
fn faults_reach_event_queue() {
    // synchronization, forced push and first state poll go through, then the link breaks
    let config = LinkConfig::latency_sensitive().with_thresholds(3, 3).with_refresh(5, 5);
    let (mut slot, _) = prel6_slot(1, config);
    slot.transport_mut().pass(6);
    slot.transport_mut().fail_always(Some(Fault::Error));
    let mut registry = SlotRegistry::new(2);
    registry.insert(boxed(slot)).unwrap();

    test(registry, ignore, |runtime| async move {
        let mut events = runtime.events().expect("event receiver");
        assert!(runtime.events().is_none());
        let event = events.recv().await;
        assert_eq!(event, Some(SystemEvent {kind: EventKind::SyncError, slot: 1}));
        assert!(!runtime.with_registry(|registry| registry.link(1).unwrap().synchronized).await);
    });
}

#[test]
fn disk_requests_are_deferred() {
    fn disk_module(request: &[u8], response: &mut [u8]) {
        if frame::read_command(request).opcode() == opcodes::GET_STATE {
            let state = mio168::State {
                disk: mio168::DiskRequest {op: mio168::DiskOp::Read, reserved: 0, count: 4, sector: 2048},
                .. Default::default()
            };
            frame::encode(state, &mut response[COMMAND_LEN ..]).unwrap();
        }
    }
    let params = Arc::new(ParamsCell::new(mio168::Params::default()));
    let transport = SimTransport::for_module::<Mio168>().with_responder(disk_module);
    let mut registry = SlotRegistry::new(4);
    registry.insert(Box::new(Slot::new(3, Mio168::new(params), transport).unwrap())).unwrap();

    let (jobs, mut received) = tokio::sync::mpsc::unbounded_channel();
    test(registry, move |job| {let _ = jobs.send(job);}, |_runtime| async move {
        let job = received.recv().await;
        assert_eq!(job, Some(Deferred {slot: 3, job: Job::DiskRead {sector: 2048, count: 4}}));
    });
}

#[test]
fn heterogeneous_board() {
    let mut registry = SlotRegistry::new(6);
    let (prel6, _) = prel6_slot(0, LinkConfig::relay());
    registry.insert(boxed(prel6)).unwrap();
    registry.insert(Box::new(Slot::new(1,
        Smx46::new(Arc::new(ParamsCell::new(smx46::Params::default()))),
        SimTransport::for_module::<Smx46>()).unwrap())).unwrap();
    registry.insert(Box::new(Slot::new(2,
        Mux14d::new(Arc::new(ParamsCell::new(mux14d::Params::default()))),
        SimTransport::for_module::<Mux14d>()).unwrap())).unwrap();
    registry.insert(Box::new(Slot::new(4,
        Mio168::new(Arc::new(ParamsCell::new(mio168::Params::default()))),
        SimTransport::for_module::<Mio168>()).unwrap())).unwrap();
    assert_eq!(registry.len(), 4);

    test(registry, ignore, |runtime| async move {
        for index in [0, 1, 2, 4] {
            until_synchronized(&runtime, index).await;
        }
        let kinds = runtime.with_registry(|registry| registry.links().map(|link| link.kind).collect::<Vec<_>>()).await;
        assert_eq!(kinds, [ModuleKind::Prel6, ModuleKind::Smx46, ModuleKind::Mux14d, ModuleKind::Mio168]);

        let removed = runtime.remove(2).await.unwrap();
        assert_eq!(removed.link().kind, ModuleKind::None);
        assert!(runtime.with_registry(|registry| registry.link(2).is_none()).await);
        assert!(runtime.remove(2).await.is_err());
    });
}

#[test]
fn registry_slots() {
    let mut registry = SlotRegistry::new(2);
    assert!(registry.is_empty());
    let (first, _) = prel6_slot(1, LinkConfig::relay());
    let (second, _) = prel6_slot(1, LinkConfig::relay());
    let (outside, _) = prel6_slot(2, LinkConfig::relay());

    registry.insert(boxed(first)).unwrap();
    assert_eq!(registry.insert(boxed(second)).err(), Some(Error::SlotOccupied));
    assert_eq!(registry.insert(boxed(outside)).err(), Some(Error::SlotEmpty));
    assert_eq!(registry.capacity(), 2);
    assert_eq!(registry.len(), 1);
    assert_eq!(registry.bring_up_all(), 1);
    assert!(registry.get(0).is_none());

    let mut system = Recorder::default();
    registry.tick_all(0, &mut system);
    assert!(registry.link(1).unwrap().synchronized);

    assert!(registry.remove(1).is_ok());
    assert_eq!(registry.remove(1).err(), Some(Error::SlotEmpty));
}

#[test]
fn unread_events_are_bounded() {
    init_log();
    // every resynchronization is followed by a push failing once, which takes the link down again
    let config = LinkConfig::latency_sensitive().with_thresholds(1, 1);
    let (mut slot, _) = prel6_slot(0, config);
    for _ in 0 .. 80 {
        slot.transport_mut().pass(2);
        slot.transport_mut().inject(Fault::Error);
    }
    let mut registry = SlotRegistry::new(1);
    registry.insert(boxed(slot)).unwrap();

    tokio::runtime::Runtime::new()
    .expect("failed to create runtime")
    .block_on(async move {
        let runtime = Runtime::new(registry, ignore);
        assert_eq!(runtime.bring_up_all().await, 1);
        for _ in 0 .. 200 {
            runtime.tick().await;
        }
        assert!(runtime.with_registry(|registry| registry.link(0).unwrap().synchronized).await);

        let mut events = runtime.events().expect("event receiver");
        let mut received = 0;
        while let Ok(event) = events.try_recv() {
            assert_eq!(event, SystemEvent {kind: EventKind::SyncError, slot: 0});
            received += 1;
        }
        assert_eq!(received, host::EVENT_QUEUE);
    });
}

#[test]
fn handshakes_leave_the_executor_free() {
    init_log();
    let mut registry = SlotRegistry::new(3);
    let (alive, _) = prel6_slot(0, LinkConfig::relay());
    let (mut dead, _) = prel6_slot(2, LinkConfig::relay());
    dead.transport_mut().kill();
    registry.insert(boxed(alive)).unwrap();
    registry.insert(boxed(dead)).unwrap();

    // a single threaded runtime has no worker thread to block
    tokio::runtime::Builder::new_current_thread()
    .enable_all()
    .build()
    .expect("failed to create runtime")
    .block_on(async move {
        let runtime = Runtime::new(registry, ignore);
        assert_eq!(runtime.bring_up_all().await, 1);
        let results = runtime.with_registry(|registry| registry.links().map(|link| link.test_result).collect::<Vec<_>>()).await;
        assert_eq!(results, [TestResult::Connecting, TestResult::Failed]);
        runtime.tick().await;
        assert!(runtime.with_registry(|registry| registry.link(0).unwrap().synchronized).await);
    });
}
