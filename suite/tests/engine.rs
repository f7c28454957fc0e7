mod common;

use slotlink::{
    Error,
    catalog::{CommandSet, ModuleKind},
    config::LinkConfig,
    escalation::{EventKind, SystemEvent},
    exchange::{ExchangeState, Failure},
    frame::CommandWord,
    link::TestResult,
    modules::{opcodes, prel6},
    sim::Fault,
    transport::TransferStatus,
    };
use common::*;


#[test]
fn cold_bring_up() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, params) = prel6_slot(2, LinkConfig::relay());

    let identity = slot.bring_up().unwrap();
    assert_eq!(slot.link().test_result, TestResult::Connecting);
    assert_eq!(slot.transport().last_revision(), Some(ModuleKind::Prel6.revision()));
    assert!(!slot.link().synchronized);

    let completion = complete(&mut slot, 0, &mut system);
    assert_eq!(completion.command, prel6::Command::GetInfo);
    assert!(completion.success);
    assert!(slot.link().synchronized);
    assert_eq!(slot.link().test_result, TestResult::Ok);
    assert_eq!(slot.link().hardware_id, identity.hardware_id);
    assert_eq!(slot.link().firmware_version(), (1, 0));

    // forced push after synchronization, then state polling at the refresh interval
    assert_eq!(complete(&mut slot, 0, &mut system).command, prel6::Command::SetParams);
    assert_eq!(params.transferred(), Some(params.snapshot()));
    assert_eq!(complete(&mut slot, 0, &mut system).command, prel6::Command::GetState);
    assert_eq!(slot.tick(500, &mut system), None);
    assert_eq!(slot.tick(999, &mut system), None);
    assert_eq!(complete(&mut slot, 1000, &mut system).command, prel6::Command::GetState);
    assert_eq!(slot.tick(1500, &mut system), None);
    assert_eq!(complete(&mut slot, 2000, &mut system).command, prel6::Command::GetState);

    assert_eq!(
        slot.transport().requests().collect::<Vec<_>>(),
        [opcodes::GET_INFO, opcodes::SET_PARAMS, opcodes::GET_STATE, opcodes::GET_STATE, opcodes::GET_STATE],
        );
    assert!(system.events.is_empty());
}

#[test]
fn every_command_is_echoed() {
    init_log();
    let (mut slot, _) = prel6_slot(0, LinkConfig::relay());
    slot.bring_up().unwrap();
    for descriptor in prel6::Command::catalog() {
        let response = slot.execute_blocking(descriptor.command).unwrap();
        assert_eq!(u32::from(response.command), u32::from(descriptor.command.word()) | 0x8000);
        assert!(response.command.echoes(CommandWord::of(descriptor.opcode)));
    }
    // a diagnostic round trip does not touch the link
    assert!(!slot.link().synchronized);

    slot.transport_mut().inject(Fault::Busy);
    assert_eq!(slot.execute_blocking(prel6::Command::GetState).map(|_| ()), Err(Error::Transfer(TransferStatus::Busy)));
    slot.transport_mut().inject(Fault::Crc);
    assert_eq!(slot.execute_blocking(prel6::Command::GetState).map(|_| ()), Err(Error::Crc));
    slot.transport_mut().pass(1);
    slot.transport_mut().inject(Fault::Mismatch);
    assert_eq!(slot.execute_blocking(prel6::Command::GetState).map(|_| ()), Err(Error::ResponseMismatch));
}

#[test]
fn exactly_one_completion_per_command() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, params) = prel6_slot(0, LinkConfig::relay());
    synchronized(&mut slot, &mut system);

    for i in 0 .. 10u8 {
        params.update(|params| params.closed = i);
        let completion = complete(&mut slot, 0, &mut system);
        assert_eq!(completion.command, prel6::Command::SetParams);
        assert_eq!(completion.retries, 0);
        assert_eq!(slot.exchange_state(), ExchangeState::Idle);
        assert_eq!(slot.tick(0, &mut system), None);
    }
    assert_eq!(slot.transport().requests().count(), 10);
    // one request and one poll per exchange
    assert_eq!(slot.transport().transfers(), 2 * (3 + 10));
}

#[test]
fn retries_are_bounded() {
    init_log();
    let mut system = Recorder::default();
    let config = LinkConfig::latency_sensitive().with_max_retries(5);
    let (mut slot, params) = prel6_slot(0, config);
    synchronized(&mut slot, &mut system);

    for failures in 0 .. 5 {
        params.update(|params| params.hold_ms += 1);
        slot.transport_mut().inject_n(Fault::Crc, failures);
        let completion = complete(&mut slot, 0, &mut system);
        assert!(completion.success);
        assert_eq!(completion.retries, failures as u32);
        assert_eq!(slot.link().crc_error_count, 0);
    }

    params.update(|params| params.hold_ms += 1);
    slot.transport_mut().fail_always(Some(Fault::Error));
    let completion = complete(&mut slot, 0, &mut system);
    assert!(!completion.success);
    assert_eq!(completion.retries, 5);
    assert_eq!(completion.failure, Some(Failure::Transfer(TransferStatus::Error)));
    assert_eq!(completion.result(), Err(Error::RetryExhausted));
    // nothing acknowledged, the push is attempted again
    assert_ne!(params.transferred(), Some(params.snapshot()));
    assert_eq!(slot.link().transfer_error_count, 5);
    assert!(system.events.is_empty());

    slot.transport_mut().fail_always(None);
    let completion = complete(&mut slot, 0, &mut system);
    assert_eq!(completion.command, prel6::Command::SetParams);
    assert!(completion.success);
    assert_eq!(slot.link().transfer_error_count, 0);
}

#[test]
fn unchanged_params_are_not_pushed_twice() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, params) = prel6_slot(0, LinkConfig::relay());
    synchronized(&mut slot, &mut system);

    params.update(|params| params.closed = 0b111111);
    assert_eq!(complete(&mut slot, 10, &mut system).command, prel6::Command::SetParams);
    // same value published again
    params.publish(params.snapshot());
    assert_eq!(slot.tick(20, &mut system), None);
    assert_eq!(complete(&mut slot, 1000, &mut system).command, prel6::Command::GetState);
    assert_eq!(
        slot.transport().requests().collect::<Vec<_>>(),
        [opcodes::SET_PARAMS, opcodes::GET_STATE],
        );
}

#[test]
fn crc_threshold_escalates_once() {
    init_log();
    let mut system = Recorder::default();
    let config = LinkConfig::latency_sensitive().with_thresholds(3, 3).with_max_retries(10);
    let (mut slot, params) = prel6_slot(4, config);
    synchronized(&mut slot, &mut system);
    let acknowledged = params.transferred();

    params.update(|params| params.closed = 0b111);
    slot.transport_mut().inject_n(Fault::Crc, 5);
    let completion = complete(&mut slot, 10, &mut system);
    // the escalation ends the exchange, no retry goes out on a failed link
    assert_eq!(completion.command, prel6::Command::SetParams);
    assert!(!completion.success);
    assert_eq!(completion.retries, 3);
    assert_eq!(completion.failure, Some(Failure::Transfer(TransferStatus::CrcError)));
    assert_eq!(system.events, [SystemEvent {kind: EventKind::CrcCheckError, slot: 4}]);
    assert!(!slot.link().synchronized);
    assert_eq!(slot.link().test_result, TestResult::Failed);
    assert_eq!(params.transferred(), acknowledged);
    assert_eq!(
        slot.transport().requests().collect::<Vec<_>>(),
        [opcodes::SET_PARAMS, opcodes::SET_PARAMS, opcodes::SET_PARAMS],
        );

    // recovery goes through a fresh GET_INFO, failures of an unsynchronized link are not escalated
    let completion = complete(&mut slot, 20, &mut system);
    assert_eq!(completion.command, prel6::Command::GetInfo);
    assert!(completion.success);
    assert_eq!(completion.retries, 2);
    assert!(slot.link().synchronized);
    assert_eq!(slot.link().test_result, TestResult::Ok);
    assert_eq!(complete(&mut slot, 20, &mut system).command, prel6::Command::SetParams);
    assert_eq!(params.transferred().map(|params| params.closed), Some(0b111));
    assert_eq!(system.events.len(), 1);
}

#[test]
fn crc_storm_below_threshold() {
    init_log();
    let mut system = Recorder::default();
    let config = LinkConfig::latency_sensitive().with_thresholds(10, 10).with_max_retries(20);
    let (mut slot, params) = prel6_slot(1, config);
    synchronized(&mut slot, &mut system);

    params.update(|params| params.closed = 0b100000);
    slot.transport_mut().inject_n(Fault::Crc, 9);
    let completion = complete(&mut slot, 10, &mut system);
    assert!(completion.success);
    assert_eq!(completion.retries, 9);
    assert!(system.events.is_empty());
    assert!(slot.link().synchronized);
    assert_eq!(slot.link().test_result, TestResult::Ok);
    assert_eq!((slot.link().crc_error_count, slot.link().transfer_error_count), (0, 0));
    assert_eq!(slot.link().last_success, 10);
}

#[test]
fn mismatches_count_as_transfer_errors() {
    init_log();
    let mut system = Recorder::default();
    let config = LinkConfig::latency_sensitive().with_thresholds(3, 3).with_max_retries(4);
    let (mut slot, params) = prel6_slot(3, config);
    synchronized(&mut slot, &mut system);

    params.update(|params| params.closed = 0b1);
    slot.transport_mut().fail_always(Some(Fault::Mismatch));
    let completion = complete(&mut slot, 10, &mut system);
    assert!(!completion.success);
    assert_eq!(completion.retries, 3);
    assert_eq!(completion.failure, Some(Failure::Mismatch));
    assert_eq!(system.events, [SystemEvent {kind: EventKind::SyncError, slot: 3}]);
    assert_eq!(slot.link().crc_error_count, 0);
}

#[test]
fn out_of_sync_timeout() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, _) = prel6_slot(5, LinkConfig::relay());
    synchronized(&mut slot, &mut system);
    let transfers = slot.transport().transfers();

    assert_eq!(slot.tick(10_000, &mut system), None);
    assert_eq!(system.events, [SystemEvent {kind: EventKind::SyncError, slot: 5}]);
    assert!(!slot.link().synchronized);
    assert_eq!(slot.link().test_result, TestResult::Failed);
    // no command issued on that tick
    assert_eq!(slot.transport().transfers(), transfers);
    assert_eq!(slot.exchange_state(), ExchangeState::Idle);

    assert_eq!(complete(&mut slot, 10_001, &mut system).command, prel6::Command::GetInfo);
    assert_eq!(system.events.len(), 1);
}

#[test]
fn silent_transfers_time_out() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, params) = prel6_slot(0, LinkConfig::relay());
    synchronized(&mut slot, &mut system);

    params.update(|params| params.closed = 0b10);
    slot.transport_mut().inject(Fault::Silent);
    assert_eq!(slot.tick(100, &mut system), None);
    assert_eq!(slot.exchange_state(), ExchangeState::WaitTransferForRequest);
    assert_eq!(slot.tick(449, &mut system), None);
    let completion = complete(&mut slot, 450, &mut system);
    assert!(completion.success);
    assert_eq!(completion.retries, 1);
    assert_eq!(slot.transport().aborts(), 1);
}

#[test]
fn dead_module_fails_silently() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, _) = prel6_slot(6, LinkConfig::latency_sensitive().with_max_retries(3));
    slot.transport_mut().kill();

    assert_eq!(slot.bring_up().map(|_| ()), Err(Error::HandshakeTimeout));
    assert_eq!(slot.link().test_result, TestResult::Failed);
    assert_eq!(slot.link().hardware_id, [0; 3]);

    assert_eq!(slot.tick(0, &mut system), None);
    assert_eq!(slot.current_command(), Some(prel6::Command::GetInfo));
    assert_eq!(slot.tick(350, &mut system), None);
    assert_eq!(slot.tick(700, &mut system), None);
    let completion = complete(&mut slot, 1050, &mut system);
    assert!(!completion.success);
    assert_eq!(completion.failure, Some(Failure::Timeout));
    assert_eq!(completion.retries, 3);
    // never synchronized, nothing is escalated
    assert!(system.events.is_empty());
    assert!(!slot.link().synchronized);

    // the module comes back and the next GET_INFO brings the link up
    slot.transport_mut().revive();
    assert_eq!(complete(&mut slot, 1100, &mut system).command, prel6::Command::GetInfo);
    assert!(slot.link().synchronized);
}

#[test]
fn removal_resets_the_slot() {
    init_log();
    let mut system = Recorder::default();
    let (mut slot, params) = prel6_slot(7, LinkConfig::relay());
    synchronized(&mut slot, &mut system);
    assert!(params.transferred().is_some());
    assert!(slot.module().state().is_some());

    slot.remove();
    assert_eq!(slot.link().kind, ModuleKind::None);
    assert_eq!(slot.link().slot, 7);
    assert_eq!(slot.link().test_result, TestResult::None);
    assert!(!slot.link().synchronized);
    assert!(params.transferred().is_none());
    assert!(slot.module().state().is_none());

    let transfers = slot.transport().transfers();
    assert_eq!(slot.tick(5000, &mut system), None);
    assert_eq!(slot.transport().transfers(), transfers);
    assert_eq!(slot.bring_up().map(|_| ()), Err(Error::SlotEmpty));
}
