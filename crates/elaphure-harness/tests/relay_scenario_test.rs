//! Session scenarios over the simulated network.
//!
//! Each test scripts the probe, submits batches through the fake producer
//! and checks the observed outcome with an oracle.

use std::time::Duration;

use elaphure_core::{SessionState, region::RESPONSE_INVALID};
use elaphure_harness::{ProbeScript, Reply, Scenario, info_record, scenario::oracle};
use elaphure_proto::{DapStatus, InfoId};

const READ_ONE_WORD: [u8; 4] = [0x05, 0x00, 0x01, 0x02];

#[test]
fn happy_path_relays_transfer() {
    let result = Scenario::new("happy path")
        .probe(ProbeScript::new().burst(vec![0x05, 0x01, 0x01, 0xEF, 0xBE, 0xAD, 0xDE]))
        .batch(1, READ_ONE_WORD.to_vec())
        .oracle(oracle::all_of(vec![
            oracle::connected(),
            oracle::no_disconnect(),
            Box::new(|outcome| {
                assert_eq!(outcome.reached, SessionState::Relaying);
                assert_eq!(outcome.final_state, SessionState::Closed);
                assert_eq!(outcome.completions.len(), 1);
                assert_eq!(outcome.completions[0].status, DapStatus::Ok.to_u32());
                assert_eq!(outcome.completions[0].payload, vec![0xEF, 0xBE, 0xAD, 0xDE]);
                assert_eq!(outcome.device.product_name, b"CMSIS-DAP elaphure");
                assert_eq!(outcome.device.serial_number, b"E1A0001");
                assert_eq!(outcome.device.firmware_version, b"2.1.0");
                assert_eq!(outcome.device.capabilities, 0x13);
                // Stopped by the host, so the ready flag is cleared again.
                assert!(!outcome.device.ready);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn handshake_and_queries_on_the_wire() {
    let result = Scenario::new("wire setup")
        .oracle(Box::new(|outcome| {
            assert_eq!(
                outcome.probe.handshake.as_deref(),
                Some(&[0x8a, 0x65, 0x6c, 0x70, 0, 0, 0, 0, 0, 0, 0, 1][..])
            );
            assert_eq!(
                outcome.probe.queries,
                vec![vec![0x00, 0x02], vec![0x00, 0x03], vec![0x00, 0x04], vec![0x00, 0xF0]]
            );
            assert!(outcome.probe.batches.is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn bad_magic_closes_with_identifier_message() {
    let result = Scenario::new("bad magic")
        .probe(ProbeScript::new().handshake(0x1234_5678, 0, 1))
        .batch(1, READ_ONE_WORD.to_vec())
        .oracle(oracle::all_of(vec![
            oracle::disconnected_with("identifier"),
            Box::new(|outcome| {
                assert_eq!(outcome.reached, SessionState::Closed);
                assert!(outcome.connects().is_empty());
                assert!(outcome.completions.is_empty());
                assert!(outcome.probe.queries.is_empty());
                assert!(!outcome.device.ready);
                assert_eq!(outcome.device.command_response, RESPONSE_INVALID);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn two_byte_capabilities_fill_only_the_low_half() {
    let result = Scenario::new("capabilities width")
        .probe(ProbeScript::new().info(InfoId::Capabilities, info_record(&[0xA5, 0x5A])))
        .oracle(oracle::all_of(vec![
            oracle::connected(),
            Box::new(|outcome| {
                assert_eq!(
                    outcome.device.capabilities.to_ne_bytes(),
                    [0xA5, 0x5A, 0x00, 0x00]
                );
                assert_eq!(outcome.device.product_name, b"CMSIS-DAP elaphure");
                assert_eq!(outcome.device.serial_number, b"E1A0001");
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn oversized_capabilities_never_relays() {
    let result = Scenario::new("capabilities bound")
        .probe(ProbeScript::new().info(InfoId::Capabilities, info_record(&[0x13, 0x00, 0x01])))
        .batch(1, READ_ONE_WORD.to_vec())
        .oracle(oracle::all_of(vec![
            oracle::disconnected_with("capabilities"),
            Box::new(|outcome| {
                assert_eq!(outcome.reached, SessionState::Closed);
                assert!(outcome.probe.batches.is_empty());
                assert!(!outcome.device.ready);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn overlong_product_name_is_rejected() {
    let name = vec![b'x'; 200];
    let result = Scenario::new("product name bound")
        .probe(ProbeScript::new().info(InfoId::ProductName, info_record(&name)))
        .oracle(oracle::all_of(vec![
            oracle::disconnected_with("product name"),
            Box::new(|outcome| {
                assert_eq!(outcome.probe.queries.len(), 1);
                assert!(outcome.device.product_name.is_empty());
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn count_mismatch_faults_then_next_batch_succeeds() {
    let result = Scenario::new("count mismatch")
        .probe(
            ProbeScript::new()
                .burst(vec![0x05, 0x01, 0x01, 1, 2, 3, 4])
                .burst(vec![0x05, 0x01, 0x01, 5, 6, 7, 8]),
        )
        .batch(2, vec![0x05, 0x00, 0x02, 0x02, 0x06])
        .batch(1, READ_ONE_WORD.to_vec())
        .oracle(oracle::all_of(vec![
            oracle::connected(),
            oracle::no_disconnect(),
            Box::new(|outcome| {
                assert_eq!(outcome.completions.len(), 2);
                assert_eq!(outcome.completions[0].status, DapStatus::Fault.to_u32());
                assert!(outcome.completions[0].payload.is_empty());
                assert_eq!(outcome.completions[1].status, DapStatus::Ok.to_u32());
                assert_eq!(outcome.completions[1].payload, vec![5, 6, 7, 8]);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn transfer_block_wait_reports_status_without_payload() {
    let result = Scenario::new("transfer block wait")
        .probe(ProbeScript::new().burst(vec![0x06, 0x04, 0x00, 0x02]))
        .batch(4, vec![0x06, 0x00, 0x04, 0x00, 0x0F])
        .oracle(Box::new(|outcome| {
            assert_eq!(outcome.completions.len(), 1);
            assert_eq!(outcome.completions[0].status, DapStatus::Wait.to_u32());
            assert!(outcome.completions[0].payload.is_empty());
            assert!(outcome.disconnects().is_empty());
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn enveloped_batch_relays_trailing_transfer() {
    let reply = vec![
        0x7F, 0x03, // envelope, three records
        0x11, 0x00, // SWJ_Clock
        0x04, 0x00, // TransferConfigure
        0x05, 0x01, 0x01, 0x78, 0x56, 0x34, 0x12, // Transfer, one word
    ];
    let result = Scenario::new("enveloped batch")
        .probe(ProbeScript::new().burst(reply))
        .batch(1, vec![0x7F, 0x03, 0x11, 0, 0, 0, 0, 0x04, 0, 0, 0, 0, 0, 0x05, 0, 1, 2])
        .oracle(Box::new(|outcome| {
            assert_eq!(outcome.completions.len(), 1);
            assert_eq!(outcome.completions[0].status, 1);
            assert_eq!(outcome.completions[0].payload, vec![0x78, 0x56, 0x34, 0x12]);
            Ok(())
        }))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn misaligned_payload_is_fatal() {
    let result = Scenario::new("misaligned payload")
        .probe(ProbeScript::new().burst(vec![0x05, 0x01, 0x01, 1, 2, 3]))
        .batch(1, READ_ONE_WORD.to_vec())
        .batch(1, READ_ONE_WORD.to_vec())
        .oracle(oracle::all_of(vec![
            oracle::connected(),
            oracle::disconnected_with("aligned"),
            Box::new(|outcome| {
                assert_eq!(outcome.completions.len(), 1);
                assert_eq!(outcome.completions[0].status, RESPONSE_INVALID);
                assert_eq!(outcome.probe.batches.len(), 1);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn peer_hangup_mid_relay_wakes_producer() {
    let result = Scenario::new("hangup")
        .probe(ProbeScript::new().reply(Reply::Hangup))
        .batch(1, READ_ONE_WORD.to_vec())
        .oracle(oracle::all_of(vec![
            oracle::disconnected_with("closed"),
            Box::new(|outcome| {
                assert_eq!(outcome.completions.len(), 1);
                assert_eq!(outcome.completions[0].status, RESPONSE_INVALID);
                assert!(!outcome.device.ready);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn silent_probe_hits_io_timeout() {
    let result = Scenario::new("silent probe")
        .probe(ProbeScript::new().reply(Reply::Silent))
        .batch(1, READ_ONE_WORD.to_vec())
        .io_timeout(Duration::from_secs(2))
        .oracle(oracle::all_of(vec![
            oracle::disconnected_with("no response"),
            Box::new(|outcome| {
                assert_eq!(outcome.completions[0].status, RESPONSE_INVALID);
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}

#[test]
fn batches_stay_serialized_under_latency() {
    let batches: Vec<Vec<u8>> = (0u8..4).map(|i| vec![0x05, 0x00, 0x01, 0x02 | (i << 4)]).collect();

    let mut script = ProbeScript::new();
    let mut scenario = Scenario::new("latency").latency(Duration::from_millis(50));
    for (i, batch) in batches.iter().enumerate() {
        script = script.burst(vec![0x05, 0x01, 0x01, i as u8, 0, 0, 0]);
        scenario = scenario.batch(1, batch.clone());
    }

    let result = scenario
        .probe(script)
        .oracle(oracle::all_of(vec![
            oracle::one_batch_in_flight(batches),
            Box::new(|outcome| {
                assert_eq!(outcome.probe.batches.len(), 4);
                for (i, completion) in outcome.completions.iter().enumerate() {
                    assert_eq!(completion.payload, vec![i as u8, 0, 0, 0]);
                }
                Ok(())
            }),
        ]))
        .run();

    assert!(result.is_ok(), "scenario should succeed: {result:?}");
}
