//! Integration tests for the frame → dispatcher → feedback pipeline.
//!
//! Every request goes through the real codec, the command engine and the
//! config store; only persistence and peripherals are mocked.

use core::time::Duration;

use feeder::app::ports::RestartReason;
use feeder::config::{DeviceConfig, Direction, OperatingMode};
use feeder::rpc::codec;
use feeder::rpc::message::{FB_ERROR, FB_OK, FeedbackMessage, Message};

use crate::mock_hw::Rig;

fn web_account(server: &[u8], port: &[u8], id: &[u8], pass: &[u8]) -> Vec<u8> {
    let mut p = vec![server.len() as u8, port.len() as u8, id.len() as u8, pass.len() as u8];
    p.extend_from_slice(server);
    p.extend_from_slice(port);
    p.extend_from_slice(id);
    p.extend_from_slice(pass);
    p
}

fn wifi(ssid: &[u8], pass: &[u8]) -> Vec<u8> {
    let mut p = vec![ssid.len() as u8, pass.len() as u8];
    p.extend_from_slice(ssid);
    p.extend_from_slice(pass);
    p
}

fn motor_payload(dirs: &[u8; 5], freqs: [u16; 5], steps: [u16; 5]) -> Vec<u8> {
    let mut p = dirs.to_vec();
    for f in freqs {
        p.extend_from_slice(&f.to_le_bytes());
    }
    for s in steps {
        p.extend_from_slice(&s.to_le_bytes());
    }
    p
}

fn schedule(entries: &[(u8, u8, [u8; 5])]) -> Vec<u8> {
    let mut p = Vec::new();
    for (hour, minute, counts) in entries {
        p.push(*hour);
        p.push(*minute);
        p.extend_from_slice(counts);
    }
    p
}

// ── Queries ──────────────────────────────────────────────────

#[test]
fn get_mac_returns_nul_terminated_string() {
    let mut rig = Rig::new();
    let out = rig.send(1, 0x01, 0, &[]);
    assert_eq!(out.status, Some(FB_OK));

    let fb = rig.take_feedback();
    assert_eq!(fb.client_id, 1);
    assert_eq!(fb.message.payload(), b"DE:AD:BE:EF:CA:FE\0");
    assert_eq!(fb.message.length, 18);
    assert_eq!(rig.take_notice().line2.as_str(), "CMD:01 OK");
}

#[test]
fn get_state_returns_fixed_flags() {
    let mut rig = Rig::new();
    rig.send(4, 0x03, 0, &[]);
    let fb = rig.take_feedback();
    assert_eq!(fb.message.payload(), &[0, 0, 1, 1, 0]);
    assert_eq!(fb.message.checksum, fb.message.compute_checksum());
}

#[test]
fn get_firmware_version_little_endian() {
    let mut rig = Rig::new();
    rig.send(1, 0x04, 0, &[]);
    assert_eq!(
        rig.take_feedback().message.payload(),
        &feeder::config::FIRMWARE_VERSION.to_le_bytes()
    );
}

#[test]
fn get_id_echoes_account_id() {
    let mut rig = Rig::new();
    rig.send(1, 0x05, 0, &[]);
    assert_eq!(rig.take_feedback().message.payload(), &[0]);

    rig.send(1, 0x11, 0, &web_account(b"cloud.example", &[0x5B, 0x22], b"feeder-7", b"pw"));
    rig.take_feedback();
    rig.send(1, 0x05, 0, &[]);
    assert_eq!(rig.take_feedback().message.payload(), b"feeder-7\0");
}

#[test]
fn camera_request_is_signalled() {
    let mut rig = Rig::new();
    assert!(!rig.camera.signaled());
    let out = rig.send(2, 0x02, 0, &[]);
    assert_eq!(out.status, Some(FB_OK));
    assert!(rig.camera.signaled());
}

// ── Credentials ──────────────────────────────────────────────

#[test]
fn web_account_alone_stays_in_ap_mode() {
    let mut rig = Rig::new();
    let out = rig.send(1, 0x11, 0, &web_account(b"cloud.example", &[0x5B, 0x22], b"id", b"pw"));
    assert_eq!(out.status, Some(FB_OK));
    assert!(out.restart.is_none());

    let net = rig.store.snapshot().network;
    assert_eq!(&net.server[..], b"cloud.example");
    assert_eq!(net.port, 0x225B);
    assert!(net.cloud_configured);
    assert_eq!(net.mode, OperatingMode::AccessPoint);
    assert_eq!(rig.config.saves.get(), 1);
}

#[test]
fn both_credentials_promote_and_restart() {
    let mut rig = Rig::new();
    let out = rig.send(1, 0x12, 0, &wifi(b"barn-ap", b"hunter22"));
    assert!(out.restart.is_none());
    rig.take_feedback();

    let out = rig.send(1, 0x11, 0, &web_account(b"10.0.0.2", &[0x50, 0x00], b"id", b"pw"));
    assert_eq!(out.status, Some(FB_OK));
    let restart = out.restart.expect("restart into station mode");
    assert_eq!(restart.reason, RestartReason::NetworkConfigured);
    assert_eq!(restart.delay, Duration::from_millis(1010));

    let net = rig.store.snapshot().network;
    assert_eq!(net.mode, OperatingMode::Station);
    assert_eq!(&net.ssid[..], b"barn-ap");
    let persisted = rig.config.saved.borrow().clone().unwrap();
    assert_eq!(persisted.network.mode, OperatingMode::Station);
}

#[test]
fn web_account_length_mismatch_rejected() {
    let mut rig = Rig::new();
    let mut p = web_account(b"srv", &[1, 0], b"id", b"pw");
    p.push(0x00);
    let out = rig.send(1, 0x11, 0, &p);
    assert_eq!(out.status, Some(FB_ERROR));
    assert_eq!(rig.store.snapshot(), DeviceConfig::default());
    assert_eq!(rig.config.saves.get(), 0);
}

#[test]
fn wifi_allows_trailing_bytes_but_not_short_payload() {
    let mut rig = Rig::new();
    let mut p = wifi(b"ap", b"pw");
    p.extend_from_slice(&[0xAA, 0xBB]);
    assert_eq!(rig.send(1, 0x12, 0, &p).status, Some(FB_OK));
    rig.take_feedback();

    let short = vec![5, 5, b'a', b'b'];
    assert_eq!(rig.send(1, 0x12, 0, &short).status, Some(FB_ERROR));
}

#[test]
fn oversized_ssid_rejected() {
    let mut rig = Rig::new();
    let ssid = [b's'; 33];
    assert_eq!(rig.send(1, 0x12, 0, &wifi(&ssid, b"pw")).status, Some(FB_ERROR));
    assert!(!rig.store.snapshot().network.wifi_configured);
}

// ── Motor, time and schedule ─────────────────────────────────

#[test]
fn set_motor_updates_calibration() {
    let mut rig = Rig::new();
    let p = motor_payload(b"LRLxR", [100, 200, 300, 400, 500], [10, 20, 30, 40, 50]);
    assert_eq!(rig.send(1, 0x13, 0, &p).status, Some(FB_OK));

    let motors = rig.store.snapshot().motors;
    assert_eq!(motors[0].direction, Direction::Left);
    assert_eq!(motors[1].direction, Direction::Right);
    assert_eq!(motors[2].direction, Direction::Left);
    assert_eq!(motors[3].direction, Direction::Right);
    assert_eq!(motors[4].frequency_hz, 500);
    assert_eq!(motors[2].steps_per_unit, 30);
}

#[test]
fn set_motor_short_payload_rejected() {
    let mut rig = Rig::new();
    let p = motor_payload(b"LLLLL", [1; 5], [1; 5]);
    assert_eq!(rig.send(1, 0x13, 0, &p[..24]).status, Some(FB_ERROR));
    assert_eq!(rig.store.snapshot(), DeviceConfig::default());
}

#[test]
fn set_motor_zero_frequency_fails_validation() {
    let mut rig = Rig::new();
    let p = motor_payload(b"RRRRR", [500, 0, 500, 500, 500], [200; 5]);
    assert_eq!(rig.send(1, 0x13, 0, &p).status, Some(FB_ERROR));
    assert_eq!(rig.store.snapshot(), DeviceConfig::default());
}

#[test]
fn echo_convention_acknowledges_with_command_code() {
    let mut rig = Rig::with_echo(true);
    let p = motor_payload(b"RRRRR", [500; 5], [200; 5]);
    assert_eq!(rig.send(1, 0x13, 0, &p).status, Some(0x13));
    assert_eq!(rig.take_feedback().message.command, 0x13);
}

#[test]
fn set_time_programs_rtc() {
    let mut rig = Rig::new();
    let mut p = 2024u16.to_le_bytes().to_vec();
    p.extend_from_slice(&[6, 15, 8, 30, 5]);
    assert_eq!(rig.send(1, 0x14, 0, &p).status, Some(FB_OK));
    assert_eq!(rig.rtc.now.to_string(), "2024-06-15 08:30:05");
}

#[test]
fn set_time_invalid_month_rejected() {
    let mut rig = Rig::new();
    let before = rig.rtc.now;
    let mut p = 2024u16.to_le_bytes().to_vec();
    p.extend_from_slice(&[13, 1, 0, 0, 0]);
    assert_eq!(rig.send(1, 0x14, 0, &p).status, Some(FB_ERROR));
    assert_eq!(rig.rtc.now, before);
}

#[test]
fn set_schedule_replaces_entries() {
    let mut rig = Rig::new();
    let p = schedule(&[(7, 0, [1, 0, 0, 0, 0]), (12, 30, [0, 2, 0, 0, 0]), (19, 45, [1, 1, 1, 1, 1])]);
    assert_eq!(rig.send(1, 0x15, 0, &p).status, Some(FB_OK));
    let sched = rig.store.snapshot().schedule;
    assert_eq!(sched.len(), 3);
    assert_eq!((sched[1].hour, sched[1].minute), (12, 30));
    assert_eq!(sched[2].feed_counts, [1, 1, 1, 1, 1]);

    let p = schedule(&[(6, 0, [3, 0, 0, 0, 0])]);
    assert_eq!(rig.send(1, 0x15, 0, &p).status, Some(FB_OK));
    assert_eq!(rig.store.snapshot().schedule.len(), 1);
}

#[test]
fn set_schedule_empty_clears() {
    let mut rig = Rig::new();
    rig.send(1, 0x15, 0, &schedule(&[(7, 0, [1, 0, 0, 0, 0])]));
    assert_eq!(rig.send(1, 0x15, 0, &[]).status, Some(FB_OK));
    assert!(rig.store.snapshot().schedule.is_empty());
}

#[test]
fn set_schedule_too_many_entries_rejected() {
    let mut rig = Rig::new();
    let entries: Vec<_> = (0..13).map(|h| (h as u8, 0, [1, 0, 0, 0, 0])).collect();
    assert_eq!(rig.send(1, 0x15, 0, &schedule(&entries)).status, Some(FB_ERROR));
    assert!(rig.store.snapshot().schedule.is_empty());
}

#[test]
fn set_schedule_partial_entry_rejected() {
    let mut rig = Rig::new();
    let mut p = schedule(&[(7, 0, [1, 0, 0, 0, 0])]);
    p.push(8);
    assert_eq!(rig.send(1, 0x15, 0, &p).status, Some(FB_ERROR));
}

#[test]
fn set_schedule_bad_hour_never_persisted() {
    let mut rig = Rig::new();
    let p = schedule(&[(24, 0, [1, 0, 0, 0, 0])]);
    assert_eq!(rig.send(1, 0x15, 0, &p).status, Some(FB_ERROR));
    assert!(rig.config.saved.borrow().is_none());
}

// ── Persistence failure ──────────────────────────────────────

#[test]
fn persist_failure_keeps_previous_record() {
    let mut rig = Rig::new();
    rig.send(1, 0x15, 0, &schedule(&[(7, 0, [1, 0, 0, 0, 0])]));
    rig.take_feedback();
    let before = rig.store.snapshot();

    rig.config.fail.set(true);
    let p = motor_payload(b"LLLLL", [900; 5], [5; 5]);
    let out = rig.send(1, 0x13, 0, &p);
    assert_eq!(out.status, Some(FB_ERROR));
    assert_eq!(rig.store.snapshot(), before);
    assert_eq!(rig.take_feedback().message.payload, None);
}

// ── Factory reset ────────────────────────────────────────────

#[test]
fn factory_new_resets_and_restarts() {
    let mut rig = Rig::new();
    rig.send(1, 0x12, 0, &wifi(b"barn-ap", b"hunter22"));
    rig.send(1, 0x15, 0, &schedule(&[(7, 0, [1, 0, 0, 0, 0])]));
    assert_ne!(rig.store.snapshot(), DeviceConfig::default());

    let out = rig.send(1, 0x41, 0, &[]);
    assert_eq!(out.status, Some(FB_OK));
    let restart = out.restart.unwrap();
    assert_eq!(restart.reason, RestartReason::FactoryReset);
    assert_eq!(restart.delay, Duration::from_millis(1000));
    assert_eq!(rig.store.snapshot(), DeviceConfig::default());
    assert_eq!(rig.config.saved.borrow().clone().unwrap(), DeviceConfig::default());
}

#[test]
fn factory_new_restarts_even_if_persist_fails() {
    let mut rig = Rig::new();
    rig.config.fail.set(true);
    let out = rig.send(1, 0x41, 0, &[]);
    assert_eq!(out.status, Some(FB_ERROR));
    assert_eq!(out.restart.unwrap().reason, RestartReason::FactoryReset);
}

// ── Rejections ───────────────────────────────────────────────

#[test]
fn push_codes_rejected_as_requests() {
    let mut rig = Rig::new();
    for code in [0x21, 0x22, 0x23] {
        assert_eq!(rig.send(3, code, 0, &[1, 2, 3]).status, Some(FB_ERROR));
        let fb = rig.take_feedback();
        assert_eq!(fb.message.command, FB_ERROR);
        assert_eq!(fb.message.length, 0);
    }
}

#[test]
fn unknown_command_rejected() {
    let mut rig = Rig::new();
    assert_eq!(rig.send(1, 0x42, 0, &[]).status, Some(FB_ERROR));
    assert_eq!(rig.take_notice().line2.as_str(), "CMD:42 Error");
}

#[test]
fn client_feedback_is_not_answered() {
    let mut rig = Rig::new();
    let out = rig.send(1, 0xF0, 0, &[]);
    assert_eq!(out.status, None);
    assert!(rig.feedback.try_receive().is_err());
    assert!(rig.display.try_receive().is_err());
}

#[test]
fn corrupted_frame_is_not_answered() {
    let mut rig = Rig::new();
    let mut wire = codec::encode(&Message::new(0x03, 0, None));
    let last = wire.len() - 1;
    wire[last] = wire[last].wrapping_add(1);
    let out = rig.handle(5, Message::from_frame(&wire));
    assert_eq!(out.status, None);
    assert!(rig.feedback.try_receive().is_err());
}

#[test]
fn error_feedback_wire_form() {
    let fb = FeedbackMessage::build(5, FB_ERROR, 9, Some(vec![1, 2, 3]));
    assert_eq!(
        codec::encode(&fb.message),
        vec![0xA5, 0xA5, 0xA5, 0xA5, 0xFF, 0, 0, 0, 0, 0xFF]
    );
}
