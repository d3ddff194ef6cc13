//! Integration tests for in-band firmware update.
//!
//! Drives OtaUpdateRequest → OtaBinData × N → OtaVerify through the codec
//! and dispatcher into an in-memory staging region.

use core::time::Duration;

use feeder::app::ports::RestartReason;
use feeder::config::{FIRMWARE_VERSION, FirmwareInfo};
use feeder::rpc::checksum::crc16_ccitt;
use feeder::rpc::message::{FB_ERROR, FB_OK, FB_UPDATED};
use feeder::rpc::ota::OtaState;

use crate::mock_hw::{IMAGE_CAPACITY, Rig};

const REQUEST: u8 = 0x31;
const BIN: u8 = 0x32;
const VERIFY: u8 = 0x33;

fn image(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 31 + 7) as u8).collect()
}

fn first_packet(version: u16, crc: u16, size: u32, slice: &[u8]) -> Vec<u8> {
    let mut p = Vec::with_capacity(8 + slice.len());
    p.extend_from_slice(&version.to_le_bytes());
    p.extend_from_slice(&crc.to_le_bytes());
    p.extend_from_slice(&size.to_le_bytes());
    p.extend_from_slice(slice);
    p
}

/// Send packet 0 with the first `head` bytes, then the rest in `chunk`-sized
/// packets. Asserts every packet is acknowledged.
fn transfer(rig: &mut Rig, version: u16, crc: u16, data: &[u8], head: usize, chunk: usize) {
    let out = rig.send(1, BIN, 0, &first_packet(version, crc, data.len() as u32, &data[..head]));
    assert_eq!(out.status, Some(FB_OK));
    for (i, part) in data[head..].chunks(chunk).enumerate() {
        let out = rig.send(1, BIN, (i + 1) as u16, part);
        assert_eq!(out.status, Some(FB_OK), "packet {}", i + 1);
    }
}

fn drain(rig: &Rig) {
    while rig.feedback.try_receive().is_ok() {}
    while rig.display.try_receive().is_ok() {}
}

#[test]
fn full_update_verifies_and_restarts() {
    let mut rig = Rig::new();
    let data = image(3000);
    let crc = crc16_ccitt(&data);
    let next = FIRMWARE_VERSION + 1;

    let out = rig.send(1, REQUEST, 0, &next.to_le_bytes());
    assert_eq!(out.status, Some(FB_OK));
    assert_eq!(rig.engine.ota().state(), OtaState::Requested);
    assert_eq!(*rig.firmware.info.borrow(), FirmwareInfo::default());
    drain(&rig);

    transfer(&mut rig, next, crc, &data, 500, 1000);
    drain(&rig);
    assert_eq!(rig.engine.ota().state(), OtaState::Transferring);
    assert_eq!(rig.engine.ota().session().write_offset, 3000);

    let out = rig.send(1, VERIFY, 0, &[]);
    assert_eq!(out.status, Some(FB_OK));
    let restart = out.restart.expect("restart into new image");
    assert_eq!(restart.reason, RestartReason::FirmwareUpdated);
    assert_eq!(restart.delay, Duration::from_millis(3100));

    assert!(rig.image.is_activated());
    assert_eq!(&rig.image.bytes()[..3000], &data[..]);
    assert_eq!(
        *rig.firmware.info.borrow(),
        FirmwareInfo {
            installed_version: next,
            installed_length: 3000,
            installed_crc: crc,
        }
    );
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
}

#[test]
fn same_version_reports_updated() {
    let mut rig = Rig::new();
    let before = *rig.firmware.info.borrow();
    let out = rig.send(1, REQUEST, 0, &FIRMWARE_VERSION.to_le_bytes());
    assert_eq!(out.status, Some(FB_UPDATED));
    assert_eq!(rig.take_notice().line2.as_str(), "CMD:31 Updated");
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
    assert_eq!(*rig.firmware.info.borrow(), before);
}

#[test]
fn malformed_request_rejected() {
    let mut rig = Rig::new();
    assert_eq!(rig.send(1, REQUEST, 0, &[9]).status, Some(FB_ERROR));
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
}

#[test]
fn bin_data_without_request_rejected() {
    let mut rig = Rig::new();
    let data = image(64);
    let out = rig.send(1, BIN, 0, &first_packet(9, crc16_ccitt(&data), 64, &data));
    assert_eq!(out.status, Some(FB_ERROR));
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
    assert!(rig.image.bytes().iter().all(|&b| b == 0xFF));
}

#[test]
fn corrupted_image_fails_verify_without_restart() {
    let mut rig = Rig::new();
    let data = image(2048);
    let crc = crc16_ccitt(&data);
    let next = FIRMWARE_VERSION + 1;
    rig.send(1, REQUEST, 0, &next.to_le_bytes());

    let mut bad = data.clone();
    bad[1500] ^= 0x01;
    transfer(&mut rig, next, crc, &bad, 1000, 1000);
    drain(&rig);

    let out = rig.send(1, VERIFY, 0, &[]);
    assert_eq!(out.status, Some(FB_ERROR));
    assert!(out.restart.is_none());
    assert!(!rig.image.is_activated());
    assert_eq!(*rig.firmware.info.borrow(), FirmwareInfo::default());
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
}

#[test]
fn info_store_failure_fails_verify_without_activation() {
    let mut rig = Rig::new();
    let data = image(1500);
    let next = FIRMWARE_VERSION + 1;
    rig.send(1, REQUEST, 0, &next.to_le_bytes());
    transfer(&mut rig, next, crc16_ccitt(&data), &data, 700, 400);
    drain(&rig);

    rig.firmware.fail.set(true);
    let out = rig.send(1, VERIFY, 0, &[]);
    assert_eq!(out.status, Some(FB_ERROR));
    assert!(out.restart.is_none());
    assert!(!rig.image.is_activated());
    assert_eq!(*rig.firmware.info.borrow(), FirmwareInfo::default());
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
}

#[test]
fn short_transfer_fails_verify() {
    let mut rig = Rig::new();
    let data = image(1200);
    let next = FIRMWARE_VERSION + 1;
    rig.send(1, REQUEST, 0, &next.to_le_bytes());
    let out = rig.send(1, BIN, 0, &first_packet(next, crc16_ccitt(&data), 1200, &data[..600]));
    assert_eq!(out.status, Some(FB_OK));

    assert_eq!(rig.send(1, VERIFY, 0, &[]).status, Some(FB_ERROR));
    assert_eq!(rig.engine.ota().state(), OtaState::Idle);
}

#[test]
fn declared_size_over_capacity_rejected() {
    let mut rig = Rig::new();
    let next = FIRMWARE_VERSION + 1;
    rig.send(1, REQUEST, 0, &next.to_le_bytes());
    let out = rig.send(1, BIN, 0, &first_packet(next, 0, IMAGE_CAPACITY as u32 + 1, &[0; 16]));
    assert_eq!(out.status, Some(FB_ERROR));
    assert_eq!(rig.engine.ota().state(), OtaState::Requested);
}

#[test]
fn fresh_request_restarts_transfer() {
    let mut rig = Rig::new();
    let next = FIRMWARE_VERSION + 1;
    let stale = image(900);
    rig.send(1, REQUEST, 0, &next.to_le_bytes());
    transfer(&mut rig, next, 0, &stale, 400, 250);
    drain(&rig);

    // Second request erases the region and waits for packet 0 again.
    assert_eq!(rig.send(1, REQUEST, 0, &next.to_le_bytes()).status, Some(FB_OK));
    assert_eq!(rig.engine.ota().state(), OtaState::Requested);
    assert!(rig.image.bytes()[..900].iter().all(|&b| b == 0xFF));
    assert_eq!(rig.send(1, BIN, 1, &[1, 2, 3]).status, Some(FB_ERROR));
    drain(&rig);

    let data = image(700);
    transfer(&mut rig, next, crc16_ccitt(&data), &data, 300, 400);
    assert_eq!(rig.send(1, VERIFY, 0, &[]).status, Some(FB_OK));
}
