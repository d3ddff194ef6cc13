//! Fuzz target: `CommandEngine::handle`
//!
//! Treats the input as a sequence of raw frames separated by the preamble
//! and dispatches each one against in-memory adapters. Checks that no
//! handler panics, that every answer is a well-formed frame and that the
//! config mirror always equals the last persisted record.
//!
//! cargo fuzz run fuzz_command_dispatch

#![no_main]

use core::cell::RefCell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use feeder::adapters::image_region::MemoryImageRegion;
use feeder::adapters::nvs::NvsAdapter;
use feeder::app::clock::DateTime;
use feeder::app::ports::{ConfigPort, RtcPort, TimeError};
use feeder::app::store::ConfigStore;
use feeder::rpc::codec::{encode, parse};
use feeder::rpc::engine::{CommandContext, CommandEngine};
use feeder::rpc::message::{DisplayNotice, FB_ERROR, FeedbackMessage, Message};
use libfuzzer_sys::fuzz_target;

struct FixedRtc(RefCell<DateTime>);

impl RtcPort for FixedRtc {
    fn now(&self) -> DateTime {
        *self.0.borrow()
    }

    fn set(&mut self, time: &DateTime) -> Result<(), TimeError> {
        *self.0.borrow_mut() = *time;
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let Ok(nvs) = NvsAdapter::new() else {
        return;
    };
    let store = ConfigStore::load(&nvs);
    let mut image = MemoryImageRegion::new(4096);
    let mut rtc = FixedRtc(RefCell::new(DateTime::default()));
    let camera: Signal<CriticalSectionRawMutex, ()> = Signal::new();
    let feedback: Channel<CriticalSectionRawMutex, FeedbackMessage, 4> = Channel::new();
    let display: Channel<CriticalSectionRawMutex, DisplayNotice, 4> = Channel::new();
    let (fb_tx, disp_tx) = (feedback.sender(), display.sender());
    let mut ctx = CommandContext {
        store: &store,
        config: &nvs,
        firmware: &nvs,
        image: &mut image,
        rtc: &mut rtc,
        camera: &camera,
        feedback: &fb_tx,
        display: &disp_tx,
    };
    let mut engine = CommandEngine::new([0; 6], 3, data.first().is_some_and(|b| b & 1 == 1));

    for chunk in data.split(|&b| b == 0x5A) {
        let mut frame = vec![0xA5; 4];
        frame.extend_from_slice(chunk);
        let message = Message::from_frame(&frame);
        engine.handle(1, message, &mut ctx);

        while let Ok(fb) = feedback.try_receive() {
            let wire = encode(&fb.message);
            assert_eq!(parse(&wire).as_ref(), Ok(&fb.message));
            if fb.message.command == FB_ERROR {
                assert!(fb.message.payload.is_none());
            }
        }
        while display.try_receive().is_ok() {}

        if let Ok(persisted) = nvs.load() {
            assert_eq!(store.snapshot(), persisted);
        }
    }
});
