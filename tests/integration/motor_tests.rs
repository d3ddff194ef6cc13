//! Integration tests for the schedule → driver → step clock pipeline.
//!
//! A [`FeedService`] ticks against a mock RTC and config store while the
//! simulated step timer is fired by hand, standing in for the hardware
//! timer callback.

use feeder::app::service::FeedService;
use feeder::app::store::ConfigStore;
use feeder::config::{DeviceConfig, Direction, ScheduleEntry};
use feeder::drivers::step_timer::StepTimer;
use feeder::motor::{DriverState, MotorGroup, SharedMotorPort};

use crate::mock_hw::{MockMotors, MockRtc, MotorCall};

struct Bench {
    group: &'static MotorGroup,
    motors: &'static SharedMotorPort<MockMotors>,
    timer: StepTimer,
    service: FeedService,
    store: ConfigStore,
    rtc: MockRtc,
}

impl Bench {
    fn new(config: DeviceConfig, rtc: MockRtc) -> Self {
        let group: &'static MotorGroup = Box::leak(Box::new(MotorGroup::new()));
        let motors: &'static SharedMotorPort<MockMotors> =
            Box::leak(Box::new(SharedMotorPort::new(MockMotors::new())));
        let timer = StepTimer::start(group, motors).unwrap();
        Self {
            group,
            motors,
            timer,
            service: FeedService::new(),
            store: ConfigStore::new(config),
            rtc,
        }
    }

    fn tick(&mut self) -> feeder::app::service::TickReport {
        self.service
            .tick(&self.store, self.group, &self.rtc, self.motors, &mut self.timer)
    }

    fn calls(&self) -> Vec<MotorCall> {
        self.motors.with(|m| m.calls.clone())
    }

    fn clear(&self) {
        self.motors.with(|m| m.calls.clear());
    }
}

/// Channels 1 and 2 feed one unit at 08:00; channel 2 turns left.
fn breakfast() -> DeviceConfig {
    let mut cfg = DeviceConfig::default();
    cfg.motors[0].steps_per_unit = 2;
    cfg.motors[1].steps_per_unit = 2;
    cfg.motors[1].direction = Direction::Left;
    cfg.schedule
        .push(ScheduleEntry {
            hour: 8,
            minute: 0,
            feed_counts: [1, 1, 0, 0, 0],
        })
        .unwrap();
    cfg
}

#[test]
fn scheduled_feed_runs_channels_in_order() {
    let mut bench = Bench::new(breakfast(), MockRtc::at(8, 0));

    let report = bench.tick();
    assert_eq!(report.fired, Some(0));
    assert_eq!(report.driver, DriverState::Run(0));
    assert_eq!(bench.group.channel(0).pending_steps(), 4);
    assert_eq!(bench.group.channel(1).pending_steps(), 4);

    // Channel 1 takes the clock and is energised.
    let report = bench.tick();
    assert_eq!(report.fired, None);
    assert_eq!(bench.timer.period(), 1000);
    assert_eq!(
        bench.calls(),
        vec![
            MotorCall::StepLow(0),
            MotorCall::Direction { line: 0, direction: Direction::Right },
            MotorCall::StepLow(0),
            MotorCall::Enable { channel: 0, on: true },
        ]
    );
    bench.clear();

    for _ in 0..5 {
        assert!(bench.timer.fire());
    }
    bench.motors.with(|m| {
        assert_eq!(m.toggles(0), 4);
        assert_eq!(m.toggles(1), 0);
        assert!(!m.enabled(0));
    });
    assert_eq!(bench.group.channel(0).pending_steps(), 0);
    bench.clear();

    assert_eq!(bench.tick().driver, DriverState::Run(1));
    bench.clear();

    // Channel 2 left is wired to channel 3's direction line.
    bench.tick();
    assert!(bench.calls().contains(&MotorCall::Direction { line: 2, direction: Direction::Left }));
    for _ in 0..5 {
        bench.timer.fire();
    }
    bench.motors.with(|m| assert_eq!(m.toggles(1), 4));

    let mut state = DriverState::Run(1);
    for _ in 0..4 {
        state = bench.tick().driver;
    }
    assert_eq!(state, DriverState::Idle);
    assert_eq!(bench.timer.period(), 1000);

    bench.tick();
    assert_eq!(bench.timer.period(), 0);
    assert!(!bench.timer.fire());
    assert!(bench.group.is_idle());
}

#[test]
fn nothing_happens_off_schedule() {
    let mut bench = Bench::new(breakfast(), MockRtc::at(7, 59));
    for _ in 0..10 {
        let report = bench.tick();
        assert_eq!(report.fired, None);
        assert_eq!(report.driver, DriverState::Idle);
    }
    assert_eq!(bench.timer.period(), 0);
    assert!(bench.calls().is_empty());
    assert_eq!(bench.service.tick_count(), 10);
}

#[test]
fn feed_fires_once_per_day() {
    let mut bench = Bench::new(breakfast(), MockRtc::at(8, 0));
    assert_eq!(bench.tick().fired, Some(0));
    for _ in 0..20 {
        assert_eq!(bench.tick().fired, None);
    }

    bench.rtc.now.day += 1;
    assert_eq!(bench.tick().fired, Some(0));
}

#[test]
fn every_owed_toggle_is_delivered() {
    let mut cfg = DeviceConfig::default();
    for (n, m) in cfg.motors.iter_mut().enumerate() {
        m.steps_per_unit = 3 + n as u16;
        m.frequency_hz = 250 * (n as u16 + 1);
    }
    cfg.schedule
        .push(ScheduleEntry {
            hour: 12,
            minute: 0,
            feed_counts: [2, 0, 1, 3, 1],
        })
        .unwrap();
    let expected: Vec<u32> = cfg
        .motors
        .iter()
        .zip([2u8, 0, 1, 3, 1])
        .map(|(m, count)| m.toggles_for(count))
        .collect();

    let mut bench = Bench::new(cfg, MockRtc::at(12, 0));
    let mut periods = Vec::new();
    for _ in 0..500 {
        bench.tick();
        if bench.timer.period() != 0 && periods.last() != Some(&bench.timer.period()) {
            periods.push(bench.timer.period());
        }
        for _ in 0..3 {
            bench.timer.fire();
        }
        if bench.service.driver_state() == DriverState::Idle
            && bench.group.is_idle()
            && bench.timer.period() == 0
            && bench.service.tick_count() > 1
        {
            break;
        }
    }

    assert!(bench.group.is_idle());
    assert_eq!(bench.timer.period(), 0);
    bench.motors.with(|m| {
        for (n, &want) in expected.iter().enumerate() {
            assert_eq!(m.toggles(n) as u32, want, "channel {}", n + 1);
            assert!(!m.enabled(n));
        }
    });
    // Channel 2 owed nothing and never took the clock.
    assert_eq!(periods, vec![2000, 666, 500, 400]);
}
