//! Poll-cycle controller
//!
//! Ties the time source, scheduler and stepper together. Boot synchronizes
//! time and calibrates the RTC; every poll then decides on the best time base
//! available whether to rotate.

use embassy_futures::select::{select, Either};
use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_sync::signal::Signal;
use embedded_hal::digital::OutputPin;
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{Monotonic, NtpTransport, Rtc, SettingsMedium};

use crate::config::ControllerConfig;
use crate::schedule::{RotationScheduler, SchedulerTime};
use crate::signals::{RotationEvent, RotationSignal};
use crate::stepper::{ActuatorError, StepperActuator};
use crate::switches::TurnRateSource;
use crate::time::TimeSource;

/// Result of [`Controller::boot`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BootReport {
    pub synced: bool,
    /// Local unix time written to the RTC
    pub local_unix: Option<i64>,
}

/// Result of one [`Controller::poll`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PollOutcome {
    pub rotated: bool,
    pub position: u8,
    pub time_base: SchedulerTime,
}

pub struct Controller<'a, M, S, T, C, D, P, PD, R, E>
where
    M: RawMutex,
    S: SettingsMedium,
    E: RawMutex,
{
    time: TimeSource<'a, M, S, T, C, D>,
    scheduler: RotationScheduler<'a, M, S>,
    stepper: StepperActuator<'a, M, S, P, PD>,
    switches: R,
    rotations: &'a RotationSignal<E>,
    config: ControllerConfig,
}

impl<'a, M, S, T, C, D, P, PD, R, E> Controller<'a, M, S, T, C, D, P, PD, R, E>
where
    M: RawMutex,
    S: SettingsMedium,
    T: NtpTransport,
    C: Monotonic,
    D: DelayNs,
    P: OutputPin,
    PD: DelayNs,
    R: TurnRateSource,
    E: RawMutex,
{
    pub fn new(
        time: TimeSource<'a, M, S, T, C, D>,
        scheduler: RotationScheduler<'a, M, S>,
        stepper: StepperActuator<'a, M, S, P, PD>,
        switches: R,
        rotations: &'a RotationSignal<E>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            time,
            scheduler,
            stepper,
            switches,
            rotations,
            config,
        }
    }

    /// Synchronize time and calibrate the RTC to local time.
    ///
    /// Without network time the RTC is left alone and polling runs on uptime.
    pub async fn boot<RT: Rtc>(&mut self, rtc: &mut RT) -> BootReport {
        if let Err(e) = self.time.sync().await {
            warn!("Starting without network time ({}), scheduling on uptime", e);
            return BootReport {
                synced: false,
                local_unix: None,
            };
        }

        let (datetime, local_unix) = match self.time.time_now().await {
            Ok(now) => now,
            Err(e) => {
                warn!("Local time unavailable: {}", e);
                return BootReport {
                    synced: self.time.is_synced(),
                    local_unix: None,
                };
            }
        };

        match rtc.set_datetime(datetime) {
            Ok(()) => info!(
                "RTC calibrated to {}-{}-{} {}:{}:{}",
                datetime.year,
                datetime.month,
                datetime.day,
                datetime.hour,
                datetime.minute,
                datetime.second
            ),
            Err(_) => warn!("RTC calibration failed"),
        }

        BootReport {
            synced: true,
            local_unix: Some(local_unix),
        }
    }

    /// Run one scheduling cycle, rotating if due
    pub async fn poll(&mut self) -> PollOutcome {
        let time_base = match self.time.now_utc().await {
            Some(utc) => {
                self.scheduler.carry_over_uptime(utc, self.time.uptime_secs());
                SchedulerTime::Wall(utc)
            }
            None => SchedulerTime::Uptime(self.time.uptime_secs()),
        };

        let reading = self.switches.read_turn_rate();
        let due = match self.scheduler.check(time_base, reading) {
            Ok(due) => due,
            Err(e) => {
                warn!("Rotation check skipped: {}", e);
                false
            }
        };

        let rotated = due && self.rotate().await;
        PollOutcome {
            rotated,
            position: self.stepper.position(),
            time_base,
        }
    }

    async fn rotate(&mut self) -> bool {
        let moved = match self.stepper.rotate().await {
            Ok(_) => true,
            Err(ActuatorError::Persist(e)) => {
                error!("Rotation done but position not saved: {}", e);
                true
            }
            Err(e) => {
                error!("Rotation failed: {}", e);
                false
            }
        };
        if moved {
            self.rotations.signal(RotationEvent {
                position: self.stepper.position(),
            });
        }
        moved
    }

    /// Poll every `poll_interval_secs` until `reset` fires.
    ///
    /// The reset is only observed between cycles. Returns the number of
    /// cycles run.
    pub async fn run<W: DelayNs, RM: RawMutex>(
        &mut self,
        pacing: &mut W,
        reset: &Signal<RM, ()>,
    ) -> u32 {
        let interval_ms = self.config.poll_interval_secs.saturating_mul(1000);
        let mut cycles: u32 = 0;
        loop {
            let outcome = self.poll().await;
            cycles = cycles.wrapping_add(1);
            debug!(
                "Poll cycle {}: rotated={} position={}",
                cycles, outcome.rotated, outcome.position
            );

            if let Either::First(()) = select(reset.wait(), pacing.delay_ms(interval_ms)).await {
                info!("Reset requested after {} poll cycles", cycles);
                return cycles;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SntpConfig, StepperConfig};
    use crate::mock::{
        ntp_reply, ClockDelay, CoilHarness, CoilPin, FixedTurnRate, ManualClock, MockRtc,
        RamMedium, RowRecorder, ScriptedTransport,
    };
    use crate::schedule::{ScheduleError, TurnRate};
    use crate::store::SharedStore;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::NoopRawMutex;
    use hal_abstractions::Weekday;

    type TestStore = SharedStore<NoopRawMutex, RamMedium>;
    type TestController<'a> = Controller<
        'a,
        NoopRawMutex,
        RamMedium,
        ScriptedTransport,
        ManualClock,
        ClockDelay,
        CoilPin,
        RowRecorder,
        FixedTurnRate,
        NoopRawMutex,
    >;

    // 2025-01-15 12:00:00 UTC, a Wednesday
    const MID_JANUARY: i64 = 1_736_942_400;

    fn controller<'a>(
        store: &'a TestStore,
        rotations: &'a RotationSignal<NoopRawMutex>,
        transport: ScriptedTransport,
        clock: &ManualClock,
        rate: Result<TurnRate, ScheduleError>,
    ) -> TestController<'a> {
        let sntp = SntpConfig {
            deadline_ms: 2000,
            ..SntpConfig::default()
        };
        let coils = CoilHarness::new();
        Controller::new(
            TimeSource::new(store, transport, clock.clone(), ClockDelay::new(clock.clone()), sntp),
            RotationScheduler::new(store),
            StepperActuator::new(store, coils.pins(), coils.delay(), StepperConfig::default()),
            FixedTurnRate(rate),
            rotations,
            ControllerConfig::default(),
        )
    }

    /// Pacing delay that fires `reset` on its last pause
    struct Countdown<'a> {
        remaining: u32,
        reset: &'a Signal<NoopRawMutex, ()>,
    }

    impl DelayNs for Countdown<'_> {
        async fn delay_ns(&mut self, _ns: u32) {
            self.remaining = self.remaining.saturating_sub(1);
            if self.remaining == 0 {
                self.reset.signal(());
            }
        }

        async fn delay_ms(&mut self, _ms: u32) {
            self.delay_ns(0).await;
        }
    }

    #[test]
    fn test_boot_calibrates_rtc() {
        let store = SharedStore::new(RamMedium::new());
        let rotations = Signal::new();
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone()).reply(ntp_reply(MID_JANUARY));
        let mut controller =
            controller(&store, &rotations, transport, &clock, Ok(TurnRate::TwoWeeks));
        let mut rtc = MockRtc::default();

        let report = block_on(controller.boot(&mut rtc));
        assert_eq!(
            report,
            BootReport {
                synced: true,
                local_unix: Some(MID_JANUARY + 3600),
            }
        );
        let datetime = rtc.last.unwrap();
        assert_eq!((datetime.year, datetime.month, datetime.day), (2025, 1, 15));
        assert_eq!((datetime.hour, datetime.minute, datetime.second), (13, 0, 0));
        assert_eq!(datetime.weekday, Weekday::Wednesday);
        assert_eq!(store.read_all().timezone().map(|tz| tz.offset_hours()), Some(1));
    }

    #[test]
    fn test_poll_rotates_once_per_interval() {
        let store = SharedStore::new(RamMedium::new());
        let rotations = Signal::new();
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone()).reply(ntp_reply(MID_JANUARY));
        let mut controller =
            controller(&store, &rotations, transport, &clock, Ok(TurnRate::TwoWeeks));
        block_on(controller.boot(&mut MockRtc::default()));

        let first = block_on(controller.poll());
        assert!(first.rotated);
        assert_eq!(first.position, 1);
        assert_eq!(first.time_base, SchedulerTime::Wall(MID_JANUARY));
        assert_eq!(rotations.try_take(), Some(RotationEvent { position: 1 }));

        clock.advance_ms(60_000);
        let second = block_on(controller.poll());
        assert!(!second.rotated);
        assert_eq!(second.position, 1);
        assert_eq!(second.time_base, SchedulerTime::Wall(MID_JANUARY + 60));
        assert_eq!(rotations.try_take(), None);

        let settings = store.read_all();
        assert_eq!(settings.position(), Some(1));
        assert_eq!(settings.next_rotation(), Some(MID_JANUARY + 2 * 604_800));
    }

    #[test]
    fn test_unreachable_time_falls_back_to_uptime() {
        let medium = RamMedium::new();
        let store = SharedStore::new(medium.clone());
        let rotations = Signal::new();
        let clock = ManualClock::new();
        let mut controller = controller(
            &store,
            &rotations,
            ScriptedTransport::new(clock.clone()),
            &clock,
            Ok(TurnRate::FourWeeks),
        );
        let mut rtc = MockRtc::default();

        let report = block_on(controller.boot(&mut rtc));
        assert!(!report.synced);
        assert!(rtc.last.is_none());

        let outcome = block_on(controller.poll());
        assert!(outcome.rotated);
        assert_eq!(outcome.time_base, SchedulerTime::Uptime(2));
        assert_eq!(store.read_all().next_rotation(), None);

        assert!(!block_on(controller.poll()).rotated);
    }

    #[test]
    fn test_late_sync_does_not_repeat_uptime_rotation() {
        let store = SharedStore::new(RamMedium::new());
        let rotations = Signal::new();
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone())
            .fail(hal_abstractions::TransportError::Timeout)
            .fail(hal_abstractions::TransportError::Timeout)
            .reply(ntp_reply(MID_JANUARY));
        let mut controller =
            controller(&store, &rotations, transport, &clock, Ok(TurnRate::TwoWeeks));

        assert!(!block_on(controller.boot(&mut MockRtc::default())).synced);
        let first = block_on(controller.poll());
        assert!(first.rotated);
        assert_eq!(first.time_base, SchedulerTime::Uptime(2));

        // Next poll resynchronizes and switches to the wall clock
        clock.advance_ms(900_000);
        let second = block_on(controller.poll());
        assert_eq!(second.time_base, SchedulerTime::Wall(MID_JANUARY));
        assert!(!second.rotated);
        assert_eq!(second.position, 1);
        assert_eq!(
            store.read_all().next_rotation(),
            Some(MID_JANUARY + 2 * 604_800 + 2 - 902)
        );
    }

    #[test]
    fn test_ambiguous_switch_skips_rotation() {
        let store = SharedStore::new(RamMedium::new());
        let rotations = Signal::new();
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone()).reply(ntp_reply(MID_JANUARY));
        let mut controller = controller(
            &store,
            &rotations,
            transport,
            &clock,
            Err(ScheduleError::AmbiguousInterval),
        );
        block_on(controller.boot(&mut MockRtc::default()));

        let outcome = block_on(controller.poll());
        assert!(!outcome.rotated);
        assert_eq!(outcome.position, 0);
        assert_eq!(store.read_all().next_rotation(), None);
        assert!(!rotations.signaled());
    }

    #[test]
    fn test_run_stops_on_reset() {
        let store = SharedStore::new(RamMedium::new());
        let rotations = Signal::new();
        let reset = Signal::new();
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone()).reply(ntp_reply(MID_JANUARY));
        let mut controller =
            controller(&store, &rotations, transport, &clock, Ok(TurnRate::SixWeeks));
        block_on(controller.boot(&mut MockRtc::default()));

        let mut pacing = Countdown {
            remaining: 2,
            reset: &reset,
        };
        let cycles = block_on(controller.run(&mut pacing, &reset));
        assert_eq!(cycles, 3);
        assert_eq!(store.read_all().position(), Some(1));
    }

    #[test]
    fn test_pending_reset_ends_after_one_cycle() {
        let store = SharedStore::new(RamMedium::new());
        let rotations = Signal::new();
        let reset: Signal<NoopRawMutex, ()> = Signal::new();
        let clock = ManualClock::new();
        let transport = ScriptedTransport::new(clock.clone()).reply(ntp_reply(MID_JANUARY));
        let mut controller =
            controller(&store, &rotations, transport, &clock, Ok(TurnRate::SixWeeks));

        reset.signal(());
        let mut pacing = ClockDelay::new(clock.clone());
        assert_eq!(block_on(controller.run(&mut pacing, &reset)), 1);
        assert_eq!(rotations.try_take(), Some(RotationEvent { position: 1 }));
    }
}
