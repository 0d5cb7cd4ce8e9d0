//! Test doubles for the hardware seams

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{
    DateTime, Monotonic, NtpTransport, Rtc, SettingsMedium, TransportError,
};

use crate::schedule::{ScheduleError, TurnRate};
use crate::switches::TurnRateSource;
use crate::time::NTP_UNIX_OFFSET;

#[derive(Default)]
struct RamState {
    committed: Option<Vec<u8>>,
    staged: Option<Vec<u8>>,
    fail_commits: bool,
    commits: usize,
}

/// In-memory medium; clones share the same storage
#[derive(Clone, Default)]
pub struct RamMedium {
    state: Arc<Mutex<RamState>>,
}

#[derive(Debug)]
pub struct RamError;

impl RamMedium {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_image(image: &[u8]) -> Self {
        let medium = Self::new();
        medium.state.lock().unwrap().committed = Some(image.to_vec());
        medium
    }

    pub fn committed(&self) -> Option<Vec<u8>> {
        self.state.lock().unwrap().committed.clone()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.state.lock().unwrap().fail_commits = fail;
    }

    pub fn commit_count(&self) -> usize {
        self.state.lock().unwrap().commits
    }
}

impl SettingsMedium for RamMedium {
    type Error = RamError;

    fn load(&mut self, buf: &mut [u8]) -> Result<Option<usize>, Self::Error> {
        let state = self.state.lock().unwrap();
        Ok(state.committed.as_ref().map(|image| {
            let copied = image.len().min(buf.len());
            buf[..copied].copy_from_slice(&image[..copied]);
            image.len()
        }))
    }

    fn stage(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.state.lock().unwrap().staged = Some(data.to_vec());
        Ok(())
    }

    fn commit(&mut self) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        if state.fail_commits {
            return Err(RamError);
        }
        let staged = state.staged.take().ok_or(RamError)?;
        state.committed = Some(staged);
        state.commits += 1;
        Ok(())
    }
}

/// Uptime clock advanced by hand (or by the other mocks)
#[derive(Clone, Default)]
pub struct ManualClock {
    now_ms: Rc<Cell<u64>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get() + ms);
    }
}

impl Monotonic for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.get()
    }
}

/// Delay that completes immediately and advances a [`ManualClock`]
pub struct ClockDelay {
    clock: ManualClock,
}

impl ClockDelay {
    pub fn new(clock: ManualClock) -> Self {
        Self { clock }
    }
}

impl DelayNs for ClockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.clock.advance_ms(u64::from(ns) / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.clock.advance_ms(u64::from(ms));
    }
}

/// Build a 48-byte NTP reply carrying `unix_secs` as the transmit timestamp
pub fn ntp_reply(unix_secs: i64) -> Vec<u8> {
    let ntp_secs = (unix_secs + NTP_UNIX_OFFSET) as u32;
    let mut reply = vec![0u8; 48];
    reply[0] = 0x24;
    reply[1] = 2;
    reply[40..44].copy_from_slice(&ntp_secs.to_be_bytes());
    reply
}

/// NTP transport replaying a script of outcomes
///
/// Timeouts advance the clock by the attempt timeout; an exhausted script
/// times out forever.
pub struct ScriptedTransport {
    script: VecDeque<Result<Vec<u8>, TransportError>>,
    clock: ManualClock,
    hosts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedTransport {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            script: VecDeque::new(),
            clock,
            hosts: Rc::default(),
        }
    }

    pub fn reply(mut self, reply: Vec<u8>) -> Self {
        self.script.push_back(Ok(reply));
        self
    }

    pub fn fail(mut self, error: TransportError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    /// Hosts queried so far, one entry per exchange
    pub fn hosts(&self) -> Rc<RefCell<Vec<String>>> {
        self.hosts.clone()
    }
}

impl NtpTransport for ScriptedTransport {
    async fn exchange(
        &mut self,
        host: &str,
        _port: u16,
        request: &[u8],
        response: &mut [u8],
        timeout_ms: u64,
    ) -> Result<usize, TransportError> {
        assert_eq!(request.len(), 48);
        self.hosts.borrow_mut().push(host.to_string());
        match self.script.pop_front() {
            Some(Ok(reply)) => {
                self.clock.advance_ms(20);
                response[..reply.len()].copy_from_slice(&reply);
                Ok(reply.len())
            }
            Some(Err(TransportError::Timeout)) | None => {
                self.clock.advance_ms(timeout_ms);
                Err(TransportError::Timeout)
            }
            Some(Err(e)) => {
                self.clock.advance_ms(1);
                Err(e)
            }
        }
    }
}

/// Shared view of four coil outputs and the rows they were held in
#[derive(Clone, Default)]
pub struct CoilHarness {
    levels: Rc<RefCell<[bool; 4]>>,
    rows: Rc<RefCell<Vec<[bool; 4]>>>,
    held_us: Rc<Cell<u64>>,
}

impl CoilHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pins(&self) -> [CoilPin; 4] {
        core::array::from_fn(|index| CoilPin {
            index,
            levels: self.levels.clone(),
        })
    }

    pub fn delay(&self) -> RowRecorder {
        RowRecorder {
            harness: self.clone(),
        }
    }

    pub fn levels(&self) -> [bool; 4] {
        *self.levels.borrow()
    }

    /// Drain the rows held since the last call
    pub fn take_rows(&self) -> Vec<[bool; 4]> {
        self.rows.take()
    }

    /// Drain the total hold time since the last call
    pub fn take_held_us(&self) -> u64 {
        self.held_us.replace(0)
    }
}

pub struct CoilPin {
    index: usize,
    levels: Rc<RefCell<[bool; 4]>>,
}

impl ErrorType for CoilPin {
    type Error = Infallible;
}

impl OutputPin for CoilPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut()[self.index] = false;
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut()[self.index] = true;
        Ok(())
    }
}

/// Delay that records the coil levels held during each pause
pub struct RowRecorder {
    harness: CoilHarness,
}

impl DelayNs for RowRecorder {
    async fn delay_ns(&mut self, ns: u32) {
        let levels = self.harness.levels();
        self.harness.rows.borrow_mut().push(levels);
        self.harness
            .held_us
            .set(self.harness.held_us.get() + u64::from(ns) / 1000);
    }

    async fn delay_us(&mut self, us: u32) {
        let levels = self.harness.levels();
        self.harness.rows.borrow_mut().push(levels);
        self.harness
            .held_us
            .set(self.harness.held_us.get() + u64::from(us));
    }
}

/// Output pin whose writes always fail
pub struct BrokenPin;

#[derive(Debug)]
pub struct BrokenPinError;

impl embedded_hal::digital::Error for BrokenPinError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

impl ErrorType for BrokenPin {
    type Error = BrokenPinError;
}

impl OutputPin for BrokenPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(BrokenPinError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(BrokenPinError)
    }
}

/// Input pin stuck at one level
pub struct Level(pub bool);

impl ErrorType for Level {
    type Error = Infallible;
}

impl InputPin for Level {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok(self.0)
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!self.0)
    }
}

/// Turn-rate switch with a fixed reading
pub struct FixedTurnRate(pub Result<TurnRate, ScheduleError>);

impl TurnRateSource for FixedTurnRate {
    fn read_turn_rate(&mut self) -> Result<TurnRate, ScheduleError> {
        self.0
    }
}

/// RTC remembering the last calibration
#[derive(Default)]
pub struct MockRtc {
    pub last: Option<DateTime>,
}

impl Rtc for MockRtc {
    type Error = Infallible;

    fn set_datetime(&mut self, datetime: DateTime) -> Result<(), Self::Error> {
        self.last = Some(datetime);
        Ok(())
    }
}
