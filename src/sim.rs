//! Deterministic stand-in for a sensor wired to a data line.
//!
//! [`SimulatedSensor`] keeps a virtual clock that only moves when the line is sampled (one
//! microsecond per read) or when a delay is requested, so captures, back-off waits and whole
//! sampling loops run instantly and repeatably. It stands in for the hardware on platforms
//! without GPIO access and in tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embedded_hal::delay::DelayNs;

use crate::capture::Pulse;
use crate::clock::Clock;
use crate::pin::{DataPin, Level, Pull};

/// Virtual time at which a new simulation starts.
pub const START_US: u64 = 60_000_000;

/// Virtual cost of sampling the line once.
const READ_COST_US: u64 = 1;

/// What the simulated sensor answers to one wake signal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// A well-timed transmission of these five bytes.
    Frame([u8; 5]),
    /// The sensor does not answer; the line stays high.
    Silent,
    /// An arbitrary waveform, starting when the line is released.
    Pulses(Vec<Pulse>),
}

impl Response {
    fn waveform(&self) -> Vec<Pulse> {
        match self {
            Response::Frame(bytes) => frame_pulses(bytes),
            Response::Silent => Vec::new(),
            Response::Pulses(pulses) => pulses.clone(),
        }
    }
}

/// Appends the checksum byte to four data bytes.
pub fn frame_with_checksum(data: [u8; 4]) -> [u8; 5] {
    let [hum_hi, hum_lo, temp_hi, temp_lo] = data;
    let checksum = data.iter().fold(0u8, |sum, v| sum.wrapping_add(*v));
    [hum_hi, hum_lo, temp_hi, temp_lo, checksum]
}

fn frame_pulses(bytes: &[u8; 5]) -> Vec<Pulse> {
    // Release delay, then the 80us low / 80us high response, then the first bit's low
    let mut pulses = vec![
        Pulse::high(30),
        Pulse::low(80),
        Pulse::high(80),
        Pulse::low(50),
    ];
    for byte in bytes {
        for i in (0..8).rev() {
            let width = if (byte >> i) & 1 == 1 { 70 } else { 26 };
            pulses.push(Pulse::high(width));
            pulses.push(Pulse::low(50));
        }
    }
    pulses
}

struct Line {
    now_us: u64,
    driven: Option<Level>,
    released_at: u64,
    waveform: Vec<Pulse>,
    script: VecDeque<Response>,
    default: Response,
    transactions: u32,
    fail_next_output: bool,
}

impl Line {
    fn level(&self) -> Level {
        if let Some(level) = self.driven {
            return level;
        }
        let mut t = self.now_us - self.released_at;
        for pulse in &self.waveform {
            let width = u64::from(pulse.duration_us);
            if t < width {
                return pulse.level;
            }
            t -= width;
        }
        // Pull-up holds the idle line high
        Level::High
    }
}

/// Handle to a simulated sensor. Clones share the same line.
#[derive(Clone)]
pub struct SimulatedSensor {
    line: Arc<Mutex<Line>>,
}

impl SimulatedSensor {
    /// Creates a sensor that answers every wake signal with an all-zero frame.
    pub fn new() -> Self {
        SimulatedSensor {
            line: Arc::new(Mutex::new(Line {
                now_us: START_US,
                driven: None,
                released_at: START_US,
                waveform: Vec::new(),
                script: VecDeque::new(),
                default: Response::Frame([0; 5]),
                transactions: 0,
                fail_next_output: false,
            })),
        }
    }

    /// Queues a response for the next wake signal.
    pub fn push_response(&self, response: Response) {
        self.lock().script.push_back(response);
    }

    /// Sets the response used once the queue is empty.
    pub fn set_default(&self, response: Response) {
        self.lock().default = response;
    }

    /// Makes the next output write on the line fail.
    pub fn fail_next_output(&self) {
        self.lock().fail_next_output = true;
    }

    /// Moves virtual time forward.
    pub fn advance_us(&self, us: u64) {
        self.lock().now_us += us;
    }

    pub fn now_us(&self) -> u64 {
        self.lock().now_us
    }

    /// Number of wake signals answered so far.
    pub fn transactions(&self) -> u32 {
        self.lock().transactions
    }

    pub fn pin(&self) -> SimPin {
        SimPin {
            line: Arc::clone(&self.line),
        }
    }

    pub fn clock(&self) -> SimClock {
        SimClock {
            line: Arc::clone(&self.line),
        }
    }

    pub fn delay(&self) -> SimDelay {
        SimDelay {
            line: Arc::clone(&self.line),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Line> {
        lock(&self.line)
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

fn lock(line: &Mutex<Line>) -> MutexGuard<'_, Line> {
    line.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Injected output failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SimPinError;

/// Data line of a [`SimulatedSensor`].
pub struct SimPin {
    line: Arc<Mutex<Line>>,
}

impl SimPin {
    /// Level the host is driving, or `None` while the line is released.
    pub fn driven(&self) -> Option<Level> {
        lock(&self.line).driven
    }
}

impl DataPin for SimPin {
    type Error = SimPinError;

    fn set_output(&mut self, level: Level) -> Result<(), SimPinError> {
        let mut line = lock(&self.line);
        if line.fail_next_output {
            line.fail_next_output = false;
            return Err(SimPinError);
        }
        line.driven = Some(level);
        Ok(())
    }

    fn set_input(&mut self, _pull: Pull) -> Result<(), SimPinError> {
        let mut line = lock(&self.line);
        let response = match line.script.pop_front() {
            Some(response) => response,
            None => line.default.clone(),
        };
        line.waveform = response.waveform();
        line.driven = None;
        line.released_at = line.now_us;
        line.transactions += 1;
        Ok(())
    }

    fn read_level(&mut self) -> Result<Level, SimPinError> {
        let mut line = lock(&self.line);
        let level = line.level();
        line.now_us += READ_COST_US;
        Ok(level)
    }
}

/// Virtual clock of a [`SimulatedSensor`].
pub struct SimClock {
    line: Arc<Mutex<Line>>,
}

impl Clock for SimClock {
    fn now_us(&self) -> u64 {
        lock(&self.line).now_us
    }
}

/// Delay that advances the virtual clock of a [`SimulatedSensor`] without sleeping.
pub struct SimDelay {
    line: Arc<Mutex<Line>>,
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        lock(&self.line).now_us += u64::from(ns.div_ceil(1_000));
    }

    fn delay_us(&mut self, us: u32) {
        lock(&self.line).now_us += u64::from(us);
    }

    fn delay_ms(&mut self, ms: u32) {
        lock(&self.line).now_us += u64::from(ms) * 1_000;
    }
}
