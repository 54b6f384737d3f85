//! Busy-poll capture of the sensor's pulse train.

use embedded_hal::delay::DelayNs;

use crate::clock::Clock;
use crate::error::CaptureError;
use crate::logging::warning;
use crate::pin::{DataPin, Level, Pull};

/// Number of level changes recorded per transaction.
///
/// The sensor answers with an 80us low/80us high response followed by 40 low/high bit pairs;
/// the slots in front of the data absorb the handshake.
pub const PULSE_SLOTS: usize = 84;

/// Longest time a single slot waits for the level to change.
pub const SLOT_TIMEOUT_US: u64 = 1_000;

/// Length of the start signal the host drives low.
const WAKE_MS: u32 = 1;

/// One contiguous interval during which the line held a single level.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pulse {
    pub level: Level,
    pub duration_us: u32,
}

impl Pulse {
    pub const fn new(level: Level, duration_us: u32) -> Self {
        Pulse { level, duration_us }
    }

    pub const fn high(duration_us: u32) -> Self {
        Self::new(Level::High, duration_us)
    }

    pub const fn low(duration_us: u32) -> Self {
        Self::new(Level::Low, duration_us)
    }
}

/// Fixed-capacity buffer of captured pulses.
///
/// Lives on the stack so that recording a pulse never allocates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PulseTrain {
    pulses: [Pulse; PULSE_SLOTS],
    len: usize,
}

impl PulseTrain {
    pub const fn new() -> Self {
        PulseTrain {
            pulses: [Pulse::high(0); PULSE_SLOTS],
            len: 0,
        }
    }

    /// Builds a train from already measured pulses, keeping at most [`PULSE_SLOTS`] of them.
    pub fn from_pulses(pulses: &[Pulse]) -> Self {
        let mut train = Self::new();
        for pulse in pulses.iter().take(PULSE_SLOTS) {
            train.push(*pulse);
        }
        train
    }

    /// Appends a pulse; returns `false` once the buffer is full.
    pub fn push(&mut self, pulse: Pulse) -> bool {
        match self.pulses.get_mut(self.len) {
            Some(slot) => {
                *slot = pulse;
                self.len += 1;
                true
            }
            None => false,
        }
    }

    pub fn as_slice(&self) -> &[Pulse] {
        &self.pulses[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for PulseTrain {
    fn default() -> Self {
        Self::new()
    }
}

/// Wakes the sensor and records its answer.
///
/// Drives the line low for 1 ms, releases it with a pull-up, then samples the level in a tight
/// loop. Each of the [`PULSE_SLOTS`] slots records the level that was held and how long it was
/// held, capped at [`SLOT_TIMEOUT_US`]. The loop performs no allocation.
///
/// The line is driven high again afterwards, also when a pin operation fails.
///
/// # Errors
///
/// Returns `CaptureError::PinFault` if any pin operation fails.
pub fn capture<PIN, CLK, D>(
    pin: &mut PIN,
    clock: &CLK,
    delay: &mut D,
) -> Result<PulseTrain, CaptureError<PIN::Error>>
where
    PIN: DataPin,
    CLK: Clock,
    D: DelayNs,
{
    let mut train = PulseTrain::new();

    match record(pin, clock, delay, &mut train) {
        Ok(()) => {
            // Idle high so the sensor is ready for the next transaction
            pin.set_output(Level::High)?;
            Ok(train)
        }
        Err(e) => {
            if pin.set_output(Level::High).is_err() {
                warning!("capture failed and the line could not be driven high");
            }
            Err(e.into())
        }
    }
}

fn record<PIN, CLK, D>(
    pin: &mut PIN,
    clock: &CLK,
    delay: &mut D,
    train: &mut PulseTrain,
) -> Result<(), PIN::Error>
where
    PIN: DataPin,
    CLK: Clock,
    D: DelayNs,
{
    // MCU sends start request
    pin.set_output(Level::Low)?;
    delay.delay_ms(WAKE_MS);
    pin.set_input(Pull::Up)?;

    let mut held = pin.read_level()?;
    let mut level = held;
    for _ in 0..PULSE_SLOTS {
        let start = clock.now_us();
        while level == held && clock.now_us().saturating_sub(start) < SLOT_TIMEOUT_US {
            level = pin.read_level()?;
        }
        let elapsed = clock.now_us().saturating_sub(start);
        train.push(Pulse::new(held, u32::try_from(elapsed).unwrap_or(u32::MAX)));
        held = level;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pin::OpenDrain;
    use crate::sim::{Response, SimulatedSensor};
    use core::cell::Cell;
    use embedded_hal_mock::eh1::MockError;
    use embedded_hal_mock::eh1::delay::{CheckedDelay, NoopDelay, Transaction as DelayTx};
    use embedded_hal_mock::eh1::digital::{
        Mock as PinMock, State as PinState, Transaction as PinTx,
    };
    use std::io::ErrorKind;

    /// Clock that moves forward one microsecond every time it is read.
    struct TickClock(Cell<u64>);

    impl Clock for TickClock {
        fn now_us(&self) -> u64 {
            let now = self.0.get();
            self.0.set(now + 1);
            now
        }
    }

    #[test]
    fn test_wake_failure_restores_idle_high() {
        let mut pin = PinMock::new(&[
            PinTx::set(PinState::Low).with_error(MockError::Io(ErrorKind::NotConnected)),
            PinTx::set(PinState::High),
        ]);

        let mut line = OpenDrain::new(pin.clone());
        let clock = TickClock(Cell::new(0));
        let result = capture(&mut line, &clock, &mut NoopDelay);

        assert_eq!(
            result.unwrap_err(),
            CaptureError::PinFault(MockError::Io(ErrorKind::NotConnected))
        );
        pin.done();
    }

    #[test]
    fn test_release_failure_restores_idle_high() {
        let mut pin = PinMock::new(&[
            PinTx::set(PinState::Low),
            PinTx::set(PinState::High).with_error(MockError::Io(ErrorKind::Other)),
            PinTx::set(PinState::High),
        ]);

        let delay_transactions = vec![DelayTx::delay_ms(1)];
        let mut delay = CheckedDelay::new(&delay_transactions);

        let mut line = OpenDrain::new(pin.clone());
        let clock = TickClock(Cell::new(0));
        let result = capture(&mut line, &clock, &mut delay);

        assert!(matches!(result, Err(CaptureError::PinFault(_))));
        pin.done();
        delay.done();
    }

    #[test]
    fn test_failed_restore_keeps_first_error() {
        let mut pin = PinMock::new(&[
            PinTx::set(PinState::Low).with_error(MockError::Io(ErrorKind::NotConnected)),
            PinTx::set(PinState::High).with_error(MockError::Io(ErrorKind::BrokenPipe)),
        ]);

        let mut line = OpenDrain::new(pin.clone());
        let clock = TickClock(Cell::new(0));
        let result = capture(&mut line, &clock, &mut NoopDelay);

        assert_eq!(
            result.unwrap_err(),
            CaptureError::PinFault(MockError::Io(ErrorKind::NotConnected))
        );
        pin.done();
    }

    #[test]
    fn test_silent_line_times_out_every_slot() {
        let sim = SimulatedSensor::new();
        sim.push_response(Response::Silent);

        let mut pin = sim.pin();
        let train = capture(&mut pin, &sim.clock(), &mut sim.delay()).unwrap();

        assert_eq!(train.len(), PULSE_SLOTS);
        for pulse in train.as_slice() {
            assert_eq!(pulse.level, Level::High);
            assert!(pulse.duration_us >= SLOT_TIMEOUT_US as u32);
        }
        assert_eq!(pin.driven(), Some(Level::High));
    }

    #[test]
    fn test_records_sensor_answer() {
        let sim = SimulatedSensor::new();
        sim.push_response(Response::Frame([0x02, 0x2B, 0x00, 0xF6, 0x23]));

        let mut pin = sim.pin();
        let train = capture(&mut pin, &sim.clock(), &mut sim.delay()).unwrap();
        let pulses = train.as_slice();

        assert_eq!(pulses.len(), PULSE_SLOTS);
        // Response handshake: 80us low then 80us high
        assert_eq!(pulses[1].level, Level::Low);
        assert!(pulses[1].duration_us.abs_diff(80) <= 2);
        assert_eq!(pulses[2].level, Level::High);
        assert!(pulses[2].duration_us.abs_diff(80) <= 2);
        // The line is released high after the final low
        assert_eq!(pulses[83].level, Level::Low);
        assert_eq!(pin.driven(), Some(Level::High));
    }

    #[test]
    fn test_pulse_train_caps_at_slot_count() {
        let pulses = [Pulse::low(50); PULSE_SLOTS + 3];
        let mut train = PulseTrain::from_pulses(&pulses);
        assert_eq!(train.len(), PULSE_SLOTS);
        assert!(!train.push(Pulse::high(20)));
    }
}
