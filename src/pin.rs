//! Data line capability used by the capture step.

use embedded_hal::digital::{InputPin, OutputPin};

/// Logic level of the data line.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    High,
    Low,
}

/// Pull configuration applied when the line is switched to input.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pull {
    Up,
    None,
}

/// A single bidirectional GPIO line.
///
/// Implementations own the line exclusively; the sensor protocol breaks if anything else drives
/// it while a transaction is in flight.
pub trait DataPin {
    /// Error reported by the underlying GPIO driver.
    type Error;

    /// Drives the line to `level`.
    fn set_output(&mut self, level: Level) -> Result<(), Self::Error>;

    /// Stops driving the line and lets the sensor take it over.
    fn set_input(&mut self, pull: Pull) -> Result<(), Self::Error>;

    /// Samples the current level of the line.
    ///
    /// This is called in a tight loop while pulses are measured, so it should be as cheap as the
    /// platform allows.
    fn read_level(&mut self) -> Result<Level, Self::Error>;
}

impl<T: DataPin + ?Sized> DataPin for &mut T {
    type Error = T::Error;

    fn set_output(&mut self, level: Level) -> Result<(), Self::Error> {
        T::set_output(self, level)
    }

    fn set_input(&mut self, pull: Pull) -> Result<(), Self::Error> {
        T::set_input(self, pull)
    }

    fn read_level(&mut self) -> Result<Level, Self::Error> {
        T::read_level(self)
    }
}

/// Adapts an open-drain `embedded-hal` pin to [`DataPin`].
///
/// The line needs an external (or internal) pull-up resistor. Releasing the line is done by
/// driving it high, which leaves the open-drain output floating so the sensor can pull it low.
pub struct OpenDrain<PIN> {
    pin: PIN,
}

impl<PIN> OpenDrain<PIN> {
    pub fn new(pin: PIN) -> Self {
        OpenDrain { pin }
    }

    /// Returns the wrapped pin.
    pub fn into_inner(self) -> PIN {
        self.pin
    }
}

impl<PIN, E> DataPin for OpenDrain<PIN>
where
    PIN: InputPin<Error = E> + OutputPin<Error = E>,
{
    type Error = E;

    fn set_output(&mut self, level: Level) -> Result<(), E> {
        match level {
            Level::High => self.pin.set_high(),
            Level::Low => self.pin.set_low(),
        }
    }

    fn set_input(&mut self, _pull: Pull) -> Result<(), E> {
        self.pin.set_high()
    }

    fn read_level(&mut self) -> Result<Level, E> {
        if self.pin.is_high()? {
            Ok(Level::High)
        } else {
            Ok(Level::Low)
        }
    }
}

/// Resolves platform pin names (for example `"GPIO4"`) to data lines.
pub trait PinProvider {
    type Pin: DataPin;

    /// Looks up a pin by name, returning `None` if the platform has no such pin.
    fn pin_by_name(&mut self, name: &str) -> Option<Self::Pin>;
}
