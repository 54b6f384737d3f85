use core::fmt;

use crate::pin::Level;

/// Failure while driving or sampling the data line.
#[derive(Debug, PartialEq, Eq)]
pub enum CaptureError<E> {
    /// Error from the GPIO pin (input/output).
    PinFault(E),
}

impl<E> From<E> for CaptureError<E> {
    fn from(value: E) -> Self {
        Self::PinFault(value)
    }
}

/// The captured pulse train does not describe a well-formed frame.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer than 80 usable pulses ended in a low level.
    MissingLowLevel,
    /// The pulse at `index` did not have the expected level.
    LevelMismatch { index: usize, expected: Level },
    /// High pulse longer than 90us.
    HighTooLong { index: usize, duration_us: u32 },
    /// Low pulse longer than 70us.
    LowTooLong { index: usize, duration_us: u32 },
    /// Low pulse shorter than 35us.
    LowTooShort { index: usize, duration_us: u32 },
}

/// Which half of the frame a range check rejected.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quantity {
    Humidity,
    Temperature,
}

/// A decoded frame failed validation.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ValueError {
    /// Checksum byte did not match the sum of the data bytes.
    ChecksumFail { expected: u8, received: u8 },
    /// Raw value outside what the sensor variant can report.
    OutOfRange { quantity: Quantity, raw: i32 },
}

/// Any failure of a single sample attempt.
#[derive(Debug, PartialEq, Eq)]
pub enum SampleError<E> {
    Capture(CaptureError<E>),
    Decode(DecodeError),
    Value(ValueError),
}

/// Coarse classification of [`SampleError`].
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaultKind {
    /// A GPIO operation failed.
    PinFault,
    /// The pulse train was corrupted or incomplete.
    CaptureTimingFault,
    /// The frame checksum did not match.
    ChecksumFault,
    /// The frame carried an impossible value.
    RangeFault,
}

impl<E> SampleError<E> {
    pub fn kind(&self) -> FaultKind {
        match self {
            SampleError::Capture(CaptureError::PinFault(_)) => FaultKind::PinFault,
            SampleError::Decode(_) => FaultKind::CaptureTimingFault,
            SampleError::Value(ValueError::ChecksumFail { .. }) => FaultKind::ChecksumFault,
            SampleError::Value(ValueError::OutOfRange { .. }) => FaultKind::RangeFault,
        }
    }
}

impl<E> From<CaptureError<E>> for SampleError<E> {
    fn from(value: CaptureError<E>) -> Self {
        Self::Capture(value)
    }
}

impl<E> From<DecodeError> for SampleError<E> {
    fn from(value: DecodeError) -> Self {
        Self::Decode(value)
    }
}

impl<E> From<ValueError> for SampleError<E> {
    fn from(value: ValueError) -> Self {
        Self::Value(value)
    }
}

/// Errors while setting up a sensor.
#[derive(Debug, PartialEq, Eq)]
pub enum InitError<E> {
    /// The platform has no pin with the requested name.
    UnknownPin,
    /// Driving the line to its idle level failed.
    PinFault(E),
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FaultKind::PinFault => "pin fault",
            FaultKind::CaptureTimingFault => "capture timing fault",
            FaultKind::ChecksumFault => "checksum fault",
            FaultKind::RangeFault => "range fault",
        })
    }
}

impl<E: fmt::Debug> fmt::Display for CaptureError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::PinFault(e) => write!(f, "pin operation failed: {e:?}"),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MissingLowLevel => f.write_str("missing readings: low level not found"),
            DecodeError::LevelMismatch { index, expected } => {
                write!(f, "missing readings: pulse {index} should be {expected:?}")
            }
            DecodeError::HighTooLong { index, duration_us } => {
                write!(f, "high level too long at pulse {index}: {duration_us}us")
            }
            DecodeError::LowTooLong { index, duration_us } => {
                write!(f, "low level too long at pulse {index}: {duration_us}us")
            }
            DecodeError::LowTooShort { index, duration_us } => {
                write!(f, "low level too short at pulse {index}: {duration_us}us")
            }
        }
    }
}

impl fmt::Display for ValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueError::ChecksumFail { expected, received } => {
                write!(f, "checksum fail: expected {expected:#04x}, received {received:#04x}")
            }
            ValueError::OutOfRange { quantity, raw } => {
                write!(f, "bad data: {quantity:?} {raw} out of range")
            }
        }
    }
}

impl<E: fmt::Debug> fmt::Display for SampleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleError::Capture(e) => fmt::Display::fmt(e, f),
            SampleError::Decode(e) => fmt::Display::fmt(e, f),
            SampleError::Value(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl<E: fmt::Debug> fmt::Display for InitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitError::UnknownPin => f.write_str("unknown pin"),
            InitError::PinFault(e) => write!(f, "pin out high error: {e:?}"),
        }
    }
}

impl<E: fmt::Debug> core::error::Error for CaptureError<E> {}
impl core::error::Error for DecodeError {}
impl core::error::Error for ValueError {}
impl<E: fmt::Debug> core::error::Error for SampleError<E> {}
impl<E: fmt::Debug> core::error::Error for InitError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_classifies_every_variant() {
        let pin: SampleError<()> = CaptureError::PinFault(()).into();
        assert_eq!(pin.kind(), FaultKind::PinFault);

        let timing: SampleError<()> = DecodeError::MissingLowLevel.into();
        assert_eq!(timing.kind(), FaultKind::CaptureTimingFault);

        let checksum: SampleError<()> = ValueError::ChecksumFail {
            expected: 1,
            received: 2,
        }
        .into();
        assert_eq!(checksum.kind(), FaultKind::ChecksumFault);

        let range: SampleError<()> = ValueError::OutOfRange {
            quantity: Quantity::Humidity,
            raw: 1001,
        }
        .into();
        assert_eq!(range.kind(), FaultKind::RangeFault);
    }

    #[test]
    fn test_display_mentions_duration() {
        let err = DecodeError::LowTooShort {
            index: 7,
            duration_us: 34,
        };
        assert_eq!(err.to_string(), "low level too short at pulse 7: 34us");
    }
}
