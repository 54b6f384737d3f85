//! Pulse train to frame conversion.

use crate::capture::Pulse;
use crate::error::DecodeError;
use crate::pin::Level;

/// Number of bits in one sensor frame.
pub const FRAME_BITS: usize = 40;

/// Pulses carrying data: one high/low pair per bit.
const DATA_PULSES: usize = FRAME_BITS * 2;

/// High pulses up to this width are a `0` bit, longer ones a `1` bit.
const BIT_ONE_THRESHOLD_US: u32 = 30;
const HIGH_MAX_US: u32 = 90;
const LOW_MIN_US: u32 = 35;
const LOW_MAX_US: u32 = 70;

/// The 40-bit payload of one transaction, most significant bit first.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    bits: [bool; FRAME_BITS],
}

impl Frame {
    pub const fn from_bits(bits: [bool; FRAME_BITS]) -> Self {
        Frame { bits }
    }

    /// Builds a frame from humidity high/low, temperature high/low and checksum bytes.
    pub fn from_bytes(bytes: [u8; 5]) -> Self {
        let mut bits = [false; FRAME_BITS];
        for (i, bit) in bits.iter_mut().enumerate() {
            *bit = (bytes[i / 8] >> (7 - i % 8)) & 1 == 1;
        }
        Frame { bits }
    }

    pub fn bits(&self) -> &[bool; FRAME_BITS] {
        &self.bits
    }

    /// Packs the bits into five bytes, in transmission order.
    pub fn bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        for (byte, chunk) in bytes.iter_mut().zip(self.bits.chunks_exact(8)) {
            *byte = chunk.iter().fold(0, |acc, bit| (acc << 1) | u8::from(*bit));
        }
        bytes
    }
}

/// Decodes the data bits from a captured pulse train.
///
/// The last low pulse marks the end of the transmission; the 80 pulses ending at it are the
/// 40 high/low bit pairs. Anything in front of them is the wake handshake and is ignored.
///
/// # Errors
///
/// * `MissingLowLevel` if the train holds fewer than 80 pulses up to its last low pulse.
/// * `LevelMismatch` if the pairs do not alternate high/low.
/// * `HighTooLong`, `LowTooLong` or `LowTooShort` if a pulse width is outside the protocol's
///   window, which means an edge was missed or the line is noisy.
pub fn decode(pulses: &[Pulse]) -> Result<Frame, DecodeError> {
    let end = pulses
        .iter()
        .rposition(|pulse| pulse.level == Level::Low)
        .ok_or(DecodeError::MissingLowLevel)?;
    let start = (end + 1)
        .checked_sub(DATA_PULSES)
        .ok_or(DecodeError::MissingLowLevel)?;

    let mut bits = [false; FRAME_BITS];
    let pairs = pulses[start..=end].chunks_exact(2);
    for ((n, pair), bit) in pairs.enumerate().zip(bits.iter_mut()) {
        let index = start + n * 2;
        let (high, low) = (pair[0], pair[1]);

        if high.level != Level::High {
            return Err(DecodeError::LevelMismatch {
                index,
                expected: Level::High,
            });
        }
        if high.duration_us > HIGH_MAX_US {
            return Err(DecodeError::HighTooLong {
                index,
                duration_us: high.duration_us,
            });
        }
        *bit = high.duration_us > BIT_ONE_THRESHOLD_US;

        let index = index + 1;
        if low.level != Level::Low {
            return Err(DecodeError::LevelMismatch {
                index,
                expected: Level::Low,
            });
        }
        if low.duration_us > LOW_MAX_US {
            return Err(DecodeError::LowTooLong {
                index,
                duration_us: low.duration_us,
            });
        }
        if low.duration_us < LOW_MIN_US {
            return Err(DecodeError::LowTooShort {
                index,
                duration_us: low.duration_us,
            });
        }
    }

    Ok(Frame { bits })
}
