//! DHT11 and AM2302/DHT22 sampling for Embedded Rust
//!
//! This crate decodes the single-wire, pulse-width-modulated protocol of the DHT family of
//! humidity and temperature sensors, and schedules reads so that the sensor is never polled
//! faster than it can refresh, backing off further while it keeps failing.
//!
//! A read goes through four stages:
//! - [`capture`](capture::capture) wakes the sensor and busy-polls the line, recording up to 84
//!   pulses into a stack buffer
//! - [`decode`](decode::decode) turns the last 80 pulses into a 40-bit [`Frame`]
//! - [`convert`](convert::convert) checks the checksum and range and scales to a [`Reading`]
//! - [`Sensor`] spaces attempts and tracks consecutive failures
//!
//! # Features
//! - Blocking synchronous API using `embedded-hal` traits, usable in `no_std` environments
//! - `std` (default): [`StdClock`], [`StdDelay`], background sampling on a thread and a
//!   deterministic simulated sensor
//! - `defmt`: Implements `defmt::Format` and logs through `defmt`
//! - `log`: Logs through the `log` facade
//!
//! # Dependencies
//! The capture step depends on the following `embedded-hal` traits:
//! - [`InputPin`] and [`OutputPin`] for GPIO access, through [`OpenDrain`]
//! - [`DelayNs`] for the wake signal and read spacing
//!
//! [`InputPin`]: embedded_hal::digital::InputPin
//! [`OutputPin`]: embedded_hal::digital::OutputPin
//! [`DelayNs`]: embedded_hal::delay::DelayNs

#![cfg_attr(not(any(test, feature = "std")), no_std)]

mod logging;

pub mod capture;
pub mod clock;
pub mod config;
pub mod convert;
pub mod decode;
pub mod error;
pub mod pin;
pub mod sensor;

#[cfg(feature = "std")]
pub mod background;
#[cfg(any(test, feature = "std"))]
pub mod sim;

pub use capture::{Pulse, PulseTrain};
pub use clock::Clock;
#[cfg(feature = "std")]
pub use clock::{StdClock, StdDelay};
pub use config::SamplerConfig;
pub use convert::{Reading, TemperatureUnit, Variant};
pub use decode::Frame;
pub use error::{CaptureError, DecodeError, FaultKind, InitError, SampleError, ValueError};
pub use pin::{DataPin, Level, OpenDrain, PinProvider, Pull};
pub use sensor::Sensor;

#[cfg(feature = "std")]
pub use background::{BackgroundSampler, CancelToken, Completion, LiveReading, sample_continuously};
