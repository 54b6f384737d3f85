//! Frame validation and conversion to physical units.

use core::convert::Infallible;
use core::str::FromStr;

use crate::decode::Frame;
use crate::error::{Quantity, ValueError};

/// Sensor sub-protocol, which decides scaling and legal ranges.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Variant {
    /// DHT11: whole units, 0-100 %RH and 0-50 degrees Celsius.
    Dht11,
    /// AM2302 / DHT22 family: tenths of a unit, 0-100 %RH and -40-80 degrees Celsius.
    #[default]
    Generic,
}

impl Variant {
    /// Parses a sensor name: `"dht11"` in any case selects [`Variant::Dht11`], anything else
    /// the AM2302 / DHT22 family.
    pub fn from_name(name: &str) -> Self {
        if name.eq_ignore_ascii_case("dht11") {
            Variant::Dht11
        } else {
            Variant::Generic
        }
    }

    fn humidity_range(self) -> (i32, i32) {
        match self {
            Variant::Dht11 => (0, 100),
            Variant::Generic => (0, 1000),
        }
    }

    fn temperature_range(self) -> (i32, i32) {
        match self {
            Variant::Dht11 => (0, 50),
            Variant::Generic => (-400, 800),
        }
    }

    fn scale(self) -> f32 {
        match self {
            Variant::Dht11 => 1.0,
            Variant::Generic => 10.0,
        }
    }
}

impl FromStr for Variant {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

/// Unit temperatures are reported in.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemperatureUnit {
    #[default]
    Celsius,
    Fahrenheit,
}

/// Reading returned by the sensor.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reading {
    /// Temperature in `unit`.
    pub temperature: f32,
    /// Relative humidity in percent.
    pub relative_humidity: f32,
    pub unit: TemperatureUnit,
}

/// Validates a frame and converts it into a [`Reading`].
///
/// The checksum is checked before anything else; a frame failing it is never converted.
///
/// # Errors
///
/// * `ChecksumFail` if the checksum byte is not the truncated sum of the four data bytes.
/// * `OutOfRange` if humidity or temperature is outside what `variant` can report.
pub fn convert(
    frame: &Frame,
    variant: Variant,
    unit: TemperatureUnit,
) -> Result<Reading, ValueError> {
    let [hum_hi, hum_lo, temp_hi, temp_lo, checksum] = frame.bytes();

    let expected = [hum_hi, hum_lo, temp_hi, temp_lo]
        .iter()
        .fold(0u8, |sum, v| sum.wrapping_add(*v));
    if expected != checksum {
        return Err(ValueError::ChecksumFail {
            expected,
            received: checksum,
        });
    }

    let humidity = i32::from(u16::from_be_bytes([hum_hi, hum_lo]));

    // Sign-magnitude: the top bit flags a negative value
    let magnitude = i32::from(u16::from_be_bytes([temp_hi & 0b0111_1111, temp_lo]));
    let temperature = if temp_hi & 0b1000_0000 != 0 {
        -magnitude
    } else {
        magnitude
    };

    check_range(Quantity::Humidity, humidity, variant.humidity_range())?;
    check_range(Quantity::Temperature, temperature, variant.temperature_range())?;

    let celsius = temperature as f32 / variant.scale();
    let temperature = match unit {
        TemperatureUnit::Celsius => celsius,
        TemperatureUnit::Fahrenheit => celsius * 9.0 / 5.0 + 32.0,
    };

    Ok(Reading {
        temperature,
        relative_humidity: humidity as f32 / variant.scale(),
        unit,
    })
}

fn check_range(quantity: Quantity, raw: i32, (min, max): (i32, i32)) -> Result<(), ValueError> {
    if (min..=max).contains(&raw) {
        Ok(())
    } else {
        Err(ValueError::OutOfRange { quantity, raw })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(humidity: u16, temperature: u16) -> Frame {
        let [hum_hi, hum_lo] = humidity.to_be_bytes();
        let [temp_hi, temp_lo] = temperature.to_be_bytes();
        let checksum = hum_hi
            .wrapping_add(hum_lo)
            .wrapping_add(temp_hi)
            .wrapping_add(temp_lo);
        Frame::from_bytes([hum_hi, hum_lo, temp_hi, temp_lo, checksum])
    }

    fn assert_close(actual: f32, expected: f32) {
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_convert_positive_temp() {
        // Words are tenths: 555 is 55.5 %RH, 246 is 24.6 C
        let reading = convert(&frame(555, 246), Variant::Generic, TemperatureUnit::Celsius).unwrap();
        assert_close(reading.relative_humidity, 55.5);
        assert_close(reading.temperature, 24.6);
        assert_eq!(reading.unit, TemperatureUnit::Celsius);
    }

    #[test]
    fn test_convert_sign_magnitude_temp() {
        let reading =
            convert(&frame(400, 0x8032), Variant::Generic, TemperatureUnit::Celsius).unwrap();
        assert_eq!(reading.temperature, -5.0);

        let reading =
            convert(&frame(400, 0x0032), Variant::Generic, TemperatureUnit::Celsius).unwrap();
        assert_eq!(reading.temperature, 5.0);
    }

    #[test]
    fn test_convert_fahrenheit() {
        let reading =
            convert(&frame(400, 250), Variant::Generic, TemperatureUnit::Fahrenheit).unwrap();
        assert_close(reading.temperature, 77.0);

        let reading = convert(
            &frame(400, 0x8000 | 400),
            Variant::Generic,
            TemperatureUnit::Fahrenheit,
        )
        .unwrap();
        assert_close(reading.temperature, -40.0);

        let reading = convert(&frame(40, 25), Variant::Dht11, TemperatureUnit::Fahrenheit).unwrap();
        assert_close(reading.temperature, 77.0);
        assert_close(reading.relative_humidity, 40.0);
    }

    #[test]
    fn test_convert_checksum_fail() {
        for (humidity, temperature) in [(555, 246), (0, 0), (1000, 800), (12, 30)] {
            let mut bytes = frame(humidity, temperature).bytes();
            bytes[4] = bytes[4].wrapping_add(1);
            for variant in [Variant::Generic, Variant::Dht11] {
                let err = convert(&Frame::from_bytes(bytes), variant, TemperatureUnit::Celsius)
                    .unwrap_err();
                assert!(matches!(err, ValueError::ChecksumFail { .. }));
            }
        }
    }

    #[test]
    fn test_checksum_reported_before_range() {
        // Humidity out of range for both variants and a bad checksum
        let mut bytes = frame(2000, 0).bytes();
        bytes[4] ^= 0xFF;
        let err = convert(&Frame::from_bytes(bytes), Variant::Generic, TemperatureUnit::Celsius)
            .unwrap_err();
        assert!(matches!(err, ValueError::ChecksumFail { .. }));
    }

    #[test]
    fn test_generic_range() {
        assert!(convert(&frame(1000, 800), Variant::Generic, TemperatureUnit::Celsius).is_ok());
        assert!(convert(&frame(0, 0x8000 | 400), Variant::Generic, TemperatureUnit::Celsius).is_ok());

        assert_eq!(
            convert(&frame(1001, 0), Variant::Generic, TemperatureUnit::Celsius).unwrap_err(),
            ValueError::OutOfRange {
                quantity: Quantity::Humidity,
                raw: 1001
            }
        );
        assert_eq!(
            convert(&frame(0, 801), Variant::Generic, TemperatureUnit::Celsius).unwrap_err(),
            ValueError::OutOfRange {
                quantity: Quantity::Temperature,
                raw: 801
            }
        );
        assert_eq!(
            convert(&frame(0, 0x8000 | 401), Variant::Generic, TemperatureUnit::Celsius)
                .unwrap_err(),
            ValueError::OutOfRange {
                quantity: Quantity::Temperature,
                raw: -401
            }
        );
    }

    #[test]
    fn test_dht11_range() {
        let reading = convert(&frame(100, 50), Variant::Dht11, TemperatureUnit::Celsius).unwrap();
        assert_eq!(reading.relative_humidity, 100.0);
        assert_eq!(reading.temperature, 50.0);

        assert_eq!(
            convert(&frame(40, 51), Variant::Dht11, TemperatureUnit::Celsius).unwrap_err(),
            ValueError::OutOfRange {
                quantity: Quantity::Temperature,
                raw: 51
            }
        );
        assert_eq!(
            convert(&frame(101, 20), Variant::Dht11, TemperatureUnit::Celsius).unwrap_err(),
            ValueError::OutOfRange {
                quantity: Quantity::Humidity,
                raw: 101
            }
        );
        // Below freezing is outside what a DHT11 reports
        assert!(convert(&frame(40, 0x8001), Variant::Dht11, TemperatureUnit::Celsius).is_err());
    }

    #[test]
    fn test_variant_from_name() {
        assert_eq!(Variant::from_name("dht11"), Variant::Dht11);
        assert_eq!("DHT11".parse::<Variant>().unwrap(), Variant::Dht11);
        assert_eq!(Variant::from_name("dht22"), Variant::Generic);
        assert_eq!(Variant::from_name("am2302"), Variant::Generic);
        assert_eq!(Variant::from_name(""), Variant::Generic);
    }
}
