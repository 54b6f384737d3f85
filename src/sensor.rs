use core::time::Duration;

use embedded_hal::delay::DelayNs;

use crate::capture::capture;
use crate::clock::Clock;
use crate::config::SamplerConfig;
use crate::convert::{Reading, TemperatureUnit, Variant, convert};
use crate::decode::decode;
use crate::error::{InitError, SampleError};
use crate::logging::{debug, trace};
use crate::pin::{DataPin, Level, PinProvider};

/// How far the first attempt is back-dated on creation, so the initial read only waits for the
/// remainder of the regular spacing.
const WARM_UP_CREDIT: Duration = Duration::from_secs(1);

/// Driver and read scheduler for one DHT11 or AM2302/DHT22 sensor.
///
/// Owns the data pin for its whole lifetime. Every attempt spaces itself from the previous one
/// by [`SamplerConfig::minimum_interval`], which lengthens with consecutive failures.
pub struct Sensor<PIN, CLK, D> {
    pin: PIN,
    clock: CLK,
    delay: D,
    variant: Variant,
    unit: TemperatureUnit,
    config: SamplerConfig,
    last_attempt_us: u64,
    consecutive_failures: u32,
}

impl<PIN, CLK, D> Sensor<PIN, CLK, D>
where
    PIN: DataPin,
    CLK: Clock,
    D: DelayNs,
{
    /// Creates a sensor on an already resolved pin.
    ///
    /// # Arguments
    ///
    /// * `pin` - The data line. It is driven high so the sensor is idle for the first read.
    /// * `clock` - Microsecond clock used to time pulses and read spacing.
    /// * `delay` - A delay provider implementing the `DelayNs` trait.
    /// * `unit` - Unit temperatures are reported in.
    /// * `variant` - Sensor sub-protocol.
    ///
    /// The first read is held back a second so the sensor can warm up.
    pub fn new(
        mut pin: PIN,
        clock: CLK,
        delay: D,
        unit: TemperatureUnit,
        variant: Variant,
    ) -> Result<Self, InitError<PIN::Error>> {
        pin.set_output(Level::High).map_err(InitError::PinFault)?;

        let last_attempt_us = clock.now_us().saturating_sub(duration_us(WARM_UP_CREDIT));
        debug!("sensor ready");

        Ok(Sensor {
            pin,
            clock,
            delay,
            variant,
            unit,
            config: SamplerConfig::default(),
            last_attempt_us,
            consecutive_failures: 0,
        })
    }

    /// Creates a sensor on the pin the platform knows as `pin_name`.
    ///
    /// # Errors
    ///
    /// Returns `InitError::UnknownPin` if `provider` cannot resolve the name.
    pub fn open<P>(
        provider: &mut P,
        pin_name: &str,
        clock: CLK,
        delay: D,
        unit: TemperatureUnit,
        variant: Variant,
    ) -> Result<Self, InitError<PIN::Error>>
    where
        P: PinProvider<Pin = PIN>,
    {
        let pin = provider.pin_by_name(pin_name).ok_or(InitError::UnknownPin)?;
        Self::new(pin, clock, delay, unit, variant)
    }

    /// Replaces the default timing policy.
    pub fn with_config(mut self, config: SamplerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn unit(&self) -> TemperatureUnit {
        self.unit
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Number of failed attempts since the last successful one.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Clock timestamp at which the last attempt started.
    pub fn last_attempt_us(&self) -> u64 {
        self.last_attempt_us
    }

    /// Spacing the next attempt must keep from the previous one.
    pub fn minimum_interval(&self) -> Duration {
        self.config.minimum_interval(self.consecutive_failures)
    }

    /// How long the next attempt still has to wait.
    pub fn time_until_ready(&self) -> Duration {
        let elapsed = self.clock.now_us().saturating_sub(self.last_attempt_us);
        self.minimum_interval()
            .saturating_sub(Duration::from_micros(elapsed))
    }

    /// Reads the sensor once, waiting out the minimum spacing first.
    ///
    /// Blocks for up to [`SamplerConfig::max_interval`] plus one transaction.
    pub fn read_once(&mut self) -> Result<Reading, SampleError<PIN::Error>> {
        let wait = self.time_until_ready();
        if !wait.is_zero() {
            trace!("waiting {} us before next attempt", duration_us(wait));
            self.delay.delay_us(u32::try_from(duration_us(wait)).unwrap_or(u32::MAX));
        }
        self.attempt()
    }

    /// Calls [`read_once`](Self::read_once) until it succeeds or `max_attempts` attempts have
    /// failed, returning the last error in that case. At least one attempt is made.
    pub fn read_with_retry(&mut self, max_attempts: u32) -> Result<Reading, SampleError<PIN::Error>> {
        let mut attempts = 1;
        loop {
            match self.read_once() {
                Ok(reading) => return Ok(reading),
                Err(e) if attempts >= max_attempts => return Err(e),
                Err(_) => attempts += 1,
            }
        }
    }

    /// Hands back the data pin.
    pub fn release(self) -> PIN {
        self.pin
    }

    /// One capture, decode and convert pass, without any spacing.
    pub(crate) fn attempt(&mut self) -> Result<Reading, SampleError<PIN::Error>> {
        self.last_attempt_us = self.clock.now_us();

        let result = capture(&mut self.pin, &self.clock, &mut self.delay)
            .map_err(SampleError::from)
            .and_then(|train| decode(train.as_slice()).map_err(SampleError::from))
            .and_then(|frame| convert(&frame, self.variant, self.unit).map_err(SampleError::from));

        match &result {
            Ok(_) => {
                self.consecutive_failures = 0;
                trace!("read ok");
            }
            Err(e) => {
                self.consecutive_failures = self.consecutive_failures.saturating_add(1);
                debug!(
                    "read failed: {}, {} consecutive failures",
                    e.kind(),
                    self.consecutive_failures
                );
            }
        }
        result
    }

    /// Sleeps for `total` in `slice` steps, giving up early once `cancelled` returns `true`.
    ///
    /// Returns `true` if the wait was cut short.
    #[cfg(feature = "std")]
    pub(crate) fn pause_unless<F>(&mut self, total: Duration, slice: Duration, cancelled: F) -> bool
    where
        F: Fn() -> bool,
    {
        let mut remaining = total;
        loop {
            if cancelled() {
                return true;
            }
            if remaining.is_zero() {
                return false;
            }
            let step = remaining.min(slice.max(Duration::from_micros(1)));
            self.delay
                .delay_us(u32::try_from(duration_us(step)).unwrap_or(u32::MAX));
            remaining = remaining.saturating_sub(step);
        }
    }

    #[cfg(feature = "std")]
    pub(crate) fn clock(&self) -> &CLK {
        &self.clock
    }
}

fn duration_us(duration: Duration) -> u64 {
    u64::try_from(duration.as_micros()).unwrap_or(u64::MAX)
}
