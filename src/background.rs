//! Continuous sampling on a dedicated thread.
//!
//! The sampling thread owns the [`Sensor`] for as long as it runs. Readings reach other threads
//! only through a [`LiveReading`] snapshot cell; failed attempts are not reported, a reading that
//! stops updating is the only sign of trouble.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use embedded_hal::delay::DelayNs;

use crate::clock::Clock;
use crate::convert::Reading;
use crate::logging::{debug, warning};
use crate::pin::DataPin;
use crate::sensor::Sensor;

/// Cooperative stop request shared between the caller and a sampling thread.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the sampling thread to stop at its next wait point.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

#[derive(Clone, Copy, Debug, Default)]
struct Snapshot {
    reading: Option<Reading>,
    sequence: u64,
}

#[derive(Debug, Default)]
struct Slot {
    snapshot: Mutex<Snapshot>,
    updated: Condvar,
}

/// Most recent reading published by a sampling thread.
#[derive(Clone, Debug, Default)]
pub struct LiveReading {
    slot: Arc<Slot>,
}

impl LiveReading {
    fn lock(&self) -> MutexGuard<'_, Snapshot> {
        self.slot
            .snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// The last successful reading, if there has been one.
    pub fn latest(&self) -> Option<Reading> {
        self.lock().reading
    }

    /// Number of readings published so far.
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }

    /// Blocks until a reading newer than sequence number `seen` is published, or `timeout`
    /// passes. Returns the new sequence number with its reading.
    pub fn wait_for_update(&self, seen: u64, timeout: Duration) -> Option<(u64, Reading)> {
        let (snapshot, _) = self
            .slot
            .updated
            .wait_timeout_while(self.lock(), timeout, |snapshot| snapshot.sequence <= seen)
            .unwrap_or_else(PoisonError::into_inner);
        let reading = snapshot.reading?;
        (snapshot.sequence > seen).then_some((snapshot.sequence, reading))
    }

    fn publish(&self, reading: Reading) {
        let mut snapshot = self.lock();
        snapshot.reading = Some(reading);
        snapshot.sequence += 1;
        drop(snapshot);
        self.slot.updated.notify_all();
    }
}

/// One-shot signal raised when a sampling thread has finished.
///
/// The sampling thread holds the only sender of a channel that never carries a message, so the
/// channel disconnects exactly when the thread exits, also by panic.
#[derive(Clone, Debug)]
pub struct Completion {
    done: Receiver<()>,
}

/// Creates the sending half held by the sampling thread and the signal it raises.
fn completion() -> (Sender<()>, Completion) {
    let (tx, done) = bounded(0);
    (tx, Completion { done })
}

impl Completion {
    pub fn is_complete(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// Blocks until the signal is raised.
    pub fn wait(&self) {
        while self.done.recv().is_ok() {}
    }

    /// Blocks until the signal is raised or `timeout` passes; returns whether it was raised.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.done.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }
}

/// Handle to a running sampling thread.
///
/// Dropping the handle without [`join`](Self::join) cancels the thread.
pub struct BackgroundSampler<PIN, CLK, D> {
    live: LiveReading,
    completion: Completion,
    cancel: CancelToken,
    handle: Option<JoinHandle<Sensor<PIN, CLK, D>>>,
}

impl<PIN, CLK, D> BackgroundSampler<PIN, CLK, D> {
    pub fn live(&self) -> &LiveReading {
        &self.live
    }

    pub fn completion(&self) -> &Completion {
        &self.completion
    }

    /// Asks the thread to stop, without waiting for it.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the thread to finish and takes the sensor back.
    ///
    /// Does not cancel; call [`cancel`](Self::cancel) first unless the token is fired elsewhere.
    pub fn join(mut self) -> thread::Result<Sensor<PIN, CLK, D>> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => unreachable!("sampling thread is only joined once"),
        }
    }
}

impl<PIN, CLK, D> Drop for BackgroundSampler<PIN, CLK, D> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel.cancel();
        }
    }
}

/// Starts reading `sensor` on its own thread until `cancel` fires.
///
/// Every successful reading is published to the returned handle's [`LiveReading`]. After a
/// success the thread waits for `interval` measured from the start of that attempt; after a
/// failure it waits [`retry_pause`](crate::SamplerConfig::retry_pause). On top of that every
/// attempt keeps the sensor's minimum spacing. All waits observe `cancel`.
///
/// # Errors
///
/// Fails if the thread cannot be spawned.
pub fn sample_continuously<PIN, CLK, D>(
    mut sensor: Sensor<PIN, CLK, D>,
    interval: Duration,
    cancel: CancelToken,
) -> io::Result<BackgroundSampler<PIN, CLK, D>>
where
    PIN: DataPin + Send + 'static,
    CLK: Clock + Send + 'static,
    D: DelayNs + Send + 'static,
{
    let live = LiveReading::default();
    let (signal, completion) = completion();

    let handle = thread::Builder::new().name("dht-sampler".into()).spawn({
        let live = live.clone();
        let cancel = cancel.clone();
        move || {
            let _signal = signal;
            run(&mut sensor, interval, &cancel, &live);
            sensor
        }
    })?;

    Ok(BackgroundSampler {
        live,
        completion,
        cancel,
        handle: Some(handle),
    })
}

fn run<PIN, CLK, D>(
    sensor: &mut Sensor<PIN, CLK, D>,
    interval: Duration,
    cancel: &CancelToken,
    live: &LiveReading,
) where
    PIN: DataPin,
    CLK: Clock,
    D: DelayNs,
{
    let config = *sensor.config();
    let cancelled = || cancel.is_cancelled();
    debug!("background sampling started");

    loop {
        if cancel.is_cancelled() {
            break;
        }
        let spacing = sensor.time_until_ready();
        if sensor.pause_unless(spacing, config.cancel_poll, cancelled) {
            break;
        }

        let started_us = sensor.clock().now_us();
        let pause = match sensor.attempt() {
            Ok(reading) => {
                live.publish(reading);
                let elapsed = sensor.clock().now_us().saturating_sub(started_us);
                interval.saturating_sub(Duration::from_micros(elapsed))
            }
            Err(_) => {
                if sensor.consecutive_failures() == 10 {
                    warning!("sensor keeps failing, readings are going stale");
                }
                config.retry_pause
            }
        };

        if sensor.pause_unless(pause, config.cancel_poll, cancelled) {
            break;
        }
    }

    debug!("background sampling stopped after {} readings", live.sequence());
}
