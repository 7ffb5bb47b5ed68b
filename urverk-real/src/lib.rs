//! # urverk-real
//!
//! Wall-clock backend for the `urverk-core` [`Clock`] contract.
//!
//! [`RealClock`] is a stateless value: every instance reads the same
//! process-wide monotonic epoch, so there is no singleton to manage and
//! nothing to tear down. Timers and tickers are small worker threads
//! multiplexing a control channel against their deadline with
//! `crossbeam_channel::select!`.
//!
//! Unlike the simulated backend, real fire channels hold one slot of
//! buffer: a receiver that is slow to drain delays nothing and a ticker
//! simply skips beats, which is the behavior production code expects
//! from a wall clock.

#![deny(rustdoc::broken_intra_doc_links)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant as StdInstant;

use crossbeam_channel::{after, bounded, select, unbounded, Receiver, Sender, TrySendError};
use once_cell::sync::Lazy;

use urverk_core::clock::{Clock, TickerControl, TimerControl};
use urverk_core::error::ClockError;
use urverk_core::time::Instant;

/// Process-wide monotonic epoch; all real instants are measured from it.
static EPOCH: Lazy<StdInstant> = Lazy::new(StdInstant::now);

fn host_now() -> Instant {
    Instant::from_nanos(u64::try_from(EPOCH.elapsed().as_nanos()).unwrap_or(u64::MAX))
}

/// Wall-clock implementation of [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    pub fn new() -> Self {
        RealClock
    }
}

impl Clock for RealClock {
    type Timer = RealTimer;
    type Ticker = RealTicker;

    fn now(&self) -> Instant {
        host_now()
    }

    fn new_timer(&self, d: Duration) -> Result<(RealTimer, Receiver<Instant>), ClockError> {
        if d.is_zero() {
            return Err(ClockError::InvalidDuration {
                what: "new_timer",
                d,
            });
        }
        let (inner, fires) = spawn_worker(d, false);
        Ok((RealTimer { inner }, fires))
    }

    fn new_ticker(&self, d: Duration) -> Result<(RealTicker, Receiver<Instant>), ClockError> {
        if d.is_zero() {
            return Err(ClockError::InvalidDuration {
                what: "new_ticker",
                d,
            });
        }
        let (inner, fires) = spawn_worker(d, true);
        Ok((RealTicker { inner }, fires))
    }

    fn sleep(&self, d: Duration) -> Result<Instant, ClockError> {
        thread::sleep(d);
        Ok(host_now())
    }
}

enum Ctrl {
    Rearm(Duration),
    Stop,
}

/// Shared plumbing behind both real handle kinds.
#[derive(Debug, Clone)]
struct RealHandle {
    ctrl: Sender<Ctrl>,
    stopped: Arc<AtomicBool>,
}

impl RealHandle {
    fn stop(&self) -> bool {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        let _ = self.ctrl.send(Ctrl::Stop);
        true
    }

    fn rearm(&self, d: Duration) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        self.ctrl.send(Ctrl::Rearm(d)).is_ok()
    }
}

/// One-shot timer backed by a worker thread.
#[derive(Debug, Clone)]
pub struct RealTimer {
    inner: RealHandle,
}

impl TimerControl for RealTimer {
    fn reset(&self, d: Duration) -> bool {
        self.inner.rearm(d)
    }

    fn stop(&self) -> bool {
        self.inner.stop()
    }
}

/// Periodic ticker backed by a worker thread.
#[derive(Debug, Clone)]
pub struct RealTicker {
    inner: RealHandle,
}

impl TickerControl for RealTicker {
    fn reset(&self, d: Duration) -> Result<(), ClockError> {
        if d.is_zero() {
            return Err(ClockError::InvalidDuration {
                what: "ticker reset",
                d,
            });
        }
        self.inner.rearm(d);
        Ok(())
    }

    fn stop(&self) -> bool {
        self.inner.stop()
    }
}

fn spawn_worker(d: Duration, repeat: bool) -> (RealHandle, Receiver<Instant>) {
    let (fire_tx, fire_rx) = bounded(1);
    let (ctrl_tx, ctrl_rx) = unbounded();
    let stopped = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stopped);

    thread::spawn(move || {
        let mut period = d;
        let mut alarm = after(period);
        loop {
            select! {
                recv(ctrl_rx) -> msg => match msg {
                    Ok(Ctrl::Rearm(new_period)) => {
                        period = new_period;
                        alarm = after(period);
                    }
                    // Disconnect means every handle is gone; a one-shot
                    // still pending would fire into nowhere, so exit.
                    Ok(Ctrl::Stop) | Err(_) => return,
                },
                recv(alarm) -> _ => {
                    if flag.load(Ordering::Acquire) {
                        return;
                    }
                    match fire_tx.try_send(host_now()) {
                        Ok(()) => {}
                        // Slow receiver: the beat is dropped, not queued.
                        Err(TrySendError::Full(_)) => {}
                        Err(TrySendError::Disconnected(_)) => return,
                    }
                    if !repeat {
                        flag.store(true, Ordering::Release);
                        return;
                    }
                    alarm = after(period);
                }
            }
        }
    });

    (RealHandle { ctrl: ctrl_tx, stopped }, fire_rx)
}
