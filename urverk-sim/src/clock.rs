//! The simulated clock facade.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, trace};

use urverk_core::clock::Clock;
use urverk_core::error::ClockError;
use urverk_core::events::{EventId, EventIdGen, TimedEvent};
use urverk_core::time::{Instant, SharedNow};

use crate::handle::{TickerHandle, TimerHandle};
use crate::loop_thread::{self, LoopRequest};

/// A clock whose time advances only on explicit [`tick`](SimClock::tick)
/// calls.
///
/// All event state lives in a dedicated loop thread; the facade holds the
/// shared now-cell, the stopped flag, and the request sender. The clock
/// is `Send + Sync`: share it across threads behind an `Arc`, drive
/// `tick` from one of them, and await timers, tickers, and sleeps from
/// the others.
pub struct SimClock {
    now: SharedNow,
    stopped: Arc<AtomicBool>,
    ids: EventIdGen,
    requests: Sender<LoopRequest>,
    /// Serializes tick and stop so advance-then-drain ordering between
    /// concurrent callers can never invert.
    serial: Mutex<()>,
    loop_thread: Mutex<Option<JoinHandle<()>>>,
    label: String,
}

/// Builder for [`SimClock`]; the only knobs are the starting instant and
/// a label used in trace output.
#[derive(Debug, Clone)]
pub struct SimClockBuilder {
    start: Instant,
    label: String,
}

impl SimClockBuilder {
    /// Starting instant of virtual time.
    pub fn start(mut self, at: Instant) -> Self {
        self.start = at;
        self
    }

    /// Label carried in the loop thread name and trace events.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn build(self) -> SimClock {
        let now = SharedNow::new(self.start);
        let (requests, request_rx) = unbounded();
        let loop_now = now.clone();
        let handle = thread::Builder::new()
            .name(format!("urverk-loop-{}", self.label))
            .spawn(move || loop_thread::run(request_rx, loop_now))
            .expect("failed to spawn clock event loop");

        debug!(label = %self.label, start = %self.start, "simulated clock started");
        SimClock {
            now,
            stopped: Arc::new(AtomicBool::new(false)),
            ids: EventIdGen::new(),
            requests,
            serial: Mutex::new(()),
            loop_thread: Mutex::new(Some(handle)),
            label: self.label,
        }
    }
}

impl SimClock {
    /// A clock starting at `initial`.
    pub fn new(initial: Instant) -> Self {
        Self::builder().start(initial).build()
    }

    pub fn builder() -> SimClockBuilder {
        SimClockBuilder {
            start: Instant::ZERO,
            label: "sim".to_string(),
        }
    }

    /// Advances virtual time by `dt` and fires every event that became
    /// due, in deadline order. Returns the new now once every fire has
    /// been observed by its waiter.
    ///
    /// `dt` must be positive. Calling `tick` from a thread that also
    /// awaits one of this clock's events deadlocks by design.
    pub fn tick(&self, dt: Duration) -> Result<Instant, ClockError> {
        let _serial = self.serial.lock();
        self.ensure_running()?;
        if dt.is_zero() {
            return Err(ClockError::InvalidDuration { what: "tick", d: dt });
        }

        let now = self.now.advance(dt);
        trace!(clock = %self.label, %now, "tick");

        let (done_tx, done_rx) = bounded(1);
        self.requests
            .send(LoopRequest::Tick { now, done: done_tx })
            .map_err(|_| ClockError::Stopped)?;
        done_rx.recv().map_err(|_| ClockError::Stopped)?;
        Ok(now)
    }

    /// Stops the clock: every pending event is released by closing its
    /// channel, the loop thread exits, and all further operations fail
    /// with [`ClockError::Stopped`]. A second stop is itself `Stopped`.
    pub fn stop(&self) -> Result<(), ClockError> {
        let _serial = self.serial.lock();
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ClockError::Stopped);
        }

        let (done_tx, done_rx) = bounded(1);
        self.requests
            .send(LoopRequest::Stop { done: done_tx })
            .map_err(|_| ClockError::Stopped)?;
        let _ = done_rx.recv();
        if let Some(handle) = self.loop_thread.lock().take() {
            let _ = handle.join();
        }
        debug!(clock = %self.label, "clock stopped");
        Ok(())
    }

    /// Number of live events currently registered. Useful for a harness
    /// that must wait until concurrent waiters are parked before ticking.
    pub fn pending_events(&self) -> Result<usize, ClockError> {
        self.ensure_running()?;
        let (reply_tx, reply_rx) = bounded(1);
        self.requests
            .send(LoopRequest::Query { reply: reply_tx })
            .map_err(|_| ClockError::Stopped)?;
        reply_rx.recv().map_err(|_| ClockError::Stopped)
    }

    /// Runs `f` with the firing instant on a helper thread once virtual
    /// time has advanced `d` past now. The returned handle cancels the
    /// callback like any timer.
    pub fn after_func<F>(&self, d: Duration, f: F) -> Result<TimerHandle, ClockError>
    where
        F: FnOnce(Instant) + Send + 'static,
    {
        let (id, stopped, fire_rx) = self.submit_event(d, false)?;
        thread::spawn(move || {
            if let Ok(at) = fire_rx.recv() {
                f(at);
            }
        });
        Ok(TimerHandle::new(self.requests.clone(), id, stopped))
    }

    fn ensure_running(&self) -> Result<(), ClockError> {
        if self.stopped.load(Ordering::Acquire) {
            Err(ClockError::Stopped)
        } else {
            Ok(())
        }
    }

    /// Builds and registers an event `d` from now. The post-send stopped
    /// re-check closes the race with a concurrent `stop`: if the flag
    /// reads false here, channel order guarantees the loop saw the
    /// registration before the stop and will release the event.
    fn submit_event(
        &self,
        d: Duration,
        repeat: bool,
    ) -> Result<(EventId, Arc<AtomicBool>, Receiver<Instant>), ClockError> {
        self.ensure_running()?;
        let id = self.ids.next_id();
        let stopped = Arc::new(AtomicBool::new(false));
        let (fire_tx, fire_rx) = bounded(0);
        let ev = TimedEvent {
            id,
            period: d,
            deadline: self.now.now() + d,
            fire_tx,
            repeat,
            stopped: Arc::clone(&stopped),
        };
        self.requests
            .send(LoopRequest::Register(ev))
            .map_err(|_| ClockError::Stopped)?;
        if self.stopped.load(Ordering::Acquire) {
            return Err(ClockError::Stopped);
        }
        Ok((id, stopped, fire_rx))
    }
}

impl Clock for SimClock {
    type Timer = TimerHandle;
    type Ticker = TickerHandle;

    fn now(&self) -> Instant {
        self.now.now()
    }

    fn new_timer(&self, d: Duration) -> Result<(TimerHandle, Receiver<Instant>), ClockError> {
        if d.is_zero() {
            return Err(ClockError::InvalidDuration {
                what: "new_timer",
                d,
            });
        }
        let (id, stopped, fire_rx) = self.submit_event(d, false)?;
        Ok((TimerHandle::new(self.requests.clone(), id, stopped), fire_rx))
    }

    fn new_ticker(&self, d: Duration) -> Result<(TickerHandle, Receiver<Instant>), ClockError> {
        if d.is_zero() {
            return Err(ClockError::InvalidDuration {
                what: "new_ticker",
                d,
            });
        }
        let (id, stopped, fire_rx) = self.submit_event(d, true)?;
        Ok((TickerHandle::new(self.requests.clone(), id, stopped), fire_rx))
    }

    /// Blocks until the next tick that carries virtual time at least `d`
    /// past the instant of the call. `Duration::ZERO` parks until the
    /// next tick, whatever its size.
    fn sleep(&self, d: Duration) -> Result<Instant, ClockError> {
        let (_id, _stopped, fire_rx) = self.submit_event(d, false)?;
        fire_rx.recv().map_err(|_| ClockError::Stopped)
    }
}

impl Drop for SimClock {
    fn drop(&mut self) {
        // Best-effort release of anything still parked on this clock.
        let _ = self.stop();
    }
}
