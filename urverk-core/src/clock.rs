//! The clock contract shared by the real and simulated backends.
//!
//! Application code written against [`Clock`] runs unchanged under wall
//! time and under a simulated clock driven by a test harness.

use std::time::Duration;

use crossbeam_channel::Receiver;

use crate::error::ClockError;
use crate::time::Instant;

/// Control surface of a one-shot timer handle.
pub trait TimerControl {
    /// Re-arms the timer to fire `d` after the current time.
    /// `Duration::ZERO` is legal and means "fire at the next advance".
    /// Returns false if the timer already fired or was stopped.
    fn reset(&self, d: Duration) -> bool;

    /// Cancels the timer. True iff it was still live; across repeated
    /// calls at most one `true` is ever returned.
    fn stop(&self) -> bool;
}

/// Control surface of a periodic ticker handle.
pub trait TickerControl {
    /// Updates the period and re-arms the next fire to `d` from now.
    /// Zero periods are rejected with [`ClockError::InvalidDuration`].
    fn reset(&self, d: Duration) -> Result<(), ClockError>;

    /// Stops the ticker. True iff it was still live.
    fn stop(&self) -> bool;
}

/// A source of time and timed events.
///
/// Every firing is delivered as the firing instant on the returned
/// receiver. For the simulated backend the channel is a rendezvous: the
/// advance that caused a fire does not complete until the fire has been
/// observed, so "tick returned" implies "waiters ran".
pub trait Clock {
    type Timer: TimerControl;
    type Ticker: TickerControl;

    /// Current time. Non-blocking; on a simulated clock the value is
    /// stable between explicit advances.
    fn now(&self) -> Instant;

    /// One-shot timer firing `d` from now (`d` must be positive). The
    /// receiver yields the firing instant exactly once.
    fn new_timer(&self, d: Duration) -> Result<(Self::Timer, Receiver<Instant>), ClockError>;

    /// Periodic ticker firing every `d` (positive), starting `d` from now.
    fn new_ticker(&self, d: Duration) -> Result<(Self::Ticker, Receiver<Instant>), ClockError>;

    /// Blocks the calling thread until time has advanced by at least `d`
    /// past the instant of the call, and returns the instant that
    /// released it.
    fn sleep(&self, d: Duration) -> Result<Instant, ClockError>;
}
