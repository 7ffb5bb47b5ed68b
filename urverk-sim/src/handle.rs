//! Caller-facing timer and ticker handles.
//!
//! A handle never touches the event record it refers to. It carries the
//! loop's request sender, the event id, and the shared terminal flag;
//! stop and reset translate into messages, and the loop stays the sole
//! mutator of event state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, Sender};

use urverk_core::clock::{TickerControl, TimerControl};
use urverk_core::error::ClockError;
use urverk_core::events::EventId;

use crate::loop_thread::{LoopRequest, UpdateOp};

/// Shared plumbing behind both handle kinds.
#[derive(Debug, Clone)]
struct Handle {
    requests: Sender<LoopRequest>,
    id: EventId,
    stopped: Arc<AtomicBool>,
}

impl Handle {
    /// The first caller to observe the event live wins the stop.
    fn stop(&self) -> bool {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        // The flag above is the authoritative terminal state; the message
        // just prompts the loop to drop the registry entry. If the clock
        // already stopped, the entry is gone anyway.
        let _ = self.requests.send(LoopRequest::Update {
            id: self.id,
            op: UpdateOp::Cancel,
            reply: None,
        });
        true
    }

    /// Re-arms the event `d` from the loop's current now. Returns the
    /// loop's confirmation, so a fire that won the race is never
    /// misreported as re-armed.
    fn rearm(&self, d: Duration) -> bool {
        if self.stopped.load(Ordering::Acquire) {
            return false;
        }
        let (reply_tx, reply_rx) = bounded(1);
        let sent = self.requests.send(LoopRequest::Update {
            id: self.id,
            op: UpdateOp::Rearm(d),
            reply: Some(reply_tx),
        });
        if sent.is_err() {
            return false;
        }
        reply_rx.recv().unwrap_or(false)
    }
}

/// One-shot timer handle returned by [`SimClock::new_timer`](crate::SimClock).
#[derive(Debug, Clone)]
pub struct TimerHandle {
    inner: Handle,
}

impl TimerHandle {
    pub(crate) fn new(requests: Sender<LoopRequest>, id: EventId, stopped: Arc<AtomicBool>) -> Self {
        Self {
            inner: Handle {
                requests,
                id,
                stopped,
            },
        }
    }
}

impl TimerControl for TimerHandle {
    fn reset(&self, d: Duration) -> bool {
        // Zero is legal here: the timer fires on the next tick.
        self.inner.rearm(d)
    }

    fn stop(&self) -> bool {
        self.inner.stop()
    }
}

/// Periodic ticker handle returned by [`SimClock::new_ticker`](crate::SimClock).
#[derive(Debug, Clone)]
pub struct TickerHandle {
    inner: Handle,
}

impl TickerHandle {
    pub(crate) fn new(requests: Sender<LoopRequest>, id: EventId, stopped: Arc<AtomicBool>) -> Self {
        Self {
            inner: Handle {
                requests,
                id,
                stopped,
            },
        }
    }
}

impl TickerControl for TickerHandle {
    fn reset(&self, d: Duration) -> Result<(), ClockError> {
        if d.is_zero() {
            return Err(ClockError::InvalidDuration {
                what: "ticker reset",
                d,
            });
        }
        // A stopped ticker stays stopped; the re-arm is silently void.
        self.inner.rearm(d);
        Ok(())
    }

    fn stop(&self) -> bool {
        self.inner.stop()
    }
}
