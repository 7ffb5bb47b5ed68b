//! The serialized event loop behind [`SimClock`](crate::SimClock).
//!
//! The loop thread is the only mutator of the event registry. Creators,
//! handles, tickers, and stop all submit a [`LoopRequest`] onto one
//! stream, and the loop applies them one at a time: the whole clock is
//! linearizable at this single point.

use std::time::Duration;

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace};

use urverk_core::events::{EventId, EventQueue, TimedEvent};
use urverk_core::time::{Instant, SharedNow};

/// Mutation of an already-registered event.
#[derive(Debug)]
pub(crate) enum UpdateOp {
    /// Set a new period and re-arm the deadline to `now + period`.
    Rearm(Duration),
    /// Mark the event stopped and drop it from the registry.
    Cancel,
}

/// Requests accepted by the loop.
pub(crate) enum LoopRequest {
    /// A newly constructed event to insert.
    Register(TimedEvent),
    /// Re-arm or cancel. When `reply` is present the loop reports whether
    /// the update applied to a live event.
    Update {
        id: EventId,
        op: UpdateOp,
        reply: Option<Sender<bool>>,
    },
    /// Authoritative new now; acked on `done` once every due event fired.
    Tick { now: Instant, done: Sender<()> },
    /// Live pending-event count.
    Query { reply: Sender<usize> },
    /// Release every pending event and exit the thread.
    Stop { done: Sender<()> },
}

/// Runs the loop until a `Stop` request arrives or every sender is gone.
pub(crate) fn run(requests: Receiver<LoopRequest>, now: SharedNow) {
    let mut queue = EventQueue::new();

    while let Ok(request) = requests.recv() {
        match request {
            LoopRequest::Register(ev) => {
                trace!(
                    id = ev.id.as_u64(),
                    deadline = %ev.deadline,
                    repeat = ev.repeat,
                    "register event"
                );
                queue.register(ev);
            }
            LoopRequest::Update { id, op, reply } => {
                let applied = match op {
                    UpdateOp::Rearm(period) => {
                        let deadline = now.now() + period;
                        trace!(id = id.as_u64(), %deadline, "re-arm event");
                        queue.reschedule(id, period, deadline)
                    }
                    UpdateOp::Cancel => {
                        trace!(id = id.as_u64(), "cancel event");
                        match queue.remove(id) {
                            Some(ev) => {
                                ev.mark_stopped();
                                true
                            }
                            None => false,
                        }
                    }
                };
                if let Some(reply) = reply {
                    let _ = reply.send(applied);
                }
            }
            LoopRequest::Tick { now, done } => {
                fire_due(&mut queue, now);
                let _ = done.send(());
            }
            LoopRequest::Query { reply } => {
                let _ = reply.send(queue.live());
            }
            LoopRequest::Stop { done } => {
                let released = queue.len();
                for ev in queue.drain() {
                    // Dropping the event drops its sender, which closes the
                    // channel and releases any blocked receiver.
                    ev.mark_stopped();
                }
                debug!(released, "event loop stopped");
                let _ = done.send(());
                return;
            }
        }
    }
}

/// Drains every event whose deadline has passed, in `(deadline, id)` order.
///
/// Each fire is a blocking rendezvous send: the tick that caused it does
/// not complete until the waiter has observed the fire. A missing waiter
/// stalls the loop here; that is the backpressure contract, not a bug.
fn fire_due(queue: &mut EventQueue, now: Instant) {
    let mut fired = 0u32;
    while queue.peek().is_some_and(|ev| ev.deadline <= now) {
        let mut ev = queue.pop().expect("peeked event must pop");

        if ev.is_stopped() {
            continue;
        }

        if ev.fire_tx.send(now).is_err() {
            // Receiver dropped; nobody is left to notify.
            ev.mark_stopped();
            continue;
        }
        fired += 1;

        if ev.repeat {
            // Periods are validated positive at creation and reset, so the
            // deadline always advances; a ticker can still legitimately
            // fire several times inside one large tick.
            ev.deadline = ev.deadline + ev.period;
            queue.register(ev);
        } else {
            ev.mark_stopped();
        }
    }
    debug!(%now, fired, pending = queue.len(), "tick drained");
}
