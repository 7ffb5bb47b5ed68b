//! Timed events and the deadline-ordered registry.
//!
//! Timers, tickers, and sleeps are all the same [`TimedEvent`] record,
//! distinguished by the `repeat` flag and by whether a caller-facing
//! handle is exposed. The registry is a vector kept sorted by
//! `(deadline, id)`: re-ordering after an in-place deadline change is a
//! remove plus a binary-search re-insert, and queues stay small enough
//! (thousands of events at most) that a heap buys nothing. Ids are
//! assigned in registration order, so among equal deadlines the
//! first-registered event fires first.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::Sender;

use crate::time::Instant;

/// Identity of a registered event. Ordering follows creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    /// Raw counter value, mainly for logging.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

/// Monotonic generator for [`EventId`]s, shared across creator threads.
#[derive(Debug, Default)]
pub struct EventIdGen {
    next: AtomicU64,
}

impl EventIdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> EventId {
        EventId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

/// A scheduled future event: the substrate of timers, tickers and sleeps.
#[derive(Debug)]
pub struct TimedEvent {
    /// Registration-order identity; the deadline tie-breaker.
    pub id: EventId,
    /// One-shot delay or ticker period.
    pub period: Duration,
    /// Next fire instant.
    pub deadline: Instant,
    /// Rendezvous sender for the firing instant. The matching receiver is
    /// held by the waiter; a send completes only when the waiter is ready.
    pub fire_tx: Sender<Instant>,
    /// Tickers re-arm after each fire; timers and sleeps do not.
    pub repeat: bool,
    /// Terminal flag, shared with the caller-facing handle. Write-once
    /// false to true.
    pub stopped: Arc<AtomicBool>,
}

impl TimedEvent {
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    #[inline]
    pub fn mark_stopped(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    #[inline]
    fn sort_key(&self) -> (Instant, EventId) {
        (self.deadline, self.id)
    }
}

/// Pending events ordered by `(deadline, id)` ascending.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<TimedEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of registered events that are still live.
    pub fn live(&self) -> usize {
        self.events.iter().filter(|ev| !ev.is_stopped()).count()
    }

    /// Inserts `ev` at its sorted position.
    pub fn register(&mut self, ev: TimedEvent) {
        let at = self
            .events
            .partition_point(|existing| existing.sort_key() <= ev.sort_key());
        self.events.insert(at, ev);
    }

    /// The earliest pending event, if any.
    pub fn peek(&self) -> Option<&TimedEvent> {
        self.events.first()
    }

    /// Removes and returns the earliest pending event.
    pub fn pop(&mut self) -> Option<TimedEvent> {
        if self.events.is_empty() {
            None
        } else {
            Some(self.events.remove(0))
        }
    }

    /// Re-arms `id` with a new period and deadline, keeping the order
    /// intact. Returns false for unknown ids and for stopped events:
    /// stopped is terminal, a stopped event is never re-armed.
    pub fn reschedule(&mut self, id: EventId, period: Duration, deadline: Instant) -> bool {
        let Some(pos) = self.events.iter().position(|ev| ev.id == id) else {
            return false;
        };
        if self.events[pos].is_stopped() {
            return false;
        }
        let mut ev = self.events.remove(pos);
        ev.period = period;
        ev.deadline = deadline;
        self.register(ev);
        true
    }

    /// Removes `id`, returning the event if it was registered.
    pub fn remove(&mut self, id: EventId) -> Option<TimedEvent> {
        let pos = self.events.iter().position(|ev| ev.id == id)?;
        Some(self.events.remove(pos))
    }

    /// Removes every event, in order. Used when the owning clock stops.
    pub fn drain(&mut self) -> Vec<TimedEvent> {
        std::mem::take(&mut self.events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    fn event(gen: &EventIdGen, deadline_ns: u64) -> TimedEvent {
        let (fire_tx, _fire_rx) = bounded(0);
        TimedEvent {
            id: gen.next_id(),
            period: Duration::from_nanos(1),
            deadline: Instant::from_nanos(deadline_ns),
            fire_tx,
            repeat: false,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn pops_in_deadline_order() {
        let gen = EventIdGen::new();
        let mut queue = EventQueue::new();
        queue.register(event(&gen, 30));
        queue.register(event(&gen, 10));
        queue.register(event(&gen, 20));

        let order: Vec<u64> = std::iter::from_fn(|| queue.pop())
            .map(|ev| ev.deadline.as_nanos())
            .collect();
        assert_eq!(order, vec![10, 20, 30]);
    }

    #[test]
    fn equal_deadlines_fire_in_registration_order() {
        let gen = EventIdGen::new();
        let mut queue = EventQueue::new();
        let first = event(&gen, 10);
        let second = event(&gen, 10);
        let third = event(&gen, 10);
        let ids = vec![first.id, second.id, third.id];

        // Register out of id order; pops must still follow creation order.
        queue.register(third);
        queue.register(first);
        queue.register(second);
        let popped: Vec<EventId> = std::iter::from_fn(|| queue.pop()).map(|ev| ev.id).collect();
        assert_eq!(popped, ids);
    }

    #[test]
    fn reschedule_reorders() {
        let gen = EventIdGen::new();
        let mut queue = EventQueue::new();
        let early = event(&gen, 10);
        let late = event(&gen, 20);
        let early_id = early.id;
        queue.register(early);
        queue.register(late);

        assert!(queue.reschedule(early_id, Duration::from_nanos(5), Instant::from_nanos(30)));
        assert_eq!(queue.peek().unwrap().deadline.as_nanos(), 20);
    }

    #[test]
    fn reschedule_rejects_unknown_and_stopped() {
        let gen = EventIdGen::new();
        let mut queue = EventQueue::new();
        let ev = event(&gen, 10);
        let id = ev.id;
        ev.mark_stopped();
        queue.register(ev);

        assert!(!queue.reschedule(id, Duration::from_nanos(1), Instant::from_nanos(5)));
        assert!(!queue.reschedule(
            EventId(u64::MAX),
            Duration::from_nanos(1),
            Instant::from_nanos(5)
        ));
    }

    #[test]
    fn remove_and_drain() {
        let gen = EventIdGen::new();
        let mut queue = EventQueue::new();
        let ev = event(&gen, 10);
        let id = ev.id;
        queue.register(ev);
        queue.register(event(&gen, 20));

        assert!(queue.remove(id).is_some());
        assert!(queue.remove(id).is_none());
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn live_ignores_stopped() {
        let gen = EventIdGen::new();
        let mut queue = EventQueue::new();
        let ev = event(&gen, 10);
        ev.mark_stopped();
        queue.register(ev);
        queue.register(event(&gen, 20));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.live(), 1);
    }
}
