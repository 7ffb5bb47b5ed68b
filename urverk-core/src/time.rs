//! Virtual time primitives.
//!
//! [`Instant`] is an opaque nanosecond timestamp with no tie to the host
//! clock. [`SharedNow`] is the mutable "current time" cell shared between
//! a clock facade and its event loop: an atomic counter, so readers never
//! block while an advance is in flight.

use std::fmt;
use std::ops::{Add, Sub};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A point in virtual time, counted in nanoseconds from an arbitrary epoch.
///
/// Instants are totally ordered and only ever move forward: the clock that
/// owns them advances in explicit steps and never rewinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Instant(u64);

impl Instant {
    /// The zero point of virtual time.
    pub const ZERO: Instant = Instant(0);

    /// Builds an instant from raw nanoseconds since the epoch.
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Instant(nanos)
    }

    /// Raw nanoseconds since the epoch.
    #[inline]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// The instant `d` after `self`, or `None` on overflow.
    #[inline]
    pub fn checked_add(self, d: Duration) -> Option<Instant> {
        u64::try_from(d.as_nanos())
            .ok()
            .and_then(|ns| self.0.checked_add(ns))
            .map(Instant)
    }

    /// Time elapsed since `earlier`, or `Duration::ZERO` if `earlier` is
    /// in the future.
    #[inline]
    pub fn duration_since(self, earlier: Instant) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    /// Saturates at the end of representable time instead of wrapping.
    #[inline]
    fn add(self, d: Duration) -> Instant {
        self.checked_add(d).unwrap_or(Instant(u64::MAX))
    }
}

impl Sub<Instant> for Instant {
    type Output = Duration;

    #[inline]
    fn sub(self, earlier: Instant) -> Duration {
        self.duration_since(earlier)
    }
}

impl fmt::Display for Instant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{}ns", self.0)
    }
}

/// Shared current-time cell.
///
/// Cloning hands out another handle onto the same counter. Any number of
/// readers call [`now`](SharedNow::now); the single writer advances with
/// [`advance`](SharedNow::advance), serialized externally by its clock.
#[derive(Clone, Debug)]
pub struct SharedNow {
    offset: Arc<AtomicU64>,
}

impl SharedNow {
    /// Creates a cell starting at `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            offset: Arc::new(AtomicU64::new(start.as_nanos())),
        }
    }

    /// Current instant. Never blocks; stable between advances.
    #[inline]
    pub fn now(&self) -> Instant {
        Instant(self.offset.load(Ordering::Acquire))
    }

    /// Advances the cell by `d` and returns the updated instant.
    ///
    /// Saturates at the end of representable time so the value stays
    /// monotonic under any input.
    pub fn advance(&self, d: Duration) -> Instant {
        let ns = u64::try_from(d.as_nanos()).unwrap_or(u64::MAX);
        let prev = self
            .offset
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_add(ns))
            })
            .expect("fetch_update closure never returns None");
        Instant(prev.saturating_add(ns))
    }
}
