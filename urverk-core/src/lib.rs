//! # urverk-core
//!
//! Foundation layer for virtual-time clocks.
//!
//! Time-dependent code consults the [`clock::Clock`] contract instead of
//! the host clock. In production the contract is backed by wall time; in
//! tests it is backed by a simulated clock whose time advances only when
//! the test asks it to, which makes timing behavior exact and repeatable.
//!
//! ## Key modules
//! - `time`: [`time::Instant`] (opaque nanosecond timestamps) and
//!   [`time::SharedNow`] (the lock-free current-time cell).
//! - `events`: the timed-event record and the deadline-ordered registry.
//! - `clock`: the `Clock` / handle contracts shared by all backends.
//! - `error`: unified [`error::ClockError`] type.

#![deny(rustdoc::broken_intra_doc_links)]

pub mod clock;
pub mod error;
pub mod events;
pub mod time;

pub mod prelude {
    pub use crate::clock::{Clock, TickerControl, TimerControl};
    pub use crate::error::ClockError;
    pub use crate::events::{EventId, EventIdGen, EventQueue, TimedEvent};
    pub use crate::time::{Instant, SharedNow};
}
