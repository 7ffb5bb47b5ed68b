//! # urverk-sim
//!
//! The simulated clock behind deterministic timing tests.
//!
//! [`SimClock`] implements the `urverk-core` [`Clock`](urverk_core::clock::Clock)
//! contract, but its time moves only when the harness calls
//! [`tick`](SimClock::tick). Every due timer, ticker, and sleep fires
//! during the tick, in deadline order, over rendezvous channels: by the
//! time `tick` returns, every waiter it released has observed its fire.
//!
//! ```
//! use std::time::Duration;
//! use urverk_core::prelude::*;
//! use urverk_sim::SimClock;
//!
//! let clock = SimClock::new(Instant::ZERO);
//! let (timer, fired) = clock.new_timer(Duration::from_secs(1)).unwrap();
//!
//! let waiter = std::thread::spawn(move || fired.recv().unwrap());
//! clock.tick(Duration::from_secs(1)).unwrap();
//! assert_eq!(waiter.join().unwrap(), Instant::ZERO + Duration::from_secs(1));
//! assert!(!timer.stop()); // already fired
//! ```
//!
//! One rule follows from the rendezvous design: never drive `tick` from
//! the same thread that awaits an event of the same clock. That flow
//! deadlocks, deliberately; buffering the fires away would break the
//! "tick returned implies waiters ran" guarantee.

#![deny(rustdoc::broken_intra_doc_links)]

mod clock;
mod handle;
mod loop_thread;

pub use clock::{SimClock, SimClockBuilder};
pub use handle::{TickerHandle, TimerHandle};
