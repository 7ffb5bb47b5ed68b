//! Error types for clock operations.

use std::time::Duration;

use thiserror::Error;

/// Unified error type for clock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClockError {
    /// The clock has been stopped and accepts no further operations.
    ///
    /// Also observed by blocked `sleep` callers when the clock stops
    /// underneath them: stopping closes every pending event channel.
    #[error("clock is stopped")]
    Stopped,

    /// A duration that must be positive was zero.
    #[error("{what} requires a positive duration")]
    InvalidDuration {
        /// The operation that rejected the duration.
        what: &'static str,
        /// The offending value.
        d: Duration,
    },
}
