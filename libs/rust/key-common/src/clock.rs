//! Time source used for key timestamps, token issuance and expiry checks.

use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// A source of "now".
///
/// Validation samples the clock once per call and reuses that instant for
/// every time-based check in the same call.
pub trait Clock: Send + Sync + Debug {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
