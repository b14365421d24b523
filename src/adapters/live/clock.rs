//! System clock adapter.

use chrono::{DateTime, Utc};

use crate::ports::clock::Clock;

/// Returns the real current time.
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
