use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// A logical timestamp.
///
/// Lamport times order edits across replicas without trusting wall clocks.
/// They are advisory for indexing and sorting; conflict resolution relies on
/// the commit graph only.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LamportTime(pub u64);

impl fmt::Debug for LamportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LamportTime({})", self.0)
    }
}

impl fmt::Display for LamportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread-safe Lamport clock.
///
/// The counter always holds the next time to hand out, starting at 1.
#[derive(Debug)]
pub struct LamportClock {
    counter: AtomicU64,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::with_value(LamportTime(1))
    }

    /// Restore a clock whose next value is `next`.
    pub fn with_value(next: LamportTime) -> Self {
        Self {
            counter: AtomicU64::new(next.0.max(1)),
        }
    }

    /// The next time this clock will hand out.
    pub fn time(&self) -> LamportTime {
        LamportTime(self.counter.load(Ordering::SeqCst))
    }

    /// Return the current time and advance the clock.
    pub fn increment(&self) -> LamportTime {
        LamportTime(self.counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Record a time observed on another replica. Afterwards the clock is
    /// strictly after `seen`.
    pub fn witness(&self, seen: LamportTime) {
        let mut current = self.counter.load(Ordering::SeqCst);
        while seen.0 >= current {
            match self.counter.compare_exchange(
                current,
                seen.0 + 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return,
                Err(actual) => current = actual,
            }
        }
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}

/// Seconds since the UNIX epoch.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}
