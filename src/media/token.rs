use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

static LAST_TOKEN: AtomicI64 = AtomicI64::new(0);

/// Millisecond timestamp that prefixes every file a run produces.
///
/// Tokens never repeat within a process: two runs started in the same
/// millisecond get consecutive values, so a directory scan for one run
/// cannot pick up another run's file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunToken(i64);

impl RunToken {
    /// Allocate the next token
    #[must_use]
    pub fn next() -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        let mut last = LAST_TOKEN.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(last + 1);
            match LAST_TOKEN.compare_exchange_weak(
                last,
                candidate,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => return Self(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    /// Token with a fixed value, for callers that already own one
    #[must_use]
    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Prefix every produced file name starts with
    #[must_use]
    pub fn file_prefix(&self) -> String {
        format!("{}_", self.0)
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
