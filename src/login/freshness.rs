//! Replay window for signed payloads.

use std::time::{SystemTime, UNIX_EPOCH};

use super::error::LoginError;

/// Payloads older than this many seconds are rejected.
pub const MAX_AUTH_AGE_SECONDS: i64 = 86_400;

pub trait Clock: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> i64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| i64::try_from(elapsed.as_secs()).unwrap_or(i64::MAX))
    }
}

/// Reject payloads older than [`MAX_AUTH_AGE_SECONDS`]. There is no lower
/// bound, so timestamps in the future pass.
///
/// # Errors
/// Returns `LoginError::Expired` when `now - auth_date` exceeds the window.
pub fn check_freshness(auth_date: i64, now: i64) -> Result<(), LoginError> {
    if now.saturating_sub(auth_date) > MAX_AUTH_AGE_SECONDS {
        return Err(LoginError::Expired);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_700_000_000;

    #[test]
    fn boundary_is_inclusive() {
        assert!(check_freshness(NOW - MAX_AUTH_AGE_SECONDS, NOW).is_ok());
        assert!(matches!(
            check_freshness(NOW - MAX_AUTH_AGE_SECONDS - 1, NOW),
            Err(LoginError::Expired)
        ));
    }

    #[test]
    fn future_timestamps_pass() {
        assert!(check_freshness(NOW + 3_600, NOW).is_ok());
    }

    #[test]
    fn extreme_values_do_not_overflow() {
        assert!(matches!(
            check_freshness(i64::MIN, NOW),
            Err(LoginError::Expired)
        ));
        assert!(check_freshness(i64::MAX, NOW).is_ok());
    }

    #[test]
    fn system_clock_is_after_2023() {
        assert!(SystemClock.now() > NOW);
    }
}
