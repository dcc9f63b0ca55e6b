use chrono::{DateTime, Duration, Utc};

/// Safety margin subtracted from the real expiry so a token is refreshed before it lapses.
pub const EXPIRY_BUFFER: Duration = Duration::minutes(5);

/// Return true if `now` is within [`EXPIRY_BUFFER`] of `expires_at` (inclusive).
pub fn is_expired(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    now >= expires_at - EXPIRY_BUFFER
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary_is_inclusive() {
        let now = Utc::now();
        let one_ms = Duration::milliseconds(1);

        assert!(is_expired(now + EXPIRY_BUFFER - one_ms, now));
        assert!(is_expired(now + EXPIRY_BUFFER, now));
        assert!(!is_expired(now + EXPIRY_BUFFER + one_ms, now));
    }

    #[test]
    fn past_and_far_future() {
        let now = Utc::now();
        assert!(is_expired(now - Duration::hours(1), now));
        assert!(is_expired(now, now));
        assert!(!is_expired(now + Duration::hours(1), now));
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).expect("valid timestamp");
        let expires_at = now + Duration::minutes(10);
        for _ in 0..3 {
            assert!(!is_expired(expires_at, now));
            assert!(is_expired(expires_at, now + Duration::minutes(5)));
        }
    }
}
