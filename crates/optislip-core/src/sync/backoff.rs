//! Retry scheduling for failed replays

/// Delay before the first retry.
pub const BASE_DELAY_MS: i64 = 5_000;

/// Attempt index past which the delay stops doubling.
const MAX_EXPONENT: u32 = 4;

/// Largest multiplier applied to [`BASE_DELAY_MS`].
const MAX_MULTIPLIER: i64 = 16;

/// Delay in milliseconds after a failed replay.
///
/// `attempts` is the item's attempt count before the failing attempt:
/// 0 -> 5s, 1 -> 10s, 2 -> 20s, 3 -> 40s, 4 and above -> 80s.
pub fn retry_delay_ms(attempts: u32) -> i64 {
    let multiplier = (1_i64 << attempts.min(MAX_EXPONENT)).min(MAX_MULTIPLIER);
    multiplier * BASE_DELAY_MS
}

/// What to do with an item whose replay just failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDecision {
    /// Back to `pending`, eligible again at `next_retry_at`
    Retry { attempts: u32, next_retry_at: i64 },
    /// Terminal failure
    Fail { attempts: u32 },
}

/// Decide between retry and terminal failure for one failed attempt.
///
/// `give_up` forces a terminal failure regardless of the remaining budget.
pub fn on_failure(attempts: u32, max_attempts: u32, now: i64, give_up: bool) -> FailureDecision {
    let attempts_after = attempts.saturating_add(1).min(max_attempts.max(1));
    if give_up || attempts_after >= max_attempts {
        return FailureDecision::Fail {
            attempts: attempts_after,
        };
    }
    FailureDecision::Retry {
        attempts: attempts_after,
        next_retry_at: now.saturating_add(retry_delay_ms(attempts)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_doubles_then_caps() {
        let delays: Vec<i64> = (0..7).map(retry_delay_ms).collect();
        assert_eq!(
            delays,
            vec![5_000, 10_000, 20_000, 40_000, 80_000, 80_000, 80_000]
        );
        assert_eq!(retry_delay_ms(u32::MAX), 80_000);
    }

    #[test]
    fn retries_until_budget_is_spent() {
        assert_eq!(
            on_failure(0, 5, 1_000, false),
            FailureDecision::Retry {
                attempts: 1,
                next_retry_at: 6_000,
            }
        );
        assert_eq!(
            on_failure(3, 5, 1_000, false),
            FailureDecision::Retry {
                attempts: 4,
                next_retry_at: 41_000,
            }
        );
        assert_eq!(
            on_failure(4, 5, 1_000, false),
            FailureDecision::Fail { attempts: 5 }
        );
    }

    #[test]
    fn single_attempt_budget_fails_immediately() {
        assert_eq!(
            on_failure(0, 1, 1_000, false),
            FailureDecision::Fail { attempts: 1 }
        );
    }

    #[test]
    fn give_up_still_counts_the_attempt() {
        assert_eq!(
            on_failure(0, 5, 1_000, true),
            FailureDecision::Fail { attempts: 1 }
        );
    }
}
