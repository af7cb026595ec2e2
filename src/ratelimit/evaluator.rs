//! Tier evaluation over a window record.

use tracing::trace;

use super::tier::Tier;
use super::verdict::{MessageTemplates, Verdict};

/// Whether a timestamp taken at `ts` is still inside a window ending at `now`.
pub(crate) fn within_window(now: i64, ts: i64, window_ms: u64) -> bool {
    let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
    now.saturating_sub(ts) < window
}

/// Whole seconds until a request made `elapsed_ms` ago leaves a window.
///
/// Always rounded up and never below one second.
pub fn retry_after_seconds(window_ms: u64, elapsed_ms: i64) -> u64 {
    let window = i64::try_from(window_ms).unwrap_or(i64::MAX);
    let remaining = window.saturating_sub(elapsed_ms.max(0)).max(1) as u64;
    remaining.div_ceil(1000).max(1)
}

/// Decide whether the request that produced `timestamps` is allowed.
///
/// `timestamps` must be in non-decreasing order and `tiers` in ascending
/// window order. The first tier whose occupancy exceeds its limit decides,
/// so a burst tripping several tiers is reported against the shortest one.
/// Occupancy equal to the limit is still allowed.
pub fn evaluate(
    timestamps: &[i64],
    now: i64,
    tiers: &[Tier],
    messages: &MessageTemplates,
) -> Verdict {
    for tier in tiers {
        let start = timestamps.partition_point(|&ts| !within_window(now, ts, tier.window_ms));
        let count = timestamps.len() - start;

        trace!(
            limit_type = %tier.limit_type,
            count = count,
            max_requests = tier.max_requests,
            "Evaluated tier"
        );

        if count > tier.max_requests as usize {
            let oldest = timestamps[start];
            let retry_after = retry_after_seconds(tier.window_ms, now - oldest);
            let message = messages.render(tier.limit_type, retry_after);
            return Verdict::deny(tier, retry_after, message);
        }
    }

    Verdict::allow()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::tier::{IpTierConfig, LimitType, TierSet};

    fn tiers() -> TierSet {
        TierSet::new(&IpTierConfig::default()).unwrap()
    }

    #[test]
    fn test_count_equal_to_max_is_allowed() {
        let timestamps = vec![0; 5];
        let verdict = evaluate(&timestamps, 0, tiers().as_slice(), &MessageTemplates::default());
        assert!(verdict.allowed);
        assert!(verdict.retry_after_seconds.is_none());
    }

    #[test]
    fn test_count_above_max_is_denied_by_short_tier() {
        let timestamps = vec![0; 6];
        let verdict = evaluate(&timestamps, 0, tiers().as_slice(), &MessageTemplates::default());

        assert!(!verdict.allowed);
        assert_eq!(verdict.limit_type, Some(LimitType::Short));
        assert_eq!(verdict.retry_after_seconds, Some(60));
        assert_eq!(verdict.window_ms, Some(60_000));
        assert_eq!(verdict.max_requests, Some(5));
        assert!(verdict.message.is_some());
    }

    #[test]
    fn test_short_tier_wins_when_medium_also_exceeded() {
        // 16 requests inside one minute trip both short (5) and medium (15).
        let timestamps: Vec<i64> = (0..16).map(|i| i * 1_000).collect();
        let verdict = evaluate(&timestamps, 15_000, tiers().as_slice(), &MessageTemplates::default());
        assert_eq!(verdict.limit_type, Some(LimitType::Short));
    }

    #[test]
    fn test_medium_tier_denies_spread_out_burst() {
        // 16 requests, one every 30s: never more than 2 in a minute.
        let timestamps: Vec<i64> = (0..16).map(|i| i * 30_000).collect();
        let now = 15 * 30_000;
        let verdict = evaluate(&timestamps, now, tiers().as_slice(), &MessageTemplates::default());

        assert_eq!(verdict.limit_type, Some(LimitType::Medium));
        // Oldest in the 10 minute window is t=0, elapsed 450s.
        assert_eq!(verdict.retry_after_seconds, Some(150));
    }

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_seconds(60_000, 59_100), 1);
        assert_eq!(retry_after_seconds(60_000, 0), 60);
        assert_eq!(retry_after_seconds(60_000, 1), 60);
        assert_eq!(retry_after_seconds(60_000, 1_000), 59);
    }

    #[test]
    fn test_retry_after_never_zero() {
        assert_eq!(retry_after_seconds(60_000, 60_000), 1);
        assert_eq!(retry_after_seconds(60_000, 120_000), 1);
        assert_eq!(retry_after_seconds(1_000, -5), 1);
    }

    #[test]
    fn test_retry_after_uses_oldest_in_window() {
        // One stale entry outside the short window must not drive the retry time.
        let mut timestamps = vec![-120_000];
        timestamps.extend(std::iter::repeat(10_000).take(6));
        let verdict = evaluate(&timestamps, 10_000, tiers().as_slice(), &MessageTemplates::default());

        assert_eq!(verdict.limit_type, Some(LimitType::Short));
        assert_eq!(verdict.retry_after_seconds, Some(60));
    }

    #[test]
    fn test_within_window_boundary() {
        assert!(within_window(59_999, 0, 60_000));
        assert!(!within_window(60_000, 0, 60_000));
    }
}
