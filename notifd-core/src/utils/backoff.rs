use crate::config::DeliveryPolicy;
use rand::Rng;
use std::time::Duration;

/// Delay before the retry that follows failed attempt `attempt` (0-based).
///
/// Exponential: `2^attempt` backoff units, with the exponent capped at
/// `max_backoff_exponent`. With `jitter` enabled, up to half a unit is added.
pub fn backoff_delay(attempt: u32, policy: &DeliveryPolicy) -> Duration {
    let exponent = attempt.min(policy.max_backoff_exponent).min(31);
    let delay = policy.backoff_unit.saturating_mul(2u32.pow(exponent));

    if !policy.jitter {
        return delay;
    }

    let max_jitter = (policy.backoff_unit / 2).as_nanos() as u64;
    let jitter = rand::rng().random_range(0..=max_jitter);
    delay.saturating_add(Duration::from_nanos(jitter))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_per_attempt() {
        let policy = DeliveryPolicy::default();
        assert_eq!(backoff_delay(0, &policy), Duration::from_secs(1));
        assert_eq!(backoff_delay(1, &policy), Duration::from_secs(2));
        assert_eq!(backoff_delay(2, &policy), Duration::from_secs(4));
        assert_eq!(backoff_delay(10, &policy), Duration::from_secs(1024));
        assert_eq!(backoff_delay(11, &policy), Duration::from_secs(2048));
        // Capped at the configured exponent
        assert_eq!(backoff_delay(12, &policy), Duration::from_secs(2048));
        assert_eq!(backoff_delay(u32::MAX, &policy), Duration::from_secs(2048));
    }

    #[test]
    fn test_backoff_scales_with_unit() {
        let policy = DeliveryPolicy {
            backoff_unit: Duration::from_millis(10),
            ..DeliveryPolicy::default()
        };
        assert_eq!(backoff_delay(3, &policy), Duration::from_millis(80));
    }

    #[test]
    fn test_jitter_stays_within_half_a_unit() {
        let policy = DeliveryPolicy {
            jitter: true,
            ..DeliveryPolicy::default()
        };
        for attempt in 0..4 {
            let base = Duration::from_secs(1 << attempt);
            let delay = backoff_delay(attempt, &policy);
            assert!(delay >= base);
            assert!(delay <= base + Duration::from_millis(500));
        }
    }
}
