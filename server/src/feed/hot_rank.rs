//! The `hot` ranking function (§4.2): score-plus-recency, Reddit-style.

use chrono::{DateTime, Utc};

/// Epoch anchor baked into the formula (§4.2) — not configurable, matching
/// the spec's literal constant.
const HOT_RANK_EPOCH: f64 = 1_134_028_003.0;
const HOT_RANK_DIVISOR: f64 = 45_000.0;

/// `hot_rank = sign(score) * log10(max(|score|, 1)) + (created_at_epoch_seconds - epoch) / divisor`.
pub fn hot_rank(score: i64, created_at: DateTime<Utc>) -> f64 {
    let sign = if score > 0 {
        1.0
    } else if score < 0 {
        -1.0
    } else {
        0.0
    };
    let magnitude = (score.unsigned_abs() as f64).max(1.0).log10();
    let created_at_epoch = created_at.timestamp() as f64;
    sign * magnitude + (created_at_epoch - HOT_RANK_EPOCH) / HOT_RANK_DIVISOR
}

/// Serializes `hot_rank` with full precision for the cursor's `sort_key`
/// (§4.2: "≥ 15 significant digits... this precision guarantee is
/// load-bearing"). `{:.15e}` gives 16 significant digits (1 before the
/// decimal point + 15 after) which is always ≥ 15.
pub fn format_hot_rank(rank: f64) -> String {
    format!("{rank:.15e}")
}

pub fn parse_hot_rank(s: &str) -> Option<f64> {
    s.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn zero_score_has_no_magnitude_term() {
        let t = Utc.timestamp_opt(1_134_028_003, 0).unwrap();
        assert_eq!(hot_rank(0, t), 0.0);
    }

    #[test]
    fn positive_and_negative_scores_are_mirrored() {
        let t = Utc.timestamp_opt(1_134_028_003, 0).unwrap();
        assert_eq!(hot_rank(100, t), -hot_rank(-100, t));
    }

    #[test]
    fn more_recent_posts_rank_higher_at_equal_score() {
        let earlier = Utc.timestamp_opt(1_134_028_003, 0).unwrap();
        let later = Utc.timestamp_opt(1_134_028_003 + 45_000, 0).unwrap();
        assert!(hot_rank(10, later) > hot_rank(10, earlier));
    }

    #[test]
    fn format_round_trips_with_full_precision() {
        let t = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let rank = hot_rank(37, t);
        let formatted = format_hot_rank(rank);
        let parsed = parse_hot_rank(&formatted).unwrap();
        assert_eq!(rank, parsed);
    }
}
