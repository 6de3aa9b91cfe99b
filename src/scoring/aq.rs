use crate::models::VoteRecord;
use std::collections::BTreeMap;

/// Only this stage feeds the Awareness Quotient.
pub const AQ_STAGE: i32 = 0;
pub const AQ_BASELINE: f64 = 50.0;
pub const AQ_CEILING: f64 = 100.0;
const DEFAULT_LEVEL: i32 = 1;

/// Sums `points_earned` per level over Stage-0 votes.
///
/// Votes whose poll has vanished from the catalog carry no stage and are
/// ignored.
pub fn stage_zero_points(votes: &[VoteRecord]) -> BTreeMap<i32, i64> {
    let mut points: BTreeMap<i32, i64> = BTreeMap::new();

    for vote in votes.iter().filter(|v| v.stage == Some(AQ_STAGE)) {
        let level = vote.level.unwrap_or(DEFAULT_LEVEL);
        *points.entry(level).or_insert(0) += vote.points_earned as i64;
    }

    points
}

/// AQ for a single level. Capped at 100 but not floored: a large negative
/// point total yields a negative level AQ.
pub fn level_aq(points: i64) -> f64 {
    (AQ_BASELINE + points as f64).min(AQ_CEILING)
}

pub fn level_aqs(level_points: &BTreeMap<i32, i64>) -> BTreeMap<i32, f64> {
    level_points
        .iter()
        .map(|(level, pts)| (*level, level_aq(*pts)))
        .collect()
}

/// Averages the level AQs, defaulting to the baseline when there are none.
/// The result is clamped to the ceiling and rounded to the nearest integer.
pub fn overall_aq(level_aqs: &BTreeMap<i32, f64>) -> f64 {
    if level_aqs.is_empty() {
        return AQ_BASELINE;
    }
    let average = level_aqs.values().sum::<f64>() / level_aqs.len() as f64;
    round_half_up(average.min(AQ_CEILING))
}

/// Rounds to the nearest integer with halves going up, so -2.5 becomes -2.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}
