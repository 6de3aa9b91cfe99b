use crate::models::ScoreTier;

/// Picks the tier with the highest `min_score` that `score` reaches.
///
/// Tiers may be stored in any order. `None` means no tier applies (the list
/// has no floor at or below `score`) and the caller should show no message.
pub fn resolve_tier(tiers: &[ScoreTier], score: i64) -> Option<&ScoreTier> {
    let mut sorted: Vec<&ScoreTier> = tiers.iter().collect();
    sorted.sort_by(|a, b| b.min_score.cmp(&a.min_score));
    sorted.into_iter().find(|tier| score >= tier.min_score)
}
