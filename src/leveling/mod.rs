use crate::models::{Bucket, UserProfile};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Result of checking one bucket after a vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCompletion {
    pub bucket: Bucket,
    pub has_completed_level: bool,
}

/// Reports whether the user has voted on every poll in `bucket`.
///
/// `voted_poll_ids` must already contain the vote that triggered the check.
/// A bucket without polls is never complete. The check has no side effects
/// and can be repeated safely.
pub fn check_level_completion(
    bucket: Bucket,
    bucket_poll_ids: &HashSet<String>,
    voted_poll_ids: &HashSet<String>,
) -> LevelCompletion {
    let has_completed_level =
        !bucket_poll_ids.is_empty() && bucket_poll_ids.is_subset(voted_poll_ids);

    LevelCompletion {
        bucket,
        has_completed_level,
    }
}

/// The first bucket after `completed` in progression order.
pub fn next_bucket(buckets: &[Bucket], completed: Bucket) -> Option<Bucket> {
    buckets.iter().copied().filter(|b| *b > completed).min()
}

/// Where the profile's pointer should move to, if anywhere. The pointer only
/// moves forward, so a stale or repeated level-up is a no-op.
pub fn advance_pointer(profile: &UserProfile, target: Bucket) -> Option<Bucket> {
    if target > profile.bucket() {
        Some(target)
    } else {
        None
    }
}
