use crate::models::{Poll, PollType};
use log::debug;
use std::collections::HashMap;

/// Points a poll is worth when its definition does not say.
fn fallback_points(poll: &Poll) -> i64 {
    2 * poll.stage.max(1) as i64 * poll.level.max(1) as i64
}

/// Highest number of points a single user can earn on `poll`.
pub fn max_points(poll: &Poll) -> i64 {
    match poll.poll_type {
        PollType::MultipleChoice => poll
            .objects
            .iter()
            .map(|o| o.points as i64)
            .max()
            .unwrap_or(0),
        PollType::QuadSorting => poll
            .quad_scores
            .values()
            .map(|v| *v as i64)
            .max()
            .unwrap_or_else(|| fallback_points(poll)),
        PollType::IsitText | PollType::IsitImage => {
            if poll.objects.iter().any(|o| o.points != 0) {
                poll.objects.iter().map(|o| o.points as i64).sum()
            } else {
                fallback_points(poll)
            }
        }
    }
}

/// Sums [`max_points`] over every touched poll. Ids missing from `polls`
/// contribute nothing.
pub fn total_possible_points<'a, I>(poll_ids: I, polls: &HashMap<String, Poll>) -> i64
where
    I: IntoIterator<Item = &'a str>,
{
    poll_ids
        .into_iter()
        .map(|poll_id| match polls.get(poll_id) {
            Some(poll) => max_points(poll),
            None => {
                debug!("Poll {} missing from catalog, skipped in point ceiling", poll_id);
                0
            }
        })
        .sum()
}
