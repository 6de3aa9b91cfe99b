pub mod aq;
pub mod ceiling;
pub mod dq;

use crate::error::Result;
use crate::models::{Poll, UserMetrics, VoteRecord};
use crate::store::{PollCatalog, ProfileStore, VoteLedger};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Folds a vote history into [`UserMetrics`].
///
/// `raw_score` comes from the profile store, which also counts bonuses that
/// no vote row records. The ledger is only trusted for correctness and the
/// Stage-0 points behind AQ.
pub fn calculate_metrics(
    votes: &[VoteRecord],
    polls: &HashMap<String, Poll>,
    raw_score: i64,
) -> UserMetrics {
    let verdicts = dq::fold_poll_correctness(votes);
    let polls_taken = verdicts.len();
    let polls_incorrect = dq::count_incorrect(&verdicts);

    let level_aq = aq::level_aqs(&aq::stage_zero_points(votes));
    let total_possible_points = ceiling::total_possible_points(verdicts.keys().copied(), polls);

    UserMetrics {
        polls_taken,
        polls_incorrect,
        overall_dq: dq::overall_dq(polls_taken, polls_incorrect),
        raw_score,
        aq: aq::overall_aq(&level_aq),
        level_aq,
        total_possible_points,
    }
}

/// Reads a user's history through the injected stores and computes metrics.
/// Nothing is cached: every call reflects the ledger as it is now.
#[derive(Clone)]
pub struct MetricsEngine {
    votes: Arc<dyn VoteLedger>,
    polls: Arc<dyn PollCatalog>,
    profiles: Arc<dyn ProfileStore>,
}

impl MetricsEngine {
    pub fn new(
        votes: Arc<dyn VoteLedger>,
        polls: Arc<dyn PollCatalog>,
        profiles: Arc<dyn ProfileStore>,
    ) -> Self {
        Self {
            votes,
            polls,
            profiles,
        }
    }

    pub async fn user_metrics(&self, user_id: &str) -> Result<UserMetrics> {
        let votes = self.votes.votes_for_user(user_id).await?;
        let raw_score = self.profiles.score(user_id).await?;

        let poll_ids: HashSet<String> = votes.iter().map(|v| v.poll_id.clone()).collect();
        let polls: HashMap<String, Poll> = if poll_ids.is_empty() {
            HashMap::new()
        } else {
            match self.polls.polls(&poll_ids).await {
                Ok(found) => found.into_iter().map(|p| (p.id.clone(), p)).collect(),
                Err(e) => {
                    warn!(
                        "Failed to load {} poll(s) for user {}, point ceiling will be 0: {}",
                        poll_ids.len(),
                        user_id,
                        e
                    );
                    HashMap::new()
                }
            }
        };

        let metrics = calculate_metrics(&votes, &polls, raw_score);
        debug!(
            "Metrics for {}: taken={} incorrect={} dq={:.2} aq={}",
            user_id, metrics.polls_taken, metrics.polls_incorrect, metrics.overall_dq, metrics.aq
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PollType;

    fn vote(poll_id: &str, is_correct: bool, points_earned: i32, stage: i32, level: i32) -> VoteRecord {
        VoteRecord {
            poll_id: poll_id.to_string(),
            is_correct,
            points_earned,
            stage: Some(stage),
            level: Some(level),
        }
    }

    fn poll_with_id(id: &str, poll: Poll) -> (String, Poll) {
        (id.to_string(), Poll { id: id.to_string(), ..poll })
    }

    #[test]
    fn metrics_combine_all_parts() {
        let polls: HashMap<String, Poll> = vec![
            poll_with_id(
                "mc",
                Poll::new(PollType::MultipleChoice, 0, 1, 1)
                    .with_object("a", 10, None)
                    .with_object("b", 30, None)
                    .with_object("c", 5, None),
            ),
            poll_with_id("quad", Poll::new(PollType::QuadSorting, 1, 2, 1)),
        ]
        .into_iter()
        .collect();

        let votes = vec![
            vote("mc", true, 10, 0, 1),
            vote("quad", true, 2, 1, 2),
            vote("quad", false, 0, 1, 2),
            vote("unknown", true, 3, 0, 2),
        ];

        let metrics = calculate_metrics(&votes, &polls, 1234);
        assert_eq!(metrics.polls_taken, 3);
        assert_eq!(metrics.polls_incorrect, 1);
        assert!((metrics.overall_dq - 1.0 / 3.0).abs() < 1e-12);
        assert_eq!(metrics.raw_score, 1234);
        // level 1: 60, level 2: 53
        assert_eq!(metrics.level_aq.get(&1), Some(&60.0));
        assert_eq!(metrics.level_aq.get(&2), Some(&53.0));
        assert_eq!(metrics.aq, 57.0);
        // 30 for the multiple choice poll, fallback 2*1*2 for the quad poll
        assert_eq!(metrics.total_possible_points, 34);
    }

    #[test]
    fn metrics_are_idempotent() {
        let votes = vec![vote("a", true, 7, 0, 1), vote("b", false, -3, 0, 2)];
        let polls = HashMap::new();
        let first = calculate_metrics(&votes, &polls, 10);
        let second = calculate_metrics(&votes, &polls, 10);
        assert_eq!(first, second);
        assert_eq!(first.overall_dq.to_bits(), second.overall_dq.to_bits());
    }

    #[test]
    fn empty_history_uses_defaults() {
        let metrics = calculate_metrics(&[], &HashMap::new(), 0);
        assert_eq!(metrics.polls_taken, 0);
        assert_eq!(metrics.overall_dq, 0.0);
        assert_eq!(metrics.aq, 50.0);
        assert_eq!(metrics.total_possible_points, 0);
    }
}
