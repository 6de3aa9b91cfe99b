use crate::config::Settings;
use crate::error::{Error, Result};
use crate::leveling::{LevelCompletion, advance_pointer, check_level_completion, next_bucket};
use crate::models::{Bucket, MessageVariables, UserMetrics, UserProfile, Vote};
use crate::scoring::MetricsEngine;
use crate::store::{PollCatalog, ProfileStore, VoteLedger};
use log::{debug, info};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// What happened when a submission was recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteOutcome {
    /// Metrics before the submission was written.
    pub previous: UserMetrics,
    pub current: UserMetrics,
    pub completion: LevelCompletion,
    /// The bucket the user's pointer moved to, if it moved.
    pub advanced_to: Option<Bucket>,
    pub bonus_awarded: i64,
}

impl VoteOutcome {
    pub fn message_variables(&self) -> MessageVariables {
        MessageVariables::from_metrics(&self.current, &self.previous)
    }

    pub fn leveled_up(&self) -> bool {
        self.advanced_to.is_some()
    }
}

/// Records votes and drives leveling.
pub struct VoteService {
    ledger: Arc<dyn VoteLedger>,
    catalog: Arc<dyn PollCatalog>,
    profiles: Arc<dyn ProfileStore>,
    engine: MetricsEngine,
    stage_completion_bonus: i64,
}

impl VoteService {
    pub fn new(
        ledger: Arc<dyn VoteLedger>,
        catalog: Arc<dyn PollCatalog>,
        profiles: Arc<dyn ProfileStore>,
        settings: &Settings,
    ) -> Self {
        let engine = MetricsEngine::new(
            Arc::clone(&ledger),
            Arc::clone(&catalog),
            Arc::clone(&profiles),
        );
        Self {
            ledger,
            catalog,
            profiles,
            engine,
            stage_completion_bonus: settings.stage_completion_bonus,
        }
    }

    pub fn engine(&self) -> &MetricsEngine {
        &self.engine
    }

    pub async fn cast_vote(&self, vote: &Vote) -> Result<VoteOutcome> {
        self.cast_votes(std::slice::from_ref(vote)).await
    }

    /// Records every vote of one submission. Quad sorting submits one vote
    /// per object, so all votes must belong to the same user and poll.
    pub async fn cast_votes(&self, votes: &[Vote]) -> Result<VoteOutcome> {
        let first = votes.first().ok_or(Error::EmptySubmission)?;
        if votes
            .iter()
            .any(|v| v.poll_id != first.poll_id || v.user_id != first.user_id)
        {
            return Err(Error::MixedSubmission);
        }

        let user_id = first.user_id.as_str();
        let poll = self
            .catalog
            .poll(&first.poll_id)
            .await?
            .ok_or_else(|| Error::PollNotFound(first.poll_id.clone()))?;

        info!(
            "Recording {} vote(s): user_id={}, poll_id={}, bucket={}",
            votes.len(),
            user_id,
            poll.id,
            poll.bucket()
        );

        let previous = self.engine.user_metrics(user_id).await?;

        let points: i64 = votes.iter().map(|v| v.points_earned as i64).sum();
        self.ledger.append_votes(votes, points).await?;

        // The ledger is re-read here, so the check sees the votes just written.
        let completion = self.check_completion(user_id, poll.bucket()).await?;
        let (advanced_to, bonus_awarded) = if completion.has_completed_level {
            self.level_up(user_id, completion.bucket).await?
        } else {
            (None, 0)
        };

        let current = self.engine.user_metrics(user_id).await?;

        Ok(VoteOutcome {
            previous,
            current,
            completion,
            advanced_to,
            bonus_awarded,
        })
    }

    /// Checks whether the user has voted on every poll of `bucket`.
    pub async fn check_completion(&self, user_id: &str, bucket: Bucket) -> Result<LevelCompletion> {
        let bucket_poll_ids: HashSet<String> = self
            .catalog
            .poll_ids_in_bucket(bucket)
            .await?
            .into_iter()
            .collect();

        let voted_poll_ids: HashSet<String> = self
            .ledger
            .votes_for_user(user_id)
            .await?
            .into_iter()
            .filter(|v| v.stage == Some(bucket.stage) && v.level == Some(bucket.level))
            .map(|v| v.poll_id)
            .collect();

        let completion = check_level_completion(bucket, &bucket_poll_ids, &voted_poll_ids);
        debug!(
            "Level check for {} in {}: {}/{} polls voted, complete={}",
            user_id,
            bucket,
            voted_poll_ids.len(),
            bucket_poll_ids.len(),
            completion.has_completed_level
        );
        Ok(completion)
    }

    // Only completing the level the pointer is on moves it. Levels ahead of
    // the pointer that are already complete are skipped over.
    async fn level_up(&self, user_id: &str, completed: Bucket) -> Result<(Option<Bucket>, i64)> {
        let profile = self
            .profiles
            .profile(user_id)
            .await?
            .unwrap_or_else(|| UserProfile::new(user_id));
        let from = profile.bucket();
        if from != completed {
            debug!(
                "User {} completed {} but is at {}, pointer stays",
                user_id, completed, from
            );
            return Ok((None, 0));
        }

        let buckets = self.catalog.buckets().await?;
        let mut target = None;
        let mut cursor = completed;
        while let Some(next) = next_bucket(&buckets, cursor) {
            target = Some(next);
            if !self.check_completion(user_id, next).await?.has_completed_level {
                break;
            }
            cursor = next;
        }

        let Some(target) = target.and_then(|t| advance_pointer(&profile, t)) else {
            info!("User {} completed {}, the last level", user_id, completed);
            return Ok((None, 0));
        };

        if !self.profiles.set_stage_level(user_id, target).await? {
            debug!("Pointer for {} was moved concurrently, skipping level up", user_id);
            return Ok((None, 0));
        }

        let mut bonus = 0;
        if target.stage > from.stage && self.stage_completion_bonus != 0 {
            bonus = self.stage_completion_bonus;
            self.profiles.add_score(user_id, bonus).await?;
        }

        info!(
            "User {} leveled up from {} to {} (bonus {})",
            user_id, from, target, bonus
        );
        Ok((Some(target), bonus))
    }
}
