//! Collaborator interfaces the scoring code reads from and writes to.
//!
//! The engine and the vote flow only ever see these traits, so any backend
//! (the bundled SQLite [`Database`](crate::db::Database) or a test double)
//! can be injected.

use async_trait::async_trait;
use std::collections::HashSet;

use crate::error::Result;
use crate::models::{Bucket, Poll, UserProfile, Vote, VoteRecord};

#[async_trait]
pub trait VoteLedger: Send + Sync {
    /// Appends one vote. Must be durable before it returns.
    async fn append_vote(&self, vote: &Vote) -> Result<()>;

    /// Appends a whole submission and credits `score_delta` to the user's
    /// profile. Either everything is written or nothing is.
    async fn append_votes(&self, votes: &[Vote], score_delta: i64) -> Result<()>;

    /// Every vote the user has cast, joined with its poll's stage and level.
    async fn votes_for_user(&self, user_id: &str) -> Result<Vec<VoteRecord>>;
}

#[async_trait]
pub trait PollCatalog: Send + Sync {
    async fn poll(&self, poll_id: &str) -> Result<Option<Poll>>;

    /// Polls for the given ids. Unknown ids are left out of the result.
    async fn polls(&self, poll_ids: &HashSet<String>) -> Result<Vec<Poll>>;

    async fn poll_ids_in_bucket(&self, bucket: Bucket) -> Result<Vec<String>>;

    /// Every bucket that has at least one poll, in progression order.
    async fn buckets(&self) -> Result<Vec<Bucket>>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>>;

    /// Cumulative score including bonuses. Users without a profile score 0.
    async fn score(&self, user_id: &str) -> Result<i64>;

    async fn add_score(&self, user_id: &str, delta: i64) -> Result<()>;

    /// Moves the user's stage/level pointer to `bucket` if that is further
    /// along than where it is now. Returns whether the pointer moved.
    async fn set_stage_level(&self, user_id: &str, bucket: Bucket) -> Result<bool>;
}
