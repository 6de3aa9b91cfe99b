use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::info;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, migrate::MigrateDatabase};
use std::collections::{BTreeMap, HashSet};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{
    Bucket, Poll, PollObject, PollType, ScoreTier, Side, UserProfile, Vote, VoteRecord,
};
use crate::store::{PollCatalog, ProfileStore, VoteLedger};

/// SQLite-backed vote ledger, poll catalog and profile store.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(settings: &Settings) -> Result<Self> {
        Self::connect(&settings.database_url, settings.max_connections).await
    }

    pub async fn connect(db_url: &str, max_connections: u32) -> Result<Self> {
        // Create database if it doesn't exist
        if !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(db_url)
            .await?;

        Self::init_schema(&pool).await?;
        info!("Connected to database {}", db_url);

        Ok(Self { pool })
    }

    async fn init_schema(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS polls (
                id TEXT PRIMARY KEY,
                poll_type TEXT NOT NULL,
                stage INTEGER NOT NULL,
                level INTEGER NOT NULL,
                poll_order INTEGER NOT NULL DEFAULT 0,
                quad_scores TEXT NOT NULL DEFAULT '{}'
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS poll_objects (
                id TEXT PRIMARY KEY,
                poll_id TEXT NOT NULL,
                text TEXT NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                correct_side TEXT,
                position INTEGER NOT NULL,
                FOREIGN KEY (poll_id) REFERENCES polls(id) ON DELETE CASCADE
            );
            "#,
        )
        .execute(pool)
        .await?;

        // No foreign key to polls: ledger rows outlive catalog edits.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS votes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                poll_id TEXT NOT NULL,
                selected_object_id TEXT NOT NULL,
                is_correct BOOLEAN NOT NULL,
                points_earned INTEGER NOT NULL,
                chosen_side TEXT,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_votes_user ON votes (user_id);")
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS profiles (
                id TEXT PRIMARY KEY,
                score INTEGER NOT NULL DEFAULT 0,
                current_stage INTEGER NOT NULL DEFAULT 0,
                current_level INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS score_tiers (
                tier TEXT PRIMARY KEY,
                min_score INTEGER NOT NULL,
                message TEXT NOT NULL,
                title TEXT NOT NULL
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    // Create a poll together with its objects
    pub async fn create_poll(&self, poll: &Poll) -> Result<()> {
        let quad_scores =
            serde_json::to_string(&poll.quad_scores).map_err(|source| Error::QuadScores {
                poll_id: poll.id.clone(),
                source,
            })?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO polls (id, poll_type, stage, level, poll_order, quad_scores)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&poll.id)
        .bind(poll.poll_type.as_str())
        .bind(poll.stage)
        .bind(poll.level)
        .bind(poll.poll_order)
        .bind(quad_scores)
        .execute(&mut *tx)
        .await?;

        for (i, object) in poll.objects.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO poll_objects (id, poll_id, text, points, correct_side, position)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&object.id)
            .bind(&poll.id)
            .bind(&object.text)
            .bind(object.points)
            .bind(object.correct_side.map(|side| side.as_str()))
            .bind(i as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn create_profile(&self, profile: &UserProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, score, current_stage, current_level)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                score = excluded.score,
                current_stage = excluded.current_stage,
                current_level = excluded.current_level
            "#,
        )
        .bind(&profile.id)
        .bind(profile.score)
        .bind(profile.current_stage)
        .bind(profile.current_level)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn save_score_tier(&self, tier: &ScoreTier) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO score_tiers (tier, min_score, message, title)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(tier) DO UPDATE SET
                min_score = excluded.min_score,
                message = excluded.message,
                title = excluded.title
            "#,
        )
        .bind(&tier.tier)
        .bind(tier.min_score)
        .bind(&tier.message)
        .bind(&tier.title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// All score tiers, in no particular order.
    pub async fn score_tiers(&self) -> Result<Vec<ScoreTier>> {
        let tiers = sqlx::query("SELECT tier, min_score, message, title FROM score_tiers")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| ScoreTier {
                tier: row.get::<String, _>("tier"),
                min_score: row.get::<i64, _>("min_score"),
                message: row.get::<String, _>("message"),
                title: row.get::<String, _>("title"),
            })
            .collect();
        Ok(tiers)
    }

    // Get the full vote rows a user cast on one poll
    pub async fn user_poll_votes(&self, user_id: &str, poll_id: &str) -> Result<Vec<Vote>> {
        let rows = sqlx::query(
            r#"
            SELECT user_id, poll_id, selected_object_id, is_correct, points_earned, chosen_side, created_at
            FROM votes
            WHERE user_id = ? AND poll_id = ?
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        let mut votes = Vec::with_capacity(rows.len());
        for row in rows {
            let chosen_side = row
                .get::<Option<String>, _>("chosen_side")
                .map(|s| s.parse::<Side>())
                .transpose()?;
            let created_at = DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))?
                .with_timezone(&Utc);

            votes.push(Vote {
                user_id: row.get::<String, _>("user_id"),
                poll_id: row.get::<String, _>("poll_id"),
                selected_object_id: row.get::<String, _>("selected_object_id"),
                is_correct: row.get::<bool, _>("is_correct"),
                points_earned: row.get::<i32, _>("points_earned"),
                chosen_side,
                created_at,
            });
        }
        Ok(votes)
    }

    async fn load_objects(&self, poll_id: &str) -> Result<Vec<PollObject>> {
        let rows = sqlx::query(
            r#"
            SELECT id, text, points, correct_side
            FROM poll_objects
            WHERE poll_id = ?
            ORDER BY position
            "#,
        )
        .bind(poll_id)
        .fetch_all(&self.pool)
        .await?;

        let mut objects = Vec::with_capacity(rows.len());
        for row in rows {
            objects.push(PollObject {
                id: row.get::<String, _>("id"),
                text: row.get::<String, _>("text"),
                points: row.get::<i32, _>("points"),
                correct_side: row
                    .get::<Option<String>, _>("correct_side")
                    .map(|s| s.parse::<Side>())
                    .transpose()?,
            });
        }
        Ok(objects)
    }

    async fn with_objects(&self, mut poll: Poll) -> Result<Poll> {
        poll.objects = self.load_objects(&poll.id).await?;
        Ok(poll)
    }
}

// Poll columns without objects, which live in their own table
fn poll_from_row(row: &SqliteRow) -> Result<Poll> {
    let id = row.get::<String, _>("id");
    let poll_type = row.get::<String, _>("poll_type").parse::<PollType>()?;
    let quad_scores: BTreeMap<String, i32> =
        serde_json::from_str(&row.get::<String, _>("quad_scores")).map_err(|source| {
            Error::QuadScores {
                poll_id: id.clone(),
                source,
            }
        })?;

    Ok(Poll {
        id,
        poll_type,
        stage: row.get::<i32, _>("stage"),
        level: row.get::<i32, _>("level"),
        poll_order: row.get::<i32, _>("poll_order"),
        objects: Vec::new(),
        quad_scores,
    })
}

// Shared by single appends and batched submissions
async fn insert_vote(conn: &mut SqliteConnection, vote: &Vote) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO votes (user_id, poll_id, selected_object_id, is_correct, points_earned, chosen_side, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&vote.user_id)
    .bind(&vote.poll_id)
    .bind(&vote.selected_object_id)
    .bind(vote.is_correct)
    .bind(vote.points_earned)
    .bind(vote.chosen_side.map(|side| side.as_str()))
    .bind(vote.created_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

const ADD_SCORE: &str = r#"
    INSERT INTO profiles (id, score, current_stage, current_level)
    VALUES (?, ?, 0, 1)
    ON CONFLICT(id) DO UPDATE SET score = profiles.score + excluded.score
"#;

#[async_trait]
impl VoteLedger for Database {
    async fn append_vote(&self, vote: &Vote) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        insert_vote(&mut *conn, vote).await
    }

    async fn append_votes(&self, votes: &[Vote], score_delta: i64) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        for vote in votes {
            insert_vote(&mut *tx, vote).await?;
        }

        if let Some(first) = votes.first().filter(|_| score_delta != 0) {
            sqlx::query(ADD_SCORE)
                .bind(&first.user_id)
                .bind(score_delta)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn votes_for_user(&self, user_id: &str) -> Result<Vec<VoteRecord>> {
        let votes = sqlx::query(
            r#"
            SELECT v.poll_id, v.is_correct, v.points_earned, p.stage, p.level
            FROM votes v
            LEFT JOIN polls p ON p.id = v.poll_id
            WHERE v.user_id = ?
            ORDER BY v.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| VoteRecord {
            poll_id: row.get::<String, _>("poll_id"),
            is_correct: row.get::<bool, _>("is_correct"),
            points_earned: row.get::<i32, _>("points_earned"),
            stage: row.get::<Option<i32>, _>("stage"),
            level: row.get::<Option<i32>, _>("level"),
        })
        .collect();
        Ok(votes)
    }
}

#[async_trait]
impl PollCatalog for Database {
    async fn poll(&self, poll_id: &str) -> Result<Option<Poll>> {
        let row = sqlx::query(
            r#"
            SELECT id, poll_type, stage, level, poll_order, quad_scores
            FROM polls
            WHERE id = ?
            "#,
        )
        .bind(poll_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let poll = poll_from_row(&row)?;
                Ok(Some(self.with_objects(poll).await?))
            }
            None => Ok(None),
        }
    }

    async fn polls(&self, poll_ids: &HashSet<String>) -> Result<Vec<Poll>> {
        if poll_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; poll_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, poll_type, stage, level, poll_order, quad_scores FROM polls WHERE id IN ({}) ORDER BY stage, level, poll_order",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for poll_id in poll_ids {
            query = query.bind(poll_id);
        }
        let headers = query
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(poll_from_row)
            .collect::<Result<Vec<Poll>>>()?;

        let mut polls = Vec::with_capacity(headers.len());
        for poll in headers {
            polls.push(self.with_objects(poll).await?);
        }
        Ok(polls)
    }

    async fn poll_ids_in_bucket(&self, bucket: Bucket) -> Result<Vec<String>> {
        let ids = sqlx::query(
            r#"
            SELECT id
            FROM polls
            WHERE stage = ? AND level = ?
            ORDER BY poll_order
            "#,
        )
        .bind(bucket.stage)
        .bind(bucket.level)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| row.get::<String, _>("id"))
        .collect();
        Ok(ids)
    }

    async fn buckets(&self) -> Result<Vec<Bucket>> {
        let buckets = sqlx::query("SELECT DISTINCT stage, level FROM polls ORDER BY stage, level")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| Bucket::new(row.get::<i32, _>("stage"), row.get::<i32, _>("level")))
            .collect();
        Ok(buckets)
    }
}

#[async_trait]
impl ProfileStore for Database {
    async fn profile(&self, user_id: &str) -> Result<Option<UserProfile>> {
        let profile = sqlx::query(
            "SELECT id, score, current_stage, current_level FROM profiles WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .map(|row| UserProfile {
            id: row.get::<String, _>("id"),
            score: row.get::<i64, _>("score"),
            current_stage: row.get::<i32, _>("current_stage"),
            current_level: row.get::<i32, _>("current_level"),
        });
        Ok(profile)
    }

    async fn score(&self, user_id: &str) -> Result<i64> {
        let score = sqlx::query("SELECT score FROM profiles WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.get::<i64, _>("score"))
            .unwrap_or(0);
        Ok(score)
    }

    async fn add_score(&self, user_id: &str, delta: i64) -> Result<()> {
        sqlx::query(ADD_SCORE)
            .bind(user_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // The pointer only ever moves forward, even if two level-ups race
    async fn set_stage_level(&self, user_id: &str, bucket: Bucket) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO profiles (id, score, current_stage, current_level)
            VALUES (?, 0, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                current_stage = excluded.current_stage,
                current_level = excluded.current_level
            WHERE excluded.current_stage > profiles.current_stage
               OR (excluded.current_stage = profiles.current_stage
                   AND excluded.current_level > profiles.current_level)
            "#,
        )
        .bind(user_id)
        .bind(bucket.stage)
        .bind(bucket.level)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db() -> Database {
        Database::connect("sqlite::memory:", 1).await.unwrap()
    }

    #[tokio::test]
    async fn submission_is_written_with_its_score() {
        let db = memory_db().await;
        let votes = vec![
            Vote::new("u1", "quad", "a", true, 6, None),
            Vote::new("u1", "quad", "c", false, 0, None),
        ];

        db.append_votes(&votes, 6).await.unwrap();

        assert_eq!(db.votes_for_user("u1").await.unwrap().len(), 2);
        assert_eq!(db.score("u1").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn failed_submission_leaves_nothing_behind() {
        let db = memory_db().await;
        // The score credit runs after both votes are inserted and fails here.
        sqlx::query("DROP TABLE profiles")
            .execute(&db.pool)
            .await
            .unwrap();
        let votes = vec![
            Vote::new("u1", "quad", "a", true, 6, None),
            Vote::new("u1", "quad", "c", false, 0, None),
        ];

        assert!(matches!(
            db.append_votes(&votes, 6).await,
            Err(Error::Database(_))
        ));
        assert!(db.votes_for_user("u1").await.unwrap().is_empty());
    }
}
