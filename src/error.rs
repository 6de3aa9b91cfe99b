use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Poll not found: {0}")]
    PollNotFound(String),

    #[error("Profile not found: {0}")]
    ProfileNotFound(String),

    #[error("Unknown poll type: {0}")]
    UnknownPollType(String),

    #[error("Unknown side: {0}")]
    UnknownSide(String),

    #[error("invalid quad scores for poll {poll_id}: {source}")]
    QuadScores {
        poll_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("vote submission contains no votes")]
    EmptySubmission,

    #[error("vote submission spans several polls")]
    MixedSubmission,
}

pub type Result<T> = std::result::Result<T, Error>;
