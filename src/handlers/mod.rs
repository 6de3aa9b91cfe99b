mod vote;

pub use vote::{VoteOutcome, VoteService};
