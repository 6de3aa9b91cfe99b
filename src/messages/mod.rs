pub mod template;
pub mod tiers;

pub use template::{PollRef, poll_refs, replace_message_variables, rewrite_poll_refs};
pub use tiers::resolve_tier;
