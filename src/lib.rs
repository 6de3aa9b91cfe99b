//! Scoring engine for the ISIT word-association poll game.
//!
//! Turns a user's vote history into the Deviance Quotient (share of polls
//! answered incorrectly), the Awareness Quotient (Stage-0 performance), and
//! a point ceiling. It also decides when a user has finished a level and
//! fills those numbers into feedback templates.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod leveling;
pub mod messages;
pub mod models;
pub mod scoring;
pub mod store;

pub use error::{Error, Result};
