//! Vote domain model.
//!
//! # Responsibility
//! - Define the votable snapshot and the value types used by vote operations.
//! - Resolve deployment configuration into a validated schema.
//! - Derive the exposed tally from stored counters.
//!
//! # Invariants
//! - Every votable is identified by a stable `VotableId`.
//! - Optional downvote data is a tagged variant, never a zeroed placeholder.

pub mod config;
pub mod tally;
pub mod votable;
