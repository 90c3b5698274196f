//! Vote tallies and voter membership for persisted entities.
//! This crate is the single source of truth for vote-state invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{
    default_log_level, init_logging, init_logging_from, logging_status, LogSettings, LoggingError,
};
pub use model::config::{ConfigError, VoteConfig, VoteSchema, VoterIdKind};
pub use model::tally::TallyView;
pub use model::votable::{DownvoteState, Polarity, Votable, VotableId, VoterId, VoteWeight};
pub use repo::mutator::{
    AtomicMutator, MatchPredicate, Membership, Mutation, MutationOutcome, SetOp,
};
pub use repo::schema::{install_vote_schema, TALLY_VIEW};
pub use repo::votable_repo::{
    RepoError, RepoResult, SqliteVotableRepository, VotableListQuery, VotableRepository,
};
pub use service::arbiter::{CastOutcome, PolarityArbiter};
pub use service::canceller::VoteCanceller;
pub use service::recorder::VoteRecorder;
pub use service::vote_service::{VoteError, VoteService};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
