//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `votable_core` linkage.
//! - Run one upvote/downvote/cancel cycle against an in-memory database.
//! - Keep output deterministic apart from generated ids.

use std::process::ExitCode;
use uuid::Uuid;
use votable_core::db::open_db_in_memory;
use votable_core::{
    install_vote_schema, SqliteVotableRepository, VoteConfig, VoteService, VoterId,
};

fn main() -> ExitCode {
    println!("votable_core ping={}", votable_core::ping());
    println!("votable_core version={}", votable_core::core_version());

    match run_vote_cycle() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("votable_core smoke failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run_vote_cycle() -> Result<(), Box<dyn std::error::Error>> {
    let schema = VoteConfig::default().resolve()?;
    let mut conn = open_db_in_memory()?;
    install_vote_schema(&mut conn, &schema)?;

    let service = VoteService::new(SqliteVotableRepository::try_new(&conn, schema)?);
    let votable = service.create_votable()?;
    let voter = VoterId::from(Uuid::new_v4());

    service.upvote(votable, &voter)?;
    println!("after upvote tally={:?}", service.tally(votable)?);
    service.downvote(votable, &voter)?;
    println!("after downvote tally={:?}", service.tally(votable)?);
    service.cancel_downvote(votable, &voter)?;
    println!("after cancel tally={:?}", service.tally(votable)?);
    Ok(())
}
