//! Installs configured vote columns on top of the migrated base table.
//!
//! # Responsibility
//! - Add counter/voter-set columns named by a `VoteSchema` to `votables`.
//! - (Re)create the tally view and the optional voter-set indexes.
//!
//! # Invariants
//! - Installation is idempotent; existing columns and their data are kept.
//! - The tally view always reflects the schema passed to the latest install.

use crate::model::config::VoteSchema;
use crate::model::votable::Polarity;
use crate::repo::votable_repo::RepoResult;
use log::info;
use rusqlite::{Connection, TransactionBehavior};

/// SQL view exposing the derived tally per votable.
pub const TALLY_VIEW: &str = "votable_tallies";

/// Adds vote columns, the tally view and optional indexes for `schema`.
///
/// Columns left over from an earlier schema (e.g. downvotes before they were
/// disabled) are not dropped.
pub fn install_vote_schema(conn: &mut Connection, schema: &VoteSchema) -> RepoResult<()> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    for polarity in [Polarity::Up, Polarity::Down] {
        let Some(columns) = schema.columns(polarity) else {
            continue;
        };
        if !table_has_column(&tx, "votables", &columns.counter)? {
            tx.execute_batch(&format!(
                "ALTER TABLE votables ADD COLUMN \"{}\" INTEGER NOT NULL DEFAULT 0;",
                columns.counter
            ))?;
        }
        if !table_has_column(&tx, "votables", &columns.voters)? {
            tx.execute_batch(&format!(
                "ALTER TABLE votables ADD COLUMN \"{}\" TEXT NOT NULL DEFAULT '[]';",
                columns.voters
            ))?;
        }
        if schema.indexed() {
            tx.execute_batch(&format!(
                "CREATE INDEX IF NOT EXISTS idx_votables_{voters} ON votables (uuid, \"{voters}\");",
                voters = columns.voters
            ))?;
        }
    }

    let up = &schema.upvote_columns().counter;
    let tally_expr = match schema.columns(Polarity::Down) {
        Some(down) => format!("\"{up}\" - \"{}\"", down.counter),
        None => format!("\"{up}\""),
    };
    tx.execute_batch(&format!(
        "DROP VIEW IF EXISTS {TALLY_VIEW};
         CREATE VIEW {TALLY_VIEW} AS
         SELECT uuid, ({tally_expr}) AS \"{tally}\"
         FROM votables;",
        tally = schema.tally_column()
    ))?;

    tx.commit()?;
    info!(
        "event=vote_schema_install module=repo status=ok downvotes_enabled={} indexed={} tally={}",
        schema.downvotes_enabled(),
        schema.indexed(),
        schema.tally_column()
    );
    Ok(())
}

pub(crate) fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn view_exists(conn: &Connection, view: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'view' AND name = ?1
        );",
        [view],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}
