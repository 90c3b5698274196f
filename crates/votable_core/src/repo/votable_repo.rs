//! Votable repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide create/get/list/delete over the `votables` table.
//! - Implement `AtomicMutator` as a single conditional `UPDATE`.
//! - Keep SQL details inside the persistence boundary.
//!
//! # Invariants
//! - Voter sets are JSON arrays of strings; a set mutation and its counter
//!   change always land in the same statement.
//! - Counters never go below zero; such a mutation does not match.
//! - Read paths reject malformed persisted voter sets instead of masking them.
//! - Column names come only from a resolved `VoteSchema`.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::config::{DownvoteColumns, PolarityColumns, VoteSchema};
use crate::model::votable::{DownvoteState, Polarity, Votable, VotableId, VoterId};
use crate::repo::mutator::{
    AtomicMutator, MatchPredicate, Membership, Mutation, MutationOutcome, SetOp,
};
use crate::repo::schema::{table_has_column, view_exists, TALLY_VIEW};
use log::{debug, error};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for votable persistence and vote mutations.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    NotFound(VotableId),
    InvalidData(String),
    /// Operation targets a polarity this deployment does not carry.
    PolarityDisabled(Polarity),
    /// Connection has not been migrated to the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// A configured vote column is missing; `install_vote_schema` was not run.
    MissingRequiredColumn {
        table: &'static str,
        column: String,
    },
    /// The tally view is missing; `install_vote_schema` was not run.
    MissingTallyView,
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "votable not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted votable data: {message}"),
            Self::PolarityDisabled(polarity) => {
                write!(f, "{polarity}votes are disabled for this schema")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
            Self::MissingTallyView => write!(f, "missing required view `{TALLY_VIEW}`"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Query options for listing votables.
#[derive(Debug, Clone, Default)]
pub struct VotableListQuery {
    pub limit: Option<u32>,
    pub offset: u32,
}

/// Repository interface for votable lifecycle and reads.
pub trait VotableRepository {
    /// Inserts a votable with empty vote fields.
    fn create_votable(&self, id: VotableId) -> RepoResult<VotableId>;
    fn get_votable(&self, id: VotableId) -> RepoResult<Option<Votable>>;
    /// Lists votables newest first.
    fn list_votables(&self, query: &VotableListQuery) -> RepoResult<Vec<Votable>>;
    /// Reads the tally as computed by the SQL tally view.
    fn stored_tally(&self, id: VotableId) -> RepoResult<Option<i64>>;
    /// Removes a votable together with its votes.
    fn delete_votable(&self, id: VotableId) -> RepoResult<()>;
}

/// SQLite-backed votable repository.
///
/// Holds one borrowed connection; concurrent voters use one repository (and
/// connection) per thread.
pub struct SqliteVotableRepository<'conn> {
    conn: &'conn Connection,
    schema: VoteSchema,
    select_sql: String,
}

impl<'conn> SqliteVotableRepository<'conn> {
    /// Constructs a repository from a migrated connection with the vote
    /// schema installed.
    pub fn try_new(conn: &'conn Connection, schema: VoteSchema) -> RepoResult<Self> {
        ensure_connection_ready(conn, &schema)?;
        let select_sql = build_select_sql(&schema);
        Ok(Self {
            conn,
            schema,
            select_sql,
        })
    }

    fn columns_for(&self, polarity: Polarity) -> RepoResult<&PolarityColumns> {
        self.schema
            .columns(polarity)
            .ok_or(RepoError::PolarityDisabled(polarity))
    }
}

impl VotableRepository for SqliteVotableRepository<'_> {
    fn create_votable(&self, id: VotableId) -> RepoResult<VotableId> {
        self.conn
            .execute("INSERT INTO votables (uuid) VALUES (?1);", [id.to_string()])?;
        Ok(id)
    }

    fn get_votable(&self, id: VotableId) -> RepoResult<Option<Votable>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE uuid = ?1;", self.select_sql))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_votable_row(row, &self.schema)?));
        }
        Ok(None)
    }

    fn list_votables(&self, query: &VotableListQuery) -> RepoResult<Vec<Votable>> {
        let mut sql = format!("{} ORDER BY created_at DESC, uuid ASC", self.select_sql);
        let mut bind_values: Vec<Value> = Vec::new();

        match (query.limit, query.offset) {
            (Some(limit), offset) => {
                sql.push_str(" LIMIT ? OFFSET ?");
                bind_values.push(Value::Integer(i64::from(limit)));
                bind_values.push(Value::Integer(i64::from(offset)));
            }
            (None, 0) => {}
            (None, offset) => {
                sql.push_str(" LIMIT -1 OFFSET ?");
                bind_values.push(Value::Integer(i64::from(offset)));
            }
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut votables = Vec::new();
        while let Some(row) = rows.next()? {
            votables.push(parse_votable_row(row, &self.schema)?);
        }
        Ok(votables)
    }

    fn stored_tally(&self, id: VotableId) -> RepoResult<Option<i64>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT \"{tally}\" FROM {TALLY_VIEW} WHERE uuid = ?1;",
            tally = self.schema.tally_column()
        ))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(row.get(0)?));
        }
        Ok(None)
    }

    fn delete_votable(&self, id: VotableId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM votables WHERE uuid = ?1;", [id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }
}

impl AtomicMutator for SqliteVotableRepository<'_> {
    fn schema(&self) -> &VoteSchema {
        &self.schema
    }

    fn apply(
        &self,
        id: VotableId,
        predicate: &MatchPredicate,
        mutation: &Mutation,
    ) -> RepoResult<MutationOutcome> {
        let match_columns = self.columns_for(predicate.polarity)?;
        let target_columns = self.columns_for(mutation.polarity)?;

        let voter_in_match_set = member_exists_sql(&match_columns.voters, "?4");
        let membership_sql = match predicate.membership {
            Membership::Absent => format!("NOT {voter_in_match_set}"),
            Membership::Present => voter_in_match_set,
        };
        let (set_sql, set_voter) = match &mutation.set_op {
            SetOp::Add(voter) => (
                format!(
                    "CASE WHEN {exists} THEN \"{voters}\" ELSE json_insert(\"{voters}\", '$[#]', ?3) END",
                    exists = member_exists_sql(&target_columns.voters, "?3"),
                    voters = target_columns.voters,
                ),
                voter,
            ),
            SetOp::Remove(voter) => (
                format!(
                    "(SELECT json_group_array(json_each.value)
                      FROM json_each(votables.\"{voters}\")
                      WHERE json_each.value <> ?3)",
                    voters = target_columns.voters,
                ),
                voter,
            ),
        };

        let sql = format!(
            "UPDATE votables
             SET
                \"{counter}\" = \"{counter}\" + ?2,
                \"{voters}\" = {set_sql}
             WHERE uuid = ?1
               AND \"{counter}\" + ?2 >= 0
               AND {membership_sql};",
            counter = target_columns.counter,
            voters = target_columns.voters,
        );

        let changed = self
            .conn
            .execute(
                &sql,
                params![
                    id.to_string(),
                    mutation.delta,
                    set_voter.as_str(),
                    predicate.voter.as_str(),
                ],
            )
            .map_err(|err| {
                error!(
                    "event=vote_mutation module=repo status=error polarity={} error={}",
                    mutation.polarity, err
                );
                err
            })?;

        let outcome = if changed == 0 {
            MutationOutcome::NotMatched
        } else {
            MutationOutcome::Applied
        };
        debug!(
            "event=vote_mutation module=repo status=ok polarity={} delta={} outcome={}",
            mutation.polarity,
            mutation.delta,
            outcome.as_str()
        );
        Ok(outcome)
    }
}

fn member_exists_sql(voters_column: &str, voter_param: &str) -> String {
    format!(
        "EXISTS (
            SELECT 1
            FROM json_each(votables.\"{voters_column}\")
            WHERE json_each.value = {voter_param}
        )"
    )
}

fn build_select_sql(schema: &VoteSchema) -> String {
    let up_columns = schema.upvote_columns();
    let up = format!("\"{}\", \"{}\"", up_columns.counter, up_columns.voters);
    let down = match schema.downvote_columns() {
        DownvoteColumns::Enabled(columns) => {
            format!(", \"{}\", \"{}\"", columns.counter, columns.voters)
        }
        DownvoteColumns::Disabled => String::new(),
    };
    format!("SELECT uuid, created_at, {up}{down} FROM votables")
}

fn parse_votable_row(row: &Row<'_>, schema: &VoteSchema) -> RepoResult<Votable> {
    let uuid_text: String = row.get("uuid")?;
    let id = Uuid::parse_str(&uuid_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid uuid value `{uuid_text}` in votables.uuid"))
    })?;

    let (upvotes, upvoters) = read_polarity(row, schema.upvote_columns())?;

    let downvotes = match schema.downvote_columns() {
        DownvoteColumns::Enabled(columns) => {
            let (count, voters) = read_polarity(row, columns)?;
            DownvoteState::Enabled { count, voters }
        }
        DownvoteColumns::Disabled => DownvoteState::Disabled,
    };

    Ok(Votable {
        id,
        upvotes,
        upvoters,
        downvotes,
        created_at: row.get("created_at")?,
    })
}

fn read_polarity(row: &Row<'_>, columns: &PolarityColumns) -> RepoResult<(i64, Vec<VoterId>)> {
    let count: i64 = row.get(columns.counter.as_str())?;
    let raw: String = row.get(columns.voters.as_str())?;
    let voters = serde_json::from_str::<Vec<VoterId>>(&raw).map_err(|err| {
        RepoError::InvalidData(format!(
            "invalid voter set in votables.{}: {err}",
            columns.voters
        ))
    })?;
    Ok((count, voters))
}

fn ensure_connection_ready(conn: &Connection, schema: &VoteSchema) -> RepoResult<()> {
    let actual_version = current_version(conn)?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for polarity in [Polarity::Up, Polarity::Down] {
        let Some(columns) = schema.columns(polarity) else {
            continue;
        };
        for column in [&columns.counter, &columns.voters] {
            if !table_has_column(conn, "votables", column)? {
                return Err(RepoError::MissingRequiredColumn {
                    table: "votables",
                    column: column.clone(),
                });
            }
        }
    }

    if !view_exists(conn, TALLY_VIEW)? {
        return Err(RepoError::MissingTallyView);
    }

    Ok(())
}
