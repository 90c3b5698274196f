//! Vote configuration and its resolved schema.
//!
//! # Responsibility
//! - Accept per-deployment column naming and feature switches.
//! - Resolve configuration once into a validated `VoteSchema`.
//!
//! # Invariants
//! - Every configured name is a plain SQL identifier.
//! - Stored column names are unique and never shadow `uuid`/`created_at`.
//! - The tally name never equals a voter-set name.
//! - Downvote names are ignored entirely when downvoting is disabled.

use crate::model::votable::{Polarity, VoterId};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

const RESERVED_NAMES: &[&str] = &["uuid", "created_at"];

/// Accepted shape of voter identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoterIdKind {
    /// Canonical UUID text, the usual shape of user ids.
    #[default]
    Uuid,
    /// Any non-blank string without surrounding whitespace.
    Text,
}

/// Raw deployment configuration.
///
/// Missing keys fall back to `VoteConfig::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteConfig {
    pub tally_name: String,
    pub upvotes_name: String,
    pub upvoters_name: String,
    pub downvotes_name: String,
    pub downvoters_name: String,
    pub disable_downvotes: bool,
    pub voter_id_kind: VoterIdKind,
    /// Create `(uuid, <voter set>)` indexes when installing the schema.
    pub indexed: bool,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            tally_name: "votes".to_string(),
            upvotes_name: "upvotes".to_string(),
            upvoters_name: "upvoters".to_string(),
            downvotes_name: "downvotes".to_string(),
            downvoters_name: "downvoters".to_string(),
            disable_downvotes: false,
            voter_id_kind: VoterIdKind::Uuid,
            indexed: false,
        }
    }
}

/// Errors raised while parsing or resolving `VoteConfig`.
#[derive(Debug)]
pub enum ConfigError {
    /// Name is not a plain SQL identifier.
    InvalidIdentifier { key: &'static str, value: String },
    /// Name would shadow a base column of `votables`.
    ReservedName { key: &'static str, value: String },
    /// Two stored columns resolve to the same name.
    DuplicateName(String),
    /// Tally output would shadow a voter set.
    TallyCollidesWithVoters(String),
    /// Config document could not be parsed.
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier { key, value } => {
                write!(f, "`{key}` must be a plain identifier, got `{value}`")
            }
            Self::ReservedName { key, value } => {
                write!(f, "`{key}` uses reserved column name `{value}`")
            }
            Self::DuplicateName(name) => write!(f, "column name `{name}` is configured twice"),
            Self::TallyCollidesWithVoters(name) => write!(
                f,
                "tally name `{name}` collides with a voter set column; pick a distinct name"
            ),
            Self::Parse(err) => write!(f, "invalid vote config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

impl VoteConfig {
    /// Parses a JSON config document. Absent keys keep their defaults.
    pub fn from_json_str(input: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(input)?)
    }

    /// Validates names and switches, producing the schema used by storage.
    pub fn resolve(&self) -> Result<VoteSchema, ConfigError> {
        let tally = checked_identifier("tally_name", &self.tally_name)?;
        let upvotes = PolarityColumns {
            counter: checked_identifier("upvotes_name", &self.upvotes_name)?,
            voters: checked_identifier("upvoters_name", &self.upvoters_name)?,
        };

        let downvotes = if self.disable_downvotes {
            DownvoteColumns::Disabled
        } else {
            DownvoteColumns::Enabled(PolarityColumns {
                counter: checked_identifier("downvotes_name", &self.downvotes_name)?,
                voters: checked_identifier("downvoters_name", &self.downvoters_name)?,
            })
        };

        let mut stored = vec![&upvotes.counter, &upvotes.voters];
        if let DownvoteColumns::Enabled(columns) = &downvotes {
            stored.push(&columns.counter);
            stored.push(&columns.voters);
        }

        let mut seen = HashSet::new();
        for name in &stored {
            if !seen.insert(name.to_ascii_lowercase()) {
                return Err(ConfigError::DuplicateName((*name).clone()));
            }
        }

        let collides = |voters: &String| voters.eq_ignore_ascii_case(&tally);
        let tally_hits_downvoters = match &downvotes {
            DownvoteColumns::Enabled(columns) => collides(&columns.voters),
            DownvoteColumns::Disabled => false,
        };
        if collides(&upvotes.voters) || tally_hits_downvoters {
            return Err(ConfigError::TallyCollidesWithVoters(tally));
        }

        Ok(VoteSchema {
            tally,
            upvotes,
            downvotes,
            voter_id_kind: self.voter_id_kind,
            indexed: self.indexed,
        })
    }
}

/// Column pair backing one polarity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolarityColumns {
    pub counter: String,
    pub voters: String,
}

/// Downvote columns, present only when downvoting is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownvoteColumns {
    Disabled,
    Enabled(PolarityColumns),
}

/// Validated, immutable vote schema.
///
/// Built only through `VoteConfig::resolve`, so every name it hands out is
/// safe to splice into SQL as an identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteSchema {
    tally: String,
    upvotes: PolarityColumns,
    downvotes: DownvoteColumns,
    voter_id_kind: VoterIdKind,
    indexed: bool,
}

impl VoteSchema {
    /// Schema for `VoteConfig::default()`.
    pub fn default_schema() -> Self {
        Self {
            tally: "votes".to_string(),
            upvotes: PolarityColumns {
                counter: "upvotes".to_string(),
                voters: "upvoters".to_string(),
            },
            downvotes: DownvoteColumns::Enabled(PolarityColumns {
                counter: "downvotes".to_string(),
                voters: "downvoters".to_string(),
            }),
            voter_id_kind: VoterIdKind::Uuid,
            indexed: false,
        }
    }

    pub fn tally_column(&self) -> &str {
        self.tally.as_str()
    }

    /// Upvote columns; upvoting is always enabled.
    pub fn upvote_columns(&self) -> &PolarityColumns {
        &self.upvotes
    }

    pub fn downvotes_enabled(&self) -> bool {
        matches!(self.downvotes, DownvoteColumns::Enabled(_))
    }

    pub fn downvote_columns(&self) -> &DownvoteColumns {
        &self.downvotes
    }

    /// Columns for `polarity`, or `None` when that polarity is disabled.
    pub fn columns(&self, polarity: Polarity) -> Option<&PolarityColumns> {
        match (polarity, &self.downvotes) {
            (Polarity::Up, _) => Some(&self.upvotes),
            (Polarity::Down, DownvoteColumns::Enabled(columns)) => Some(columns),
            (Polarity::Down, DownvoteColumns::Disabled) => None,
        }
    }

    pub fn is_enabled(&self, polarity: Polarity) -> bool {
        self.columns(polarity).is_some()
    }

    pub fn voter_id_kind(&self) -> VoterIdKind {
        self.voter_id_kind
    }

    pub fn indexed(&self) -> bool {
        self.indexed
    }

    /// Returns the stored form of `voter`, or `None` when it does not have
    /// the shape this deployment accepts.
    ///
    /// Voter sets compare ids byte for byte, so every accepted spelling of a
    /// UUID (upper case, simple, braced, urn) maps to lowercase hyphenated.
    pub fn canonical_voter(&self, voter: &VoterId) -> Option<VoterId> {
        let value = voter.as_str();
        match self.voter_id_kind {
            VoterIdKind::Uuid => Uuid::parse_str(value).ok().map(VoterId::from),
            VoterIdKind::Text => {
                (!value.is_empty() && value.trim() == value).then(|| voter.clone())
            }
        }
    }
}

fn checked_identifier(key: &'static str, value: &str) -> Result<String, ConfigError> {
    if !IDENTIFIER_RE.is_match(value) {
        return Err(ConfigError::InvalidIdentifier {
            key,
            value: value.to_string(),
        });
    }
    if RESERVED_NAMES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(value))
    {
        return Err(ConfigError::ReservedName {
            key,
            value: value.to_string(),
        });
    }
    Ok(value.to_string())
}
