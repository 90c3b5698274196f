//! Votable domain model.
//!
//! # Responsibility
//! - Define the vote-bearing snapshot read back from storage.
//! - Provide polarity, voter and weight value types shared by services.
//!
//! # Invariants
//! - `id` is stable and never reused for another votable.
//! - `upvotes == upvoters.len()` while every vote has weight 1.
//! - A voter appears in at most one of `upvoters` / downvoters.
//!
//! # See also
//! - `crate::model::tally` for the derived score.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::num::NonZeroU32;
use uuid::Uuid;

/// Stable identifier of a votable entity.
pub type VotableId = Uuid;

/// Which voter set/counter an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Up,
    Down,
}

impl Polarity {
    /// Returns the other polarity.
    pub fn opposite(self) -> Self {
        match self {
            Self::Up => Self::Down,
            Self::Down => Self::Up,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

impl Display for Polarity {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque voter identifier.
///
/// Shape validation (uuid vs free text) belongs to the resolved schema, not
/// to this type, so one deployment can accept ids another would reject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VoterId(String);

impl VoterId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Short prefix used in diagnostics instead of the full id.
    pub fn log_prefix(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl From<Uuid> for VoterId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for VoterId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for VoterId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Counter increment applied per vote. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteWeight(NonZeroU32);

impl VoteWeight {
    pub const ONE: Self = Self(NonZeroU32::MIN);

    /// Returns `None` for a zero weight.
    pub fn new(value: u32) -> Option<Self> {
        NonZeroU32::new(value).map(Self)
    }

    pub fn get(self) -> u32 {
        self.0.get()
    }

    /// Signed counter delta for the record (`+`) direction.
    pub fn as_delta(self) -> i64 {
        i64::from(self.0.get())
    }
}

impl Default for VoteWeight {
    fn default() -> Self {
        Self::ONE
    }
}

/// Downvote side of a votable.
///
/// Deployments with downvoting disabled carry no downvote columns at all,
/// which is represented as `Disabled` rather than zeroed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DownvoteState {
    Disabled,
    Enabled { count: i64, voters: Vec<VoterId> },
}

impl DownvoteState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled { .. })
    }
}

/// Vote-bearing snapshot of one votable row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Votable {
    pub id: VotableId,
    pub upvotes: i64,
    pub upvoters: Vec<VoterId>,
    pub downvotes: DownvoteState,
    /// Unix epoch milliseconds.
    pub created_at: i64,
}

impl Votable {
    /// Stored counter for `polarity`, or `None` when that polarity is disabled.
    pub fn count(&self, polarity: Polarity) -> Option<i64> {
        match (polarity, &self.downvotes) {
            (Polarity::Up, _) => Some(self.upvotes),
            (Polarity::Down, DownvoteState::Enabled { count, .. }) => Some(*count),
            (Polarity::Down, DownvoteState::Disabled) => None,
        }
    }

    /// Voter set for `polarity`, or `None` when that polarity is disabled.
    pub fn voters(&self, polarity: Polarity) -> Option<&[VoterId]> {
        match (polarity, &self.downvotes) {
            (Polarity::Up, _) => Some(self.upvoters.as_slice()),
            (Polarity::Down, DownvoteState::Enabled { voters, .. }) => Some(voters.as_slice()),
            (Polarity::Down, DownvoteState::Disabled) => None,
        }
    }

    /// Returns whether `voter` currently holds a vote of `polarity`.
    pub fn has_voted(&self, polarity: Polarity, voter: &VoterId) -> bool {
        self.voters(polarity)
            .is_some_and(|voters| voters.iter().any(|item| item == voter))
    }
}
