//! Conditional single-row mutation contract.
//!
//! # Responsibility
//! - Describe "match votable + voter membership, then adjust one counter and
//!   one voter set" as plain data.
//! - Define the storage seam the vote services depend on.
//!
//! # Invariants
//! - Implementations execute match and mutation as one indivisible step.
//! - A predicate that does not match is `MutationOutcome::NotMatched`, never
//!   an error. A missing votable does not match either.
//! - A mutation that would take its counter below zero does not match.

use crate::model::config::VoteSchema;
use crate::model::votable::{Polarity, VotableId, VoterId};
use crate::repo::votable_repo::RepoResult;

/// Required membership of a voter in one voter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Absent,
    Present,
}

/// Row-level condition evaluated together with the mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchPredicate {
    pub polarity: Polarity,
    pub voter: VoterId,
    pub membership: Membership,
}

impl MatchPredicate {
    pub fn voter_absent(polarity: Polarity, voter: &VoterId) -> Self {
        Self {
            polarity,
            voter: voter.clone(),
            membership: Membership::Absent,
        }
    }

    pub fn voter_present(polarity: Polarity, voter: &VoterId) -> Self {
        Self {
            polarity,
            voter: voter.clone(),
            membership: Membership::Present,
        }
    }
}

/// Change applied to one voter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetOp {
    /// Add the voter unless already a member.
    Add(VoterId),
    /// Remove the voter if present.
    Remove(VoterId),
}

/// Counter delta plus set change on one polarity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mutation {
    pub polarity: Polarity,
    pub delta: i64,
    pub set_op: SetOp,
}

/// Result of a conditional mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    Applied,
    NotMatched,
}

impl MutationOutcome {
    pub fn is_applied(self) -> bool {
        self == Self::Applied
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::NotMatched => "not_matched",
        }
    }
}

/// Atomic conditional update over one votable.
pub trait AtomicMutator {
    /// Schema the mutator was built with.
    fn schema(&self) -> &VoteSchema;

    /// Applies `mutation` to votable `id` only if `predicate` holds.
    ///
    /// # Errors
    /// - `RepoError::PolarityDisabled` when either side targets a polarity
    ///   the schema does not carry.
    /// - `RepoError::Db` for storage failures, returned unchanged.
    fn apply(
        &self,
        id: VotableId,
        predicate: &MatchPredicate,
        mutation: &Mutation,
    ) -> RepoResult<MutationOutcome>;
}

impl<M: AtomicMutator + ?Sized> AtomicMutator for &M {
    fn schema(&self) -> &VoteSchema {
        (**self).schema()
    }

    fn apply(
        &self,
        id: VotableId,
        predicate: &MatchPredicate,
        mutation: &Mutation,
    ) -> RepoResult<MutationOutcome> {
        (**self).apply(id, predicate, mutation)
    }
}
