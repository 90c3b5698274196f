//! Cancels one vote of one polarity.
//!
//! # Invariants
//! - Only a voter currently in the polarity's set is removed; anything else
//!   is `NotMatched` and leaves counters untouched.
//! - Exactly one `AtomicMutator::apply` per call.

use crate::model::votable::{Polarity, VotableId, VoterId, VoteWeight};
use crate::repo::mutator::{AtomicMutator, MatchPredicate, Mutation, MutationOutcome, SetOp};
use crate::repo::votable_repo::RepoResult;
use log::debug;

pub struct VoteCanceller<M: AtomicMutator> {
    mutator: M,
}

impl<M: AtomicMutator> VoteCanceller<M> {
    pub fn new(mutator: M) -> Self {
        Self { mutator }
    }

    /// Cancels a weight-1 vote.
    pub fn cancel(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
    ) -> RepoResult<MutationOutcome> {
        self.cancel_weighted(id, voter, polarity, VoteWeight::ONE)
    }

    /// Removes `voter` from the polarity's set and lowers its counter by
    /// `weight`, only if `voter` is in that set.
    ///
    /// `weight` must match the weight the vote was recorded with, otherwise
    /// the counter drifts from the set size. A `weight` above the current
    /// counter is `NotMatched` and keeps the voter in the set.
    pub fn cancel_weighted(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
        weight: VoteWeight,
    ) -> RepoResult<MutationOutcome> {
        let outcome = self.mutator.apply(
            id,
            &MatchPredicate::voter_present(polarity, voter),
            &Mutation {
                polarity,
                delta: -weight.as_delta(),
                set_op: SetOp::Remove(voter.clone()),
            },
        )?;
        debug!(
            "event=vote_cancel module=service status=ok polarity={} weight={} outcome={} voter={}",
            polarity,
            weight.get(),
            outcome.as_str(),
            voter.log_prefix()
        );
        Ok(outcome)
    }
}
