//! Records one vote of one polarity.
//!
//! # Invariants
//! - A voter already in the polarity's set is never added or counted twice;
//!   the second call is `NotMatched`.
//! - Exactly one `AtomicMutator::apply` per call.

use crate::model::votable::{Polarity, VotableId, VoterId, VoteWeight};
use crate::repo::mutator::{AtomicMutator, MatchPredicate, Mutation, MutationOutcome, SetOp};
use crate::repo::votable_repo::RepoResult;
use log::debug;

pub struct VoteRecorder<M: AtomicMutator> {
    mutator: M,
}

impl<M: AtomicMutator> VoteRecorder<M> {
    pub fn new(mutator: M) -> Self {
        Self { mutator }
    }

    /// Records a weight-1 vote.
    pub fn record(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
    ) -> RepoResult<MutationOutcome> {
        self.record_weighted(id, voter, polarity, VoteWeight::ONE)
    }

    /// Adds `voter` to the polarity's set and raises its counter by `weight`,
    /// only if `voter` is not already in that set.
    pub fn record_weighted(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
        weight: VoteWeight,
    ) -> RepoResult<MutationOutcome> {
        let outcome = self.mutator.apply(
            id,
            &MatchPredicate::voter_absent(polarity, voter),
            &Mutation {
                polarity,
                delta: weight.as_delta(),
                set_op: SetOp::Add(voter.clone()),
            },
        )?;
        debug!(
            "event=vote_record module=service status=ok polarity={} weight={} outcome={} voter={}",
            polarity,
            weight.get(),
            outcome.as_str(),
            voter.log_prefix()
        );
        Ok(outcome)
    }
}
