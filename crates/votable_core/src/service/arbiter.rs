//! Mutually exclusive upvote/downvote arbitration.
//!
//! # Responsibility
//! - Cast a vote by first clearing the voter's opposite vote, then recording
//!   the requested one.
//! - Report which of the two steps completed.
//!
//! # Invariants
//! - Only built when both polarities are enabled.
//! - The record step starts strictly after the cancel step returned.
//! - A failing cancel step skips the record step.
//! - The two steps are separate atomic operations; a failure between them
//!   leaves the voter with no vote, reported as `PartialArbitration`.

use crate::model::votable::{Polarity, VotableId, VoterId, VoteWeight};
use crate::repo::mutator::{AtomicMutator, MutationOutcome};
use crate::service::canceller::VoteCanceller;
use crate::service::recorder::VoteRecorder;
use crate::service::vote_service::VoteError;
use log::{error, warn};

/// Outcome of both `cast` steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastOutcome {
    /// Cancel step on the opposite polarity. `None` when no arbitration ran
    /// (downvoting disabled).
    pub opposite_cleared: Option<MutationOutcome>,
    /// Record step on the requested polarity.
    pub recorded: MutationOutcome,
}

impl CastOutcome {
    /// Returns whether the voter switched away from an opposite vote.
    pub fn switched(&self) -> bool {
        self.opposite_cleared.is_some_and(MutationOutcome::is_applied)
    }
}

pub struct PolarityArbiter<M: AtomicMutator> {
    mutator: M,
}

impl<M: AtomicMutator> PolarityArbiter<M> {
    /// # Errors
    /// - `VoteError::PolarityDisabled(Down)` when the schema has no downvotes.
    pub fn new(mutator: M) -> Result<Self, VoteError> {
        if !mutator.schema().downvotes_enabled() {
            return Err(VoteError::PolarityDisabled(Polarity::Down));
        }
        Ok(Self { mutator })
    }

    pub fn cast(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
    ) -> Result<CastOutcome, VoteError> {
        self.cast_weighted(id, voter, polarity, VoteWeight::ONE, VoteWeight::ONE)
    }

    /// Casts a vote worth `weight`, clearing an opposite vote worth
    /// `opposite_weight`.
    ///
    /// Storage keeps no per-voter weight, so the caller names the weight the
    /// opposite vote was recorded with. An `opposite_weight` larger than the
    /// opposite counter does not match and leaves that vote in place.
    pub fn cast_weighted(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
        weight: VoteWeight,
        opposite_weight: VoteWeight,
    ) -> Result<CastOutcome, VoteError> {
        let opposite = polarity.opposite();
        let cleared = VoteCanceller::new(&self.mutator)
            .cancel_weighted(id, voter, opposite, opposite_weight)
            .map_err(|err| {
                error!(
                    "event=vote_cast module=service status=error step=cancel_opposite polarity={} error={}",
                    polarity, err
                );
                VoteError::from(err)
            })?;

        match VoteRecorder::new(&self.mutator).record_weighted(id, voter, polarity, weight) {
            Ok(recorded) => Ok(CastOutcome {
                opposite_cleared: Some(cleared),
                recorded,
            }),
            Err(source) => {
                warn!(
                    "event=vote_cast module=service status=partial step=record polarity={} opposite_cleared={} error={}",
                    polarity,
                    cleared.as_str(),
                    source
                );
                Err(VoteError::PartialArbitration {
                    polarity,
                    opposite_cleared: cleared,
                    source,
                })
            }
        }
    }

    /// Direct pass-through to `VoteCanceller`; no arbitration needed.
    pub fn cancel(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
    ) -> Result<MutationOutcome, VoteError> {
        Ok(VoteCanceller::new(&self.mutator).cancel(id, voter, polarity)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{CastOutcome, PolarityArbiter};
    use crate::model::config::{VoteConfig, VoteSchema};
    use crate::model::votable::{Polarity, VotableId, VoterId, VoteWeight};
    use crate::repo::mutator::{
        AtomicMutator, MatchPredicate, Membership, Mutation, MutationOutcome, SetOp,
    };
    use crate::repo::votable_repo::{RepoError, RepoResult};
    use crate::service::vote_service::VoteError;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    /// Single-threaded stand-in for storage; fails the call numbered
    /// `fail_on_call` (1-based) when set.
    struct ScriptedMutator {
        schema: VoteSchema,
        sets: RefCell<BTreeMap<Polarity, (i64, Vec<VoterId>)>>,
        calls: Cell<u32>,
        fail_on_call: Option<u32>,
    }

    impl ScriptedMutator {
        fn new(fail_on_call: Option<u32>) -> Self {
            Self {
                schema: VoteSchema::default_schema(),
                sets: RefCell::new(BTreeMap::new()),
                calls: Cell::new(0),
                fail_on_call,
            }
        }

        fn state(&self, polarity: Polarity) -> (i64, Vec<VoterId>) {
            self.sets
                .borrow()
                .get(&polarity)
                .cloned()
                .unwrap_or_default()
        }
    }

    impl AtomicMutator for ScriptedMutator {
        fn schema(&self) -> &VoteSchema {
            &self.schema
        }

        fn apply(
            &self,
            _id: VotableId,
            predicate: &MatchPredicate,
            mutation: &Mutation,
        ) -> RepoResult<MutationOutcome> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on_call == Some(call) {
                return Err(RepoError::InvalidData("injected failure".to_string()));
            }

            let mut sets = self.sets.borrow_mut();
            let present = sets
                .get(&predicate.polarity)
                .is_some_and(|(_, voters)| voters.contains(&predicate.voter));
            let matched = match predicate.membership {
                Membership::Absent => !present,
                Membership::Present => present,
            };
            if !matched {
                return Ok(MutationOutcome::NotMatched);
            }

            let (count, voters) = sets.entry(mutation.polarity).or_default();
            if *count + mutation.delta < 0 {
                return Ok(MutationOutcome::NotMatched);
            }
            *count += mutation.delta;
            match &mutation.set_op {
                SetOp::Add(voter) => {
                    if !voters.contains(voter) {
                        voters.push(voter.clone());
                    }
                }
                SetOp::Remove(voter) => voters.retain(|item| item != voter),
            }
            Ok(MutationOutcome::Applied)
        }
    }

    #[test]
    fn arbiter_requires_downvotes() {
        let mut mutator = ScriptedMutator::new(None);
        mutator.schema = VoteConfig {
            disable_downvotes: true,
            ..VoteConfig::default()
        }
        .resolve()
        .unwrap();

        let result = PolarityArbiter::new(&mutator);
        assert!(matches!(
            result,
            Err(VoteError::PolarityDisabled(Polarity::Down))
        ));
    }

    #[test]
    fn switching_polarity_moves_the_voter() {
        let mutator = ScriptedMutator::new(None);
        let arbiter = PolarityArbiter::new(&mutator).unwrap();
        let id = Uuid::new_v4();
        let voter = VoterId::new("v1");

        let first = arbiter.cast(id, &voter, Polarity::Up).unwrap();
        assert_eq!(
            first,
            CastOutcome {
                opposite_cleared: Some(MutationOutcome::NotMatched),
                recorded: MutationOutcome::Applied,
            }
        );
        assert!(!first.switched());

        let second = arbiter.cast(id, &voter, Polarity::Down).unwrap();
        assert!(second.switched());
        assert_eq!(mutator.state(Polarity::Up), (0, Vec::new()));
        assert_eq!(mutator.state(Polarity::Down), (1, vec![voter.clone()]));
    }

    #[test]
    fn failing_cancel_step_skips_record() {
        let mutator = ScriptedMutator::new(Some(1));
        let arbiter = PolarityArbiter::new(&mutator).unwrap();

        let err = arbiter
            .cast(Uuid::new_v4(), &VoterId::new("v1"), Polarity::Up)
            .unwrap_err();

        assert!(matches!(err, VoteError::Storage(RepoError::InvalidData(_))));
        assert_eq!(mutator.calls.get(), 1);
        assert_eq!(mutator.state(Polarity::Up), (0, Vec::new()));
    }

    #[test]
    fn failing_record_step_reports_partial_arbitration() {
        let mutator = ScriptedMutator::new(Some(3));
        let arbiter = PolarityArbiter::new(&mutator).unwrap();
        let id = Uuid::new_v4();
        let voter = VoterId::new("v1");

        // Calls 1 and 2: cancel down (not matched), record up.
        arbiter.cast(id, &voter, Polarity::Up).unwrap();
        // Call 3 fails: the cancel of the upvote itself.
        let err = arbiter.cast(id, &voter, Polarity::Down).unwrap_err();
        assert!(matches!(err, VoteError::Storage(_)));

        let mutator = ScriptedMutator::new(Some(4));
        let arbiter = PolarityArbiter::new(&mutator).unwrap();
        arbiter.cast(id, &voter, Polarity::Up).unwrap();
        // Call 3 clears the upvote, call 4 (record down) fails.
        let err = arbiter.cast(id, &voter, Polarity::Down).unwrap_err();
        match err {
            VoteError::PartialArbitration {
                polarity,
                opposite_cleared,
                ..
            } => {
                assert_eq!(polarity, Polarity::Down);
                assert_eq!(opposite_cleared, MutationOutcome::Applied);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(mutator.state(Polarity::Up), (0, Vec::new()));
        assert_eq!(mutator.state(Polarity::Down), (0, Vec::new()));
    }

    #[test]
    fn weighted_cast_clears_opposite_with_its_own_weight() {
        let mutator = ScriptedMutator::new(None);
        let arbiter = PolarityArbiter::new(&mutator).unwrap();
        let id = Uuid::new_v4();
        let voter = VoterId::new("v1");
        let five = VoteWeight::new(5).unwrap();

        arbiter.cast(id, &voter, Polarity::Down).unwrap();
        let outcome = arbiter
            .cast_weighted(id, &voter, Polarity::Up, five, VoteWeight::ONE)
            .unwrap();

        assert!(outcome.switched());
        assert_eq!(mutator.state(Polarity::Down), (0, Vec::new()));
        assert_eq!(mutator.state(Polarity::Up), (5, vec![voter.clone()]));

        // Switching back clears the weight-5 upvote in full.
        arbiter
            .cast_weighted(id, &voter, Polarity::Down, VoteWeight::ONE, five)
            .unwrap();
        assert_eq!(mutator.state(Polarity::Up), (0, Vec::new()));
        assert_eq!(mutator.state(Polarity::Down), (1, vec![voter]));
    }

    #[test]
    fn cancel_is_a_pass_through() {
        let mutator = ScriptedMutator::new(None);
        let arbiter = PolarityArbiter::new(&mutator).unwrap();
        let id = Uuid::new_v4();
        let voter = VoterId::new("v1");

        assert_eq!(
            arbiter.cancel(id, &voter, Polarity::Down).unwrap(),
            MutationOutcome::NotMatched
        );
        arbiter.cast(id, &voter, Polarity::Down).unwrap();
        assert_eq!(
            arbiter.cancel(id, &voter, Polarity::Down).unwrap(),
            MutationOutcome::Applied
        );
        assert_eq!(mutator.state(Polarity::Down), (0, Vec::new()));
    }
}
