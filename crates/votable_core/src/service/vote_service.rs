//! Vote use-case service.
//!
//! # Responsibility
//! - Provide the public upvote/downvote/cancel/tally entry points.
//! - Validate voter ids against the resolved schema before storage calls and
//!   hand only their canonical form to storage.
//! - Route casts through `PolarityArbiter` when downvoting is enabled.
//!
//! # Invariants
//! - Service APIs never bypass the recorder/canceller/arbiter contracts.
//! - `NotMatched` outcomes are returned as values, never as errors.
//! - Storage errors surface unchanged inside `VoteError::Storage`.

use crate::model::tally::TallyView;
use crate::model::votable::{Polarity, Votable, VotableId, VoterId};
use crate::repo::mutator::{AtomicMutator, MutationOutcome};
use crate::repo::votable_repo::{RepoError, VotableListQuery, VotableRepository};
use crate::service::arbiter::{CastOutcome, PolarityArbiter};
use crate::service::canceller::VoteCanceller;
use crate::service::recorder::VoteRecorder;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Errors from vote use-cases.
#[derive(Debug)]
pub enum VoteError {
    /// Storage failure, propagated unchanged and never retried.
    Storage(RepoError),
    /// Polarity is not enabled for this deployment.
    PolarityDisabled(Polarity),
    /// Voter id does not have the configured shape.
    InvalidVoterId(String),
    /// The opposite vote was cleared (or found absent) but recording the
    /// requested polarity failed. The voter currently holds no vote of
    /// `polarity`; reconciling is up to the caller.
    PartialArbitration {
        polarity: Polarity,
        opposite_cleared: MutationOutcome,
        source: RepoError,
    },
}

impl Display for VoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Storage(err) => write!(f, "{err}"),
            Self::PolarityDisabled(polarity) => {
                write!(f, "{polarity}votes are disabled for this schema")
            }
            Self::InvalidVoterId(value) => write!(f, "invalid voter id: `{value}`"),
            Self::PartialArbitration {
                polarity,
                opposite_cleared,
                source,
            } => write!(
                f,
                "{polarity}vote not recorded after opposite cancel ({}): {source}",
                opposite_cleared.as_str()
            ),
        }
    }
}

impl Error for VoteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::PartialArbitration { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<RepoError> for VoteError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::PolarityDisabled(polarity) => Self::PolarityDisabled(polarity),
            other => Self::Storage(other),
        }
    }
}

/// Vote service facade over a repository that is also an atomic mutator.
pub struct VoteService<R: VotableRepository + AtomicMutator> {
    repo: R,
}

impl<R: VotableRepository + AtomicMutator> VoteService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates a votable with empty vote fields and a generated id.
    pub fn create_votable(&self) -> Result<VotableId, VoteError> {
        let id = self.repo.create_votable(Uuid::new_v4())?;
        info!("event=votable_create module=service status=ok votable={id}");
        Ok(id)
    }

    pub fn get_votable(&self, id: VotableId) -> Result<Option<Votable>, VoteError> {
        Ok(self.repo.get_votable(id)?)
    }

    pub fn list_votables(&self, query: &VotableListQuery) -> Result<Vec<Votable>, VoteError> {
        Ok(self.repo.list_votables(query)?)
    }

    /// Deletes a votable and every vote it carries.
    pub fn delete_votable(&self, id: VotableId) -> Result<(), VoteError> {
        self.repo.delete_votable(id)?;
        info!("event=votable_delete module=service status=ok votable={id}");
        Ok(())
    }

    /// Casts an upvote.
    ///
    /// # Contract
    /// - Downvoting enabled: clears any downvote first (two atomic steps).
    /// - Downvoting disabled: plain record, `opposite_cleared = None`.
    pub fn upvote(&self, id: VotableId, voter: &VoterId) -> Result<CastOutcome, VoteError> {
        let voter = self.canonical_voter(voter)?;
        if self.repo.schema().downvotes_enabled() {
            return PolarityArbiter::new(&self.repo)?.cast(id, &voter, Polarity::Up);
        }

        let recorded = VoteRecorder::new(&self.repo).record(id, &voter, Polarity::Up)?;
        Ok(CastOutcome {
            opposite_cleared: None,
            recorded,
        })
    }

    /// Casts a downvote, clearing any upvote first.
    pub fn downvote(&self, id: VotableId, voter: &VoterId) -> Result<CastOutcome, VoteError> {
        let voter = self.canonical_voter(voter)?;
        PolarityArbiter::new(&self.repo)?.cast(id, &voter, Polarity::Down)
    }

    pub fn cancel_upvote(
        &self,
        id: VotableId,
        voter: &VoterId,
    ) -> Result<MutationOutcome, VoteError> {
        let voter = self.canonical_voter(voter)?;
        Ok(VoteCanceller::new(&self.repo).cancel(id, &voter, Polarity::Up)?)
    }

    pub fn cancel_downvote(
        &self,
        id: VotableId,
        voter: &VoterId,
    ) -> Result<MutationOutcome, VoteError> {
        let voter = self.canonical_voter(voter)?;
        PolarityArbiter::new(&self.repo)?.cancel(id, &voter, Polarity::Down)
    }

    /// Returns the derived tally, or `None` for an unknown votable.
    pub fn tally(&self, id: VotableId) -> Result<Option<i64>, VoteError> {
        Ok(self.repo.get_votable(id)?.as_ref().map(TallyView::value))
    }

    pub fn has_upvoted(&self, id: VotableId, voter: &VoterId) -> Result<bool, VoteError> {
        self.has_voted(id, voter, Polarity::Up)
    }

    pub fn has_downvoted(&self, id: VotableId, voter: &VoterId) -> Result<bool, VoteError> {
        if !self.repo.schema().downvotes_enabled() {
            return Err(VoteError::PolarityDisabled(Polarity::Down));
        }
        self.has_voted(id, voter, Polarity::Down)
    }

    fn has_voted(
        &self,
        id: VotableId,
        voter: &VoterId,
        polarity: Polarity,
    ) -> Result<bool, VoteError> {
        let voter = self.canonical_voter(voter)?;
        let votable = self
            .repo
            .get_votable(id)?
            .ok_or(RepoError::NotFound(id))?;
        Ok(votable.has_voted(polarity, &voter))
    }

    fn canonical_voter(&self, voter: &VoterId) -> Result<VoterId, VoteError> {
        if let Some(canonical) = self.repo.schema().canonical_voter(voter) {
            return Ok(canonical);
        }
        warn!(
            "event=vote_rejected module=service status=error error_code=invalid_voter_id voter={}",
            voter.log_prefix()
        );
        Err(VoteError::InvalidVoterId(voter.to_string()))
    }
}
