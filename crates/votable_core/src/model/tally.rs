//! Net score derivation for votables.
//!
//! # Invariants
//! - Downvoting disabled: `tally == upvotes`.
//! - Downvoting enabled: `tally == upvotes - downvotes`.
//! - The value is recomputed on every read and never stored.

use crate::model::votable::{DownvoteState, Votable};

/// Pure read-side projection from stored counters to the exposed score.
#[derive(Debug, Clone, Copy, Default)]
pub struct TallyView;

impl TallyView {
    /// Returns the score exposed to consumers.
    pub fn value(votable: &Votable) -> i64 {
        match &votable.downvotes {
            DownvoteState::Disabled => votable.upvotes,
            DownvoteState::Enabled { count, .. } => votable.upvotes - count,
        }
    }
}

impl Votable {
    /// Shorthand for `TallyView::value(self)`.
    pub fn tally(&self) -> i64 {
        TallyView::value(self)
    }
}
