//! Core use-case services.
//!
//! # Responsibility
//! - Compose atomic mutations into record/cancel/cast vote operations.
//! - Keep callers decoupled from storage details.

pub mod arbiter;
pub mod canceller;
pub mod recorder;
pub mod vote_service;
