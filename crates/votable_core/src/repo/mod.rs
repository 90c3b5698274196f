//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the atomic conditional mutation contract used by vote services.
//! - Isolate SQLite query details from service/business orchestration.
//! - Install configurable vote columns on the base schema.
//!
//! # Invariants
//! - Every vote mutation is one indivisible storage operation.
//! - Repository APIs return semantic errors (`NotFound`, `PolarityDisabled`)
//!   in addition to DB transport errors.

pub mod mutator;
pub mod schema;
pub mod votable_repo;
