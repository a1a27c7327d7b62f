//! Dispatch core for the Lifeline emergency response engine
//!
//! This crate binds panic incidents to field responders. It owns:
//! - The incident board (in-memory engine state; persistence adapters
//!   live outside this core)
//! - The dispatch coordinator and its exclusive-assignment protocol
//! - The dispatch-decision audit interface with in-memory and SQLite
//!   sinks
//!
//! # Architecture
//!
//! Requests flow through the following pipeline:
//! 1. A panic trigger creates an `active` incident on the board
//! 2. `DispatchCoordinator::assign` queries the responder index for the
//!    nearest fresh, available candidates
//! 3. Each candidate is claimed with an atomic `available → reserved`
//!    compare-and-set; exactly one racing claimant wins a unit
//! 4. The incident crosses `→ dispatched`, the reservation becomes a
//!    `busy` commitment, and a dispatch event is recorded
//! 5. Resolution returns the responder to `available` and folds the
//!    response time into its rolling average
//!
//! Manual operator dispatch takes the identical path with a single
//! operator-chosen candidate and no automatic substitution.

pub mod audit;
pub mod board;
pub mod commands;
pub mod coordinator;
pub mod error;

pub use audit::{AuditError, AuditSink, DispatchEvent, DispatchPath, MemoryAuditLog, SqliteAuditLog};
pub use board::IncidentBoard;
pub use commands::{
    Assignment, CandidateReport, CreateIncidentRequest, EmergencyProfile, ResponderPing,
};
pub use coordinator::DispatchCoordinator;
pub use error::DispatchError;
