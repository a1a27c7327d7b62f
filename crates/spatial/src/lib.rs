//! Spatial matching for the Lifeline dispatch core
//!
//! This crate owns the two location-aware pieces of the engine:
//! - `geodesic`: great-circle distance and point-in-polygon over WGS84
//!   degrees (straight-line distance is the matching metric; routing is
//!   out of scope)
//! - `index`: the live responder roster — positions, availability,
//!   freshness filtering, nearest-candidate queries, and the atomic
//!   reservation step of the exclusivity protocol
//!
//! The roster is the single owner of shared responder state. Every
//! mutation goes through [`ResponderIndex`]; no other component holds
//! responder records.

pub mod geodesic;
pub mod index;

pub use index::{Candidate, IndexError, ResponderIndex};
