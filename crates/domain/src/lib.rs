//! Domain model for the Lifeline emergency dispatch engine.
//!
//! This crate defines the records the dispatch core operates on and the
//! pure logic attached to them:
//! - Incident and Responder entities with closed status enumerations
//! - The incident lifecycle state machine and its transition guards
//! - The bounded trail recorder for breadcrumbs and responder trails
//! - Response-time and ETA metrics
//!
//! Incident and Responder reference each other by identifier only; the
//! records are resolved through their owning stores, never through
//! embedded pointers.

pub mod incident;
pub mod metrics;
pub mod responder;
pub mod state_machine;
pub mod trail;
pub mod types;

pub use incident::{
    Breadcrumb, DeviceInfo, Incident, IncidentSnapshot, IncidentStatus, Severity, TrailPoint,
    TriggerKind,
};
pub use responder::{Responder, ResponderKind, ResponderStatus};
pub use state_machine::StateError;
pub use trail::TrailRecorder;
pub use types::{Coordinate, Region};
