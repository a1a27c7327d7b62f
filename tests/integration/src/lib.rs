//! Cross-crate integration tests for the Lifeline dispatch core
//!
//! This test suite validates:
//! - End-to-end incident lifecycle scenarios (trigger to resolution)
//! - The exclusive-assignment protocol under concurrent contention
//! - Freshness filtering and nearest-candidate ordering
//! - Audit-trail emission for both decision paths


#[cfg(test)]
mod dispatch_scenarios;

#[cfg(test)]
mod exclusivity_tests;
