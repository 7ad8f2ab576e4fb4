//! # platopia-tests
//!
//! Integration tests for the Platopia node core:
//! - Template assembly scenarios over a live mempool
//! - Mining coordinator life cycle, work deprecation and submission
//! - The interest and pool-protocol API surface

pub mod harness;

#[cfg(test)]
mod template_tests;

#[cfg(test)]
mod mining_tests;

#[cfg(test)]
mod interest_api_tests;

pub use harness::*;
