//! Request handlers.

pub mod interest;
pub mod mining;
