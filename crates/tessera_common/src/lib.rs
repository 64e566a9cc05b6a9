//! Shared foundational types for the Tessera CGRA toolchain.
//!
//! This crate provides the result and error types used by every pass in the
//! core, plus the clock specification that turns a target frequency into a
//! per-pipeline-stage delay budget.

#![warn(missing_docs)]

pub mod clock;
pub mod result;

pub use clock::ClockSpec;
pub use result::{TesseraError, TesseraResult};
