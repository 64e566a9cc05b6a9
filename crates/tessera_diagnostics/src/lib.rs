//! Diagnostic reporting for the Tessera CGRA toolchain.
//!
//! Passes report non-fatal findings (a combinational span no register
//! placement can fix, a merge sweep that rejected every candidate) as
//! [`Diagnostic`]s emitted into a [`DiagnosticSink`]. Fatal conditions are
//! errors, not diagnostics; see `tessera_common`.

#![warn(missing_docs)]

pub mod diagnostic;
pub mod severity;
pub mod sink;

pub use diagnostic::Diagnostic;
pub use severity::Severity;
pub use sink::DiagnosticSink;
