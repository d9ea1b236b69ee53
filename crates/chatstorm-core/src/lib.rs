//! chatstorm core: transport-agnostic frame codec, envelope model, and errors.
//!
//! This crate defines the wire-level contracts shared by the simulated
//! clients and the protocol fuzzer. It carries no transport or runtime
//! dependencies so the codec can be exercised from plain unit tests and
//! reused from any I/O stack.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Hostile server traffic must surface as `HarnessError`/`Result`, never as a
//! crashed harness.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod protocol;

/// Shared result type.
pub use error::{ErrorKind, HarnessError, Result};
