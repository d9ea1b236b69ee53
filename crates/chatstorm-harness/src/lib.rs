//! chatstorm harness library entry.
//!
//! This crate wires the transport, the simulated client sessions, the fleet
//! orchestrator, the event sink, and the protocol fuzzer into one load/fuzz
//! harness. It is consumed by the binary (`main.rs`) and by integration tests.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod cli;
pub mod config;
pub mod fuzz;
pub mod sim;
pub mod sink;
pub mod transport;
