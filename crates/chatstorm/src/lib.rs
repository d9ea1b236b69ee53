//! Top-level facade crate for chatstorm.
//!
//! Re-exports the protocol core and the simulation harness so users can depend on a single crate.

pub mod core {
    pub use chatstorm_core::*;
}

pub mod harness {
    pub use chatstorm_harness::*;
}
