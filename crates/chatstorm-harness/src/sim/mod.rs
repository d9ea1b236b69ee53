//! Client simulation: generators, channel state, sessions, and the fleet.

pub mod channel;
pub mod fleet;
pub mod generator;
pub mod session;

use std::fmt;

pub use channel::{ChannelDirectory, ChannelSet, ChannelState};
pub use fleet::{FleetHandle, FleetSummary};
pub use generator::{Action, GeneratedText, MessageGenerator};
pub use session::{ClientSession, SessionOutcome, SessionPhase, SessionReport};

/// Index of a session within its fleet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub usize);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
