//! Consensus engine, command applier, and the collected-responses buffer.

mod applier;
mod engine;
mod responses;

pub use engine::{ConsensusEngine, ConsensusError};
pub use responses::CollectedResponses;
