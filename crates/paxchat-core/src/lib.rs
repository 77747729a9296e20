//! # paxchat-core
//!
//! Dependency-light foundation for the `paxchat` consensus crate: the
//! ballot ordering, the command grammar decided log entries are written
//! in, the framed wire message, and shared error/validation types.
//!
//! Kept separate from `paxchat` so the wire format and command grammar can
//! be depended on (e.g. by a future operator CLI or HTTP surface) without
//! pulling in the transport, relay or consensus engine.

pub mod ballot;
pub mod command;
pub mod error;
pub mod frame;
pub mod validation;

pub use ballot::Ballot;
pub use command::{Command, CommandError};
pub use error::CoreError;
pub use frame::{Frame, Header, NONE_ID};
pub use validation::{ValidationError, ValidationResult};
