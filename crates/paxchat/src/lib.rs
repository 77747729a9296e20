//! # paxchat
//!
//! A star-topology relay and a leader-based multi-decree consensus node
//! that replicate a log of commands mutating per-node "context" text
//! buffers, with an external text generator reached through the
//! [`generator::Generator`] trait.
//!
//! - [`transport`] — length-prefixed JSON framing over TCP.
//! - [`relay`] — the central forwarder and its simulated connectivity
//!   matrix.
//! - [`store`] — the per-node context store.
//! - [`consensus`] — ballots, leader election, accept/decide, the
//!   applier.
//! - [`ingress`] — the FIFO pending-operations queue.
//! - [`generator`] — the external text-generator contract.
//! - [`node`] — wires the above into a runnable node.
//! - [`config`] — layered TOML/env/CLI configuration.
//! - [`util`] — decision logging.
//! - [`cli`] — binary entry points (feature `cli`).

pub mod config;
pub mod consensus;
pub mod generator;
pub mod ingress;
pub mod node;
pub mod relay;
pub mod store;
pub mod transport;
pub mod util;

#[cfg(feature = "cli")]
pub mod cli;
