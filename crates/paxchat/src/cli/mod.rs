//! CLI plumbing for the two binaries, gated behind the `cli` feature.

pub mod config;
pub mod logging;
pub mod relay;
pub mod run;
