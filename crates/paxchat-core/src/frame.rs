use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ballot::Ballot;

/// The nine message kinds that travel over a framed connection. Serialized
/// with `#[serde(rename_all = "UPPERCASE")]` so the wire form matches the
/// header names exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Header {
    Propose,
    Promise,
    Accept,
    Accepted,
    Decide,
    Forward,
    Ack,
    Response,
    Kill,
}

/// The sentinel node id meaning "the relay itself" or "not applicable",
/// used for `src`/`dest`/`context_id`.
pub const NONE_ID: i64 = -1;

/// One length-prefixed JSON frame. `contexts` is the
/// sender's full context-store snapshot, piggy-backed on every frame so a
/// `DECIDE` recipient can `merge` against it; senders that have nothing
/// meaningful to report still send their current snapshot (usually empty).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub header: Header,
    #[serde(default)]
    pub message: String,
    pub ballot_number: Ballot,
    pub src: i64,
    pub dest: i64,
    #[serde(default = "default_context_id")]
    pub context_id: i64,
    #[serde(default)]
    pub contexts: HashMap<u64, String>,
}

fn default_context_id() -> i64 {
    NONE_ID
}

impl Frame {
    pub fn new(header: Header, src: i64, dest: i64, ballot_number: Ballot) -> Self {
        Frame {
            header,
            message: String::new(),
            ballot_number,
            src,
            dest,
            context_id: NONE_ID,
            contexts: HashMap::new(),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_context_id(mut self, context_id: i64) -> Self {
        self.context_id = context_id;
        self
    }

    pub fn with_contexts(mut self, contexts: HashMap<u64, String>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn kill(dest: i64) -> Self {
        Frame::new(Header::Kill, NONE_ID, dest, Ballot::NONE)
    }
}
