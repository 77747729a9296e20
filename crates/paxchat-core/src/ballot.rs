use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// A consensus round identifier: `(seq, id, op)`.
///
/// `seq` is a monotonic round counter local to the proposer, `id` is the
/// proposer's node id, `op` is the log slot the proposer expects to decide
/// next. Ballots are ordered `(op, seq, id)` — a ballot for a later slot
/// always dominates a ballot for an earlier slot, regardless of `seq`; ties
/// within a slot are broken by `seq`, then by `id`. This is deliberate: it
/// stops a stale leader with a high `seq` from re-opening an already
/// decided slot.
///
/// On the wire a ballot is the JSON array `[seq, id, op]` (see
/// `ballot_number` in the frame schema); `Ballot`'s `Serialize`/
/// `Deserialize` impls go through that tuple form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ballot {
    pub seq: i64,
    pub id: i64,
    pub op: i64,
}

impl Ballot {
    pub const NONE: Ballot = Ballot {
        seq: -1,
        id: -1,
        op: -1,
    };

    pub fn new(seq: i64, id: i64, op: i64) -> Self {
        Self { seq, id, op }
    }

    fn order_key(&self) -> (i64, i64, i64) {
        (self.op, self.seq, self.id)
    }
}

impl PartialOrd for Ballot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ballot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.order_key().cmp(&other.order_key())
    }
}

impl Default for Ballot {
    fn default() -> Self {
        Ballot::NONE
    }
}

impl From<(i64, i64, i64)> for Ballot {
    fn from((seq, id, op): (i64, i64, i64)) -> Self {
        Ballot { seq, id, op }
    }
}

impl From<Ballot> for (i64, i64, i64) {
    fn from(b: Ballot) -> Self {
        (b.seq, b.id, b.op)
    }
}

impl Serialize for Ballot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        (self.seq, self.id, self.op).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Ballot {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let (seq, id, op) = <(i64, i64, i64)>::deserialize(deserializer)?;
        Ok(Ballot { seq, id, op })
    }
}
