//! Operation types: the insert / delete payload recorded in the oplog, and the portable
//! forms used when shipping operations to another replica.

use std::fmt::{Display, Formatter};

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Is this operation an insert or a delete?
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OpKind { Ins, Del }

impl Default for OpKind {
    fn default() -> Self { OpKind::Ins } // Arbitrary.
}

impl Display for OpKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OpKind::Ins => f.write_str("Ins"),
            OpKind::Del => f.write_str("Del"),
        }
    }
}

/// A single edit, as its author expressed it. `pos` is the character position in the
/// document *at the time the operation was made*, from the author's point of view.
///
/// Operations always cover exactly one character. Runs of typing are stored as one
/// operation per character, each parented on the previous one.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextOp {
    pub kind: OpKind,
    pub pos: usize,
    /// The inserted character. `Some` if and only if `kind == Ins`.
    #[cfg_attr(feature = "serde", serde(default))]
    pub content: Option<char>,
}

impl TextOp {
    pub fn new_insert(pos: usize, content: char) -> Self {
        TextOp { kind: OpKind::Ins, pos, content: Some(content) }
    }

    pub fn new_delete(pos: usize) -> Self {
        TextOp { kind: OpKind::Del, pos, content: None }
    }
}

/// The globally unique name of an operation: the agent which created it and that agent's
/// sequence number. These are the IDs you can pass to a remote peer - unlike LVs, which
/// only make sense in the oplog that assigned them.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteId {
    pub agent: SmartString,
    pub seq: usize,
}

/// An operation in portable form, ready to send over the wire. Parents are named by ID;
/// the receiving oplog looks them up locally. A stream of these is causally sound as long
/// as every op's parents are sent before the op itself - sending a log in its natural
/// order always satisfies that.
#[derive(Debug, Clone, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RemoteOp {
    pub id: RemoteId,
    pub parents: SmallVec<[RemoteId; 2]>,
    pub op: TextOp,
}
