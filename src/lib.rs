//! Weft is a collaborative plain text editing engine. Each replica appends its edits to a
//! local operation log; logs from other replicas can be merged in at any time, in any order,
//! and every replica deterministically materialises the same document text.
//!
//! Concurrent edits are ordered by walking the operation DAG (an event graph walker), moving
//! a tracked version backwards and forwards through time and integrating each insert using
//! the Yjs ordering rule. See the [`list`] module for the main entry point.

use smallvec::SmallVec;

pub mod list;
pub mod operation;
pub mod oplog;

mod causalgraph;
mod frontier;
mod listmerge;

/// A local version (LV) names an operation by its index in the local oplog. LVs are not
/// stable across replicas - use [`operation::RemoteId`] when talking to a peer.
pub type LV = usize;

/// An agent is a replica identity. Agent names are interned; this is the index into the
/// oplog's client table.
pub type AgentId = u32;

/// A version (or frontier) is the set of operations in the DAG with no observed children.
/// Always stored sorted, smallest LV first. The empty version is the root - a document with
/// no operations at all.
pub type LocalVersion = SmallVec<[LV; 2]>;

pub use frontier::local_version_eq;
pub use list::{Branch, ListCRDT};
pub use operation::{OpKind, RemoteId, RemoteOp, TextOp};
pub use oplog::{OpLog, RemoteOpError};
