//! The document facade: an oplog plus a cached checkout of the text. This is the API most
//! hosts want - type into it, merge other replicas into it, read the text back out.

use jumprope::JumpRopeBuf;

use crate::listmerge::Tracker;
use crate::oplog::{OpLog, RemoteOpError};
use crate::AgentId;

/// A checkout of the document text at some version.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Branch {
    pub content: JumpRopeBuf,
}

impl Branch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.content.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn text(&self) -> String {
        self.content.to_string()
    }
}

impl OpLog {
    /// Replay the whole log into a fresh branch.
    pub fn checkout(&self) -> Branch {
        let mut branch = Branch::new();
        let mut tracker = Tracker::new();
        tracker.walk(self, Some(&mut branch.content));
        branch
    }
}

/// A collaboratively editable text document, bound to one local agent.
///
/// Local edits go through the fast path: they're appended to the oplog and spliced
/// straight into the cached branch, with no replay. That's sound because a local edit
/// always extends the current frontier. Merging a peer replays the merged log from
/// scratch and replaces the branch.
#[derive(Debug, Clone)]
pub struct ListCRDT {
    pub oplog: OpLog,
    pub branch: Branch,
    agent: AgentId,
}

impl ListCRDT {
    pub fn new(agent_name: &str) -> Self {
        let mut oplog = OpLog::new();
        let agent = oplog.get_or_create_agent_id(agent_name);
        Self { oplog, branch: Branch::new(), agent }
    }

    pub fn len(&self) -> usize {
        self.branch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branch.is_empty()
    }

    pub fn text(&self) -> String {
        self.branch.text()
    }

    /// Type `content` in at character position `pos`.
    pub fn insert(&mut self, pos: usize, content: &str) {
        if content.is_empty() { return; }
        assert!(pos <= self.branch.len(), "Insert position out of range");

        self.oplog.add_insert(self.agent, pos, content);
        self.branch.content.insert(pos, content);
    }

    /// Delete `len` characters starting at `pos`.
    pub fn delete(&mut self, pos: usize, len: usize) {
        if len == 0 { return; }
        assert!(pos + len <= self.branch.len(), "Delete range out of range");

        self.oplog.add_delete(self.agent, pos..pos + len);
        self.branch.content.remove(pos..pos + len);
    }

    /// Pull in everything `other` knows that we don't, then rebuild the branch by
    /// replaying the merged log. Merging is commutative and idempotent - once two
    /// replicas have merged each other, their text is identical.
    pub fn merge_from(&mut self, other: &ListCRDT) -> Result<usize, RemoteOpError> {
        let merged = self.oplog.merge_from(&other.oplog)?;
        if merged > 0 {
            self.branch = self.oplog.checkout();
        }
        Ok(merged)
    }

    /// Replay the oplog and compare against the cached branch. Panics on a mismatch,
    /// which would mean a local edit was made against a stale frontier (or there's a
    /// bug). This does a full replay - debugging only.
    pub fn check(&self) {
        let expected = self.oplog.checkout();
        assert_eq!(expected.content, self.branch.content,
            "Branch content is out of sync with the oplog");
    }

    /// Check internal invariants. For debugging and fuzzing.
    pub fn dbg_check(&self, deep: bool) {
        self.oplog.dbg_check(deep);
        if deep {
            self.check();
        }
    }
}
