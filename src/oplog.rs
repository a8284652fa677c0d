//! The oplog is an append-only store of every operation this replica has ever seen, local
//! or remote. Each operation gets a local version (its index in the log) and remembers its
//! parents - the frontier the operation was made at. Together the parents form the
//! operation DAG that the merge code walks.

use std::fmt::{Display, Formatter};
use std::ops::Range;

use smallvec::SmallVec;
use smartstring::alias::String as SmartString;

use crate::frontier::{advance_frontier, clean_version, frontier_is_sorted};
use crate::operation::{OpKind, RemoteId, RemoteOp, TextOp};
use crate::{AgentId, LocalVersion, LV};

/// Everything we know about one agent: its name and the LV of each of its operations,
/// indexed by sequence number. Sequence numbers are dense (the gap check below enforces
/// it), so a plain Vec doubles as the seq -> LV map and the per-agent high water mark.
#[derive(Debug, Clone)]
pub(crate) struct ClientData {
    pub(crate) name: SmartString,
    pub(crate) lv_for_seq: Vec<LV>,
}

impl ClientData {
    pub(crate) fn next_seq(&self) -> usize {
        self.lv_for_seq.len()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct OpEntry {
    pub(crate) op: TextOp,
    pub(crate) agent: AgentId,
    pub(crate) seq: usize,
    /// The frontier of the originating replica just before this op was made. Sorted.
    /// Every parent LV is strictly smaller than the op's own LV.
    pub(crate) parents: LocalVersion,
}

#[derive(Debug, Clone, Default)]
pub struct OpLog {
    pub(crate) client_data: Vec<ClientData>,
    pub(crate) ops: Vec<OpEntry>,
    /// The current frontier - the set of operations with no children yet.
    pub(crate) version: LocalVersion,
}

/// Ways appending a remote operation can fail. Either way the oplog is left untouched, so
/// a caller can fix up its transport and retry.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum RemoteOpError {
    /// A parent (or the op itself, during version translation) names an operation we've
    /// never seen. The sender must deliver causally - parents first.
    UnknownId(RemoteId),
    /// The op skips ahead of the next sequence number we expect from its agent.
    SeqGap { agent: SmartString, expected: usize, got: usize },
}

impl Display for RemoteOpError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteOpError::UnknownId(id) => {
                write!(f, "unknown operation id ({}, {})", id.agent, id.seq)
            }
            RemoteOpError::SeqGap { agent, expected, got } => {
                write!(f, "sequence gap for agent {}: expected seq {}, got {}", agent, expected, got)
            }
        }
    }
}

impl std::error::Error for RemoteOpError {}

impl OpLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn get_or_create_agent_id(&mut self, name: &str) -> AgentId {
        if let Some(id) = self.get_agent_id(name) {
            id
        } else {
            self.client_data.push(ClientData {
                name: SmartString::from(name),
                lv_for_seq: Vec::new(),
            });
            (self.client_data.len() - 1) as AgentId
        }
    }

    pub(crate) fn get_agent_id(&self, name: &str) -> Option<AgentId> {
        self.client_data.iter()
            .position(|client_data| client_data.name == name)
            .map(|id| id as AgentId)
    }

    pub fn get_agent_name(&self, agent: AgentId) -> &str {
        self.client_data[agent as usize].name.as_str()
    }

    /// A reference to the current frontier.
    pub fn local_version_ref(&self) -> &[LV] {
        &self.version
    }

    pub(crate) fn parents_at(&self, lv: LV) -> &[LV] {
        &self.ops[lv].parents
    }

    /// Append an operation with the given parents. The caller is responsible for the
    /// parents being a valid (sorted, in-bounds) version.
    fn push_op_internal(&mut self, agent: AgentId, parents: LocalVersion, op: TextOp) -> LV {
        let lv = self.ops.len();
        debug_assert!(frontier_is_sorted(&parents));
        debug_assert!(parents.iter().all(|&p| p < lv));

        let seq = self.client_data[agent as usize].next_seq();
        self.client_data[agent as usize].lv_for_seq.push(lv);

        advance_frontier(&mut self.version, lv, &parents);
        self.ops.push(OpEntry { op, agent, seq, parents });
        lv
    }

    /// Insert `content` at `pos`, with explicit parents. One operation is recorded per
    /// character; each subsequent character is parented on the previous one.
    ///
    /// Returns the LV of the last character inserted.
    pub fn add_insert_at(&mut self, agent: AgentId, parents: &[LV], pos: usize, content: &str) -> LV {
        assert!(!content.is_empty());
        let mut parents: LocalVersion = parents.into();
        clean_version(&mut parents);

        let mut pos = pos;
        let mut last_lv = 0;
        for c in content.chars() {
            last_lv = self.push_op_internal(agent, parents.clone(), TextOp::new_insert(pos, c));
            parents.clear();
            parents.push(last_lv);
            pos += 1;
        }
        last_lv
    }

    /// Delete the characters at `range`, with explicit parents. One operation per
    /// character, all at the same position - after the first delete the following
    /// characters shuffle left into it.
    pub fn add_delete_at(&mut self, agent: AgentId, parents: &[LV], range: Range<usize>) -> LV {
        assert!(!range.is_empty());
        let mut parents: LocalVersion = parents.into();
        clean_version(&mut parents);

        let mut last_lv = 0;
        for _ in range.clone() {
            last_lv = self.push_op_internal(agent, parents.clone(), TextOp::new_delete(range.start));
            parents.clear();
            parents.push(last_lv);
        }
        last_lv
    }

    /// Insert at the current frontier. Returns the LV of the last character inserted.
    pub fn add_insert(&mut self, agent: AgentId, pos: usize, content: &str) -> LV {
        let frontier = self.version.clone();
        self.add_insert_at(agent, &frontier, pos, content)
    }

    /// Delete at the current frontier. Returns the LV of the last delete.
    pub fn add_delete(&mut self, agent: AgentId, range: Range<usize>) -> LV {
        let frontier = self.version.clone();
        self.add_delete_at(agent, &frontier, range)
    }

    // *** Remote ID conversion ***

    pub fn lv_to_remote_id(&self, lv: LV) -> RemoteId {
        let entry = &self.ops[lv];
        RemoteId {
            agent: self.get_agent_name(entry.agent).into(),
            seq: entry.seq,
        }
    }

    pub fn remote_id_to_lv(&self, id: &RemoteId) -> Result<LV, RemoteOpError> {
        let agent = self.get_agent_id(&id.agent)
            .ok_or_else(|| RemoteOpError::UnknownId(id.clone()))?;
        self.client_data[agent as usize].lv_for_seq.get(id.seq)
            .copied()
            .ok_or_else(|| RemoteOpError::UnknownId(id.clone()))
    }

    pub fn local_to_remote_version(&self, version: &[LV]) -> SmallVec<[RemoteId; 2]> {
        version.iter().map(|&lv| self.lv_to_remote_id(lv)).collect()
    }

    pub fn remote_to_local_version<'a, I: Iterator<Item = &'a RemoteId>>(&self, ids: I) -> Result<LocalVersion, RemoteOpError> {
        let mut version: LocalVersion = ids
            .map(|id| self.remote_id_to_lv(id))
            .collect::<Result<_, _>>()?;
        clean_version(&mut version);
        Ok(version)
    }

    /// The operation at `lv` in portable form.
    pub fn remote_op_at(&self, lv: LV) -> RemoteOp {
        let entry = &self.ops[lv];
        RemoteOp {
            id: self.lv_to_remote_id(lv),
            parents: entry.parents.iter().map(|&p| self.lv_to_remote_id(p)).collect(),
            op: entry.op,
        }
    }

    /// All operations in portable form, in log order. Log order is causally sound: an
    /// op's parents always precede it.
    pub fn iter_remote_ops(&self) -> impl Iterator<Item = RemoteOp> + '_ {
        (0..self.ops.len()).map(|lv| self.remote_op_at(lv))
    }

    // *** Appending remote changes ***

    /// Append an operation received from another replica.
    ///
    /// Returns `Ok(Some(lv))` if the op was appended, `Ok(None)` if we already had it (a
    /// duplicate is not an error - merging is idempotent). On `Err` the oplog is
    /// unchanged.
    pub fn push_remote_op(&mut self, op: &RemoteOp) -> Result<Option<LV>, RemoteOpError> {
        let next_seq = self.get_agent_id(&op.id.agent)
            .map_or(0, |agent| self.client_data[agent as usize].next_seq());

        if op.id.seq < next_seq {
            // Already have this operation.
            return Ok(None);
        }
        if op.id.seq > next_seq {
            return Err(RemoteOpError::SeqGap {
                agent: op.id.agent.clone(),
                expected: next_seq,
                got: op.id.seq,
            });
        }

        // Translate the parents before touching anything so a failure leaves the log
        // unchanged.
        let parents = self.remote_to_local_version(op.parents.iter())?;
        let agent = self.get_or_create_agent_id(&op.id.agent);
        Ok(Some(self.push_op_internal(agent, parents, op.op)))
    }

    /// Absorb every operation from `other` that we don't have yet. Returns the number of
    /// newly added operations.
    pub fn merge_from(&mut self, other: &OpLog) -> Result<usize, RemoteOpError> {
        let mut merged = 0;
        for lv in 0..other.len() {
            let op = other.remote_op_at(lv);
            if self.push_remote_op(&op)?.is_some() {
                merged += 1;
            }
        }
        Ok(merged)
    }

    /// Check the internal invariants of the oplog. This is for debugging and fuzzing; any
    /// failure here is a bug.
    pub fn dbg_check(&self, deep: bool) {
        // The frontier must match a from-scratch recomputation.
        let mut expected: LocalVersion = Default::default();
        for (lv, entry) in self.ops.iter().enumerate() {
            assert!(frontier_is_sorted(&entry.parents));
            assert!(entry.parents.iter().all(|&p| p < lv), "parent cycle at {}", lv);
            advance_frontier(&mut expected, lv, &entry.parents);
        }
        assert_eq!(self.version, expected);

        // The client tables and the op entries must agree.
        for (agent, client) in self.client_data.iter().enumerate() {
            for (seq, &lv) in client.lv_for_seq.iter().enumerate() {
                assert_eq!(self.ops[lv].agent, agent as AgentId);
                assert_eq!(self.ops[lv].seq, seq);
            }
        }

        if deep {
            for entry in &self.ops {
                // Inserts carry content, deletes don't.
                assert_eq!(entry.op.kind == OpKind::Ins, entry.op.content.is_some());
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_smoke_test() {
        let mut oplog = OpLog::new();
        let seph = oplog.get_or_create_agent_id("seph");
        let mike = oplog.get_or_create_agent_id("mike");
        oplog.add_insert_at(seph, &[], 0, "hi");
        oplog.add_insert_at(mike, &[], 0, "yooo");

        assert_eq!(0, oplog.remote_id_to_lv(&RemoteId { agent: "seph".into(), seq: 0 }).unwrap());
        assert_eq!(1, oplog.remote_id_to_lv(&RemoteId { agent: "seph".into(), seq: 1 }).unwrap());
        assert_eq!(2, oplog.remote_id_to_lv(&RemoteId { agent: "mike".into(), seq: 0 }).unwrap());

        for lv in 0..oplog.len() {
            let id = oplog.lv_to_remote_id(lv);
            let expect_lv = oplog.remote_id_to_lv(&id).unwrap();
            assert_eq!(lv, expect_lv);
        }

        oplog.dbg_check(true);
    }

    #[test]
    fn remote_push_duplicate_is_noop() {
        let mut a = OpLog::new();
        let agent = a.get_or_create_agent_id("a");
        a.add_insert(agent, 0, "x");

        let op = a.remote_op_at(0);

        let mut b = OpLog::new();
        assert_eq!(b.push_remote_op(&op).unwrap(), Some(0));
        assert_eq!(b.push_remote_op(&op).unwrap(), None);
        assert_eq!(b.len(), 1);
        b.dbg_check(true);
    }

    #[test]
    fn remote_push_rejects_gaps() {
        let mut a = OpLog::new();
        let agent = a.get_or_create_agent_id("a");
        a.add_insert(agent, 0, "xy");

        let mut b = OpLog::new();
        // Sending seq 1 before seq 0.
        let err = b.push_remote_op(&a.remote_op_at(1)).unwrap_err();
        assert_eq!(err, RemoteOpError::SeqGap { agent: "a".into(), expected: 0, got: 1 });
        assert!(b.is_empty());
    }

    #[test]
    fn remote_push_rejects_unknown_parents() {
        let mut b = OpLog::new();
        let b_agent = b.get_or_create_agent_id("b");
        b.add_insert(b_agent, 0, "y");

        // An op parented on b's insert, sent to a log which has never seen b.
        let mut victim = OpLog::new();
        let op = RemoteOp {
            id: RemoteId { agent: "c".into(), seq: 0 },
            parents: b.local_to_remote_version(b.local_version_ref()),
            op: TextOp::new_insert(1, 'z'),
        };
        let err = victim.push_remote_op(&op).unwrap_err();
        assert!(matches!(err, RemoteOpError::UnknownId(_)));
        assert!(victim.is_empty());
    }

    #[test]
    fn merge_is_idempotent() {
        let mut a = OpLog::new();
        let agent = a.get_or_create_agent_id("a");
        a.add_insert(agent, 0, "abc");

        let mut b = OpLog::new();
        assert_eq!(b.merge_from(&a).unwrap(), 3);
        assert_eq!(b.merge_from(&a).unwrap(), 0);
        assert_eq!(b.len(), 3);
        assert!(local_version_eq_logs(&a, &b));
        b.dbg_check(true);
    }

    fn local_version_eq_logs(a: &OpLog, b: &OpLog) -> bool {
        a.local_to_remote_version(a.local_version_ref())
            == b.local_to_remote_version(b.local_version_ref())
    }

    #[test]
    fn concurrent_ops_widen_frontier() {
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "x");
        oplog.add_insert_at(b, &[], 0, "y");
        assert_eq!(oplog.local_version_ref(), &[0, 1]);

        oplog.add_insert_at(a, &[0, 1], 0, "z");
        assert_eq!(oplog.local_version_ref(), &[2]);
        oplog.dbg_check(true);
    }
}
