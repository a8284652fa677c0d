use crate::listmerge::Tracker;
use crate::operation::OpKind;
use crate::oplog::OpLog;
use crate::LV;

impl Tracker {
    /// LV of the item an operation acts on: the item itself for an insert, or the
    /// recorded target for a delete. Only valid for operations which have already been
    /// applied once - that's when a delete's target is pinned down.
    fn op_target(&self, oplog: &OpLog, lv: LV) -> (OpKind, LV) {
        match oplog.ops[lv].op.kind {
            OpKind::Ins => (OpKind::Ins, lv),
            OpKind::Del => (OpKind::Del, self.del_targets[&lv]),
        }
    }

    /// Replay the effect of an operation we've rewound past: the item becomes inserted
    /// again, or picks its delete back up.
    pub(super) fn advance_by(&mut self, oplog: &OpLog, lv: LV) {
        let (kind, target) = self.op_target(oplog, lv);
        let idx = self.find_item_idx(target);
        let item = &mut self.items[idx];
        match kind {
            OpKind::Ins => item.state.mark_inserted(),
            // ever_deleted is already set; delete() just bumps the state.
            OpKind::Del => item.delete(),
        }
    }

    /// Un-apply an operation, moving the tracked version backwards past it. The caller
    /// must retreat in descending LV order so an item's deletes are unwound before the
    /// insert which created it.
    pub(super) fn retreat_by(&mut self, oplog: &OpLog, lv: LV) {
        let (kind, target) = self.op_target(oplog, lv);
        let idx = self.find_item_idx(target);
        let item = &mut self.items[idx];
        match kind {
            OpKind::Ins => item.state.mark_not_inserted_yet(),
            OpKind::Del => item.state.undelete(),
        }
    }
}
