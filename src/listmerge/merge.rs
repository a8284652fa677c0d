use jumprope::JumpRopeBuf;

use crate::listmerge::yjsitem::{YjsItem, INSERTED, NOT_INSERTED_YET};
use crate::listmerge::Tracker;
use crate::operation::OpKind;
use crate::oplog::OpLog;
use crate::LV;

impl Tracker {
    /// Find the item index for a document position, as seen from the version the replay
    /// is currently at.
    ///
    /// Two positions are tracked while scanning: `cur_pos` counts items visible at the
    /// current version (state inserted), and `end_pos` counts items visible in the
    /// materialised output (anything that isn't a tombstone). Returns `(idx, end_pos)`
    /// for the leftmost index with exactly `target_pos` visible items to its left.
    fn walk_to_pos(&self, target_pos: usize) -> (usize, usize) {
        let mut idx = 0;
        let mut cur_pos = 0;
        let mut end_pos = 0;
        while cur_pos < target_pos {
            let item = self.items.get(idx).unwrap_or_else(|| {
                panic!("Walked past the end of the item list (looking for position {})", target_pos)
            });
            if item.state == INSERTED { cur_pos += 1; }
            if !item.ever_deleted { end_pos += 1; }
            idx += 1;
        }
        (idx, end_pos)
    }

    /// Apply an operation for the first time. The tracked version must already have been
    /// moved (via retreat / advance) to the op's parents, so the position the author
    /// wrote down resolves against the document they actually saw.
    ///
    /// If `to` is set, the op's effect on the materialised text is spliced in as well.
    pub(super) fn apply_op(&mut self, oplog: &OpLog, lv: LV, to: Option<&mut JumpRopeBuf>) {
        let op = oplog.ops[lv].op;
        match op.kind {
            OpKind::Ins => {
                let content = op.content.expect("Insert operation missing content");
                let (idx, end_pos) = self.walk_to_pos(op.pos);

                let origin_left = if idx == 0 {
                    usize::MAX
                } else {
                    let left = &self.items[idx - 1];
                    // The walk only stops after counting an inserted item, so anything
                    // else here means the op's position is malformed.
                    assert_eq!(left.state, INSERTED,
                        "Item to the left of insert {} is not in the inserted state", lv);
                    left.lv
                };

                // Origin right is the next item the author could see: the first one at or
                // after the insert position which isn't in the not-inserted-yet state.
                let origin_right = self.items[idx..].iter()
                    .find(|item| item.state != NOT_INSERTED_YET)
                    .map_or(usize::MAX, |item| item.lv);

                let item = YjsItem {
                    lv,
                    origin_left,
                    origin_right,
                    state: INSERTED,
                    ever_deleted: false,
                };
                let end_pos = self.integrate(oplog, item, idx, end_pos);

                if let Some(to) = to {
                    let mut buf = [0u8; 4];
                    to.insert(end_pos, content.encode_utf8(&mut buf));
                }
            }

            OpKind::Del => {
                let (mut idx, mut end_pos) = self.walk_to_pos(op.pos);

                // Skip anything not visible at the current version - concurrent inserts
                // the retreat pass has rewound, and items already deleted here. The
                // first visible item is the one the author deleted.
                loop {
                    let item = self.items.get(idx).unwrap_or_else(|| {
                        panic!("Walked past the end of the item list (deleting at position {})", op.pos)
                    });
                    if item.state == INSERTED { break; }
                    if !item.ever_deleted { end_pos += 1; }
                    idx += 1;
                }

                // Pin the target down so retreat / advance can find it again.
                self.del_targets.insert(lv, self.items[idx].lv);

                let item = &mut self.items[idx];
                if !item.ever_deleted {
                    if let Some(to) = to {
                        to.remove(end_pos..end_pos + 1);
                    }
                }
                item.delete();
            }
        }
    }

    /// Slot a freshly inserted item in amongst its concurrent siblings.
    ///
    /// `idx` / `end_pos` from the position walk are the preferred spot. Everything
    /// between there and the item's origin right which is in the not-inserted-yet state
    /// is an insert we're concurrent with; scan across them comparing origins to decide
    /// who sits to the left of whom. Both sides of any race run this same comparison
    /// with globally meaningful inputs, which is what makes the ordering converge.
    ///
    /// Returns the output position the new item's content surfaces at.
    fn integrate(&mut self, oplog: &OpLog, new_item: YjsItem, mut idx: usize, mut end_pos: usize) -> usize {
        let mut scan_idx = idx;
        let mut scan_end_pos = end_pos;

        let left = idx as isize - 1;
        let right = if new_item.origin_right == usize::MAX {
            self.items.len()
        } else {
            self.find_item_idx(new_item.origin_right)
        };

        let mut scanning = false;

        while scan_idx < right {
            let other = &self.items[scan_idx];

            // Only items not yet inserted at this version can be concurrent with the new
            // item. Anything else keeps its spot.
            if other.state != NOT_INSERTED_YET { break; }

            let other_left = if other.origin_left == usize::MAX {
                -1
            } else {
                self.find_item_idx(other.origin_left) as isize
            };
            let other_right = if other.origin_right == usize::MAX {
                self.items.len()
            } else {
                self.find_item_idx(other.origin_right)
            };

            if other_left < left { break; }

            if other_left == left && other_right == right {
                // Identical origins. Order by agent name.
                let my_name = oplog.get_agent_name(oplog.ops[new_item.lv].agent);
                let other_name = oplog.get_agent_name(oplog.ops[other.lv].agent);
                // An agent's own operations are never concurrent with each other, so
                // identical origins imply distinct agents.
                debug_assert_ne!(my_name, other_name);
                if my_name < other_name { break; }
            }

            if other_left == left {
                // Provisionally after `other`, but a later sibling can still send us
                // back to the last committed spot.
                scanning = other_right < right;
            }

            if !other.ever_deleted { scan_end_pos += 1; }
            scan_idx += 1;

            if !scanning {
                idx = scan_idx;
                end_pos = scan_end_pos;
            }
        }

        self.items.insert(idx, new_item);
        end_pos
    }

    /// Replay an entire oplog from scratch, in log order. For each operation the tracked
    /// version is moved to the op's parents (retreating and advancing over the diff) and
    /// the op is applied there. If `to` is given, it ends up holding the materialised
    /// document text.
    ///
    /// The result depends only on the operations in the log: two logs holding the same
    /// DAG in different orders replay to identical text.
    pub(crate) fn walk(&mut self, oplog: &OpLog, mut to: Option<&mut JumpRopeBuf>) {
        for lv in 0..oplog.len() {
            let (a_only, b_only) = oplog.diff(&self.cur_version, oplog.parents_at(lv));

            // Retreat in descending LV order so an item's deletes unwind before the
            // insert which created it. The diff comes back descending already.
            for &retreat_lv in &a_only {
                self.retreat_by(oplog, retreat_lv);
            }
            // And advance in ascending order, for the same reason in reverse.
            for &advance_lv in b_only.iter().rev() {
                self.advance_by(oplog, advance_lv);
            }

            self.apply_op(oplog, lv, to.as_deref_mut());

            self.cur_version.clear();
            self.cur_version.push(lv);
        }
    }
}

#[cfg(test)]
mod test {
    use jumprope::JumpRopeBuf;

    use crate::listmerge::Tracker;
    use crate::oplog::OpLog;

    fn replay(oplog: &OpLog) -> String {
        let mut content = JumpRopeBuf::new();
        let mut tracker = Tracker::new();
        tracker.walk(oplog, Some(&mut content));
        content.to_string()
    }

    #[test]
    fn linear_edits() {
        let mut oplog = OpLog::new();
        let agent = oplog.get_or_create_agent_id("seph");
        oplog.add_insert(agent, 0, "hi");
        oplog.add_insert(agent, 2, "!");
        assert_eq!(replay(&oplog), "hi!");
    }

    #[test]
    fn concurrent_inserts_order_by_agent() {
        // Two agents typing at an empty document. Lower agent name wins the left spot,
        // regardless of which op sits earlier in the log.
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "A");
        oplog.add_insert_at(b, &[], 0, "B");
        assert_eq!(replay(&oplog), "AB");

        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(b, &[], 0, "B");
        oplog.add_insert_at(a, &[], 0, "A");
        assert_eq!(replay(&oplog), "AB");
    }

    #[test]
    fn concurrent_runs_dont_interleave() {
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "hi");
        oplog.add_insert_at(b, &[], 0, "yo");
        assert_eq!(replay(&oplog), "hiyo");
    }

    #[test]
    fn delete_with_concurrent_insert_in_the_hole() {
        // "abc", then one branch deletes 'b' while another inserts X right after it.
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "abc"); // 0, 1, 2
        oplog.add_delete_at(a, &[2], 1..2); // 3
        oplog.add_insert_at(b, &[2], 2, "X"); // 4
        assert_eq!(replay(&oplog), "aXc");

        // Same DAG with the concurrent branches in the other log order.
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "abc"); // 0, 1, 2
        oplog.add_insert_at(b, &[2], 2, "X"); // 3
        oplog.add_delete_at(a, &[2], 1..2); // 4
        assert_eq!(replay(&oplog), "aXc");
    }

    #[test]
    fn concurrent_double_delete_converges() {
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "x"); // 0
        oplog.add_delete_at(a, &[0], 0..1); // 1
        oplog.add_delete_at(b, &[0], 0..1); // 2, concurrent with 1
        assert_eq!(replay(&oplog), "");
    }

    #[test]
    fn insert_after_merge_lands_at_the_end() {
        let mut oplog = OpLog::new();
        let a = oplog.get_or_create_agent_id("a");
        let b = oplog.get_or_create_agent_id("b");
        oplog.add_insert_at(a, &[], 0, "hi"); // 0, 1
        oplog.add_insert_at(b, &[], 0, "yo"); // 2, 3
        oplog.add_insert_at(b, &[1, 3], 4, "x"); // 4, sees the merged "hiyo"
        assert_eq!(replay(&oplog), "hiyox");
    }

    #[test]
    #[should_panic(expected = "past the end")]
    fn bad_position_panics() {
        let mut oplog = OpLog::new();
        let agent = oplog.get_or_create_agent_id("a");
        oplog.add_insert(agent, 5, "x");
        replay(&oplog);
    }
}
