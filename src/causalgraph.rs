//! Tools for reasoning about the operation DAG: ancestry queries and diffs between
//! versions. These are pure queries - nothing here mutates the log.

use std::collections::{BinaryHeap, HashSet};

use smallvec::{smallvec, SmallVec};

use crate::frontier::{debug_assert_frontier_sorted, local_version_eq};
use crate::oplog::OpLog;
use crate::LV;

/// The diff queue tags each entry with whose history it came from. Entries reachable from
/// both sides become Shared and stop contributing to the output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum DiffFlag { OnlyA, OnlyB, Shared }

impl OpLog {
    /// The set of all operations contained in `version`: the version itself plus
    /// everything reachable through parent edges.
    #[allow(unused)]
    pub(crate) fn closure_of(&self, version: &[LV]) -> HashSet<LV> {
        let mut visited = HashSet::new();
        let mut stack: Vec<LV> = version.to_vec();
        while let Some(lv) = stack.pop() {
            if !visited.insert(lv) { continue; }
            // Parents are strictly smaller, so this terminates.
            stack.extend_from_slice(self.parents_at(lv));
        }
        visited
    }

    /// Does `version` contain (dominate) the operation `target`?
    pub fn version_contains(&self, version: &[LV], target: LV) -> bool {
        if version.contains(&target) { return true; }

        // Walk down from the version, highest LV first, discarding anything below the
        // target - an ancestor of target can never be target's descendant.
        let mut queue: BinaryHeap<LV> = version.iter().copied().filter(|&v| v > target).collect();

        while let Some(lv) = queue.pop() {
            while queue.peek() == Some(&lv) { queue.pop(); }

            for &p in self.parents_at(lv) {
                if p == target { return true; }
                if p > target { queue.push(p); }
            }
        }

        false
    }

    /// Compare two versions and return the operations only in `a`'s history and only in
    /// `b`'s history. Both result lists are sorted in descending LV order.
    ///
    /// Anything reachable from both versions is excluded, so the result is exactly the
    /// symmetric difference of the two transitive closures.
    pub(crate) fn diff(&self, a: &[LV], b: &[LV]) -> (SmallVec<[LV; 4]>, SmallVec<[LV; 4]>) {
        debug_assert_frontier_sorted(a);
        debug_assert_frontier_sorted(b);

        // Almost every call during a replay hits this case - time usually advances
        // linearly.
        if local_version_eq(a, b) { return (smallvec![], smallvec![]); }

        self.diff_slow(a, b)
    }

    fn diff_slow(&self, a: &[LV], b: &[LV]) -> (SmallVec<[LV; 4]>, SmallVec<[LV; 4]>) {
        let mut only_a = smallvec![];
        let mut only_b = smallvec![];

        // Sorted highest to lowest. The flag is part of the entry so duplicates of the
        // same LV pop adjacently and can be reconciled.
        let mut queue: BinaryHeap<(LV, DiffFlag)> = BinaryHeap::new();
        for &lv in a { queue.push((lv, DiffFlag::OnlyA)); }
        for &lv in b { queue.push((lv, DiffFlag::OnlyB)); }

        let mut num_shared_entries = 0;

        while let Some((lv, mut flag)) = queue.pop() {
            if flag == DiffFlag::Shared { num_shared_entries -= 1; }

            // Merge any other queue entries for the same operation.
            while let Some(&(peek_lv, peek_flag)) = queue.peek() {
                if peek_lv != lv { break; }
                if peek_flag != flag { flag = DiffFlag::Shared; }
                if peek_flag == DiffFlag::Shared { num_shared_entries -= 1; }
                queue.pop();
            }

            match flag {
                DiffFlag::OnlyA => only_a.push(lv),
                DiffFlag::OnlyB => only_b.push(lv),
                DiffFlag::Shared => {}
            }

            for &p in self.parents_at(lv) {
                queue.push((p, flag));
                if flag == DiffFlag::Shared { num_shared_entries += 1; }
            }

            // Once nothing but shared history remains there's no more output to find.
            if queue.len() == num_shared_entries { break; }
        }

        (only_a, only_b)
    }
}
