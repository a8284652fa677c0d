//! Helpers for manipulating versions (frontiers). A frontier names a point in the DAG by
//! listing the operations with no observed children at that point.

use crate::{LocalVersion, LV};

/// Frontiers should always be sorted smallest to largest.
pub(crate) fn frontier_is_sorted(frontier: &[LV]) -> bool {
    if frontier.len() >= 2 {
        let mut last = frontier[0];
        for v in &frontier[1..] {
            debug_assert!(*v != last);
            if last > *v { return false; }
            last = *v;
        }
    }
    true
}

pub(crate) fn debug_assert_frontier_sorted(frontier: &[LV]) {
    debug_assert!(frontier_is_sorted(frontier));
}

/// Sort a version in place if it isn't sorted already. Used when collecting parents
/// translated from remote IDs, which can arrive in any order.
pub(crate) fn clean_version(version: &mut LocalVersion) {
    if !frontier_is_sorted(version) {
        version.sort_unstable();
    }
}

pub(crate) fn add_to_frontier(frontier: &mut LocalVersion, new_item: LV) {
    // Binary search might actually be slower here than a linear scan, but frontiers are
    // almost always tiny either way.
    let new_idx = frontier.binary_search(&new_item).unwrap_err();
    frontier.insert(new_idx, new_item);
    debug_assert_frontier_sorted(frontier);
}

/// Advance a frontier by a single operation: remove the operation's parents, add the
/// operation itself, and keep the result sorted.
pub(crate) fn advance_frontier(frontier: &mut LocalVersion, new_lv: LV, parents: &[LV]) {
    debug_assert!(!frontier.contains(&new_lv));
    debug_assert_frontier_sorted(frontier);

    if parents.len() == 1 && frontier.len() == 1 && parents[0] == frontier[0] {
        // Short circuit the common case where time is just advancing linearly.
        frontier[0] = new_lv;
        return;
    } else if frontier.as_slice() == parents {
        frontier.clear();
        frontier.push(new_lv);
        return;
    }

    frontier.retain(|v| !parents.contains(v)); // Usually removes all elements.
    add_to_frontier(frontier, new_lv);
}

pub fn local_version_eq(a: &[LV], b: &[LV]) -> bool {
    // Frontiers are canonically sorted, so plain slice equality is set equality.
    debug_assert_frontier_sorted(a);
    debug_assert_frontier_sorted(b);
    a == b
}

#[cfg(test)]
mod test {
    use smallvec::smallvec;

    use super::*;

    #[test]
    fn frontier_movement_smoke_tests() {
        let mut frontier: LocalVersion = smallvec![];
        advance_frontier(&mut frontier, 0, &[]);
        assert_eq!(frontier.as_slice(), &[0]);

        advance_frontier(&mut frontier, 1, &[0]);
        assert_eq!(frontier.as_slice(), &[1]);

        // A concurrent operation from the root widens the frontier.
        advance_frontier(&mut frontier, 2, &[]);
        assert_eq!(frontier.as_slice(), &[1, 2]);

        // And a merge operation collapses it again.
        advance_frontier(&mut frontier, 3, &[1, 2]);
        assert_eq!(frontier.as_slice(), &[3]);
    }

    #[test]
    fn frontier_stays_sorted() {
        let mut frontier: LocalVersion = smallvec![1, 10];
        advance_frontier(&mut frontier, 11, &[10]);
        assert_eq!(frontier.as_slice(), &[1, 11]);

        advance_frontier(&mut frontier, 12, &[2]);
        assert_eq!(frontier.as_slice(), &[1, 11, 12]);
    }

    #[test]
    fn version_equality() {
        assert!(local_version_eq(&[], &[]));
        assert!(local_version_eq(&[1, 2], &[1, 2]));
        assert!(!local_version_eq(&[1], &[2]));
        assert!(!local_version_eq(&[1], &[1, 2]));
    }

    #[test]
    fn clean_version_sorts() {
        let mut version: LocalVersion = smallvec![5, 2, 9];
        clean_version(&mut version);
        assert_eq!(version.as_slice(), &[2, 5, 9]);
    }
}
