//! The merge engine. This code walks the operation DAG and recomputes, for every
//! operation, what it meant in the context it was made in - moving the tracked version
//! backwards (retreat) and forwards (advance) through time so each operation applies
//! against exactly the document its author saw. Concurrent inserts are put into a total
//! order with the Yjs integration rule.

use std::collections::HashMap;

use crate::listmerge::yjsitem::YjsItem;
use crate::{LocalVersion, LV};

mod advance_retreat;
pub(crate) mod merge;
pub(crate) mod yjsitem;

#[cfg(feature = "dot_export")]
mod dot;

/// The replay state. One item per inserted character, in document order, tombstones
/// included. The tracker is rebuilt from scratch for each replay - it's never persisted.
#[derive(Debug, Default)]
pub(crate) struct Tracker {
    items: Vec<YjsItem>,

    /// For each delete operation (keyed by its LV), the LV of the item it deletes. Filled
    /// in the first time the delete is applied; retreat / advance look the target up here.
    del_targets: HashMap<LV, LV>,

    /// The version the replay is currently sitting at.
    cur_version: LocalVersion,
}

impl Tracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Index of the item with this LV. Items never leave the list, so a miss means the
    /// oplog is corrupt or there's a bug.
    fn find_item_idx(&self, lv: LV) -> usize {
        self.items.iter().position(|item| item.lv == lv)
            .unwrap_or_else(|| panic!("Could not find item {} in the item list", lv))
    }
}
