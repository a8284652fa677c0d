use crate::LV;

/// 0 = not inserted yet,
/// 1 = inserted but not deleted
/// 2+ = deleted n-1 times.
///
/// Deletes stack so that walking through two branches which both delete the same item
/// stays reversible. Double deletes almost never happen in reality - unless someone is
/// maliciously generating them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub(crate) struct ItemState(u32);

pub(crate) const NOT_INSERTED_YET: ItemState = ItemState(0);
pub(crate) const INSERTED: ItemState = ItemState(1);
pub(crate) const DELETED_ONCE: ItemState = ItemState(2);

impl ItemState {
    /// Note this doesn't (can't) set the ever_deleted flag. Use [`YjsItem::delete`] instead.
    fn delete(&mut self) {
        if *self == NOT_INSERTED_YET {
            panic!("Cannot delete an item which hasn't been inserted");
        }
        // To overflow we'd need 4 billion edits which all delete the same character.
        // Refusing to merge is more reasonable than wrapping.
        self.0 = self.0.checked_add(1)
            .expect("Double delete overflow detected. Refusing to merge.");
    }

    pub(crate) fn undelete(&mut self) {
        if self.0 >= DELETED_ONCE.0 {
            // Double delete -> single delete, or deleted -> inserted.
            self.0 -= 1;
        } else {
            panic!("Invalid undelete target");
        }
    }

    pub(crate) fn mark_inserted(&mut self) {
        if *self != NOT_INSERTED_YET {
            panic!("Invalid insert target - item already marked as inserted");
        }
        *self = INSERTED;
    }

    pub(crate) fn mark_not_inserted_yet(&mut self) {
        if *self != INSERTED {
            panic!("Invalid insert target - item not inserted");
        }
        *self = NOT_INSERTED_YET;
    }
}

/// One character's worth of CRDT metadata. The item's position in the tracker's list is
/// the total order all replicas agree on; the origins anchor that position.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) struct YjsItem {
    /// LV of the insert which created this item.
    pub lv: LV,

    /// LV of the item immediately to our left when this item was created, or usize::MAX
    /// if it was inserted at the start of the document.
    pub origin_left: LV,

    /// LV of the next item at or to the right of the insert position which the author
    /// could see (ie, not in the not-inserted-yet state), or usize::MAX for the end of
    /// the document.
    pub origin_right: LV,

    /// Whether the item has been inserted / deleted at the version the replay is
    /// currently at.
    pub state: ItemState,

    /// True once any delete has ever targeted this item. Never unset - this is what makes
    /// the item a tombstone in the materialised text.
    pub ever_deleted: bool,
}

impl YjsItem {
    pub(crate) fn delete(&mut self) {
        self.state.delete();
        self.ever_deleted = true;
    }
}
