use crate::mapping::Entity;

/// Merge-patch support: only fields present in the patch replace stored ones.
pub trait Merge: Entity {
    type Patch: Send + 'static;

    fn patch_id(patch: &Self::Patch) -> Option<i64>;

    /// Overlays every present field of `patch` onto `self`.
    fn merge(&mut self, patch: Self::Patch);
}

/// Replaces `slot` when the patch carries a value.
pub fn overlay<V>(slot: &mut V, incoming: Option<V>) {
    if let Some(value) = incoming {
        *slot = value;
    }
}

/// Like [`overlay`] for nullable columns; a missing value never clears the slot.
pub fn overlay_nullable<V>(slot: &mut Option<V>, incoming: Option<V>) {
    if incoming.is_some() {
        *slot = incoming;
    }
}
