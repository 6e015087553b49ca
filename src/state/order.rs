//! Turn order resolution and owner lookup.

use crate::store::models::{PlayerDoc, RoomDoc};

/// Resolve the asker sequence for a room.
///
/// Once the game has started the frozen `playerOrder` is returned verbatim.
/// Before that the players are ordered by ascending join time, which is a
/// display-only preview of what the frozen order will be.
pub fn resolve_order(room: &RoomDoc, players: &[PlayerDoc]) -> Vec<String> {
    if let Some(order) = room.player_order.as_ref() {
        if !order.is_empty() {
            return order.clone();
        }
    }
    let mut preview: Vec<&PlayerDoc> = players.iter().collect();
    preview.sort_by(|a, b| {
        a.joined_at_ms
            .cmp(&b.joined_at_ms)
            .then_with(|| a.uid.cmp(&b.uid))
    });
    preview.iter().map(|p| p.uid.clone()).collect()
}

/// The asker for the given turn: `order[turn mod |order|]`.
pub fn current_asker(order: &[String], turn_num: u32) -> Option<&str> {
    if order.is_empty() {
        return None;
    }
    let index = (turn_num as usize) % order.len();
    Some(order[index].as_str())
}

/// Which of the two owner keys matched a viewer.
///
/// Ownership is a tagged two-strategy lookup, not a merged key: a viewer is
/// the owner either because their identity equals `ownerId`, or because
/// their trimmed display name equals the room's trimmed `ownerName` (both
/// non-empty). The name strategy is legacy-compatibility behavior carried
/// over deliberately; it also grants owner rights to an unrelated player
/// who picked the same display name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnerMatch {
    /// Matched on the stable identity key.
    ByIdentity,
    /// Matched on the legacy display-name fallback.
    ByDisplayName,
}

/// Look up which owner strategy, if any, matches the viewer.
pub fn owner_match(
    room: &RoomDoc,
    viewer_uid: &str,
    viewer_name: Option<&str>,
) -> Option<OwnerMatch> {
    if room.owner_id == viewer_uid {
        return Some(OwnerMatch::ByIdentity);
    }
    let owner_name = room.owner_name.trim();
    let viewer_name = viewer_name.map(str::trim).unwrap_or_default();
    if !owner_name.is_empty() && !viewer_name.is_empty() && owner_name == viewer_name {
        return Some(OwnerMatch::ByDisplayName);
    }
    None
}

/// Whether the viewer holds owner rights over the room.
pub fn is_owner(room: &RoomDoc, viewer_uid: &str, viewer_name: Option<&str>) -> bool {
    owner_match(room, viewer_uid, viewer_name).is_some()
}
