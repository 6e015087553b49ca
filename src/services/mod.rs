//! Core operations, one module per concern.
//!
//! Every mutating operation here follows read-verify-write: fetch a fresh
//! snapshot, re-check preconditions against it, then write. The remaining
//! race windows between verify and write are known, accepted limitations
//! of the multi-writer design; no distributed lock exists to close them.

pub mod lobby_service;
pub mod room_service;
pub mod round_service;
pub mod scheduler;

use crate::client::CoreContext;
use crate::error::ServiceError;
use crate::store::models::RoomDoc;

/// Fetch the room document, mapping absence to a not-found error.
pub(crate) async fn fetch_room(ctx: &CoreContext, code: &str) -> Result<RoomDoc, ServiceError> {
    ctx.store
        .room(code)
        .await?
        .ok_or_else(|| ServiceError::room_vanished(code))
}

/// Fetch the caller's display name inside the room, if they are a player.
pub(crate) async fn viewer_name(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<Option<String>, ServiceError> {
    Ok(ctx
        .store
        .player(code, viewer_uid)
        .await?
        .map(|player| player.name))
}
