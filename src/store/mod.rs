//! Shared document store abstraction.
//!
//! The game has no arbitrating server: every client talks to the same
//! store, which must offer point reads, merge writes, atomic batched
//! writes, push subscriptions, and an ordered player query. [`RoomStore`]
//! captures exactly that capability set so the protocol can be tested
//! against the in-memory backend and shipped against a networked one.

pub mod error;
#[cfg(feature = "memory-store")]
pub mod memory;
pub mod models;
pub mod patch;

use futures::future::BoxFuture;
use futures::stream::BoxStream;

pub use error::{StoreError, StoreResult};
pub use models::{PlayerDoc, QuestionDoc, RoomDoc, RoomPhase, RoomStatus};
pub use patch::{BatchOp, Field, PlayerPatch, RoomPatch, WriteBatch};

/// Push subscription to a room document.
///
/// The stream yields the current snapshot immediately, then one snapshot
/// per observed change; `None` means the document does not exist (the room
/// vanished or was never created).
pub type RoomWatch = BoxStream<'static, Option<RoomDoc>>;

/// Push subscription to a room's players, ordered ascending by join time.
pub type PlayersWatch = BoxStream<'static, Vec<PlayerDoc>>;

/// Abstraction over the shared mutable document store.
///
/// Writes are last-write-wins per document with no cross-document
/// isolation; only [`RoomStore::commit`] is atomic across the documents it
/// touches, and even that is not serialized against other clients' writes.
pub trait RoomStore: Send + Sync {
    /// Create (or overwrite) the room document.
    fn create_room(&self, room: RoomDoc) -> BoxFuture<'static, StoreResult<()>>;

    /// Point-read the room document.
    fn room(&self, code: &str) -> BoxFuture<'static, StoreResult<Option<RoomDoc>>>;

    /// Merge a patch into the room document; fails when it does not exist.
    fn update_room(&self, code: &str, patch: RoomPatch) -> BoxFuture<'static, StoreResult<()>>;

    /// Create or replace a player document in the room's sub-collection.
    fn upsert_player(&self, code: &str, player: PlayerDoc)
    -> BoxFuture<'static, StoreResult<()>>;

    /// Point-read one player document.
    fn player(&self, code: &str, uid: &str)
    -> BoxFuture<'static, StoreResult<Option<PlayerDoc>>>;

    /// Merge a patch into one player document; fails when it does not exist.
    fn update_player(
        &self,
        code: &str,
        uid: &str,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StoreResult<()>>;

    /// Ordered query: all players of the room, ascending by join time.
    fn players_by_join_time(&self, code: &str)
    -> BoxFuture<'static, StoreResult<Vec<PlayerDoc>>>;

    /// Apply a batch of patches atomically across the documents it touches.
    fn commit(&self, batch: WriteBatch) -> BoxFuture<'static, StoreResult<()>>;

    /// Subscribe to the room document.
    fn watch_room(&self, code: &str) -> RoomWatch;

    /// Subscribe to the ordered players query.
    fn watch_players(&self, code: &str) -> PlayersWatch;
}
