//! Reference in-memory store backend.
//!
//! Serves the tests and the simulation binary. Mutations are serialized
//! behind a single gate so batches observe the same atomicity a networked
//! backend promises; subscribers receive full snapshots, first the current
//! one and then one per change, which makes lagging receivers trivially
//! recoverable.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_stream::stream;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::store::error::{StoreError, StoreResult};
use crate::store::models::{PlayerDoc, RoomDoc};
use crate::store::patch::{BatchOp, PlayerPatch, RoomPatch, WriteBatch};
use crate::store::{PlayersWatch, RoomStore, RoomWatch};

/// Broadcast capacity per room; snapshots are self-contained so a lagged
/// receiver only needs the latest one.
const TOPIC_CAPACITY: usize = 64;

/// Fan-out channels for one room code.
struct Topic {
    room_tx: broadcast::Sender<Option<RoomDoc>>,
    players_tx: broadcast::Sender<Vec<PlayerDoc>>,
}

impl Default for Topic {
    fn default() -> Self {
        Self {
            room_tx: broadcast::channel(TOPIC_CAPACITY).0,
            players_tx: broadcast::channel(TOPIC_CAPACITY).0,
        }
    }
}

struct Inner {
    rooms: DashMap<String, RoomDoc>,
    players: DashMap<String, HashMap<String, PlayerDoc>>,
    topics: DashMap<String, Topic>,
    /// Serializes mutations so a committed batch is observed all-or-nothing.
    write_gate: Mutex<()>,
}

/// In-memory [`RoomStore`] implementation.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            inner: Arc::new(Inner {
                rooms: DashMap::new(),
                players: DashMap::new(),
                topics: DashMap::new(),
                write_gate: Mutex::new(()),
            }),
        }
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Inner {
    fn room_snapshot(&self, code: &str) -> Option<RoomDoc> {
        self.rooms.get(code).map(|entry| entry.value().clone())
    }

    fn players_snapshot(&self, code: &str) -> Vec<PlayerDoc> {
        let mut list: Vec<PlayerDoc> = self
            .players
            .get(code)
            .map(|entry| entry.values().cloned().collect())
            .unwrap_or_default();
        list.sort_by(|a, b| {
            a.joined_at_ms
                .cmp(&b.joined_at_ms)
                .then_with(|| a.uid.cmp(&b.uid))
        });
        list
    }

    fn publish_room(&self, code: &str) {
        if let Some(topic) = self.topics.get(code) {
            let _ = topic.room_tx.send(self.room_snapshot(code));
        }
    }

    fn publish_players(&self, code: &str) {
        if let Some(topic) = self.topics.get(code) {
            let _ = topic.players_tx.send(self.players_snapshot(code));
        }
    }

    fn apply_room_patch(&self, code: &str, patch: RoomPatch) -> StoreResult<()> {
        let mut entry = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| StoreError::missing(format!("rooms/{code}")))?;
        patch.apply(&mut entry);
        Ok(())
    }

    fn apply_player_patch(&self, code: &str, uid: &str, patch: PlayerPatch) -> StoreResult<()> {
        let mut entry = self
            .players
            .get_mut(code)
            .ok_or_else(|| StoreError::missing(format!("rooms/{code}/players/{uid}")))?;
        let player = entry
            .get_mut(uid)
            .ok_or_else(|| StoreError::missing(format!("rooms/{code}/players/{uid}")))?;
        patch.apply(player);
        Ok(())
    }
}

impl RoomStore for MemoryStore {
    fn create_room(&self, room: RoomDoc) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        async move {
            let code = room.code.clone();
            let _gate = inner.write_gate.lock().unwrap_or_else(|e| e.into_inner());
            inner.rooms.insert(code.clone(), room);
            inner.players.entry(code.clone()).or_default();
            inner.publish_room(&code);
            Ok(())
        }
        .boxed()
    }

    fn room(&self, code: &str) -> BoxFuture<'static, StoreResult<Option<RoomDoc>>> {
        let inner = self.inner.clone();
        let code = code.to_owned();
        async move { Ok(inner.room_snapshot(&code)) }.boxed()
    }

    fn update_room(&self, code: &str, patch: RoomPatch) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let code = code.to_owned();
        async move {
            let _gate = inner.write_gate.lock().unwrap_or_else(|e| e.into_inner());
            inner.apply_room_patch(&code, patch)?;
            inner.publish_room(&code);
            Ok(())
        }
        .boxed()
    }

    fn upsert_player(
        &self,
        code: &str,
        player: PlayerDoc,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let code = code.to_owned();
        async move {
            let _gate = inner.write_gate.lock().unwrap_or_else(|e| e.into_inner());
            inner
                .players
                .entry(code.clone())
                .or_default()
                .insert(player.uid.clone(), player);
            inner.publish_players(&code);
            Ok(())
        }
        .boxed()
    }

    fn player(
        &self,
        code: &str,
        uid: &str,
    ) -> BoxFuture<'static, StoreResult<Option<PlayerDoc>>> {
        let inner = self.inner.clone();
        let code = code.to_owned();
        let uid = uid.to_owned();
        async move {
            Ok(inner
                .players
                .get(&code)
                .and_then(|entry| entry.get(&uid).cloned()))
        }
        .boxed()
    }

    fn update_player(
        &self,
        code: &str,
        uid: &str,
        patch: PlayerPatch,
    ) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        let code = code.to_owned();
        let uid = uid.to_owned();
        async move {
            let _gate = inner.write_gate.lock().unwrap_or_else(|e| e.into_inner());
            inner.apply_player_patch(&code, &uid, patch)?;
            inner.publish_players(&code);
            Ok(())
        }
        .boxed()
    }

    fn players_by_join_time(
        &self,
        code: &str,
    ) -> BoxFuture<'static, StoreResult<Vec<PlayerDoc>>> {
        let inner = self.inner.clone();
        let code = code.to_owned();
        async move { Ok(inner.players_snapshot(&code)) }.boxed()
    }

    fn commit(&self, batch: WriteBatch) -> BoxFuture<'static, StoreResult<()>> {
        let inner = self.inner.clone();
        async move {
            let mut touched_rooms = Vec::new();
            let mut touched_players = Vec::new();
            let _gate = inner.write_gate.lock().unwrap_or_else(|e| e.into_inner());
            // Validate every target first so a failed batch changes nothing.
            for op in batch.ops() {
                match op {
                    BatchOp::UpdateRoom { code, .. } => {
                        if !inner.rooms.contains_key(code) {
                            return Err(StoreError::missing(format!("rooms/{code}")));
                        }
                    }
                    BatchOp::UpdatePlayer { code, uid, .. } => {
                        let present = inner
                            .players
                            .get(code)
                            .is_some_and(|entry| entry.contains_key(uid));
                        if !present {
                            return Err(StoreError::missing(format!(
                                "rooms/{code}/players/{uid}"
                            )));
                        }
                    }
                }
            }
            for op in batch.into_ops() {
                match op {
                    BatchOp::UpdateRoom { code, patch } => {
                        inner.apply_room_patch(&code, patch)?;
                        if !touched_rooms.contains(&code) {
                            touched_rooms.push(code);
                        }
                    }
                    BatchOp::UpdatePlayer { code, uid, patch } => {
                        inner.apply_player_patch(&code, &uid, patch)?;
                        if !touched_players.contains(&code) {
                            touched_players.push(code);
                        }
                    }
                }
            }
            // Subscribers see the batch all at once: players first so a room
            // snapshot never references scores that have not landed yet.
            for code in touched_players {
                inner.publish_players(&code);
            }
            for code in touched_rooms {
                inner.publish_room(&code);
            }
            Ok(())
        }
        .boxed()
    }

    fn watch_room(&self, code: &str) -> RoomWatch {
        let inner = self.inner.clone();
        let code = code.to_owned();
        let rx = inner.topics.entry(code.clone()).or_default().room_tx.subscribe();
        Box::pin(stream! {
            let mut updates = BroadcastStream::new(rx);
            yield inner.room_snapshot(&code);
            while let Some(item) = updates.next().await {
                match item {
                    Ok(snapshot) => yield snapshot,
                    // Lagged: resync from the latest state and keep going.
                    Err(_) => yield inner.room_snapshot(&code),
                }
            }
        })
    }

    fn watch_players(&self, code: &str) -> PlayersWatch {
        let inner = self.inner.clone();
        let code = code.to_owned();
        let rx = inner
            .topics
            .entry(code.clone())
            .or_default()
            .players_tx
            .subscribe();
        Box::pin(stream! {
            let mut updates = BroadcastStream::new(rx);
            yield inner.players_snapshot(&code);
            while let Some(item) = updates.next().await {
                match item {
                    Ok(snapshot) => yield snapshot,
                    Err(_) => yield inner.players_snapshot(&code),
                }
            }
        })
    }
}
