//! Per-client runtime: identity, shared context, and the room session.
//!
//! A [`RoomSession`] is what a connected client holds while inside a room:
//! push subscriptions mirrored into watch channels, the deadline scheduler,
//! and the completion watcher that settles a fully-answered question. All
//! user intents delegate to the services, which re-verify preconditions
//! against fresh snapshots before writing.

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::clock::SharedClock;
use crate::config::AppConfig;
use crate::dto::requests::QuestionInput;
use crate::dto::view::RoomView;
use crate::error::ServiceError;
use crate::services::{lobby_service, room_service, round_service, scheduler};
use crate::state::order::resolve_order;
use crate::store::RoomStore;
use crate::store::models::{PlayerDoc, RoomDoc, RoomPhase, RoomStatus};

/// Stable per-session identity, issued before any room operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque identity key; the player document id.
    pub uid: String,
}

impl Identity {
    /// Create a fresh anonymous identity.
    pub fn anonymous() -> Self {
        Self {
            uid: Uuid::new_v4().simple().to_string(),
        }
    }
}

/// Shared handles every core operation needs: the store, the clock, and
/// the runtime configuration.
#[derive(Clone)]
pub struct CoreContext {
    /// Shared document store all clients coordinate through.
    pub store: Arc<dyn RoomStore>,
    /// Wall clock backing deadline computation.
    pub clock: SharedClock,
    /// Runtime configuration.
    pub config: AppConfig,
}

impl CoreContext {
    /// Bundle the store, clock, and configuration into a context.
    pub fn new(store: Arc<dyn RoomStore>, clock: SharedClock, config: AppConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }
}

/// A client's live connection to one room.
///
/// Dropping (or [`RoomSession::leave`]-ing) the session aborts its local
/// tasks only; authoritative deadlines live in the shared state and keep
/// driving the other clients.
pub struct RoomSession {
    ctx: CoreContext,
    identity: Identity,
    code: String,
    room_rx: watch::Receiver<Option<RoomDoc>>,
    players_rx: watch::Receiver<Vec<PlayerDoc>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RoomSession {
    /// Subscribe to a room and spawn the session's background tasks.
    ///
    /// Fails with a not-found error when the room does not exist, sending
    /// the caller back to the lobby.
    pub async fn enter(
        ctx: CoreContext,
        identity: Identity,
        code: impl Into<String>,
    ) -> Result<Self, ServiceError> {
        let code = code.into();
        let Some(initial_room) = ctx.store.room(&code).await? else {
            return Err(ServiceError::room_vanished(&code));
        };
        let initial_players = ctx.store.players_by_join_time(&code).await?;

        let (room_tx, room_rx) = watch::channel(Some(initial_room));
        let (players_tx, players_rx) = watch::channel(initial_players);

        let mut tasks = Vec::new();

        // Mirror the push subscriptions into the watch caches.
        let mut room_stream = ctx.store.watch_room(&code);
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = room_stream.next().await {
                if room_tx.send(snapshot).is_err() {
                    break;
                }
            }
        }));
        let mut players_stream = ctx.store.watch_players(&code);
        tasks.push(tokio::spawn(async move {
            while let Some(snapshot) = players_stream.next().await {
                if players_tx.send(snapshot).is_err() {
                    break;
                }
            }
        }));

        // Deadline scheduler: the local periodic evaluator.
        tasks.push(tokio::spawn(scheduler::run(
            ctx.clone(),
            identity.clone(),
            code.clone(),
            room_rx.clone(),
            players_rx.clone(),
        )));

        // Completion watcher: the asker settles as soon as every voter has
        // answered, without waiting for the deadline.
        tasks.push(tokio::spawn(completion_watcher(
            ctx.clone(),
            identity.clone(),
            code.clone(),
            room_rx.clone(),
            players_rx.clone(),
        )));

        Ok(Self {
            ctx,
            identity,
            code,
            room_rx,
            players_rx,
            tasks,
        })
    }

    /// Room code this session is attached to.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Identity this session acts as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Latest room snapshot; `None` means the room vanished.
    pub fn room(&self) -> Option<RoomDoc> {
        self.room_rx.borrow().clone()
    }

    /// Latest players snapshot, ascending by join time.
    pub fn players(&self) -> Vec<PlayerDoc> {
        self.players_rx.borrow().clone()
    }

    /// Watch handle over the room snapshot, for render loops.
    pub fn watch_room(&self) -> watch::Receiver<Option<RoomDoc>> {
        self.room_rx.clone()
    }

    /// Watch handle over the players snapshot, for render loops.
    pub fn watch_players(&self) -> watch::Receiver<Vec<PlayerDoc>> {
        self.players_rx.clone()
    }

    /// Project the current render frame, or `None` once the room vanished.
    pub fn view(&self) -> Option<RoomView> {
        let room = self.room()?;
        Some(RoomView::project(
            &room,
            &self.players(),
            self.ctx.clock.now_ms(),
        ))
    }

    /// Toggle this player's lobby readiness.
    pub async fn toggle_ready(&self) -> Result<(), ServiceError> {
        lobby_service::toggle_ready(&self.ctx, &self.code, &self.identity.uid).await
    }

    /// Start the game (owner only).
    pub async fn start(&self) -> Result<(), ServiceError> {
        room_service::start_room(&self.ctx, &self.code, &self.identity.uid).await
    }

    /// Reset the room back to the lobby (owner only).
    pub async fn restart(&self) -> Result<(), ServiceError> {
        room_service::restart_room(&self.ctx, &self.code, &self.identity.uid).await
    }

    /// Publish a question for the current turn (asker only).
    pub async fn publish_question(&self, input: QuestionInput) -> Result<String, ServiceError> {
        round_service::publish_question(&self.ctx, &self.code, &self.identity.uid, input).await
    }

    /// Submit an answer to the live question (voters only).
    pub async fn submit_answer(&self, chosen_index: u8) -> Result<(), ServiceError> {
        round_service::submit_answer(&self.ctx, &self.code, &self.identity.uid, chosen_index).await
    }

    /// Skip the current asking phase without publishing (asker only).
    pub async fn skip_turn(&self) -> Result<(), ServiceError> {
        room_service::skip_turn(&self.ctx, &self.code, &self.identity.uid).await
    }

    /// Leave the room: cancel local tasks, keep shared state untouched.
    pub fn leave(self) {}
}

impl Drop for RoomSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Settle the live question as soon as the last voter answers.
///
/// Runs on every room snapshot; only the asker's client acts, and the
/// settle service re-verifies against a fresh snapshot, so a duplicate
/// trigger degrades into a rejected precondition.
async fn completion_watcher(
    ctx: CoreContext,
    identity: Identity,
    code: String,
    mut room_rx: watch::Receiver<Option<RoomDoc>>,
    players_rx: watch::Receiver<Vec<PlayerDoc>>,
) {
    loop {
        let should_settle = {
            let room = room_rx.borrow_and_update();
            match room.as_ref() {
                Some(room) => settles_now(room, &players_rx.borrow(), &identity.uid),
                // Room vanished: nothing left to watch.
                None => break,
            }
        };

        if should_settle {
            match round_service::settle_and_reveal(&ctx, &code, &identity.uid).await {
                Ok(()) => debug!(%code, "settled after full participation"),
                // Lost the race to another trigger, or the phase moved on.
                Err(ServiceError::InvalidState(reason)) => {
                    debug!(%code, %reason, "settle skipped")
                }
                Err(err) => warn!(%code, error = %err, "settle after full participation failed"),
            }
        }

        if room_rx.changed().await.is_err() {
            break;
        }
    }
}

/// Whether this viewer should settle the current question right now.
fn settles_now(room: &RoomDoc, players: &[PlayerDoc], viewer_uid: &str) -> bool {
    if room.status != RoomStatus::Started || room.phase != RoomPhase::Voting {
        return false;
    }
    let Some(question) = room.current_question.as_ref() else {
        return false;
    };
    if question.settled || question.reveal || question.asker_id != viewer_uid {
        return false;
    }
    let order = resolve_order(room, players);
    round_service::voting_complete(question, &order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::dto::requests::{CreateRoomRequest, JoinRoomRequest};
    use crate::services::lobby_service;
    use crate::state::machine::REVEAL_HOLD_MS;
    use crate::store::memory::MemoryStore;

    #[test]
    fn anonymous_identities_are_unique() {
        let a = Identity::anonymous();
        let b = Identity::anonymous();
        assert_ne!(a, b);
        assert!(!a.uid.is_empty());
    }

    async fn wait_until<F>(ctx: &CoreContext, code: &str, mut predicate: F)
    where
        F: FnMut(&RoomDoc) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                if let Some(room) = ctx.store.room(code).await.unwrap() {
                    if predicate(&room) {
                        break;
                    }
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .expect("room never reached the expected state");
    }

    /// Full client wiring: the asker's completion watcher settles once all
    /// voters answered, the reveal expiry advances the turn, and an asking
    /// timeout skips a turn where nobody publishes.
    #[tokio::test(start_paused = true)]
    async fn sessions_drive_settle_and_deadline_advances() {
        let clock = Arc::new(ManualClock::at(1_000));
        let ctx = CoreContext::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            AppConfig::default(),
        );

        let p1 = Identity::anonymous();
        let code = lobby_service::create_room(
            &ctx,
            &p1,
            CreateRoomRequest {
                name: "P1".into(),
                rounds: Some(1),
                ask_time_sec: Some(30),
                vote_time_sec: Some(20),
            },
        )
        .await
        .unwrap();

        let p2 = Identity::anonymous();
        let p3 = Identity::anonymous();
        for (identity, name) in [(&p2, "P2"), (&p3, "P3")] {
            clock.advance(10);
            lobby_service::join_room(
                &ctx,
                identity,
                JoinRoomRequest {
                    name: name.into(),
                    code: code.clone(),
                },
            )
            .await
            .unwrap();
        }

        let s1 = RoomSession::enter(ctx.clone(), p1.clone(), code.clone())
            .await
            .unwrap();
        let s2 = RoomSession::enter(ctx.clone(), p2.clone(), code.clone())
            .await
            .unwrap();
        let s3 = RoomSession::enter(ctx.clone(), p3.clone(), code.clone())
            .await
            .unwrap();

        for session in [&s1, &s2, &s3] {
            session.toggle_ready().await.unwrap();
        }
        s1.start().await.unwrap();

        s1.publish_question(QuestionInput {
            text: "Pick the bluff".into(),
            options: ["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index: 1,
        })
        .await
        .unwrap();
        s2.submit_answer(1).await.unwrap();
        s3.submit_answer(0).await.unwrap();

        // full participation: s1's completion watcher settles on its own
        wait_until(&ctx, &code, |room| {
            room.current_question.as_ref().is_some_and(|q| q.settled && q.reveal)
        })
        .await;

        // scores applied exactly once: P2 +1, P3 +0, P1 +1
        let players = ctx.store.players_by_join_time(&code).await.unwrap();
        let score = |uid: &str| players.iter().find(|p| p.uid == uid).unwrap().score;
        assert_eq!(score(&p2.uid), 1);
        assert_eq!(score(&p3.uid), 0);
        assert_eq!(score(&p1.uid), 1);

        // reveal window elapses: s1's scheduler advances the turn
        clock.advance(REVEAL_HOLD_MS + 1);
        wait_until(&ctx, &code, |room| {
            room.turn_num == 1 && room.phase == RoomPhase::Asking && room.current_question.is_none()
        })
        .await;

        // nobody publishes: the asking deadline expires and p2's scheduler
        // skips their turn
        clock.advance(31_000);
        wait_until(&ctx, &code, |room| room.turn_num == 2).await;

        s1.leave();
        s2.leave();
        s3.leave();
    }
}
