//! Owner and asker operations on the room lifecycle.

use tracing::info;

use crate::client::CoreContext;
use crate::error::ServiceError;
use crate::services::{fetch_room, viewer_name};
use crate::state::machine::{self, RoomOp};
use crate::state::order::{current_asker, is_owner, resolve_order};
use crate::store::models::RoomPhase;

/// Start the game: freeze the order, arm the first asking deadline.
///
/// Owner-only; requires at least one player and full readiness. On a
/// precondition failure nothing is written and the reason is surfaced.
pub async fn start_room(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<(), ServiceError> {
    let room = fetch_room(ctx, code).await?;
    machine::check_op(&room, RoomOp::Start)?;

    let name = viewer_name(ctx, code, viewer_uid).await?;
    if !is_owner(&room, viewer_uid, name.as_deref()) {
        return Err(ServiceError::Unauthorized(
            "only the owner can start the game".into(),
        ));
    }

    let players = ctx.store.players_by_join_time(code).await?;
    let mut patch = machine::start_patch(&room, &players, ctx.clock.now_ms())?;

    // Rooms persisted before the ownerName field learn it on first start.
    if room.owner_name.trim().is_empty() {
        if let Some(name) = name.filter(|n| !n.trim().is_empty()) {
            patch.owner_name = Some(name);
        }
    }

    ctx.store.update_room(code, patch).await?;
    info!(%code, players = players.len(), "game started");
    Ok(())
}

/// Reset the room to the lobby, zeroing every player (owner only).
pub async fn restart_room(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<(), ServiceError> {
    let room = fetch_room(ctx, code).await?;
    let name = viewer_name(ctx, code, viewer_uid).await?;
    if !is_owner(&room, viewer_uid, name.as_deref()) {
        return Err(ServiceError::Unauthorized(
            "only the owner can restart the game".into(),
        ));
    }

    let players = ctx.store.players_by_join_time(code).await?;
    ctx.store
        .commit(machine::restart_batch(code, &players))
        .await?;
    info!(%code, "room reset to lobby");
    Ok(())
}

/// Move the room to the next turn (current asker only).
///
/// Used by the deadline scheduler for both asking timeouts and elapsed
/// reveals; verified against a fresh snapshot so a stale trigger is
/// rejected instead of double-advancing, save for the known window
/// between this check and the write.
pub async fn advance_turn(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<(), ServiceError> {
    let room = fetch_room(ctx, code).await?;
    machine::check_op(&room, RoomOp::AdvanceTurn)?;

    let players = ctx.store.players_by_join_time(code).await?;
    let order = resolve_order(&room, &players);
    if current_asker(&order, room.turn_num) != Some(viewer_uid) {
        return Err(ServiceError::Unauthorized(
            "only the current asker can advance the turn".into(),
        ));
    }

    ctx.store
        .update_room(code, machine::advance_patch(&room, ctx.clock.now_ms()))
        .await?;
    Ok(())
}

/// Skip the current asking phase without publishing a question.
pub async fn skip_turn(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<(), ServiceError> {
    let room = fetch_room(ctx, code).await?;
    if room.phase != RoomPhase::Asking {
        return Err(ServiceError::InvalidState(
            "only an asking turn can be skipped".into(),
        ));
    }
    advance_turn(ctx, code, viewer_uid).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::client::{CoreContext, Identity};
    use crate::clock::ManualClock;
    use crate::config::AppConfig;
    use crate::dto::requests::{CreateRoomRequest, JoinRoomRequest};
    use crate::services::lobby_service;
    use crate::store::memory::MemoryStore;
    use crate::store::models::RoomStatus;

    fn context() -> (CoreContext, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::at(1_000));
        let ctx = CoreContext::new(
            Arc::new(MemoryStore::new()),
            clock.clone(),
            AppConfig::default(),
        );
        (ctx, clock)
    }

    async fn lobby_with_three(
        ctx: &CoreContext,
        clock: &ManualClock,
    ) -> (String, Identity, Identity, Identity) {
        let owner = Identity::anonymous();
        let code = lobby_service::create_room(
            ctx,
            &owner,
            CreateRoomRequest {
                name: "Alice".into(),
                rounds: Some(2),
                ask_time_sec: Some(30),
                vote_time_sec: Some(20),
            },
        )
        .await
        .unwrap();

        let p2 = Identity::anonymous();
        let p3 = Identity::anonymous();
        for (identity, name) in [(&p2, "Bob"), (&p3, "Cara")] {
            clock.advance(10);
            lobby_service::join_room(
                ctx,
                identity,
                JoinRoomRequest {
                    name: name.into(),
                    code: code.clone(),
                },
            )
            .await
            .unwrap();
        }
        (code, owner, p2, p3)
    }

    async fn ready_all(ctx: &CoreContext, code: &str, uids: &[&str]) {
        for uid in uids {
            lobby_service::toggle_ready(ctx, code, uid).await.unwrap();
        }
    }

    #[tokio::test]
    async fn start_requires_owner_and_readiness() {
        let (ctx, clock) = context();
        let (code, owner, p2, _p3) = lobby_with_three(&ctx, &clock).await;

        // non-owner rejected outright
        let err = start_room(&ctx, &code, &p2.uid).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        // owner blocked until everyone is ready
        let err = start_room(&ctx, &code, &owner.uid).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn start_freezes_order_and_arms_deadline() {
        let (ctx, clock) = context();
        let (code, owner, p2, p3) = lobby_with_three(&ctx, &clock).await;
        ready_all(&ctx, &code, &[&owner.uid, &p2.uid, &p3.uid]).await;

        clock.set(5_000);
        start_room(&ctx, &code, &owner.uid).await.unwrap();

        let room = ctx.store.room(&code).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Started);
        assert_eq!(room.phase, RoomPhase::Asking);
        assert_eq!(
            room.player_order,
            Some(vec![owner.uid.clone(), p2.uid.clone(), p3.uid.clone()])
        );
        assert_eq!(room.total_turns, Some(6));
        assert_eq!(room.turn_num, 0);
        assert_eq!(room.phase_ends_at_ms, Some(5_000 + 30_000));

        // a second start is rejected by the status gate
        let err = start_room(&ctx, &code, &owner.uid).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn same_display_name_grants_owner_rights() {
        let (ctx, clock) = context();
        let (code, owner, _p2, _p3) = lobby_with_three(&ctx, &clock).await;

        // an unrelated identity joins under the owner's display name
        let impostor = Identity::anonymous();
        lobby_service::join_room(
            &ctx,
            &impostor,
            JoinRoomRequest {
                name: "Alice".into(),
                code: code.clone(),
            },
        )
        .await
        .unwrap();

        // and may restart the room, despite identity != ownerId
        assert_ne!(impostor.uid, owner.uid);
        restart_room(&ctx, &code, &impostor.uid).await.unwrap();
    }

    #[tokio::test]
    async fn restart_zeroes_players_and_room() {
        let (ctx, clock) = context();
        let (code, owner, p2, p3) = lobby_with_three(&ctx, &clock).await;
        ready_all(&ctx, &code, &[&owner.uid, &p2.uid, &p3.uid]).await;
        start_room(&ctx, &code, &owner.uid).await.unwrap();

        restart_room(&ctx, &code, &owner.uid).await.unwrap();

        let room = ctx.store.room(&code).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Waiting);
        assert_eq!(room.turn_num, 0);
        assert_eq!(room.q_counter, 0);
        assert!(room.player_order.is_none());
        for player in ctx.store.players_by_join_time(&code).await.unwrap() {
            assert_eq!(player.score, 0);
            assert!(!player.ready);
            assert!(player.last_answer_qid.is_none());
        }
    }

    #[tokio::test]
    async fn only_the_current_asker_advances() {
        let (ctx, clock) = context();
        let (code, owner, p2, p3) = lobby_with_three(&ctx, &clock).await;
        ready_all(&ctx, &code, &[&owner.uid, &p2.uid, &p3.uid]).await;
        start_room(&ctx, &code, &owner.uid).await.unwrap();

        let err = advance_turn(&ctx, &code, &p2.uid).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        skip_turn(&ctx, &code, &owner.uid).await.unwrap();
        let room = ctx.store.room(&code).await.unwrap().unwrap();
        assert_eq!(room.turn_num, 1);
        // the turn moved on: p2 is now the asker
        let err = skip_turn(&ctx, &code, &owner.uid).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
