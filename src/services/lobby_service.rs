//! Lobby operations: creating, joining, and readying up.

use tracing::info;
use validator::Validate;

use crate::client::{CoreContext, Identity};
use crate::dto::requests::{CreateRoomRequest, JoinRoomRequest};
use crate::error::ServiceError;
use crate::services::fetch_room;
use crate::state::codes;
use crate::state::machine::{clamp_rounds, clamp_time_sec};
use crate::store::models::{PlayerDoc, RoomDoc, RoomPhase, RoomStatus};
use crate::store::patch::PlayerPatch;

/// Create a fresh room and register its creator as the first player.
///
/// The room code is generated client-side without a uniqueness check;
/// returns the code for the caller to share.
pub async fn create_room(
    ctx: &CoreContext,
    identity: &Identity,
    request: CreateRoomRequest,
) -> Result<String, ServiceError> {
    request.validate()?;
    let name = request.name.trim().to_owned();
    let defaults = &ctx.config.room_defaults;
    let rounds = clamp_rounds(request.rounds.unwrap_or(defaults.rounds));
    let ask_time_sec = clamp_time_sec(request.ask_time_sec.unwrap_or(defaults.ask_time_sec));
    let vote_time_sec = clamp_time_sec(request.vote_time_sec.unwrap_or(defaults.vote_time_sec));

    let code = codes::generate();
    let now_ms = ctx.clock.now_ms();

    let room = RoomDoc {
        code: code.clone(),
        owner_id: identity.uid.clone(),
        owner_name: name.clone(),
        created_at_ms: now_ms,
        status: RoomStatus::Waiting,
        phase: RoomPhase::Asking,
        rounds_requested: rounds,
        ask_time_sec,
        vote_time_sec,
        player_order: None,
        total_turns: None,
        turn_num: 0,
        q_counter: 0,
        current_question: None,
        phase_ends_at_ms: None,
    };
    ctx.store.create_room(room).await?;
    ctx.store
        .upsert_player(&code, seed_player(&identity.uid, &name, now_ms))
        .await?;

    info!(%code, rounds, "created room");
    Ok(code)
}

/// Join an existing room while it is still gathering players.
///
/// Returns the normalized room code.
pub async fn join_room(
    ctx: &CoreContext,
    identity: &Identity,
    request: JoinRoomRequest,
) -> Result<String, ServiceError> {
    request.validate()?;
    let name = request.name.trim().to_owned();
    let code = request.code.trim().to_uppercase();

    let room = fetch_room(ctx, &code).await?;
    if room.status != RoomStatus::Waiting {
        return Err(ServiceError::InvalidState(
            "the game has already started".into(),
        ));
    }

    ctx.store
        .upsert_player(
            &code,
            seed_player(&identity.uid, &name, ctx.clock.now_ms()),
        )
        .await?;

    info!(%code, "joined room");
    Ok(code)
}

/// Flip the caller's readiness flag.
pub async fn toggle_ready(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<(), ServiceError> {
    let Some(player) = ctx.store.player(code, viewer_uid).await? else {
        return Err(ServiceError::NotFound(format!(
            "player is not part of room `{code}`"
        )));
    };
    ctx.store
        .update_player(
            code,
            viewer_uid,
            PlayerPatch {
                ready: Some(!player.ready),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

fn seed_player(uid: &str, name: &str, now_ms: i64) -> PlayerDoc {
    PlayerDoc {
        uid: uid.to_owned(),
        name: name.to_owned(),
        score: 0,
        ready: false,
        joined_at_ms: now_ms,
        last_answer_qid: None,
        last_answer_idx: None,
    }
}
