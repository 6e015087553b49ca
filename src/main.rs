//! Headless simulation binary: bot clients play one full game against the
//! in-memory store, exercising the whole protocol end to end.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rand::Rng;
use tokio::time::timeout;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bluffroom::client::{CoreContext, Identity, RoomSession};
use bluffroom::clock::SystemClock;
use bluffroom::config::AppConfig;
use bluffroom::dto::requests::{CreateRoomRequest, JoinRoomRequest, QuestionInput};
use bluffroom::dto::view::standings;
use bluffroom::error::ServiceError;
use bluffroom::services::lobby_service;
use bluffroom::state::order::current_asker;
use bluffroom::store::memory::MemoryStore;
use bluffroom::store::models::{RoomDoc, RoomPhase, RoomStatus};

/// How long one simulated game may take before the run is declared stuck.
const GAME_TIMEOUT: Duration = Duration::from_secs(120);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let ctx = CoreContext::new(
        Arc::new(MemoryStore::new()),
        Arc::new(SystemClock),
        config,
    );

    let host = Identity::anonymous();
    let code = lobby_service::create_room(
        &ctx,
        &host,
        CreateRoomRequest {
            name: "Host".into(),
            rounds: Some(1),
            ask_time_sec: Some(10),
            vote_time_sec: Some(10),
        },
    )
    .await
    .context("creating room")?;
    info!(%code, "room created");

    let mut identities = vec![host];
    for name in ["Nora", "Sami"] {
        let guest = Identity::anonymous();
        lobby_service::join_room(
            &ctx,
            &guest,
            JoinRoomRequest {
                name: name.into(),
                code: code.clone(),
            },
        )
        .await
        .context("joining room")?;
        identities.push(guest);
    }

    // Every player enters the room and readies up.
    let mut sessions = Vec::new();
    for identity in &identities {
        let session = RoomSession::enter(ctx.clone(), identity.clone(), code.clone())
            .await
            .context("entering room")?;
        session.toggle_ready().await.context("readying up")?;
        sessions.push(session);
    }
    sessions[0].start().await.context("starting game")?;
    info!(%code, "game started");

    // Bots: publish when asked to, vote when allowed to.
    let mut bots = Vec::new();
    for session in sessions {
        bots.push(tokio::spawn(run_bot(session)));
    }

    // Observe the room until the game finishes.
    let observer = RoomSession::enter(ctx.clone(), Identity::anonymous(), code.clone())
        .await
        .context("entering as observer")?;
    let mut room_rx = observer.watch_room();
    timeout(GAME_TIMEOUT, async {
        loop {
            let finished = room_rx
                .borrow()
                .as_ref()
                .is_some_and(|room| room.status == RoomStatus::Finished);
            if finished {
                break;
            }
            if room_rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .context("waiting for the game to finish")?;

    for bot in bots {
        bot.abort();
    }

    let players = observer.players();
    info!("final standings:");
    for (rank, row) in standings(&players).iter().enumerate() {
        info!("  {}. {}: {} points", rank + 1, row.name, row.score);
    }

    Ok(())
}

/// Drive one player: publish a canned question as asker, vote as voter.
///
/// Settlement and turn advancement happen through the session's own
/// completion watcher and deadline scheduler, exactly as for a human
/// player who stops interacting.
async fn run_bot(session: RoomSession) {
    let mut room_rx = session.watch_room();
    let uid = session.identity().uid.clone();

    loop {
        let intent = {
            let room = room_rx.borrow_and_update();
            match room.as_ref() {
                Some(room) if room.status == RoomStatus::Started => bot_intent(room, &uid),
                Some(_) => None,
                None => break,
            }
        };

        match intent {
            Some(BotIntent::Publish) => {
                let result = session
                    .publish_question(QuestionInput {
                        text: "Which option is the bluff?".into(),
                        options: [
                            "The first".into(),
                            "The second".into(),
                            "The third".into(),
                            "The fourth".into(),
                        ],
                        correct_index: 1,
                    })
                    .await;
                log_bot_outcome("publish", result.map(|_| ()));
            }
            Some(BotIntent::Vote(choice)) => {
                log_bot_outcome("vote", session.submit_answer(choice).await);
            }
            None => {}
        }

        if room_rx.changed().await.is_err() {
            break;
        }
    }
}

enum BotIntent {
    Publish,
    Vote(u8),
}

fn bot_intent(room: &RoomDoc, uid: &str) -> Option<BotIntent> {
    let order = room.player_order.as_deref().unwrap_or_default();
    let asker = current_asker(order, room.turn_num)?;

    match room.phase {
        RoomPhase::Asking if asker == uid => Some(BotIntent::Publish),
        RoomPhase::Voting if asker != uid => {
            let question = room.current_question.as_ref()?;
            if question.reveal || question.answered_uids.contains(uid) {
                return None;
            }
            // random votes exercise both the voter and the asker score paths
            let choice = rand::rng().random_range(0..4u8);
            Some(BotIntent::Vote(choice))
        }
        _ => None,
    }
}

fn log_bot_outcome(action: &str, result: Result<(), ServiceError>) {
    match result {
        Ok(()) => info!(action, "bot acted"),
        // Losing a race to another client is part of normal operation.
        Err(ServiceError::InvalidState(_)) | Err(ServiceError::Unauthorized(_)) => {}
        Err(err) => tracing::warn!(action, error = %err, "bot action failed"),
    }
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
