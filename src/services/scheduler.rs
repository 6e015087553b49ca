//! Deadline-driven auto-advance.
//!
//! There is no server timer: each client runs a local periodic evaluator
//! over its cached snapshots and the absolute deadline stored in the room
//! document. Reconnecting clients derive the same remaining time from the
//! same stored timestamp, so there is no missed-tick backlog to replay.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::client::{CoreContext, Identity};
use crate::error::ServiceError;
use crate::services::{room_service, round_service};
use crate::state::machine::total_turns;
use crate::state::order::{current_asker, resolve_order};
use crate::store::models::{PlayerDoc, RoomDoc, RoomPhase, RoomStatus};

/// What the evaluator decided to do about an expired deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryAction {
    /// Move the room to the next turn.
    AdvanceTurn,
    /// Score the live question and open the reveal window.
    SettleAndReveal,
}

/// Evaluate the deadline for one viewer at one instant.
///
/// Returns `None` while the deadline is in the future (display only) and
/// for every viewer except the current asker: the asker's client is the
/// designated driver of expiry transitions, which reduces concurrent
/// duplicate writes without fully preventing them.
pub fn expiry_action(
    room: &RoomDoc,
    players: &[PlayerDoc],
    viewer_uid: &str,
    now_ms: i64,
) -> Option<ExpiryAction> {
    if room.status != RoomStatus::Started {
        return None;
    }
    let ends_at = room.phase_ends_at_ms?;
    if ends_at - now_ms > 0 {
        return None;
    }

    let order = resolve_order(room, players);
    if room.turn_num >= total_turns(room, order.len()) {
        return None;
    }
    let asker = current_asker(&order, room.turn_num)?;
    if asker != viewer_uid {
        return None;
    }

    match room.phase {
        RoomPhase::Asking => Some(ExpiryAction::AdvanceTurn),
        RoomPhase::Voting => {
            let question = room.current_question.as_ref()?;
            if question.reveal {
                // Reveal window elapsed: move on.
                Some(ExpiryAction::AdvanceTurn)
            } else {
                // Voting timed out: settle with whoever answered.
                Some(ExpiryAction::SettleAndReveal)
            }
        }
    }
}

/// Periodic evaluator loop, one per room session.
///
/// Runs until the room vanishes or the session drops its watch handles.
/// Failures are logged and dropped: a lost race against another trigger is
/// expected, and a store failure is reconciled by the next snapshot.
pub async fn run(
    ctx: CoreContext,
    identity: Identity,
    code: String,
    room_rx: watch::Receiver<Option<RoomDoc>>,
    players_rx: watch::Receiver<Vec<PlayerDoc>>,
) {
    let mut ticker = time::interval(Duration::from_millis(ctx.config.tick_interval_ms));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        if room_rx.has_changed().is_err() {
            // Session dropped the sender side.
            break;
        }

        let action = {
            let room = room_rx.borrow();
            let Some(room) = room.as_ref() else {
                break;
            };
            expiry_action(room, &players_rx.borrow(), &identity.uid, ctx.clock.now_ms())
        };

        let outcome = match action {
            None => continue,
            Some(ExpiryAction::AdvanceTurn) => {
                room_service::advance_turn(&ctx, &code, &identity.uid).await
            }
            Some(ExpiryAction::SettleAndReveal) => {
                round_service::settle_and_reveal(&ctx, &code, &identity.uid).await
            }
        };

        match outcome {
            Ok(()) => debug!(%code, ?action, "deadline transition applied"),
            // Another client (or our completion watcher) got there first.
            Err(ServiceError::InvalidState(reason)) | Err(ServiceError::Unauthorized(reason)) => {
                debug!(%code, %reason, "deadline transition skipped")
            }
            Err(err) => warn!(%code, error = %err, "deadline transition failed"),
        }
    }
}
