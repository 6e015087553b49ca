//! Pure room state machine.
//!
//! Every transition is expressed as a patch-producing function over a room
//! snapshot, so the same computation serves the initiating client, the
//! deadline scheduler, and the tests. Applying a patch is left to the
//! store; nothing here performs I/O.

use thiserror::Error;

use crate::store::models::{PlayerDoc, QuestionDoc, RoomDoc, RoomPhase, RoomStatus};
use crate::store::patch::{Field, PlayerPatch, RoomPatch, WriteBatch};

/// Allowed range for the requested number of rounds.
pub const ROUNDS_RANGE: (u32, u32) = (1, 20);
/// Allowed range for both phase timers, in seconds.
pub const TIME_SEC_RANGE: (u32, u32) = (10, 120);
/// How long the correct answer stays on screen after settling.
pub const REVEAL_HOLD_MS: i64 = 3_000;

/// Clamp a requested round count into [`ROUNDS_RANGE`].
pub fn clamp_rounds(rounds: u32) -> u32 {
    rounds.clamp(ROUNDS_RANGE.0, ROUNDS_RANGE.1)
}

/// Clamp a phase timer into [`TIME_SEC_RANGE`].
pub fn clamp_time_sec(seconds: u32) -> u32 {
    seconds.clamp(TIME_SEC_RANGE.0, TIME_SEC_RANGE.1)
}

/// Total number of turns for a room, derived when the stored value is null.
pub fn total_turns(room: &RoomDoc, order_len: usize) -> u32 {
    room.total_turns
        .unwrap_or(order_len as u32 * clamp_rounds(room.rounds_requested))
}

/// Operations a client can attempt against a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomOp {
    /// Owner starts the game from the lobby.
    Start,
    /// The current asker publishes a question.
    PublishQuestion,
    /// A voter submits an answer.
    SubmitAnswer,
    /// The asker applies scoring and reveals the answer.
    Settle,
    /// The asker moves the room to the next turn.
    AdvanceTurn,
}

/// Error returned when an operation is attempted in the wrong status/phase.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot apply {op:?} while {status:?}/{phase:?}")]
pub struct InvalidTransition {
    /// Status the room was in.
    pub status: RoomStatus,
    /// Phase the room was in.
    pub phase: RoomPhase,
    /// The operation that does not apply.
    pub op: RoomOp,
}

/// Validate that `op` may be attempted given the room's status and phase.
///
/// This covers only the status/phase axis; role and question-level
/// preconditions (owner, asker, already answered, settled) are checked by
/// the services against a fresh snapshot.
pub fn check_op(room: &RoomDoc, op: RoomOp) -> Result<(), InvalidTransition> {
    let valid = match (room.status, room.phase, op) {
        (RoomStatus::Waiting, _, RoomOp::Start) => true,
        (RoomStatus::Started, RoomPhase::Asking, RoomOp::PublishQuestion) => true,
        (RoomStatus::Started, RoomPhase::Asking, RoomOp::AdvanceTurn) => true,
        (RoomStatus::Started, RoomPhase::Voting, RoomOp::SubmitAnswer) => true,
        (RoomStatus::Started, RoomPhase::Voting, RoomOp::Settle) => true,
        (RoomStatus::Started, RoomPhase::Voting, RoomOp::AdvanceTurn) => true,
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(InvalidTransition {
            status: room.status,
            phase: room.phase,
            op,
        })
    }
}

/// Reason the lobby cannot be started yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartBlocked {
    /// The room has no players.
    #[error("the room has no players")]
    NoPlayers,
    /// Not every player has toggled ready.
    #[error("waiting for all players to be ready ({ready}/{total})")]
    NotAllReady {
        /// Players currently ready.
        ready: usize,
        /// Players in the room.
        total: usize,
    },
}

/// Compute the start transition: freeze the turn order, derive the turn
/// budget, and arm the first asking deadline.
pub fn start_patch(
    room: &RoomDoc,
    players: &[PlayerDoc],
    now_ms: i64,
) -> Result<RoomPatch, StartBlocked> {
    if players.is_empty() {
        return Err(StartBlocked::NoPlayers);
    }
    let ready = players.iter().filter(|p| p.ready).count();
    if ready != players.len() {
        return Err(StartBlocked::NotAllReady {
            ready,
            total: players.len(),
        });
    }

    let mut ordered: Vec<&PlayerDoc> = players.iter().collect();
    ordered.sort_by(|a, b| {
        a.joined_at_ms
            .cmp(&b.joined_at_ms)
            .then_with(|| a.uid.cmp(&b.uid))
    });
    let order: Vec<String> = ordered.iter().map(|p| p.uid.clone()).collect();

    let total = order.len() as u32 * clamp_rounds(room.rounds_requested);
    let ask_ms = i64::from(clamp_time_sec(room.ask_time_sec)) * 1_000;

    Ok(RoomPatch {
        status: Some(RoomStatus::Started),
        phase: Some(RoomPhase::Asking),
        player_order: Field::Set(order),
        total_turns: Field::Set(total),
        turn_num: Some(0),
        current_question: Field::Clear,
        phase_ends_at_ms: Field::Set(now_ms + ask_ms),
        ..Default::default()
    })
}

/// Compute the next-turn transition.
///
/// When the turn budget is exhausted the room finishes: the question and
/// deadline are cleared and `turnNum` lands exactly on `totalTurns`.
/// Otherwise the next asking phase is armed. The patch is idempotent in
/// intent but, applied twice from stale snapshots, skips a turn; an
/// accepted hazard of the multi-writer design.
pub fn advance_patch(room: &RoomDoc, now_ms: i64) -> RoomPatch {
    let order_len = room.player_order.as_ref().map_or(0, Vec::len);
    let total = total_turns(room, order_len);
    let next_turn = room.turn_num + 1;

    if next_turn >= total {
        return RoomPatch {
            status: Some(RoomStatus::Finished),
            phase: Some(RoomPhase::Asking),
            turn_num: Some(next_turn),
            current_question: Field::Clear,
            phase_ends_at_ms: Field::Clear,
            ..Default::default()
        };
    }

    let ask_ms = i64::from(clamp_time_sec(room.ask_time_sec)) * 1_000;
    RoomPatch {
        phase: Some(RoomPhase::Asking),
        turn_num: Some(next_turn),
        current_question: Field::Clear,
        phase_ends_at_ms: Field::Set(now_ms + ask_ms),
        ..Default::default()
    }
}

/// Build the atomic batch that resets a room back to the lobby.
///
/// Every player is zeroed (score, readiness, recorded answer) and the room
/// returns to its pre-start defaults in the same commit.
pub fn restart_batch(code: &str, players: &[PlayerDoc]) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for player in players {
        batch.update_player(
            code,
            player.uid.clone(),
            PlayerPatch {
                score: Some(0),
                ready: Some(false),
                last_answer_qid: Field::Clear,
                last_answer_idx: Field::Clear,
                ..Default::default()
            },
        );
    }
    batch.update_room(
        code,
        RoomPatch {
            status: Some(RoomStatus::Waiting),
            phase: Some(RoomPhase::Asking),
            player_order: Field::Clear,
            total_turns: Field::Clear,
            turn_num: Some(0),
            q_counter: Some(0),
            current_question: Field::Clear,
            phase_ends_at_ms: Field::Clear,
            ..Default::default()
        },
    );
    batch
}

/// One score write produced by settling a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreAward {
    /// Player receiving the write.
    pub uid: String,
    /// Absolute score value to store.
    pub new_score: u32,
}

/// Outcome of scoring one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    /// Score writes, voters first, the asker last.
    pub awards: Vec<ScoreAward>,
    /// Voters that answered wrong or not at all.
    pub wrong_count: u32,
}

/// Score a question against the participants of the frozen order.
///
/// Correct voters gain one point. Every other voter (wrong answer, stale
/// answer, or no answer at all) adds one to `wrong_count`, which is
/// credited to the asker in full: the bluffing incentive. The asker's
/// write is emitted even when nobody was fooled.
pub fn score_round(question: &QuestionDoc, participants: &[PlayerDoc]) -> Settlement {
    let mut awards = Vec::new();
    let mut wrong_count = 0u32;

    for player in participants {
        if player.uid == question.asker_id {
            continue;
        }
        if question.is_correct_answer(player) {
            awards.push(ScoreAward {
                uid: player.uid.clone(),
                new_score: player.score + 1,
            });
        } else {
            wrong_count += 1;
        }
    }

    let asker_score = participants
        .iter()
        .find(|p| p.uid == question.asker_id)
        .map_or(0, |p| p.score);
    awards.push(ScoreAward {
        uid: question.asker_id.clone(),
        new_score: asker_score + wrong_count,
    });

    Settlement {
        awards,
        wrong_count,
    }
}
