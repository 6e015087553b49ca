//! Merge-write patches applied to persisted documents.
//!
//! Backends receive patches instead of whole documents so that concurrent
//! writers only overwrite the fields they actually touch, matching the
//! merge-write semantics of the shared store.

use crate::store::models::{PlayerDoc, QuestionDoc, RoomDoc, RoomPhase, RoomStatus};

/// Tri-state value for a nullable document field in a merge write.
///
/// `Keep` leaves the stored value untouched, `Set` overwrites it, and
/// `Clear` writes an explicit null.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field<T> {
    /// Leave the stored value unchanged.
    Keep,
    /// Overwrite the stored value.
    Set(T),
    /// Write an explicit null.
    Clear,
}

// the derived impl would bound `T: Default`
impl<T> Default for Field<T> {
    fn default() -> Self {
        Field::Keep
    }
}

impl<T> Field<T> {
    /// Apply this field to the slot it patches.
    pub fn apply_to(self, slot: &mut Option<T>) {
        match self {
            Field::Keep => {}
            Field::Set(value) => *slot = Some(value),
            Field::Clear => *slot = None,
        }
    }

    /// Whether applying this field would change nothing.
    pub fn is_keep(&self) -> bool {
        matches!(self, Field::Keep)
    }
}

/// Merge patch for a room document.
///
/// Besides plain field overwrites this carries the two targeted updates the
/// protocol performs inside the embedded question: flipping
/// `settled`/`reveal` and the set-union insert into `answeredUids`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomPatch {
    /// Backfill of the legacy owner display name.
    pub owner_name: Option<String>,
    /// New lifecycle status.
    pub status: Option<RoomStatus>,
    /// New sub-phase.
    pub phase: Option<RoomPhase>,
    /// Frozen turn order, or an explicit null on restart.
    pub player_order: Field<Vec<String>>,
    /// Total turn count, or an explicit null on restart.
    pub total_turns: Field<u32>,
    /// New current turn index.
    pub turn_num: Option<u32>,
    /// New question counter value.
    pub q_counter: Option<u32>,
    /// Replacement or removal of the live question.
    pub current_question: Field<QuestionDoc>,
    /// New phase deadline, or an explicit null when no deadline applies.
    pub phase_ends_at_ms: Field<i64>,
    /// Targeted update of `currentQuestion.settled`.
    pub question_settled: Option<bool>,
    /// Targeted update of `currentQuestion.reveal`.
    pub question_reveal: Option<bool>,
    /// Set-union insert into `currentQuestion.answeredUids`.
    pub answered_uid_add: Option<String>,
}

impl RoomPatch {
    /// Apply the patch to an in-memory room document.
    ///
    /// Targeted question updates are dropped when no question is live, the
    /// same way a dotted-path merge into an absent map field would not
    /// resurrect the question.
    pub fn apply(self, room: &mut RoomDoc) {
        if let Some(owner_name) = self.owner_name {
            room.owner_name = owner_name;
        }
        if let Some(status) = self.status {
            room.status = status;
        }
        if let Some(phase) = self.phase {
            room.phase = phase;
        }
        self.player_order.apply_to(&mut room.player_order);
        self.total_turns.apply_to(&mut room.total_turns);
        if let Some(turn_num) = self.turn_num {
            room.turn_num = turn_num;
        }
        if let Some(q_counter) = self.q_counter {
            room.q_counter = q_counter;
        }
        self.current_question.apply_to(&mut room.current_question);
        self.phase_ends_at_ms.apply_to(&mut room.phase_ends_at_ms);

        if let Some(question) = room.current_question.as_mut() {
            if let Some(settled) = self.question_settled {
                question.settled = settled;
            }
            if let Some(reveal) = self.question_reveal {
                question.reveal = reveal;
            }
            if let Some(uid) = self.answered_uid_add {
                question.answered_uids.insert(uid);
            }
        }
    }
}

/// Merge patch for a player document.
#[derive(Debug, Clone, Default)]
pub struct PlayerPatch {
    /// New display name.
    pub name: Option<String>,
    /// New score.
    pub score: Option<u32>,
    /// New readiness flag.
    pub ready: Option<bool>,
    /// Question id of the most recent answer, or an explicit null on reset.
    pub last_answer_qid: Field<String>,
    /// Option index of the most recent answer, or an explicit null on reset.
    pub last_answer_idx: Field<u8>,
}

impl PlayerPatch {
    /// Apply the patch to an in-memory player document.
    pub fn apply(self, player: &mut PlayerDoc) {
        if let Some(name) = self.name {
            player.name = name;
        }
        if let Some(score) = self.score {
            player.score = score;
        }
        if let Some(ready) = self.ready {
            player.ready = ready;
        }
        self.last_answer_qid.apply_to(&mut player.last_answer_qid);
        self.last_answer_idx.apply_to(&mut player.last_answer_idx);
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Merge patch against the room document.
    UpdateRoom {
        /// Room code keying the document.
        code: String,
        /// Patch to merge.
        patch: RoomPatch,
    },
    /// Merge patch against one player document.
    UpdatePlayer {
        /// Room code keying the sub-collection.
        code: String,
        /// Player identity keying the document.
        uid: String,
        /// Patch to merge.
        patch: PlayerPatch,
    },
}

/// An ordered set of writes the backend must apply atomically.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Create an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a room patch.
    pub fn update_room(&mut self, code: impl Into<String>, patch: RoomPatch) {
        self.ops.push(BatchOp::UpdateRoom {
            code: code.into(),
            patch,
        });
    }

    /// Queue a player patch.
    pub fn update_player(
        &mut self,
        code: impl Into<String>,
        uid: impl Into<String>,
        patch: PlayerPatch,
    ) {
        self.ops.push(BatchOp::UpdatePlayer {
            code: code.into(),
            uid: uid.into(),
            patch,
        });
    }

    /// Number of queued writes.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Whether the batch holds no writes.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Consume the batch, yielding its writes in insertion order.
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Borrow the queued writes.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }
}
