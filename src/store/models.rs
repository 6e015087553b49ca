//! Persisted entities shared by every store backend.
//!
//! Field names follow the wire layout of the room document and its players
//! sub-collection, so a networked backend can map these structs onto the
//! store without renaming.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    /// Players are gathering in the lobby; the game has not started.
    Waiting,
    /// The game is running; `phase` describes the current sub-step.
    Started,
    /// All turns have been played; final standings are displayed.
    Finished,
}

/// Sub-phase of a started room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomPhase {
    /// The current asker is composing a question.
    Asking,
    /// Voters are answering the published question.
    Voting,
}

/// The question currently being played, embedded in the room document.
///
/// At most one question is live at a time; `qid` ties late answers back to
/// the question they were submitted for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDoc {
    /// Identifier unique within the room (stringified question counter).
    pub qid: String,
    /// Identity of the player who published the question.
    pub asker_id: String,
    /// Question text shown to voters.
    pub text: String,
    /// The four answer options.
    pub options: [String; 4],
    /// Index of the correct option, in `0..=3`.
    pub correct_index: u8,
    /// Identities that have answered, in submission order.
    pub answered_uids: IndexSet<String>,
    /// Whether scoring has been applied for this question.
    pub settled: bool,
    /// Whether the correct answer is being shown to everyone.
    pub reveal: bool,
}

/// The room document, one per game, keyed by the room code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomDoc {
    /// Short join code identifying the room.
    pub code: String,
    /// Identity of the room creator.
    pub owner_id: String,
    /// Display name of the room creator; legacy fallback owner key.
    pub owner_name: String,
    /// Creation timestamp in unix milliseconds.
    pub created_at_ms: i64,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Sub-phase, meaningful only while `status` is [`RoomStatus::Started`].
    pub phase: RoomPhase,
    /// Number of rounds requested at creation, clamped to `1..=20`.
    pub rounds_requested: u32,
    /// Seconds granted to compose a question, clamped to `10..=120`.
    pub ask_time_sec: u32,
    /// Seconds granted to vote, clamped to `10..=120`.
    pub vote_time_sec: u32,
    /// Turn order frozen at start; `None` before the game starts.
    pub player_order: Option<Vec<String>>,
    /// `|playerOrder| * roundsRequested`; `None` before the game starts.
    pub total_turns: Option<u32>,
    /// Zero-based index of the current turn.
    pub turn_num: u32,
    /// Monotonic counter backing question identifiers.
    pub q_counter: u32,
    /// The live question, if any.
    pub current_question: Option<QuestionDoc>,
    /// Absolute deadline of the current phase in unix milliseconds.
    pub phase_ends_at_ms: Option<i64>,
}

/// A participant document in the room's players sub-collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerDoc {
    /// Stable identity issued by the identity provider (document key).
    pub uid: String,
    /// Display name chosen when joining.
    pub name: String,
    /// Accumulated score.
    pub score: u32,
    /// Lobby readiness flag.
    pub ready: bool,
    /// Join timestamp in unix milliseconds; default ordering key.
    pub joined_at_ms: i64,
    /// Question id of the most recent submitted answer.
    pub last_answer_qid: Option<String>,
    /// Chosen option index of the most recent submitted answer.
    pub last_answer_idx: Option<u8>,
}

impl QuestionDoc {
    /// Whether this player answered this question with its correct option.
    ///
    /// An answer only counts when it is tagged with this question's `qid`;
    /// a stale `lastAnswerIdx` from an earlier question never scores.
    pub fn is_correct_answer(&self, player: &PlayerDoc) -> bool {
        player.last_answer_qid.as_deref() == Some(self.qid.as_str())
            && player.last_answer_idx == Some(self.correct_index)
    }
}
