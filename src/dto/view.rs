//! Derived view data recomputed by each client from pushed snapshots.
//!
//! These projections are pure over `(room, players, now)`; the presentation
//! layer renders them without touching game rules.

use serde::Serialize;
use serde_with::skip_serializing_none;

use crate::state::machine::total_turns;
use crate::state::order::{current_asker, resolve_order};
use crate::store::models::{PlayerDoc, QuestionDoc, RoomDoc, RoomPhase, RoomStatus};

/// Lobby readiness summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReadyCount {
    /// Players currently ready.
    pub ready: usize,
    /// Players in the room.
    pub total: usize,
}

impl ReadyCount {
    /// Whether the room can be started: at least one player, all ready.
    pub fn all_ready(&self) -> bool {
        self.total > 0 && self.ready == self.total
    }
}

/// Count ready players.
pub fn ready_count(players: &[PlayerDoc]) -> ReadyCount {
    ReadyCount {
        ready: players.iter().filter(|p| p.ready).count(),
        total: players.len(),
    }
}

/// Voting progress for the live question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteProgress {
    /// Voters that have answered.
    pub answered: usize,
    /// Voters expected to answer (everyone in the order except the asker).
    pub voters: usize,
    /// Display names of voters still pending, in turn order.
    pub pending_names: Vec<String>,
    /// Whether the correct answer is being revealed.
    pub reveal: bool,
}

/// Compute voting progress from the live question and the resolved order.
pub fn vote_progress(
    question: &QuestionDoc,
    order: &[String],
    players: &[PlayerDoc],
) -> VoteProgress {
    let voters: Vec<&str> = order
        .iter()
        .filter(|uid| **uid != question.asker_id)
        .map(String::as_str)
        .collect();
    let pending_names = voters
        .iter()
        .filter(|uid| !question.answered_uids.contains(**uid))
        .map(|&uid| display_name(players, uid))
        .collect();
    VoteProgress {
        answered: question.answered_uids.len(),
        voters: voters.len(),
        pending_names,
        reveal: question.reveal,
    }
}

/// One row of the score table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StandingRow {
    /// Player identity.
    pub uid: String,
    /// Display name.
    pub name: String,
    /// Current score.
    pub score: u32,
}

/// Full standings, descending by score.
pub fn standings(players: &[PlayerDoc]) -> Vec<StandingRow> {
    let mut rows: Vec<StandingRow> = players
        .iter()
        .map(|p| StandingRow {
            uid: p.uid.clone(),
            name: p.name.clone(),
            score: p.score,
        })
        .collect();
    rows.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.uid.cmp(&b.uid)));
    rows
}

/// The top three of the standings.
pub fn podium(players: &[PlayerDoc]) -> Vec<StandingRow> {
    let mut rows = standings(players);
    rows.truncate(3);
    rows
}

/// Look up a display name, with a placeholder for unknown identities.
pub fn display_name(players: &[PlayerDoc], uid: &str) -> String {
    players
        .iter()
        .find(|p| p.uid == uid)
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "—".into())
}

/// Whole seconds left before a deadline, clamped at zero.
pub fn seconds_left(phase_ends_at_ms: i64, now_ms: i64) -> i64 {
    ((phase_ends_at_ms - now_ms).max(0) + 999) / 1_000
}

/// Everything the presentation layer needs to render one room frame.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct RoomView {
    /// Room code.
    pub code: String,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Sub-phase, present only while the game is running.
    pub phase: Option<RoomPhase>,
    /// Current turn index.
    pub turn_num: u32,
    /// Total turn budget once known.
    pub total_turns: Option<u32>,
    /// Identity of the current asker.
    pub asker_uid: Option<String>,
    /// Display name of the current asker.
    pub asker_name: Option<String>,
    /// Whole seconds left on the phase deadline.
    pub seconds_left: Option<i64>,
    /// Lobby readiness.
    pub ready: ReadyCount,
    /// Voting progress while a question is live.
    pub vote: Option<VoteProgress>,
    /// Standings, descending by score.
    pub standings: Vec<StandingRow>,
}

impl RoomView {
    /// Project a room frame from the latest snapshots.
    pub fn project(room: &RoomDoc, players: &[PlayerDoc], now_ms: i64) -> Self {
        let order = resolve_order(room, players);
        let asker_uid = current_asker(&order, room.turn_num).map(str::to_owned);
        let asker_name = asker_uid.as_deref().map(|uid| display_name(players, uid));
        let vote = room
            .current_question
            .as_ref()
            .filter(|_| room.status == RoomStatus::Started && room.phase == RoomPhase::Voting)
            .map(|q| vote_progress(q, &order, players));

        Self {
            code: room.code.clone(),
            status: room.status,
            phase: (room.status == RoomStatus::Started).then_some(room.phase),
            turn_num: room.turn_num,
            total_turns: (room.status != RoomStatus::Waiting)
                .then(|| total_turns(room, order.len())),
            asker_uid,
            asker_name,
            seconds_left: (room.status == RoomStatus::Started)
                .then_some(room.phase_ends_at_ms)
                .flatten()
                .map(|ends| seconds_left(ends, now_ms)),
            ready: ready_count(players),
            vote,
            standings: standings(players),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexSet;

    fn player(uid: &str, name: &str, score: u32, ready: bool, joined_at_ms: i64) -> PlayerDoc {
        PlayerDoc {
            uid: uid.into(),
            name: name.into(),
            score,
            ready,
            joined_at_ms,
            last_answer_qid: None,
            last_answer_idx: None,
        }
    }

    #[test]
    fn ready_count_tracks_all_ready() {
        let players = vec![
            player("a", "A", 0, true, 1),
            player("b", "B", 0, false, 2),
        ];
        let count = ready_count(&players);
        assert_eq!((count.ready, count.total), (1, 2));
        assert!(!count.all_ready());
        assert!(!ready_count(&[]).all_ready());
    }

    #[test]
    fn vote_progress_lists_pending_names_in_turn_order() {
        let mut answered = IndexSet::new();
        answered.insert("b".to_string());
        let question = QuestionDoc {
            qid: "1".into(),
            asker_id: "a".into(),
            text: "?".into(),
            options: ["w".into(), "x".into(), "y".into(), "z".into()],
            correct_index: 0,
            answered_uids: answered,
            settled: false,
            reveal: false,
        };
        let order: Vec<String> = vec!["a".into(), "b".into(), "c".into()];
        let players = vec![
            player("a", "Asker", 0, true, 1),
            player("b", "Voted", 0, true, 2),
            player("c", "Pending", 0, true, 3),
        ];
        let progress = vote_progress(&question, &order, &players);
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.voters, 2);
        assert_eq!(progress.pending_names, vec!["Pending"]);
    }

    #[test]
    fn standings_sort_descending_and_podium_truncates() {
        let players = vec![
            player("a", "A", 1, true, 1),
            player("b", "B", 5, true, 2),
            player("c", "C", 3, true, 3),
            player("d", "D", 0, true, 4),
        ];
        let rows = standings(&players);
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B", "C", "A", "D"]);
        assert_eq!(podium(&players).len(), 3);
    }

    #[test]
    fn seconds_left_rounds_up_and_clamps() {
        assert_eq!(seconds_left(10_500, 10_000), 1);
        assert_eq!(seconds_left(10_000, 10_000), 0);
        assert_eq!(seconds_left(9_000, 10_000), 0);
        assert_eq!(seconds_left(12_001, 10_000), 3);
    }
}
