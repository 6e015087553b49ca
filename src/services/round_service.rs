//! Question publishing, answer collection, and settlement.

use indexmap::IndexSet;
use tracing::info;
use validator::Validate;

use crate::client::CoreContext;
use crate::dto::requests::QuestionInput;
use crate::error::ServiceError;
use crate::services::fetch_room;
use crate::state::machine::{self, REVEAL_HOLD_MS, RoomOp, clamp_time_sec};
use crate::state::order::{current_asker, resolve_order};
use crate::store::models::{PlayerDoc, QuestionDoc, RoomPhase};
use crate::store::patch::{Field, PlayerPatch, RoomPatch, WriteBatch};

/// Publish a question, moving the room into the voting phase.
///
/// Asker-only. Allocates the next question id from the room counter and
/// arms the voting deadline; returns the allocated id.
pub async fn publish_question(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
    input: QuestionInput,
) -> Result<String, ServiceError> {
    input.validate()?;

    let room = fetch_room(ctx, code).await?;
    machine::check_op(&room, RoomOp::PublishQuestion)?;

    let players = ctx.store.players_by_join_time(code).await?;
    let order = resolve_order(&room, &players);
    if current_asker(&order, room.turn_num) != Some(viewer_uid) {
        return Err(ServiceError::Unauthorized(
            "only the current asker can publish a question".into(),
        ));
    }

    let qid = (room.q_counter + 1).to_string();
    let vote_ms = i64::from(clamp_time_sec(room.vote_time_sec)) * 1_000;
    let question = QuestionDoc {
        qid: qid.clone(),
        asker_id: viewer_uid.to_owned(),
        text: input.text.trim().to_owned(),
        options: input.options.map(|option| option.trim().to_owned()),
        correct_index: input.correct_index,
        answered_uids: IndexSet::new(),
        settled: false,
        reveal: false,
    };

    ctx.store
        .update_room(
            code,
            RoomPatch {
                phase: Some(RoomPhase::Voting),
                q_counter: Some(room.q_counter + 1),
                current_question: Field::Set(question),
                phase_ends_at_ms: Field::Set(ctx.clock.now_ms() + vote_ms),
                ..Default::default()
            },
        )
        .await?;

    info!(%code, %qid, "question published");
    Ok(qid)
}

/// Record a voter's answer to the live question.
///
/// The answer lands on the voter's player document tagged with the
/// question id, then the voter joins `answeredUids` by set-union. The two
/// writes are not atomic; the tag makes a torn pair harmless.
pub async fn submit_answer(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
    chosen_index: u8,
) -> Result<(), ServiceError> {
    if chosen_index > 3 {
        return Err(ServiceError::InvalidInput(format!(
            "answer index {chosen_index} is out of range"
        )));
    }

    let room = fetch_room(ctx, code).await?;
    machine::check_op(&room, RoomOp::SubmitAnswer)?;
    let Some(question) = room.current_question.as_ref() else {
        return Err(ServiceError::InvalidState("no question is live".into()));
    };
    if question.reveal {
        return Err(ServiceError::InvalidState(
            "the answer has already been revealed".into(),
        ));
    }
    if question.asker_id == viewer_uid {
        return Err(ServiceError::Unauthorized(
            "the asker cannot vote on their own question".into(),
        ));
    }
    if question.answered_uids.contains(viewer_uid) {
        return Err(ServiceError::InvalidState("already answered".into()));
    }

    ctx.store
        .update_player(
            code,
            viewer_uid,
            PlayerPatch {
                last_answer_qid: Field::Set(question.qid.clone()),
                last_answer_idx: Field::Set(chosen_index),
                ..Default::default()
            },
        )
        .await?;
    ctx.store
        .update_room(
            code,
            RoomPatch {
                answered_uid_add: Some(viewer_uid.to_owned()),
                ..Default::default()
            },
        )
        .await?;
    Ok(())
}

/// Whether every non-asker in the order has answered the question.
pub fn voting_complete(question: &QuestionDoc, order: &[String]) -> bool {
    order
        .iter()
        .filter(|uid| **uid != question.asker_id)
        .all(|uid| question.answered_uids.contains(uid.as_str()))
}

/// Apply scoring for the live question and open the reveal window.
///
/// Asker-only and once-only per question: the settled flag is re-checked
/// against a fresh snapshot, so the double-trigger from completion
/// detection plus deadline expiry degrades into a rejected precondition.
/// Scores and the reveal flip land in one atomic batch.
pub async fn settle_and_reveal(
    ctx: &CoreContext,
    code: &str,
    viewer_uid: &str,
) -> Result<(), ServiceError> {
    let room = fetch_room(ctx, code).await?;
    machine::check_op(&room, RoomOp::Settle)?;
    let Some(question) = room.current_question.as_ref() else {
        return Err(ServiceError::InvalidState("no question is live".into()));
    };
    if question.asker_id != viewer_uid {
        return Err(ServiceError::Unauthorized(
            "only the asker can settle the question".into(),
        ));
    }
    if question.settled {
        return Err(ServiceError::InvalidState(
            "question already settled".into(),
        ));
    }

    let players = ctx.store.players_by_join_time(code).await?;
    let order = resolve_order(&room, &players);
    let participants: Vec<PlayerDoc> = order
        .iter()
        .filter_map(|uid| players.iter().find(|p| p.uid == *uid).cloned())
        .collect();

    let settlement = machine::score_round(question, &participants);

    let mut batch = WriteBatch::new();
    for award in &settlement.awards {
        batch.update_player(
            code,
            award.uid.clone(),
            PlayerPatch {
                score: Some(award.new_score),
                ..Default::default()
            },
        );
    }
    batch.update_room(
        code,
        RoomPatch {
            question_settled: Some(true),
            question_reveal: Some(true),
            phase_ends_at_ms: Field::Set(ctx.clock.now_ms() + REVEAL_HOLD_MS),
            ..Default::default()
        },
    );
    ctx.store.commit(batch).await?;

    info!(
        %code,
        qid = %question.qid,
        wrong_count = settlement.wrong_count,
        "question settled"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::client::{CoreContext, Identity};
    use crate::clock::{Clock, ManualClock};
    use crate::config::AppConfig;
    use crate::dto::requests::{CreateRoomRequest, JoinRoomRequest};
    use crate::services::{lobby_service, room_service};
    use crate::store::memory::MemoryStore;
    use crate::store::models::RoomStatus;

    fn question_input(correct_index: u8) -> QuestionInput {
        QuestionInput {
            text: "Which planet is hottest?".into(),
            options: [
                "Mercury".into(),
                "Venus".into(),
                "Mars".into(),
                "Jupiter".into(),
            ],
            correct_index,
        }
    }

    struct Fixture {
        ctx: CoreContext,
        clock: Arc<ManualClock>,
        code: String,
        p1: Identity,
        p2: Identity,
        p3: Identity,
    }

    /// Three ready players, game started: p1 is the first asker.
    async fn started_game() -> Fixture {
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
        for uid in [&p1.uid, &p2.uid, &p3.uid] {
            lobby_service::toggle_ready(&ctx, &code, uid).await.unwrap();
        }
        room_service::start_room(&ctx, &code, &p1.uid).await.unwrap();

        Fixture {
            ctx,
            clock,
            code,
            p1,
            p2,
            p3,
        }
    }

    async fn score_of(f: &Fixture, uid: &str) -> u32 {
        f.ctx
            .store
            .player(&f.code, uid)
            .await
            .unwrap()
            .unwrap()
            .score
    }

    #[tokio::test]
    async fn publish_is_asker_only_and_arms_voting() {
        let f = started_game().await;

        let err = publish_question(&f.ctx, &f.code, &f.p2.uid, question_input(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        f.clock.set(10_000);
        let qid = publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(1))
            .await
            .unwrap();
        assert_eq!(qid, "1");

        let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
        assert_eq!(room.phase, RoomPhase::Voting);
        assert_eq!(room.q_counter, 1);
        assert_eq!(room.phase_ends_at_ms, Some(10_000 + 20_000));
        let q = room.current_question.unwrap();
        assert_eq!(q.asker_id, f.p1.uid);
        assert!(q.answered_uids.is_empty());
        assert!(!q.settled && !q.reveal);

        // publishing again is blocked by the phase gate
        let err = publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));
    }

    #[tokio::test]
    async fn answers_are_recorded_once_and_never_for_the_asker() {
        let f = started_game().await;
        publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(1))
            .await
            .unwrap();

        let err = submit_answer(&f.ctx, &f.code, &f.p1.uid, 1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        submit_answer(&f.ctx, &f.code, &f.p2.uid, 1).await.unwrap();
        let err = submit_answer(&f.ctx, &f.code, &f.p2.uid, 2).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        let err = submit_answer(&f.ctx, &f.code, &f.p3.uid, 9).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
        let q = room.current_question.unwrap();
        assert!(q.answered_uids.contains(f.p2.uid.as_str()));
        assert!(!q.answered_uids.contains(f.p1.uid.as_str()));

        let p2 = f.ctx.store.player(&f.code, &f.p2.uid).await.unwrap().unwrap();
        assert_eq!(p2.last_answer_qid.as_deref(), Some("1"));
        assert_eq!(p2.last_answer_idx, Some(1));
    }

    #[tokio::test]
    async fn settle_scores_voters_and_credits_the_asker() {
        // P2 answers right, P3 answers wrong: P2 +1, P3 +0, P1 +1.
        let f = started_game().await;
        publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(1))
            .await
            .unwrap();
        submit_answer(&f.ctx, &f.code, &f.p2.uid, 1).await.unwrap();
        submit_answer(&f.ctx, &f.code, &f.p3.uid, 0).await.unwrap();

        settle_and_reveal(&f.ctx, &f.code, &f.p1.uid).await.unwrap();

        assert_eq!(score_of(&f, &f.p2.uid).await, 1);
        assert_eq!(score_of(&f, &f.p3.uid).await, 0);
        assert_eq!(score_of(&f, &f.p1.uid).await, 1);

        let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
        let q = room.current_question.as_ref().unwrap();
        assert!(q.settled && q.reveal);
        // reveal window armed from the settle timestamp
        assert_eq!(room.phase_ends_at_ms, Some(f.clock.now_ms() + REVEAL_HOLD_MS));
    }

    #[tokio::test]
    async fn settle_applies_at_most_once() {
        let f = started_game().await;
        publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(1))
            .await
            .unwrap();
        submit_answer(&f.ctx, &f.code, &f.p2.uid, 1).await.unwrap();
        submit_answer(&f.ctx, &f.code, &f.p3.uid, 1).await.unwrap();

        settle_and_reveal(&f.ctx, &f.code, &f.p1.uid).await.unwrap();
        let err = settle_and_reveal(&f.ctx, &f.code, &f.p1.uid).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidState(_)));

        // scores unchanged by the rejected second settle
        assert_eq!(score_of(&f, &f.p2.uid).await, 1);
        assert_eq!(score_of(&f, &f.p3.uid).await, 1);
        assert_eq!(score_of(&f, &f.p1.uid).await, 0);
    }

    #[tokio::test]
    async fn unanswered_voter_is_scored_wrong_on_timeout_settle() {
        // Voting deadline elapses with P3 silent: P3 counts as wrong.
        let f = started_game().await;
        publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(1))
            .await
            .unwrap();
        submit_answer(&f.ctx, &f.code, &f.p2.uid, 1).await.unwrap();

        f.clock.advance(21_000);
        settle_and_reveal(&f.ctx, &f.code, &f.p1.uid).await.unwrap();

        assert_eq!(score_of(&f, &f.p2.uid).await, 1);
        assert_eq!(score_of(&f, &f.p3.uid).await, 0);
        assert_eq!(score_of(&f, &f.p1.uid).await, 1);
    }

    #[tokio::test]
    async fn voting_completion_tracks_non_askers_only() {
        let f = started_game().await;
        publish_question(&f.ctx, &f.code, &f.p1.uid, question_input(2))
            .await
            .unwrap();

        let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
        let order = resolve_order(&room, &[]);
        let q = room.current_question.clone().unwrap();
        assert!(!voting_complete(&q, &order));

        submit_answer(&f.ctx, &f.code, &f.p2.uid, 2).await.unwrap();
        submit_answer(&f.ctx, &f.code, &f.p3.uid, 0).await.unwrap();

        let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
        let q = room.current_question.clone().unwrap();
        assert!(voting_complete(&q, &order));
    }

    #[tokio::test]
    async fn full_game_reaches_finished_with_exact_turn_count() {
        let f = started_game().await;
        // 3 players x 1 round
        for turn in 0..3u32 {
            let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
            assert_eq!(room.turn_num, turn);
            let order = room.player_order.clone().unwrap();
            let asker = order[turn as usize % order.len()].clone();

            publish_question(&f.ctx, &f.code, &asker, question_input(0))
                .await
                .unwrap();
            for voter in order.iter().filter(|uid| **uid != asker) {
                submit_answer(&f.ctx, &f.code, voter, 0).await.unwrap();
            }
            settle_and_reveal(&f.ctx, &f.code, &asker).await.unwrap();
            f.clock.advance(REVEAL_HOLD_MS + 1);
            room_service::advance_turn(&f.ctx, &f.code, &asker).await.unwrap();
        }

        let room = f.ctx.store.room(&f.code).await.unwrap().unwrap();
        assert_eq!(room.status, RoomStatus::Finished);
        assert_eq!(room.turn_num, 3);
        assert_eq!(room.total_turns, Some(3));
        assert!(room.current_question.is_none());
        assert!(room.phase_ends_at_ms.is_none());
        // everyone voted correctly each turn: two points per player
        for uid in [&f.p1.uid, &f.p2.uid, &f.p3.uid] {
            assert_eq!(score_of(&f, uid).await, 2);
        }
    }
}
