//! The session state machine: every transition the game can make.
//!
//! These are free functions over the shared [`AppState`] rather than
//! methods because they arm timers, and a timer task needs an owned
//! handle back into the state to re-enter this module when it fires.
//! Requests and timer callbacks alike funnel through the session's write
//! lock, so transitions never interleave.

use super::{clock, score, AppState, Session};
use crate::protocol::ServerMessage;
use crate::shuffle;
use crate::types::AnswerRecord;
use chrono::Utc;
use std::sync::Arc;

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Tear the session down to a fresh lobby: no players, a new question
/// draw, a new host token. The question history survives on disk.
pub async fn reset_all(state: &Arc<AppState>) {
    let questions = state.bank.select(state.config.questions_per_game).await;

    let mut session = state.session.write().await;
    session.clock.cancel_all();
    session.players.clear();
    session.current_answers.clear();
    session.joining_players.clear();
    session.questions = questions;
    session.current_question_index = -1;
    session.answers_processed = false;
    session.intermission_active = false;
    session.end_time = None;
    session.gamestate = None;
    session.host_token = ulid::Ulid::new().to_string();

    let _ = state.broadcast.send(ServerMessage::ClearQuestion);
    let _ = state.broadcast.send(ServerMessage::GameReset);
    let _ = state.broadcast.send(ServerMessage::HostSession {
        token: session.host_token.clone(),
    });
    state.broadcast_player_list(&session.players);
    tracing::info!("game and players fully reset");
}

/// Kick the game off from the lobby.
pub async fn start_game(state: &Arc<AppState>) {
    let _ = state.broadcast.send(ServerMessage::GameStarted);
    advance(state, 0).await;
}

/// Move the session to `target_index`, scoring the current round first if
/// it never got processed. Duplicate or backwards triggers are ignored,
/// so a late intermission timer and a manual skip race harmlessly.
pub async fn advance(state: &Arc<AppState>, target_index: i64) {
    let mut session = state.session.write().await;

    if target_index <= session.current_question_index {
        return;
    }

    // Manual skip during the break: drop the pending auto-advance.
    if session.intermission_active {
        session.intermission_active = false;
        session.clock.cancel_intermission_timer();
    }

    tracing::info!("moving to question index {target_index}");
    if session.current_question_index != -1 {
        process_round_locked(state, &mut session);
        // Forced scoring just armed an intermission aimed at the index we
        // are about to occupy; drop it so only one timer is ever live.
        session.intermission_active = false;
        session.clock.cancel_intermission_timer();
    }

    session.current_question_index = target_index;
    session.current_answers.clear();
    session.answers_processed = false;

    if (target_index as usize) < session.questions.len() {
        let index = target_index as usize;
        let shuffled = shuffle::shuffle_question(&session.questions[index]);
        state.bank.record_ask(&shuffled);
        session.questions[index] = shuffled;

        let _ = state
            .broadcast
            .send(ServerMessage::question(&session.questions[index], index));

        let end_time = now_secs() + state.config.round_seconds as f64;
        session.end_time = Some(end_time);
        clock::arm_round_timer(state, &mut session.clock, state.config.round_seconds);
        let _ = state.broadcast.send(ServerMessage::Timer {
            end_time,
            duration: state.config.round_seconds,
        });
        tracing::info!("question {} started", target_index + 1);
    } else {
        session.end_time = None;
        let (players, _) = score::resolve_scores(&session.players);
        let _ = state.broadcast.send(ServerMessage::GameOver { players });
        tracing::info!("game over");
    }
}

/// Score the current round. Safe to call from the round timer, the
/// all-answered early trigger and a manual skip at once; the
/// `answers_processed` flag makes every call after the first a no-op.
pub async fn process_round(state: &Arc<AppState>) {
    let mut session = state.session.write().await;
    process_round_locked(state, &mut session);
}

fn process_round_locked(state: &Arc<AppState>, session: &mut Session) {
    if session.answers_processed {
        return;
    }
    let Some(question) = session.current_question().cloned() else {
        return;
    };
    session.answers_processed = true;
    session.clock.cancel_round_timer();

    let end_time = session.end_time.unwrap_or_else(now_secs);
    let intermission = if session.players.len() == 1 {
        state.config.solo_intermission_seconds
    } else {
        state.config.intermission_seconds
    };

    let player_answers = score::apply_round_scores(
        &mut session.players,
        &session.current_answers,
        question.correct,
        end_time,
    );

    let _ = state.broadcast.send(ServerMessage::RoundResults {
        next_question_time: now_secs() + intermission as f64,
        intermission_duration: intermission,
        question: question.question.clone(),
        answers: question.answers.clone(),
        correct_index: question.correct,
        player_answers,
    });
    state.broadcast_player_list(&session.players);

    session.current_answers.clear();
    session.intermission_active = true;
    clock::arm_intermission_timer(
        state,
        &mut session.clock,
        intermission,
        session.current_question_index + 1,
    );
    tracing::info!("question {} scored", session.current_question_index + 1);
}

/// Record a participant's answer for the active round. Last write wins
/// per participant; once everyone has answered the round ends early.
pub async fn submit_answer(state: &Arc<AppState>, username: &str, answer_index: usize) {
    let mut session = state.session.write().await;
    let now = now_secs();

    let accepting = session.clock.round_timer_armed()
        && session.end_time.is_some_and(|end| now < end)
        && session.players.iter().any(|p| p.username == username);
    if !accepting {
        return;
    }

    session.current_answers.insert(
        username.to_string(),
        AnswerRecord {
            answer_index,
            submitted_at: now,
        },
    );
    tracing::debug!("{username} answered: {answer_index}");

    if session.current_answers.len() >= session.players.len() {
        process_round_locked(state, &mut session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::QuestionBank;
    use crate::types::{GameConfig, Question};
    use std::net::{IpAddr, Ipv4Addr};

    fn pool_of(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                question: format!("Question {i}?"),
                answers: vec![
                    "right".to_string(),
                    "wrong a".to_string(),
                    "wrong b".to_string(),
                    "wrong c".to_string(),
                ],
                correct: 0,
                iq: None,
            })
            .collect()
    }

    fn test_state() -> (Arc<AppState>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let bank = QuestionBank::from_pool(pool_of(8), dir.path().join("history.log")).unwrap();
        (Arc::new(AppState::new(bank, GameConfig::default())), dir)
    }

    async fn join(state: &Arc<AppState>, name: &str, last_octet: u8) {
        let token = state.session.read().await.host_token.clone();
        state
            .join(
                name,
                &token,
                &format!("conn-{name}"),
                IpAddr::V4(Ipv4Addr::new(10, 0, 0, last_octet)),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_draws_questions_and_mints_a_token() {
        let (state, _dir) = test_state();
        reset_all(&state).await;

        let session = state.session.read().await;
        assert_eq!(session.current_question_index, -1);
        assert_eq!(session.questions.len(), 5);
        assert!(!session.host_token.is_empty());
        assert!(session.players.is_empty());
    }

    #[tokio::test]
    async fn reset_regenerates_the_token_and_clears_scores() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        let first_token = state.session.read().await.host_token.clone();
        join(&state, "ada", 1).await;

        reset_all(&state).await;
        let session = state.session.read().await;
        assert_ne!(session.host_token, first_token);
        assert!(session.players.is_empty());
        assert!(session.gamestate.is_none());
    }

    #[tokio::test]
    async fn advance_ignores_stale_and_backward_targets() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;

        advance(&state, 1).await;
        assert_eq!(state.session.read().await.current_question_index, 1);

        advance(&state, 1).await;
        advance(&state, 0).await;
        advance(&state, -3).await;
        assert_eq!(state.session.read().await.current_question_index, 1);
    }

    #[tokio::test]
    async fn starting_a_round_arms_the_round_timer_and_sets_the_deadline() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;

        start_game(&state).await;

        let session = state.session.read().await;
        assert_eq!(session.current_question_index, 0);
        assert!(session.clock.round_timer_armed());
        assert!(!session.clock.intermission_timer_armed());
        assert!(!session.answers_processed);
        let end = session.end_time.unwrap();
        assert!(end > now_secs());
    }

    #[tokio::test]
    async fn rounds_play_a_shuffled_copy_with_the_correct_answer_present() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        start_game(&state).await;

        let session = state.session.read().await;
        let q = session.current_question().unwrap();
        assert_eq!(q.answers.len(), 4);
        assert_eq!(q.answers[q.correct], "right");
    }

    #[tokio::test]
    async fn all_answered_processes_early_and_arms_the_intermission() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        join(&state, "bob", 2).await;
        start_game(&state).await;

        let correct = {
            let session = state.session.read().await;
            session.current_question().unwrap().correct
        };
        submit_answer(&state, "ada", correct).await;
        {
            let session = state.session.read().await;
            assert!(!session.answers_processed);
            assert_eq!(session.current_answers.len(), 1);
        }

        submit_answer(&state, "bob", correct).await;
        let session = state.session.read().await;
        assert!(session.answers_processed);
        assert!(session.current_answers.is_empty());
        assert!(!session.clock.round_timer_armed());
        assert!(session.clock.intermission_timer_armed());
        assert!(session.intermission_active);
        // Both answered correctly inside the window: base + slack.
        assert!(session.players.iter().all(|p| p.score >= 100));
    }

    #[tokio::test]
    async fn late_or_unknown_answers_are_dropped() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        join(&state, "bob", 2).await;
        start_game(&state).await;

        submit_answer(&state, "ghost", 0).await;
        assert!(state.session.read().await.current_answers.is_empty());

        // Force the deadline into the past; the armed timer no longer
        // matters for acceptance.
        state.session.write().await.end_time = Some(now_secs() - 1.0);
        submit_answer(&state, "ada", 0).await;
        assert!(state.session.read().await.current_answers.is_empty());
    }

    #[tokio::test]
    async fn resubmission_overwrites_the_earlier_answer() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        join(&state, "bob", 2).await;
        start_game(&state).await;

        submit_answer(&state, "ada", 0).await;
        submit_answer(&state, "ada", 2).await;

        let session = state.session.read().await;
        assert_eq!(session.current_answers.len(), 1);
        assert_eq!(session.current_answers["ada"].answer_index, 2);
    }

    #[tokio::test]
    async fn process_round_is_idempotent() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        join(&state, "bob", 2).await;
        start_game(&state).await;

        let correct = {
            let session = state.session.read().await;
            session.current_question().unwrap().correct
        };
        submit_answer(&state, "ada", correct).await;

        process_round(&state).await;
        let score_after_first = state.session.read().await.players[0].score;
        process_round(&state).await;
        process_round(&state).await;

        let session = state.session.read().await;
        assert_eq!(session.players[0].score, score_after_first);
    }

    #[tokio::test]
    async fn solo_games_get_the_short_intermission() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "solo", 1).await;
        start_game(&state).await;

        let mut rx = state.broadcast.subscribe();
        process_round(&state).await;

        let mut seen = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMessage::RoundResults {
                intermission_duration,
                ..
            } = msg
            {
                seen = Some(intermission_duration);
            }
        }
        assert_eq!(seen, Some(5));
    }

    #[tokio::test]
    async fn multiplayer_games_get_the_long_intermission() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        join(&state, "bob", 2).await;
        start_game(&state).await;

        let mut rx = state.broadcast.subscribe();
        process_round(&state).await;

        let mut seen = None;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMessage::RoundResults {
                intermission_duration,
                ..
            } = msg
            {
                seen = Some(intermission_duration);
            }
        }
        assert_eq!(seen, Some(10));
    }

    #[tokio::test]
    async fn manual_skip_mid_round_scores_first_and_leaves_one_timer() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        join(&state, "bob", 2).await;
        start_game(&state).await;

        let correct = {
            let session = state.session.read().await;
            session.current_question().unwrap().correct
        };
        submit_answer(&state, "ada", correct).await;

        advance(&state, 1).await;

        let session = state.session.read().await;
        assert_eq!(session.current_question_index, 1);
        // Round 0 was scored on the way through.
        assert!(session.players.iter().any(|p| p.score >= 100));
        // Only the new round timer is live.
        assert!(session.clock.round_timer_armed());
        assert!(!session.clock.intermission_timer_armed());
        assert!(!session.intermission_active);
        assert!(!session.answers_processed);
    }

    #[tokio::test]
    async fn advancing_past_the_last_question_ends_the_game() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        start_game(&state).await;

        let mut rx = state.broadcast.subscribe();
        advance(&state, 5).await;

        let session = state.session.read().await;
        assert_eq!(session.current_question_index, 5);
        assert!(!session.round_in_progress());
        assert!(!session.clock.round_timer_armed());
        assert!(!session.clock.intermission_timer_armed());
        assert!(session.end_time.is_none());

        let mut saw_game_over = false;
        while let Ok(msg) = rx.try_recv() {
            if let ServerMessage::GameOver { players } = msg {
                saw_game_over = true;
                assert_eq!(players.len(), 1);
            }
        }
        assert!(saw_game_over);
    }

    #[tokio::test]
    async fn advancing_again_after_game_over_stays_quiet() {
        let (state, _dir) = test_state();
        reset_all(&state).await;
        join(&state, "ada", 1).await;
        start_game(&state).await;
        advance(&state, 5).await;

        let mut rx = state.broadcast.subscribe();
        advance(&state, 6).await;

        let session = state.session.read().await;
        assert_eq!(session.current_question_index, 6);
        assert!(!session.clock.round_timer_armed());
        // No round exists at index 6, so nothing was scored or started.
        let mut saw_round_events = false;
        while let Ok(msg) = rx.try_recv() {
            if matches!(
                msg,
                ServerMessage::RoundResults { .. } | ServerMessage::Question { .. }
            ) {
                saw_round_events = true;
            }
        }
        assert!(!saw_round_events);
    }
}
