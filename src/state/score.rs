//! Scoring and rankings.

use crate::protocol::{AnswerOutcome, PlayerStanding, ServerMessage};
use crate::state::AppState;
use crate::types::{AnswerRecord, Player, Username};
use std::collections::HashMap;

/// Flat award for a correct answer, before the time-slack bonus.
pub const BASE_POINTS: u64 = 100;

/// Points for one submitted answer: a correct pick earns the base plus one
/// point per whole second of slack left on the round clock when it came
/// in; anything else earns nothing.
pub fn score_answer(
    chosen_index: usize,
    correct_index: usize,
    answer_time: f64,
    end_time: f64,
) -> u64 {
    if chosen_index != correct_index {
        return 0;
    }
    let slack = (end_time - answer_time).floor().max(0.0) as u64;
    BASE_POINTS + slack
}

/// Rank the roster by descending score and pick the winner set.
///
/// The sort is stable, so ties keep roster (join) order and repeated calls
/// agree. Everyone matching the top score wins, unless the top score is 0:
/// an all-zero board crowns nobody, while the ranking itself is still
/// returned.
pub fn resolve_scores(players: &[Player]) -> (Vec<PlayerStanding>, Vec<Username>) {
    let mut ranked: Vec<PlayerStanding> = players.iter().map(PlayerStanding::from).collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));

    let mut winners = Vec::new();
    if let Some(top) = ranked.first() {
        let mut top_score = top.score;
        if top_score == 0 {
            // Prevent all-zero-score winners
            top_score += 1;
        }
        winners = ranked
            .iter()
            .filter(|p| p.score == top_score)
            .map(|p| p.username.clone())
            .collect();
    }
    (ranked, winners)
}

/// Apply one round's answers to the roster and build the per-participant
/// outcome map for the results broadcast. Scores only ever go up.
pub fn apply_round_scores(
    players: &mut [Player],
    answers: &HashMap<Username, AnswerRecord>,
    correct_index: usize,
    end_time: f64,
) -> HashMap<Username, AnswerOutcome> {
    let mut outcomes = HashMap::new();
    for (username, record) in answers {
        outcomes.insert(
            username.clone(),
            AnswerOutcome {
                chosen_index: record.answer_index,
                is_correct: record.answer_index == correct_index,
            },
        );
        let points = score_answer(
            record.answer_index,
            correct_index,
            record.submitted_at,
            end_time,
        );
        if points > 0 {
            if let Some(player) = players.iter_mut().find(|p| &p.username == username) {
                player.score += points;
            }
        }
    }
    outcomes
}

impl AppState {
    /// Broadcast the ranked roster and current winner set to everyone.
    pub fn broadcast_player_list(&self, players: &[Player]) {
        let (players, winning_players) = resolve_scores(players);
        let _ = self.broadcast.send(ServerMessage::PlayerList {
            players,
            winning_players,
        });
    }
}
