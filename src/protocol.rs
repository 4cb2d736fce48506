use crate::types::{Player, Question, Username};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Messages sent from clients to the server.
///
/// Every event is an internally tagged JSON object
/// (`{"t": "<event>", ...fields}`) with a fixed field set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        username: String,
        host_token: String,
    },
    Answer {
        username: String,
        answer_index: usize,
    },
    StartGame,
    NextQuestion {
        question_index: i64,
    },
    ResetAll,
    /// Lobby-only: the name currently being typed into the join form
    TypingUsername {
        username: String,
    },
    /// Host-only: push a presentation state to every client
    SetGamestate {
        state: String,
        host_token: String,
    },
    TimePing {
        client_ts: f64,
    },
}

/// Messages sent from the server to clients, broadcast or targeted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Current host token, sent on connect and after every reset
    HostSession {
        token: String,
    },
    /// Periodic liveness heartbeat carrying the current host token
    HostPing {
        token: String,
    },
    /// Join acknowledgement for the requesting connection
    Joined {
        username: String,
    },
    /// Broadcast when a brand-new participant enters the roster
    PlayerJoined {
        username: String,
    },
    PlayerList {
        players: Vec<PlayerStanding>,
        winning_players: Vec<Username>,
    },
    UpdateJoiningPlayers {
        usernames: Vec<String>,
    },
    /// A round's question. Deliberately omits the correct index; only
    /// `round_results` reveals it.
    Question {
        question: String,
        answers: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        iq: Option<u32>,
        index: usize,
    },
    Timer {
        /// Unix seconds when the round locks
        end_time: f64,
        /// Full answer window in seconds
        duration: u32,
    },
    RoundResults {
        /// Unix seconds when the next round starts
        next_question_time: f64,
        intermission_duration: u32,
        question: String,
        answers: Vec<String>,
        correct_index: usize,
        player_answers: HashMap<Username, AnswerOutcome>,
    },
    GameOver {
        players: Vec<PlayerStanding>,
    },
    GameReset,
    GameStarted,
    Gamestate {
        state: String,
    },
    /// Return displays to the waiting screen
    ClearQuestion,
    TimePong {
        client_ts: f64,
        server_ts: f64,
    },
    Error {
        message: String,
    },
}

/// One row of the ranked roster, in `resolve_scores` order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerStanding {
    pub username: Username,
    pub score: u64,
}

impl From<&Player> for PlayerStanding {
    fn from(player: &Player) -> Self {
        Self {
            username: player.username.clone(),
            score: player.score,
        }
    }
}

/// How one participant did in a round, keyed by name in `round_results`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerOutcome {
    pub chosen_index: usize,
    pub is_correct: bool,
}

impl ServerMessage {
    /// The `question` broadcast for the given round, without the answer key.
    pub fn question(question: &Question, index: usize) -> Self {
        Self::Question {
            question: question.question.clone(),
            answers: question.answers.clone(),
            iq: question.iq,
            index,
        }
    }
}
