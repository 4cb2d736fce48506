use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Opaque ID types for type safety
pub type ConnectionId = String;
pub type Username = String;

/// One entry of the question pool.
///
/// Pool files carry `question`, `answers` and optionally `iq`; the correct
/// answer is the one `correct` points at, which defaults to the first
/// option when the file omits it. The bank's copy is never mutated; rounds
/// play a shuffled copy produced by [`crate::shuffle`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub question: String,
    pub answers: Vec<String>,
    #[serde(default)]
    pub correct: usize,
    /// Optional challenge rating, passed through to clients untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iq: Option<u32>,
}

/// A participant in the current session. Identity is the display name;
/// the connection id is re-bound when the same name rejoins from the same
/// address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub username: Username,
    pub score: u64,
    pub conn_id: ConnectionId,
    pub ip: IpAddr,
}

/// One participant's answer for the round in flight. Keyed by username in
/// the session's answer set, so a resubmission overwrites (last write
/// wins) and a reconnect cannot double-count anyone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerRecord {
    pub answer_index: usize,
    /// Unix seconds at submission, used for the time-slack bonus
    pub submitted_at: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    pub round_seconds: u32,
    pub solo_intermission_seconds: u32,
    pub intermission_seconds: u32,
    pub questions_per_game: usize,
    pub host_ping_seconds: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_seconds: 30,
            solo_intermission_seconds: 5,
            intermission_seconds: 10,
            questions_per_game: 5,
            host_ping_seconds: 30,
        }
    }
}

impl GameConfig {
    /// Load config from environment variables, falling back to the
    /// defaults for anything unset or unparseable
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let round_seconds = std::env::var("ROUND_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.round_seconds);

        let solo_intermission_seconds = std::env::var("SOLO_INTERMISSION_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.solo_intermission_seconds);

        let intermission_seconds = std::env::var("INTERMISSION_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.intermission_seconds);

        let questions_per_game = std::env::var("QUESTIONS_PER_GAME")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.questions_per_game);

        let host_ping_seconds = std::env::var("HOST_PING_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.host_ping_seconds);

        tracing::info!(
            "Game config: {round_seconds}s rounds, {questions_per_game} questions per game"
        );

        Self {
            round_seconds,
            solo_intermission_seconds,
            intermission_seconds,
            questions_per_game,
            host_ping_seconds,
        }
    }
}
