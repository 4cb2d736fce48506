//! Shared application state.
//!
//! One [`Session`] holds everything the running game knows, guarded by a
//! single lock so external requests and timer callbacks mutate on one
//! serialized path. [`AppState`] wraps it together with the question bank,
//! the gameplay config and the broadcast channel every connected socket
//! subscribes to.

pub mod clock;
pub mod game;
pub mod player;
pub mod score;

use crate::protocol::ServerMessage;
use crate::questions::QuestionBank;
use crate::types::{AnswerRecord, ConnectionId, GameConfig, Player, Question, Username};
use clock::SessionClock;
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};

/// The re-initializable session singleton. `reset_all` in [`game`] returns
/// every field here to its fresh state; nothing survives a reset except
/// the on-disk question history.
#[derive(Debug)]
pub struct Session {
    /// −1 before the first question; == questions.len() once the game ends
    pub current_question_index: i64,
    /// This game's draw. Each round's entry is replaced by its shuffled
    /// copy when the round starts; the bank's originals are untouched.
    pub questions: Vec<Question>,
    /// Join-ordered roster; order matters for stable ranking ties
    pub players: Vec<Player>,
    /// The round in flight: participant name → answer, last write wins
    pub current_answers: HashMap<Username, AnswerRecord>,
    /// Unix seconds when the active round locks
    pub end_time: Option<f64>,
    /// Set exactly once per question; gates scoring idempotency
    pub answers_processed: bool,
    pub intermission_active: bool,
    pub host_token: String,
    /// Host-chosen presentation state, opaque to the server
    pub gamestate: Option<String>,
    /// Names currently being typed on join screens, by connection
    pub joining_players: HashMap<ConnectionId, String>,
    pub clock: SessionClock,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            current_question_index: -1,
            questions: Vec::new(),
            players: Vec::new(),
            current_answers: HashMap::new(),
            end_time: None,
            answers_processed: false,
            intermission_active: false,
            host_token: String::new(),
            gamestate: None,
            joining_players: HashMap::new(),
            clock: SessionClock::default(),
        }
    }
}

impl Session {
    /// True while the index points at a playable question.
    pub fn round_in_progress(&self) -> bool {
        self.current_question_index >= 0
            && (self.current_question_index as usize) < self.questions.len()
    }

    pub fn current_question(&self) -> Option<&Question> {
        if self.round_in_progress() {
            self.questions.get(self.current_question_index as usize)
        } else {
            None
        }
    }
}

pub struct AppState {
    pub session: RwLock<Session>,
    pub bank: QuestionBank,
    pub config: GameConfig,
    pub broadcast: broadcast::Sender<ServerMessage>,
}

impl AppState {
    pub fn new(bank: QuestionBank, config: GameConfig) -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self {
            session: RwLock::new(Session::default()),
            bank,
            config,
            broadcast: tx,
        }
    }

    /// Catch-up bundle for a connection that just attached: the current
    /// host token, the presentation state if one is set, and the roster.
    pub async fn welcome(&self) -> Vec<ServerMessage> {
        let session = self.session.read().await;
        let mut msgs = vec![ServerMessage::HostSession {
            token: session.host_token.clone(),
        }];
        if let Some(state) = &session.gamestate {
            msgs.push(ServerMessage::Gamestate {
                state: state.clone(),
            });
        }
        let (players, winning_players) = score::resolve_scores(&session.players);
        msgs.push(ServerMessage::PlayerList {
            players,
            winning_players,
        });
        msgs
    }

    /// Connection-scoped cleanup when a socket goes away.
    pub async fn disconnect(&self, conn_id: &str) {
        let mut session = self.session.write().await;
        if session.joining_players.remove(conn_id).is_some() {
            self.broadcast_joining_players(&session);
        }
    }
}
