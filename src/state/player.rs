//! Roster operations: joining, the lobby typing indicator, and the
//! host-controlled presentation state.

use super::{AppState, Session};
use crate::protocol::ServerMessage;
use crate::types::Player;
use std::net::IpAddr;

/// Rejection sent to clients holding a token from before the last reset.
pub const HOST_SESSION_MISMATCH: &str =
    "Host session mismatch. Reload the page to join the current game.";
const USERNAME_TAKEN: &str = "Username already taken.";

/// Head start for whoever opens a fresh roster. A long-standing quirk of
/// this game, kept on purpose.
const FIRST_JOIN_BONUS: u64 = 3;

impl AppState {
    /// Join or rejoin the session.
    ///
    /// A new name creates a participant; the same name from the same
    /// address re-binds the connection (reconnect); the same name from a
    /// different address is a conflict. On success the caller gets the
    /// messages owed to the joining connection (ack, plus question and
    /// deadline when a round is already running); rejections come back as
    /// the error text for that connection alone, and nothing is mutated.
    pub async fn join(
        &self,
        username: &str,
        host_token: &str,
        conn_id: &str,
        ip: IpAddr,
    ) -> Result<Vec<ServerMessage>, String> {
        let mut session = self.session.write().await;

        if host_token != session.host_token {
            return Err(HOST_SESSION_MISMATCH.to_string());
        }

        let is_new = match session.players.iter().position(|p| p.username == username) {
            None => {
                let score = if session.players.is_empty() {
                    FIRST_JOIN_BONUS
                } else {
                    0
                };
                session.players.push(Player {
                    username: username.to_string(),
                    score,
                    conn_id: conn_id.to_string(),
                    ip,
                });
                tracing::info!("{username} joined the game from {ip}");
                true
            }
            Some(i) if session.players[i].ip == ip => {
                session.players[i].conn_id = conn_id.to_string();
                tracing::info!("{username} re-joined the game from {ip}");
                false
            }
            Some(_) => return Err(USERNAME_TAKEN.to_string()),
        };

        // The name is no longer "joining" once it is on the roster.
        if session.joining_players.remove(conn_id).is_some() {
            self.broadcast_joining_players(&session);
        }
        if is_new {
            let _ = self.broadcast.send(ServerMessage::PlayerJoined {
                username: username.to_string(),
            });
        }
        self.broadcast_player_list(&session.players);

        let mut replies = vec![ServerMessage::Joined {
            username: username.to_string(),
        }];
        if let Some(question) = session.current_question() {
            replies.push(ServerMessage::question(
                question,
                session.current_question_index as usize,
            ));
            if session.clock.round_timer_armed() {
                if let Some(end_time) = session.end_time {
                    replies.push(ServerMessage::Timer {
                        end_time,
                        duration: self.config.round_seconds,
                    });
                }
            }
        }
        Ok(replies)
    }

    /// Track a name being typed into a join form and tell everyone. An
    /// empty name clears the connection's entry.
    pub async fn typing_username(&self, conn_id: &str, username: &str) {
        let mut session = self.session.write().await;
        let trimmed = username.trim();
        let changed = if trimmed.is_empty() {
            session.joining_players.remove(conn_id).is_some()
        } else {
            session
                .joining_players
                .insert(conn_id.to_string(), trimmed.to_string())
                .as_deref()
                != Some(trimmed)
        };
        if changed {
            self.broadcast_joining_players(&session);
        }
    }

    /// Store the host-chosen presentation state and push it to everyone.
    pub async fn set_gamestate(&self, gamestate: &str, host_token: &str) -> Result<(), String> {
        let mut session = self.session.write().await;
        if host_token != session.host_token {
            return Err(HOST_SESSION_MISMATCH.to_string());
        }
        session.gamestate = Some(gamestate.to_string());
        let _ = self.broadcast.send(ServerMessage::Gamestate {
            state: gamestate.to_string(),
        });
        Ok(())
    }

    /// Current lobby typing list, sorted so the broadcast is
    /// deterministic.
    pub(crate) fn broadcast_joining_players(&self, session: &Session) {
        let mut usernames: Vec<String> = session.joining_players.values().cloned().collect();
        usernames.sort();
        let _ = self
            .broadcast
            .send(ServerMessage::UpdateJoiningPlayers { usernames });
    }
}
