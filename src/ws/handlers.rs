//! WebSocket message dispatch
//!
//! The single entry point for client messages. Each arm hands off to the
//! state layer and returns only the replies meant for the requesting
//! connection; everything room-wide leaves on the broadcast channel from
//! inside the state layer itself.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{game, AppState};
use chrono::Utc;
use std::net::IpAddr;
use std::sync::Arc;

/// Handle a client message and return the direct replies for this
/// connection. Most messages answer through the broadcast channel and
/// return nothing here.
pub async fn handle_message(
    msg: ClientMessage,
    conn_id: &str,
    ip: IpAddr,
    state: &Arc<AppState>,
) -> Vec<ServerMessage> {
    match msg {
        ClientMessage::Join {
            username,
            host_token,
        } => match state.join(&username, &host_token, conn_id, ip).await {
            Ok(replies) => replies,
            Err(message) => vec![ServerMessage::Error { message }],
        },

        ClientMessage::Answer {
            username,
            answer_index,
        } => {
            game::submit_answer(state, &username, answer_index).await;
            Vec::new()
        }

        ClientMessage::StartGame => {
            game::start_game(state).await;
            Vec::new()
        }

        ClientMessage::NextQuestion { question_index } => {
            game::advance(state, question_index).await;
            Vec::new()
        }

        ClientMessage::ResetAll => {
            game::reset_all(state).await;
            Vec::new()
        }

        ClientMessage::TypingUsername { username } => {
            state.typing_username(conn_id, &username).await;
            Vec::new()
        }

        ClientMessage::SetGamestate {
            state: gamestate,
            host_token,
        } => match state.set_gamestate(&gamestate, &host_token).await {
            Ok(()) => Vec::new(),
            Err(message) => vec![ServerMessage::Error { message }],
        },

        ClientMessage::TimePing { client_ts } => {
            let server_ts = Utc::now().timestamp_millis() as f64 / 1000.0;
            vec![ServerMessage::TimePong {
                client_ts,
                server_ts,
            }]
        }
    }
}
