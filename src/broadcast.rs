use crate::protocol::ServerMessage;
use crate::state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// Spawn a background task that periodically announces the current host
/// token, so a host page left open across a reset notices it has gone stale
pub fn spawn_host_ping(state: Arc<AppState>) {
    tokio::spawn(async move {
        let period = Duration::from_secs(state.config.host_ping_seconds as u64);

        loop {
            tokio::time::sleep(period).await;

            let token = state.session.read().await.host_token.clone();
            if token.is_empty() {
                continue;
            }

            // Ignore send errors (no receivers connected is fine)
            let _ = state.broadcast.send(ServerMessage::HostPing { token });
        }
    });
}
