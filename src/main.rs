use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pubquiz::questions::QuestionBank;
use pubquiz::state::{game, AppState};
use pubquiz::types::GameConfig;
use pubquiz::{broadcast, ws};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pubquiz=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting pubquiz...");

    let questions_file =
        std::env::var("QUESTIONS_FILE").unwrap_or_else(|_| "questions.json".to_string());
    let history_file = std::env::var("QUESTION_HISTORY_FILE")
        .unwrap_or_else(|_| "question_history.log".to_string());

    let bank = match QuestionBank::load(&questions_file, &history_file) {
        Ok(bank) => {
            tracing::info!("Loaded {} questions from {}", bank.len(), questions_file);
            bank
        }
        Err(e) => {
            tracing::error!("Failed to load questions from {}: {}", questions_file, e);
            std::process::exit(1);
        }
    };

    let state = Arc::new(AppState::new(bank, GameConfig::from_env()));

    // Draw the opening question set and mint the first host token
    game::reset_all(&state).await;

    // Spawn background task announcing the host token to connected clients
    broadcast::spawn_host_ping(state.clone());

    let app = Router::new()
        .route("/ws", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:9145".to_string());
    let addr: SocketAddr = match bind_addr.parse() {
        Ok(addr) => addr,
        Err(e) => {
            tracing::error!("Invalid BIND_ADDR {:?}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
