// Public API for integration tests and potential library usage

pub mod protocol;
pub mod questions;
pub mod shuffle;
pub mod state;
pub mod types;
pub mod ws;

// Re-export broadcast for testing
pub mod broadcast;
