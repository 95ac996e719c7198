pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use routes::router;
pub use state::{AppState, SharedState};
