//! Sales opportunity tracking backend.
//!
//! Records opportunities and their activity logs, and reminds owners over
//! Slack when an opportunity has gone quiet for too long.

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod slack;
pub mod state;

pub use config::Config;
pub use error::{AppError, Result};
pub use routes::create_router;
pub use state::AppState;
