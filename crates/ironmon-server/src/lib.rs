pub mod api;
pub mod app;
pub mod auth;
pub mod error;
pub mod models;
pub mod state;

pub use api::create_router;
pub use app::{build_scheduler, scheduler_config};
pub use error::{ApiError, Result};
pub use state::AppState;
