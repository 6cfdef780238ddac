pub mod app_state;
pub mod error;
pub mod handlers;
pub mod router;
pub mod runtime;
pub mod validation;

pub use app_state::AppState;
pub use router::create_router;
pub use runtime::run_server;
