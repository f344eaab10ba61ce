//! Application state and router assembly

mod router;
mod state;

pub use router::build_router;
pub use state::AppState;
