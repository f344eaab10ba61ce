//! Result presentation
//!
//! Renders the HTML pages behind `/view`: finished results, progress of
//! in-flight runs, and the listing of every run directory.

pub mod presenter;
pub mod routes;

pub use presenter::{ResultPresenter, RunListing};
pub use routes::view_routes;
