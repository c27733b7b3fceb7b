pub mod api;
pub mod error;
pub mod ws;

pub use api::{AppState, router};
