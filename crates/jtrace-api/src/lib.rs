pub mod admin;
pub mod auth;
pub mod comments;
pub mod envelope;
pub mod error;
pub mod extract;
pub mod files;
pub mod footprint_types;
pub mod footprints;
pub mod map;
pub mod middleware;
pub mod render;
pub mod routes;
pub mod state;
pub mod tokens;
pub mod upload;

pub use routes::build_router;
pub use state::{AppState, AppStateInner};
