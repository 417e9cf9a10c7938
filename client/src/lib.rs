pub mod channels;
pub mod config;
pub mod error;
pub mod presence_store;
mod services;
pub mod state;
pub mod transport;

pub use services::session_service::{spawn_session, SessionHandle};
