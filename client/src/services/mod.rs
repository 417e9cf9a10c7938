pub mod message_service;
pub mod presence_service;
pub mod session_service;
