pub mod board;
pub mod connection;
pub mod engine;
pub mod error;
pub mod messages;
pub mod ponder;
pub mod protocol;
pub mod session;
pub mod translate;
