pub mod action_log;
pub mod change_requests;
pub mod connection;

pub use connection::Database;
