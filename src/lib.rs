pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod issue_tracker;
pub mod notify;
pub mod outbox;
pub mod shared;
pub mod tickets;
