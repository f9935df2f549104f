//! Email as a transport for AI agents: normalized messages, threaded
//! replies, IMAP/SMTP and Gmail REST backends, and a polling loop.

pub mod agent;
pub mod client;
pub mod config;
pub mod error;
pub mod message;
pub mod payload;
