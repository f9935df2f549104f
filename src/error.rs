//! Error types for mail-agent.

/// Top-level error type for the agent.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Message error: {0}")]
    Message(#[from] MessageError),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    #[error("Client error: {0}")]
    Client(#[from] ClientError),

    #[error("Handler error: {0}")]
    Handler(String),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Canonical-message construction and reply errors.
///
/// Construction failures are hard errors, never coerced; the reply
/// precondition gets its own variant so callers can tell "you built a
/// bad message" apart from "this message cannot be replied to".
#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("Invalid {field} address: {address}")]
    InvalidAddress { field: String, address: String },

    #[error("References must be a string or a sequence of strings, got {found}")]
    InvalidReferences { found: String },

    #[error("Cannot reply to a message with no recipients")]
    NoRecipients,
}

/// Transport payload errors — raw MIME bytes or provider JSON.
///
/// Individual undecodable leaves inside an otherwise readable payload are
/// skipped during extraction and never surface here; these variants mean
/// the payload as a whole produced no message.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("Unparseable message payload: {0}")]
    Malformed(String),

    #[error("Missing {field} in provider payload")]
    MissingField { field: String },

    #[error("Failed to build MIME message: {0}")]
    MimeBuild(String),

    #[error("Invalid message: {0}")]
    Validation(#[from] MessageError),
}

/// Transport client errors (IMAP, SMTP, provider HTTP).
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Failed to connect to {host}:{port}: {reason}")]
    Connect {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed for {user}")]
    AuthFailed { user: String },

    #[error("IMAP {command} failed: {reason}")]
    Imap { command: String, reason: String },

    #[error("Failed to send message: {0}")]
    SendFailed(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Provider API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),
}

/// Result type alias for the agent.
pub type Result<T> = std::result::Result<T, Error>;
