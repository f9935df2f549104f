//! Transport clients — the I/O boundary around the message core.

pub mod gmail;
pub mod imap;
pub mod query;

use async_trait::async_trait;

use crate::error::ClientError;
use crate::message::EmailMessage;

pub use gmail::GmailClient;
pub use imap::ImapSmtpClient;
pub use query::MailQuery;

/// One mailbox transport — an IMAP/SMTP pair or a provider REST API.
///
/// Implementations own all I/O and credentials; inbound payloads go
/// through the payload module so every transport yields the same
/// canonical messages. Unparseable individual messages are logged and
/// skipped, never returned partially.
#[async_trait]
pub trait EmailClient: Send + Sync {
    /// Fetch unread messages with full bodies.
    async fn fetch_unread(&self) -> Result<Vec<EmailMessage>, ClientError>;

    /// Send one outbound message.
    async fn send(&self, message: &EmailMessage) -> Result<(), ClientError>;

    /// Mark a previously fetched message as read.
    async fn mark_read(&self, message_id: &str) -> Result<(), ClientError>;

    /// Fetch messages matching a query filter.
    async fn search(&self, query: &MailQuery) -> Result<Vec<EmailMessage>, ClientError>;
}
