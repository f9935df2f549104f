//! IMAP/SMTP transport — raw IMAP over rustls inbound, lettre outbound.
//!
//! The IMAP side speaks the protocol directly over a blocking TLS
//! stream (LOGIN, SELECT, SEARCH, FETCH, STORE, LOGOUT) with one short
//! session per operation, run under `spawn_blocking`. Outbound goes
//! through lettre's STARTTLS relay with the already-serialized RFC 5322
//! bytes, so the wire payload is exactly what `to_mime` produced.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::address::Envelope;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Address, SmtpTransport, Transport};
use secrecy::ExposeSecret;
use tracing::{debug, warn};

use super::{EmailClient, MailQuery};
use crate::config::EmailConfig;
use crate::error::ClientError;
use crate::message::EmailMessage;
use crate::payload::{parse_rfc5322, to_mime};

const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// IMAP polling plus SMTP sending against one mailbox.
pub struct ImapSmtpClient {
    config: EmailConfig,
}

impl ImapSmtpClient {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EmailClient for ImapSmtpClient {
    async fn fetch_unread(&self) -> Result<Vec<EmailMessage>, ClientError> {
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || fetch_blocking(&config, "UNSEEN", true))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))?
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ClientError> {
        let config = self.config.clone();
        let message = message.clone();
        tokio::task::spawn_blocking(move || send_blocking(&config, &message))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))?
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), ClientError> {
        let config = self.config.clone();
        let message_id = message_id.to_string();
        tokio::task::spawn_blocking(move || mark_read_blocking(&config, &message_id))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))?
    }

    async fn search(&self, query: &MailQuery) -> Result<Vec<EmailMessage>, ClientError> {
        let config = self.config.clone();
        let criteria = query.to_imap_search();
        let include_body = query.include_body;
        tokio::task::spawn_blocking(move || fetch_blocking(&config, &criteria, include_body))
            .await
            .map_err(|e| ClientError::Task(e.to_string()))?
    }
}

// ── Blocking operations ─────────────────────────────────────────────

fn fetch_blocking(
    config: &EmailConfig,
    criteria: &str,
    include_body: bool,
) -> Result<Vec<EmailMessage>, ClientError> {
    let mut session = ImapSession::open(config)?;
    let ids = session.search(criteria)?;
    debug!(count = ids.len(), criteria, "IMAP search complete");

    let item = if include_body { "RFC822" } else { "RFC822.HEADER" };
    let mut messages = Vec::new();
    for id in &ids {
        let raw = session.fetch(id, item)?;
        match parse_rfc5322(&raw) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(sequence = %id, error = %e, "Skipping unparseable message"),
        }
    }
    session.logout();
    Ok(messages)
}

fn mark_read_blocking(config: &EmailConfig, message_id: &str) -> Result<(), ClientError> {
    let mut session = ImapSession::open(config)?;
    // HEADER search matches substrings, so a bare id finds its <id> form;
    // generated gen- ids match nothing and fall through silently
    let ids = session.search(&format!("HEADER Message-ID {}", imap_quote(message_id)))?;
    if let Some(id) = ids.first() {
        session.command(&format!("STORE {id} +FLAGS (\\Seen)"))?;
    } else {
        debug!(message_id, "No IMAP match to mark read");
    }
    session.logout();
    Ok(())
}

fn send_blocking(config: &EmailConfig, message: &EmailMessage) -> Result<(), ClientError> {
    let bytes = to_mime(message)?;
    let envelope = build_envelope(message)?;

    let transport = SmtpTransport::starttls_relay(&config.smtp_host)
        .map_err(|e| ClientError::SendFailed(format!("SMTP relay setup: {e}")))?
        .port(config.smtp_port)
        .credentials(Credentials::new(
            config.address.clone(),
            config.password.expose_secret().to_string(),
        ))
        .build();

    transport
        .send_raw(&envelope, &bytes)
        .map_err(|e| ClientError::SendFailed(e.to_string()))?;
    debug!(to = ?message.to_addresses, "SMTP message sent");
    Ok(())
}

/// SMTP envelope: sender plus every To and Cc recipient.
fn build_envelope(message: &EmailMessage) -> Result<Envelope, ClientError> {
    let from = parse_address(&message.from_address)?;
    let recipients = message
        .to_addresses
        .iter()
        .chain(&message.cc_addresses)
        .map(|addr| parse_address(addr))
        .collect::<Result<Vec<_>, _>>()?;
    Envelope::new(Some(from), recipients).map_err(|e| ClientError::SendFailed(e.to_string()))
}

fn parse_address(addr: &str) -> Result<Address, ClientError> {
    addr.parse::<Address>()
        .map_err(|e| ClientError::SendFailed(format!("Invalid envelope address {addr:?}: {e}")))
}

// ── IMAP session ────────────────────────────────────────────────────

struct ImapSession {
    tls: rustls::StreamOwned<rustls::ClientConnection, TcpStream>,
    tag: u32,
}

impl ImapSession {
    /// Connect, read the greeting, LOGIN, SELECT the configured folder.
    fn open(config: &EmailConfig) -> Result<Self, ClientError> {
        let mut session = Self::connect(&config.imap_host, config.imap_port)?;
        session.login(&config.address, config.password.expose_secret())?;
        session.select(&config.folder)?;
        Ok(session)
    }

    fn connect(host: &str, port: u16) -> Result<Self, ClientError> {
        let connect_err = |reason: String| ClientError::Connect {
            host: host.to_string(),
            port,
            reason,
        };

        let tcp = TcpStream::connect((host, port)).map_err(|e| connect_err(e.to_string()))?;
        tcp.set_read_timeout(Some(READ_TIMEOUT))
            .map_err(|e| connect_err(e.to_string()))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        let tls_config = Arc::new(
            rustls::ClientConfig::builder()
                .with_root_certificates(roots)
                .with_no_client_auth(),
        );
        let server_name: rustls::pki_types::ServerName<'_> =
            rustls::pki_types::ServerName::try_from(host.to_string())
                .map_err(|e| connect_err(e.to_string()))?;
        let conn = rustls::ClientConnection::new(tls_config, server_name)
            .map_err(|e| connect_err(e.to_string()))?;

        let mut session = Self {
            tls: rustls::StreamOwned::new(conn, tcp),
            tag: 0,
        };
        session.read_line().map_err(connect_err)?; // greeting
        Ok(session)
    }

    fn login(&mut self, user: &str, password: &str) -> Result<(), ClientError> {
        let lines = self.command(&format!(
            "LOGIN {} {}",
            imap_quote(user),
            imap_quote(password)
        ))?;
        if tagged_ok(&lines) {
            Ok(())
        } else {
            Err(ClientError::AuthFailed {
                user: user.to_string(),
            })
        }
    }

    fn select(&mut self, folder: &str) -> Result<(), ClientError> {
        let lines = self.command(&format!("SELECT {}", imap_quote(folder)))?;
        if tagged_ok(&lines) {
            Ok(())
        } else {
            Err(ClientError::Imap {
                command: "SELECT".to_string(),
                reason: lines.last().cloned().unwrap_or_default().trim().to_string(),
            })
        }
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<String>, ClientError> {
        let lines = self.command(&format!("SEARCH {criteria}"))?;
        Ok(parse_search_ids(&lines))
    }

    fn fetch(&mut self, id: &str, item: &str) -> Result<Vec<u8>, ClientError> {
        let lines = self.command(&format!("FETCH {id} ({item})"))?;
        Ok(extract_raw_message(&lines))
    }

    fn logout(&mut self) {
        let _ = self.command("LOGOUT");
    }

    /// Send one tagged command and collect lines through its tagged reply.
    fn command(&mut self, cmd: &str) -> Result<Vec<String>, ClientError> {
        self.tag += 1;
        let tag = format!("A{}", self.tag);
        let name = cmd.split_whitespace().next().unwrap_or("").to_string();
        // errors carry the verb only, never the arguments
        let fail = |reason: String| ClientError::Imap {
            command: name.clone(),
            reason,
        };

        let full = format!("{tag} {cmd}\r\n");
        self.tls
            .write_all(full.as_bytes())
            .map_err(|e| fail(e.to_string()))?;
        self.tls.flush().map_err(|e| fail(e.to_string()))?;

        let mut lines = Vec::new();
        loop {
            let line = self.read_line().map_err(&fail)?;
            let done = line.starts_with(&tag);
            lines.push(line);
            if done {
                return Ok(lines);
            }
        }
    }

    fn read_line(&mut self) -> Result<String, String> {
        let mut buf = Vec::new();
        loop {
            let mut byte = [0u8; 1];
            match self.tls.read(&mut byte) {
                Ok(0) => return Err("IMAP connection closed".to_string()),
                Ok(_) => {
                    buf.push(byte[0]);
                    if buf.ends_with(b"\r\n") {
                        return Ok(String::from_utf8_lossy(&buf).to_string());
                    }
                }
                Err(e) => return Err(e.to_string()),
            }
        }
    }
}

// ── Response parsing (pure, separable from the socket) ──────────────

fn tagged_ok(lines: &[String]) -> bool {
    lines.last().is_some_and(|line| line.contains("OK"))
}

/// Collect ids from `* SEARCH n n n` lines.
fn parse_search_ids(lines: &[String]) -> Vec<String> {
    let mut ids = Vec::new();
    for line in lines {
        if let Some(rest) = line.strip_prefix("* SEARCH") {
            ids.extend(rest.split_whitespace().map(str::to_string));
        }
    }
    ids
}

/// Pull the raw message bytes out of a FETCH response.
///
/// The first line is the untagged `* n FETCH (... {size}` announcement,
/// the last two are the closing `)` and the tagged completion; the
/// literal in between still carries its CRLF line endings.
fn extract_raw_message(lines: &[String]) -> Vec<u8> {
    if lines.len() < 4 {
        return Vec::new();
    }
    lines[1..lines.len() - 2].concat().into_bytes()
}

/// IMAP quoted-string with `\` and `"` escaped.
fn imap_quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

// ── Tests ───────────────────────────────────────────────────────────
