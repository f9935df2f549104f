//! Poll-driven agent loop: fetch unread, hand to the handler, reply.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::EmailClient;
use crate::error::Error;
use crate::message::EmailMessage;

/// Business logic invoked once per inbound message.
///
/// Returning `Ok(Some(reply))` sends the reply through the same
/// transport; `Ok(None)` consumes the message without responding.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &EmailMessage) -> Result<Option<EmailMessage>, Error>;
}

/// Drives the pipeline: poll the mailbox, hand each new message to the
/// handler, send back whatever it returns.
pub struct EmailAgent {
    client: Arc<dyn EmailClient>,
    handler: Arc<dyn MessageHandler>,
    /// The agent's own address; inbound mail from it is dropped to
    /// prevent reply loops.
    address: String,
    poll_interval: Duration,
    seen: Mutex<HashSet<String>>,
}

impl EmailAgent {
    pub fn new(
        client: Arc<dyn EmailClient>,
        handler: Arc<dyn MessageHandler>,
        address: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            client,
            handler,
            address: address.into(),
            poll_interval,
            seen: Mutex::new(HashSet::new()),
        }
    }

    /// Run one poll cycle; returns how many messages were handled.
    ///
    /// A fetch failure aborts the cycle; per-message failures (mark,
    /// handle, send) are logged and the cycle continues.
    pub async fn poll_once(&self) -> Result<usize, Error> {
        let messages = self.client.fetch_unread().await?;
        if messages.is_empty() {
            return Ok(0);
        }
        debug!("Fetched {} unread messages", messages.len());

        let mut handled = 0;
        for message in &messages {
            if message.from_address.eq_ignore_ascii_case(&self.address) {
                debug!(sender = %message.from_address, "Skipping self-sent message");
                self.mark_read_logged(&message.message_id).await;
                continue;
            }
            if !self.claim_unseen(&message.message_id) {
                continue;
            }
            self.mark_read_logged(&message.message_id).await;

            match self.handler.handle(message).await {
                Ok(Some(reply)) => match self.client.send(&reply).await {
                    Ok(()) => {
                        info!(
                            message_id = %message.message_id,
                            to = ?reply.to_addresses,
                            "Reply sent"
                        );
                        handled += 1;
                    }
                    Err(e) => {
                        error!(message_id = %message.message_id, error = %e, "Failed to send reply");
                    }
                },
                Ok(None) => {
                    debug!(message_id = %message.message_id, "Handled without reply");
                    handled += 1;
                }
                Err(e) => {
                    error!(message_id = %message.message_id, error = %e, "Handler failed");
                }
            }
        }
        Ok(handled)
    }

    /// In-memory dedup by message id; true when this id is new.
    fn claim_unseen(&self, message_id: &str) -> bool {
        self.seen.lock().unwrap().insert(message_id.to_string())
    }

    async fn mark_read_logged(&self, message_id: &str) {
        if let Err(e) = self.client.mark_read(message_id).await {
            warn!(message_id, error = %e, "Failed to mark message read");
        }
    }

    /// Spawn the poll loop. Returns the task handle and a shutdown
    /// flag; set the flag to stop at the next tick.
    pub fn spawn(self) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!(
                "Mail agent started, polling every {}s as {}",
                self.poll_interval.as_secs(),
                self.address
            );

            let mut tick = tokio::time::interval(self.poll_interval);

            loop {
                tick.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    info!("Mail agent shutting down");
                    return;
                }

                match self.poll_once().await {
                    Ok(0) => {}
                    Ok(handled) => debug!(handled, "Poll tick complete"),
                    Err(e) => error!("Poll failed: {e}"),
                }
            }
        });

        (handle, shutdown_flag)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
