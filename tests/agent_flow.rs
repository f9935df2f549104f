//! End-to-end agent flow: raw message bytes in, threaded reply bytes
//! out, with the polling loop driving a stub transport.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, timeout};

use mail_agent::agent::{EmailAgent, MessageHandler};
use mail_agent::client::{EmailClient, MailQuery};
use mail_agent::error::{ClientError, Error};
use mail_agent::message::EmailMessage;
use mail_agent::payload::{parse_rfc5322, to_mime};

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const RAW_REQUEST: &str = concat!(
    "Message-ID: <req-1@example.com>\r\n",
    "References: <req-0@example.com>\r\n",
    "Date: Mon, 1 Jan 2024 12:00:00 +0000\r\n",
    "From: user@example.com\r\n",
    "To: agent@example.com\r\n",
    "Subject: Deploy status?\r\n",
    "\r\n",
    "Is the deploy done?\r\n",
);

/// Opt into agent logs with `RUST_LOG=debug cargo test`.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

#[derive(Default)]
struct StubMailbox {
    inbox: Mutex<Vec<EmailMessage>>,
    sent: Mutex<Vec<EmailMessage>>,
    read: Mutex<Vec<String>>,
}

#[async_trait]
impl EmailClient for StubMailbox {
    async fn fetch_unread(&self) -> Result<Vec<EmailMessage>, ClientError> {
        Ok(self.inbox.lock().unwrap().clone())
    }

    async fn send(&self, message: &EmailMessage) -> Result<(), ClientError> {
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn mark_read(&self, message_id: &str) -> Result<(), ClientError> {
        self.read.lock().unwrap().push(message_id.to_string());
        Ok(())
    }

    async fn search(&self, _query: &MailQuery) -> Result<Vec<EmailMessage>, ClientError> {
        Ok(Vec::new())
    }
}

struct EchoHandler;

#[async_trait]
impl MessageHandler for EchoHandler {
    async fn handle(&self, message: &EmailMessage) -> Result<Option<EmailMessage>, Error> {
        Ok(Some(message.create_reply("On it.", true, 1)?))
    }
}

fn agent_over(mailbox: &Arc<StubMailbox>, interval: Duration) -> EmailAgent {
    EmailAgent::new(
        Arc::clone(mailbox) as Arc<dyn EmailClient>,
        Arc::new(EchoHandler),
        "agent@example.com",
        interval,
    )
}

#[tokio::test]
async fn wire_round_trip_produces_threaded_reply() {
    init_logs();
    let inbound = parse_rfc5322(RAW_REQUEST.as_bytes()).unwrap();
    let mailbox = Arc::new(StubMailbox::default());
    mailbox.inbox.lock().unwrap().push(inbound);

    let agent = agent_over(&mailbox, Duration::from_secs(60));
    assert_eq!(agent.poll_once().await.unwrap(), 1);

    let sent = mailbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let reply = &sent[0];
    assert_eq!(reply.subject, "Re: Deploy status?");
    assert_eq!(reply.from_address, "agent@example.com");
    assert_eq!(reply.to_addresses, vec!["user@example.com".to_string()]);
    assert_eq!(reply.in_reply_to.as_deref(), Some("req-1@example.com"));
    assert_eq!(
        reply.references,
        vec!["req-0@example.com".to_string(), "req-1@example.com".to_string()]
    );

    // Serialize the reply and read it back the way a mail client would.
    let bytes = to_mime(reply).unwrap();
    let parsed = parse_rfc5322(&bytes).unwrap();
    assert_eq!(parsed.in_reply_to.as_deref(), Some("req-1@example.com"));
    assert_eq!(
        parsed.references.last().map(String::as_str),
        Some("req-1@example.com")
    );
    assert!(parsed.body_text.contains("On it."));
    assert!(parsed.body_text.contains("> Is the deploy done?"));
    // quoted history reads as a blockquote, so an HTML part is synthesized
    assert!(parsed.body_html.unwrap().contains("<blockquote>"));
}

#[tokio::test]
async fn spawned_loop_replies_then_stops() {
    init_logs();
    let mailbox = Arc::new(StubMailbox::default());
    mailbox.inbox.lock().unwrap().push(
        EmailMessage::new(
            "user@example.com",
            vec!["agent@example.com".into()],
            "Ping",
            "ping",
        )
        .unwrap()
        .with_message_id("ping-1"),
    );

    let (handle, shutdown) = agent_over(&mailbox, Duration::from_millis(10)).spawn();

    timeout(TEST_TIMEOUT, async {
        while mailbox.sent.lock().unwrap().is_empty() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("agent never sent a reply");

    shutdown.store(true, Ordering::Relaxed);
    timeout(TEST_TIMEOUT, handle)
        .await
        .expect("agent did not stop after shutdown")
        .unwrap();

    // dedup holds across however many ticks ran before shutdown
    assert_eq!(mailbox.sent.lock().unwrap().len(), 1);
    assert!(mailbox.read.lock().unwrap().contains(&"ping-1".to_string()));
}

#[tokio::test]
async fn empty_subject_and_body_still_flow_through() {
    init_logs();
    let mailbox = Arc::new(StubMailbox::default());
    {
        let mut inbox = mailbox.inbox.lock().unwrap();
        inbox.push(
            EmailMessage::new("user@example.com", vec!["agent@example.com".into()], "", "")
                .unwrap()
                .with_message_id("bare-1"),
        );
        inbox.push(
            EmailMessage::new(
                "user@example.com",
                vec!["agent@example.com".into()],
                "Second",
                "body",
            )
            .unwrap()
            .with_message_id("full-2"),
        );
    }

    let agent = agent_over(&mailbox, Duration::from_secs(60));
    assert_eq!(agent.poll_once().await.unwrap(), 2);

    let sent = mailbox.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].subject, "Re: ");
    assert_eq!(sent[1].subject, "Re: Second");
}
