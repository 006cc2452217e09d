//! Email sending
//!
//! Outreach goes out over plain SMTP, rotating across the configured
//! sender accounts so no single address burns its daily cap. An optional
//! hosted relay accepts future-dated sends; when it is configured the
//! dispatch executor hands the whole schedule over instead of sleeping.

use chrono::{DateTime, Utc};
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::time::Duration;
use thiserror::Error;

use outreach_common::config::{EmailConfig, SenderAccount};
use outreach_common::db::quota::{self, QuotaScope};

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAX_PER_SENDER_PER_DAY: u32 = 30;

/// Email errors
#[derive(Debug, Error)]
pub enum EmailError {
    #[error("Invalid address {0}: {1}")]
    InvalidAddress(String, String),

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("All senders at daily cap")]
    AllSendersExhausted,

    #[error("Relay error: {0}")]
    Relay(String),

    #[error("Store error: {0}")]
    Store(#[from] outreach_common::Error),
}

/// Round-robin sender rotation with per-day caps.
///
/// Usage counts live in the store keyed by UTC calendar day, so caps
/// survive restarts and reset at midnight with no bookkeeping.
pub struct SenderPool {
    senders: Vec<SenderAccount>,
    max_per_day: u32,
    cursor: std::sync::atomic::AtomicUsize,
}

impl SenderPool {
    pub fn new(senders: Vec<SenderAccount>, max_per_day: Option<u32>) -> Self {
        Self {
            senders,
            max_per_day: max_per_day.unwrap_or(DEFAULT_MAX_PER_SENDER_PER_DAY),
            cursor: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Next sender with remaining quota, advancing the rotation.
    /// Errors when every account is at its cap.
    pub async fn next_available(
        &self,
        pool: &SqlitePool,
        now: DateTime<Utc>,
    ) -> Result<&SenderAccount, EmailError> {
        let start = self
            .cursor
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);

        for offset in 0..self.senders.len() {
            let sender = &self.senders[(start + offset) % self.senders.len()];
            let used = quota::used_today(pool, QuotaScope::Sender, &sender.email, now).await?;
            if used < self.max_per_day as i64 {
                return Ok(sender);
            }
        }

        Err(EmailError::AllSendersExhausted)
    }

    /// Record one send against a sender's daily quota
    pub async fn record_send(
        &self,
        pool: &SqlitePool,
        sender: &SenderAccount,
        now: DateTime<Utc>,
    ) -> Result<(), EmailError> {
        quota::increment(pool, QuotaScope::Sender, &sender.email, now).await?;
        Ok(())
    }
}

fn mailbox(name: Option<&str>, address: &str) -> Result<Mailbox, EmailError> {
    let raw = match name {
        Some(name) => format!("{} <{}>", name, address),
        None => address.to_string(),
    };
    raw.parse()
        .map_err(|e: lettre::address::AddressError| {
            EmailError::InvalidAddress(address.to_string(), e.to_string())
        })
}

/// SMTP mailer over STARTTLS
pub struct SmtpMailer {
    host: String,
    port: u16,
    from_name: Option<String>,
}

impl SmtpMailer {
    pub fn new(config: &EmailConfig, host: String) -> Self {
        Self {
            host,
            port: config.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
            from_name: config.from_name.clone(),
        }
    }

    /// Send one email through the given sender account
    pub async fn send(
        &self,
        sender: &SenderAccount,
        to: &str,
        subject: &str,
        body: &str,
    ) -> Result<(), EmailError> {
        let message = Message::builder()
            .from(mailbox(self.from_name.as_deref(), &sender.email)?)
            .to(mailbox(None, to)?)
            .subject(subject)
            .body(body.to_string())
            .map_err(|e| EmailError::Smtp(e.to_string()))?;

        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host)
            .map_err(|e| EmailError::Smtp(e.to_string()))?
            .port(self.port)
            .credentials(Credentials::new(
                sender.username.clone(),
                sender.password.clone(),
            ))
            .build();

        transport
            .send(message)
            .await
            .map_err(|e| EmailError::Smtp(e.to_string()))?;

        tracing::info!(to = %to, via = %sender.email, "Email sent");
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct RelayTask<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: &'a str,
    send_at: String,
}

#[derive(Debug, Deserialize)]
struct RelayResponse {
    task_id: String,
}

/// Hosted relay that queues future-dated sends server-side
pub struct RelayClient {
    http_client: reqwest::Client,
    endpoint: String,
}

impl RelayClient {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, EmailError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EmailError::Relay(e.to_string()))?;

        Ok(Self {
            http_client,
            endpoint: endpoint.into(),
        })
    }

    /// Queue a send for `send_at`, returning the relay task id
    pub async fn schedule(
        &self,
        from: &str,
        to: &str,
        subject: &str,
        body: &str,
        send_at: DateTime<Utc>,
    ) -> Result<String, EmailError> {
        let response = self
            .http_client
            .post(format!("{}/tasks", self.endpoint))
            .json(&RelayTask {
                from,
                to,
                subject,
                body,
                send_at: send_at.to_rfc3339(),
            })
            .send()
            .await
            .map_err(|e| EmailError::Relay(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(EmailError::Relay(format!("{}: {}", status, error_text)));
        }

        let body: RelayResponse = response
            .json()
            .await
            .map_err(|e| EmailError::Relay(e.to_string()))?;

        Ok(body.task_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use outreach_common::db::init_store;
    use tempfile::TempDir;

    fn sender(email: &str) -> SenderAccount {
        SenderAccount {
            email: email.to_string(),
            username: email.to_string(),
            password: "pw".to_string(),
        }
    }

    async fn test_store() -> (TempDir, SqlitePool) {
        let dir = TempDir::new().unwrap();
        let pool = init_store(&dir.path().join("test.db")).await.unwrap();
        (dir, pool)
    }

    #[tokio::test]
    async fn test_pool_rotates_across_senders() {
        let (_dir, db) = test_store().await;
        let pool = SenderPool::new(vec![sender("a@x.com"), sender("b@x.com")], Some(10));
        let now = Utc::now();

        let first = pool.next_available(&db, now).await.unwrap().email.clone();
        let second = pool.next_available(&db, now).await.unwrap().email.clone();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_pool_skips_capped_sender() {
        let (_dir, db) = test_store().await;
        let pool = SenderPool::new(vec![sender("a@x.com"), sender("b@x.com")], Some(1));
        let now = Utc::now();

        let a = sender("a@x.com");
        pool.record_send(&db, &a, now).await.unwrap();

        // a is at cap, so every pick lands on b
        for _ in 0..3 {
            let picked = pool.next_available(&db, now).await.unwrap();
            assert_eq!(picked.email, "b@x.com");
        }
    }

    #[tokio::test]
    async fn test_pool_errors_when_all_capped() {
        let (_dir, db) = test_store().await;
        let pool = SenderPool::new(vec![sender("a@x.com")], Some(1));
        let now = Utc::now();

        pool.record_send(&db, &sender("a@x.com"), now).await.unwrap();

        assert!(matches!(
            pool.next_available(&db, now).await,
            Err(EmailError::AllSendersExhausted)
        ));
    }

    #[test]
    fn test_mailbox_with_display_name() {
        let mb = mailbox(Some("Outreach"), "a@x.com").unwrap();
        assert_eq!(mb.email.to_string(), "a@x.com");
        assert!(mailbox(None, "not-an-address").is_err());
    }
}
