use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

use crate::alerts::messages::Notification;
use crate::config::NOTIFY_TIMEOUT_SECS;
use crate::error::{AppError, Result};

/// Fire-and-forget delivery of one notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Delivers notifications to a Caelum daemon as newline-delimited JSON-RPC 2.0.
pub struct CaelumNotifier {
    addr: String,
    budget: Duration,
}

impl CaelumNotifier {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            budget: Duration::from_secs(NOTIFY_TIMEOUT_SECS),
        }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    fn request(notification: &Notification) -> serde_json::Value {
        serde_json::json!({
            "jsonrpc": "2.0",
            "method": "send_notification",
            "params": {
                "title": notification.title,
                "message": notification.message,
                "priority": notification.priority,
                "device": "all",
                "category": notification.category,
                "data": notification.data,
            },
            "id": 1,
        })
    }
}

#[async_trait]
impl Notifier for CaelumNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        let stream = timeout(self.budget, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| AppError::Timeout(format!("connecting to Caelum at {}", self.addr)))??;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = serde_json::to_string(&Self::request(notification))?;
        line.push('\n');
        timeout(self.budget, write_half.write_all(line.as_bytes()))
            .await
            .map_err(|_| AppError::Timeout(format!("writing to Caelum at {}", self.addr)))??;

        let mut reader = BufReader::new(read_half);
        let mut response = String::new();
        timeout(self.budget, reader.read_line(&mut response))
            .await
            .map_err(|_| AppError::Timeout(format!("waiting for Caelum at {}", self.addr)))??;

        let reply: serde_json::Value = serde_json::from_str(response.trim())?;
        if let Some(err) = reply.get("error").filter(|e| !e.is_null()) {
            return Err(AppError::Notify(format!("Caelum rejected notification: {err}")));
        }

        info!(title = %notification.title, "Caelum notification sent");
        Ok(())
    }
}

/// Used when no transport is configured: the alert only reaches the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            priority = %notification.priority,
            "ALERT | {} | {}",
            notification.title,
            notification.message.replace('\n', " | "),
        );
        Ok(())
    }
}
