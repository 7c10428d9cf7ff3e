//! Outbound Delivery
//!
//! Pushes coach replies and practice reminders to a chat channel. The only
//! channel implemented is a WeCom group robot webhook. Delivery is best
//! effort: callers spawn it and failures are only logged.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Channel hint for which chat replies are also pushed through the notifier.
pub const WECOM_CHANNEL: &str = "wecom";
const WECOM_TIMEOUT: Duration = Duration::from_secs(10);

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message` to the channel, mentioning `trainee_id`.
    async fn send(&self, trainee_id: &str, message: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct WecomResponse {
    errcode: i64,
    #[serde(default)]
    errmsg: String,
}

pub struct WecomNotifier {
    client: reqwest::Client,
    webhook_url: String,
}

impl WecomNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(WECOM_TIMEOUT)
            .build()
            .context("Failed to build WeCom HTTP client")?;
        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
        })
    }
}

/// Robot text message; an empty trainee id mentions nobody.
pub fn wecom_payload(trainee_id: &str, message: &str) -> Value {
    let mentioned: Vec<&str> = if trainee_id.is_empty() {
        vec![]
    } else {
        vec![trainee_id]
    };
    json!({
        "msgtype": "text",
        "text": {
            "content": message,
            "mentioned_list": mentioned,
        }
    })
}

#[async_trait]
impl Notifier for WecomNotifier {
    async fn send(&self, trainee_id: &str, message: &str) -> Result<()> {
        let response = self
            .client
            .post(&self.webhook_url)
            .json(&wecom_payload(trainee_id, message))
            .send()
            .await
            .context("WeCom webhook request failed")?
            .error_for_status()
            .context("WeCom webhook returned an error status")?;

        let body: WecomResponse = response
            .json()
            .await
            .context("WeCom webhook returned an unreadable body")?;
        if body.errcode != 0 {
            bail!("WeCom rejected the message: {} ({})", body.errmsg, body.errcode);
        }
        debug!(trainee_id, "Message delivered to WeCom");
        Ok(())
    }
}

/// Sends in a background task; the outcome is only logged.
pub fn deliver_in_background(notifier: Arc<dyn Notifier>, trainee_id: String, message: String) {
    tokio::spawn(async move {
        if let Err(e) = notifier.send(&trainee_id, &message).await {
            warn!(trainee_id = %trainee_id, "Failed to deliver message: {:?}", e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::State, routing::post};
    use tokio::sync::mpsc;

    async fn spawn_robot(errcode: i64) -> (String, mpsc::Receiver<Value>) {
        let (tx, rx) = mpsc::channel(4);
        let app = Router::new()
            .route(
                "/send",
                post(
                    move |State(tx): State<mpsc::Sender<Value>>, Json(body): Json<Value>| async move {
                        tx.send(body).await.ok();
                        Json(json!({ "errcode": errcode, "errmsg": "invalid webhook url" }))
                    },
                ),
            )
            .with_state(tx);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/send"), rx)
    }

    #[test]
    fn test_wecom_payload_shape() {
        let payload = wecom_payload("zhang", "📊 训练完成！");
        assert_eq!(payload["msgtype"], "text");
        assert_eq!(payload["text"]["content"], "📊 训练完成！");
        assert_eq!(payload["text"]["mentioned_list"], json!(["zhang"]));
        assert_eq!(wecom_payload("", "hi")["text"]["mentioned_list"], json!([]));
    }

    #[tokio::test]
    async fn test_wecom_notifier_posts_payload() {
        let (url, mut rx) = spawn_robot(0).await;
        let notifier = WecomNotifier::new(url).unwrap();
        notifier.send("zhang", "练习提醒").await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body, wecom_payload("zhang", "练习提醒"));
    }

    #[tokio::test]
    async fn test_wecom_notifier_surfaces_rejections() {
        let (url, _rx) = spawn_robot(93000).await;
        let notifier = WecomNotifier::new(url).unwrap();
        let err = notifier.send("zhang", "hi").await.unwrap_err();
        assert!(err.to_string().contains("93000"));
    }
}
