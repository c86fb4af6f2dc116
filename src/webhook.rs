use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::Serialize;
use tracing::debug;

/// Body of an incoming-webhook post
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub text: &'a str,
}

/// Something that can deliver a line of text to a webhook URL
#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn post(&self, url: &Url, text: &str) -> Result<()>;
}

/// Teams incoming-webhook client
pub struct WebhookClient {
    client: reqwest::Client,
}

impl WebhookClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build webhook HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl WebhookSink for WebhookClient {
    async fn post(&self, url: &Url, text: &str) -> Result<()> {
        let body = serde_json::to_vec(&Payload { text })
            .context("Failed to serialize webhook payload")?;

        debug!(
            "Posting {} bytes to webhook {}",
            body.len(),
            url.host_str().unwrap_or_default()
        );

        let response = self
            .client
            .post(url.clone())
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .context("Failed to send message to webhook")?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Got response code {} when sending message to webhook: {}",
                status.as_u16(),
                error_body
            );
        }

        Ok(())
    }
}
