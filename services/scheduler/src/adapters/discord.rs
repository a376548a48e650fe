use anyhow::Context;
use async_trait::async_trait;
use postgres_models::models::Category;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;

use super::MirrorChannel;
use crate::scheduler::render::OutboundPost;

const WHALE_COLOR: u32 = 0x1D9BF0;
const NEWS_COLOR: u32 = 0xE0245E;

/// Mirrors alerts into a Discord channel through an incoming webhook.
#[derive(Debug, Clone)]
pub struct DiscordWebhook {
    http: reqwest::Client,
    url: Url,
}

impl DiscordWebhook {
    pub fn new(url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            http,
            url: Url::parse(url).context("invalid DISCORD_WEBHOOK_URL")?,
        })
    }
}

fn payload(category: Category, post: &OutboundPost) -> Value {
    let content = match &post.video_url {
        Some(video) => format!("{}\n{video}", post.text),
        None => post.text.clone(),
    };
    let color = match category {
        Category::Whale => WHALE_COLOR,
        _ => NEWS_COLOR,
    };

    match &post.image_url {
        Some(image) => json!({
            "content": content,
            "embeds": [{ "color": color, "image": { "url": image } }],
        }),
        None => json!({ "content": content }),
    }
}

#[async_trait]
impl MirrorChannel for DiscordWebhook {
    async fn mirror(&self, category: Category, post: &OutboundPost) -> anyhow::Result<()> {
        self.http
            .post(self.url.clone())
            .json(&payload(category, post))
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected the message")?;

        tracing::debug!(category = %category, "mirrored alert");
        Ok(())
    }
}
