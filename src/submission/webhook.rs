use chrono::{DateTime, Utc};
use serde::Serialize;

const EMBED_COLOR_GREEN: u32 = 0x00ff00;

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct DiscordEmbed {
    pub title: String,
    pub fields: Vec<EmbedField>,
    pub color: u32,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<DiscordEmbed>,
}

impl WebhookPayload {
    pub fn config_uploaded(config_name: &str, username: &str, ip: &str, at: DateTime<Utc>) -> Self {
        let field = |name: &str, value: &str| EmbedField {
            name: name.to_string(),
            value: value.to_string(),
            inline: true,
        };

        Self {
            embeds: vec![DiscordEmbed {
                title: "New Config Uploaded".to_string(),
                fields: vec![
                    field("Config Name", config_name),
                    field("Username", username),
                    field("IP", ip),
                ],
                color: EMBED_COLOR_GREEN,
                timestamp: at.to_rfc3339(),
            }],
        }
    }
}

/// Post an upload notification; failures are logged and swallowed
pub async fn notify(http: &reqwest::Client, webhook_url: Option<&str>, payload: &WebhookPayload) {
    let Some(url) = webhook_url else {
        tracing::debug!("Webhook URL not configured, skipping notification");
        return;
    };

    match http.post(url).json(payload).send().await {
        Ok(response) if response.status().is_success() => {
            tracing::info!("Webhook notification sent");
        }
        Ok(response) => {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("Webhook failed (HTTP {}): {}", status, body);
        }
        Err(e) => tracing::warn!("Failed to send webhook notification: {}", e),
    }
}
