//! Condensed session summaries pushed to chat platforms.

use std::time::Duration;

use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};

use crate::analysis::AnalysisResult;
use crate::config::NotificationSettings;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// Minimal HTTP surface the notifier needs. Returns the response status code.
pub trait Transport {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<u16, NotifyError>;
    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, NotifyError>;
}

/// Blocking reqwest client
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<u16, NotifyError> {
        let response = self.client.post(url).form(form).send()?;
        Ok(response.status().as_u16())
    }

    fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<u16, NotifyError> {
        let response = self.client.post(url).json(body).send()?;
        Ok(response.status().as_u16())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Platform {
    Telegram,
    Discord,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    /// Platform answered with an unexpected status code
    Rejected(u16),
    /// Request never completed
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub platform: Platform,
    pub status: DeliveryStatus,
}

/// Render the five summary fields downstream consumers rely on.
pub fn format_summary(analysis: &AnalysisResult) -> String {
    format!(
        "🔔 Keystroke Dynamics Report\n\
         \n\
         📊 Total Keystrokes: {}\n\
         ⚡ Typing Speed: {:.1} WPM\n\
         ⏱️ Avg Interval: {:.3}s\n\
         🎯 Consistency: {:.1}%\n\
         ⏳ Session Duration: {:.1}s\n",
        analysis.total_keystrokes,
        analysis.typing_speed,
        analysis.avg_interval,
        analysis.rhythm_consistency * 100.0,
        analysis.session_duration,
    )
}

pub struct NotificationHandler<T: Transport> {
    settings: NotificationSettings,
    transport: T,
}

impl<T: Transport> NotificationHandler<T> {
    pub fn new(settings: NotificationSettings, transport: T) -> Self {
        Self {
            settings,
            transport,
        }
    }

    /// Send to every configured platform. Failures are returned, never raised.
    pub fn send_summary(&self, analysis: &AnalysisResult) -> Vec<Delivery> {
        let message = format_summary(analysis);
        let mut deliveries = Vec::new();

        if !self.settings.telegram.bot_token.is_empty() {
            deliveries.push(self.send_telegram(&message));
        }
        if !self.settings.discord.webhook_url.is_empty() {
            deliveries.push(self.send_discord(&message));
        }

        deliveries
    }

    fn send_telegram(&self, message: &str) -> Delivery {
        let telegram = &self.settings.telegram;
        let url = format!("{TELEGRAM_API}/bot{}/sendMessage", telegram.bot_token);
        let form = [
            ("chat_id", telegram.chat_id.as_str()),
            ("text", message),
            ("parse_mode", "HTML"),
        ];
        let result = self.transport.post_form(&url, &form);
        delivery(Platform::Telegram, result, 200)
    }

    fn send_discord(&self, message: &str) -> Delivery {
        let body = json!({ "content": message });
        let result = self
            .transport
            .post_json(&self.settings.discord.webhook_url, &body);
        delivery(Platform::Discord, result, 204)
    }
}

fn delivery(platform: Platform, result: Result<u16, NotifyError>, expected: u16) -> Delivery {
    let status = match result {
        Ok(code) if code == expected => {
            debug!(%platform, "notification sent");
            DeliveryStatus::Sent
        }
        Ok(code) => {
            warn!(%platform, code, "notification rejected");
            DeliveryStatus::Rejected(code)
        }
        Err(e) => {
            warn!(%platform, error = %e, "notification failed");
            DeliveryStatus::Failed(e.to_string())
        }
    };
    Delivery { platform, status }
}
