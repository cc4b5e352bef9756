//! Telegram Bot API sink.
//!
//! Sends through `sendMessage` and maps the API's error descriptions onto
//! [`SendError`] so the delivery engine can tell an oversize message apart
//! from a markup problem or a generic failure.

use super::{MessageSink, ParseMode};
use crate::error::SendError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects message texts longer than this (in characters).
pub const MAX_MESSAGE_CHARS: usize = 4096;

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'static str>,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

pub struct TelegramSink {
    client: Client,
    api_base: String,
    token: String,
    chat_id: String,
}

impl fmt::Debug for TelegramSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramSink")
            .field("api_base", &self.api_base)
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramSink {
    pub fn new(token: &str, chat_id: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_base: TELEGRAM_API_BASE.to_string(),
            token: token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }
}

fn parse_mode_param(mode: ParseMode) -> Option<&'static str> {
    match mode {
        ParseMode::Html => Some("HTML"),
        ParseMode::Plain => None,
    }
}

/// Classify a failed `sendMessage` call from its status and description.
pub fn classify_failure(status: u16, description: &str, retry_after: Option<u64>) -> SendError {
    let lower = description.to_lowercase();
    if lower.contains("message is too long") || lower.contains("text is too long") {
        SendError::SizeExceeded(description.to_string())
    } else if lower.contains("can't parse entities") || lower.contains("can't find end of") {
        SendError::FormatInvalid(description.to_string())
    } else if status == 429 {
        SendError::RateLimited { retry_after }
    } else {
        SendError::Other(format!("HTTP {status}: {description}"))
    }
}

impl MessageSink for TelegramSink {
    #[instrument(level = "debug", skip_all, fields(chat_id = %self.chat_id, mode = ?mode, chars = tracing::field::Empty))]
    async fn send_message(&self, text: &str, mode: ParseMode, link_preview: bool) -> Result<(), SendError> {
        let chars = text.chars().count();
        tracing::Span::current().record("chars", chars);
        if chars > MAX_MESSAGE_CHARS {
            return Err(SendError::SizeExceeded(format!(
                "{chars} characters exceeds the {MAX_MESSAGE_CHARS} limit"
            )));
        }

        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: parse_mode_param(mode),
            disable_web_page_preview: !link_preview,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .json(&request)
            .send()
            .await
            .map_err(|e| SendError::Other(e.without_url().to_string()))?;

        let status = resp.status().as_u16();
        let body: ApiResponse = match resp.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!(status, error = %e.without_url(), "Unreadable sendMessage response");
                return Err(SendError::Other(format!("HTTP {status}: unreadable response")));
            }
        };

        if body.ok {
            debug!("Message accepted");
            return Ok(());
        }
        let description = body.description.unwrap_or_default();
        let retry_after = body.parameters.and_then(|p| p.retry_after);
        Err(classify_failure(status, &description, retry_after))
    }
}
