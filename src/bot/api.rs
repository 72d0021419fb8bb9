//! Minimal Telegram Bot API client.
//!
//! Only the handful of methods the front end needs; every call posts JSON and
//! unwraps the `{ok, result, description}` envelope. Two agents because long
//! polling must outlive the server-side hold while everything else should fail
//! fast.

use std::time::Duration;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;

const API_BASE: &str = "https://api.telegram.org";
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);
/// Server-side long-poll hold, in seconds (getUpdates `timeout` parameter).
const POLL_HOLD_SECS: u64 = 50;
const POLL_HTTP_TIMEOUT: Duration = Duration::from_secs(70);
const ERROR_DETAIL_MAX: usize = 300;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("telegram transport failed: {0}")]
    Transport(String),

    #[error("telegram returned HTTP {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("telegram rejected the call: {0}")]
    Rejected(String),

    #[error("malformed telegram payload: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
}

#[derive(Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

pub struct TelegramApi {
    base: String,
    agent: ureq::Agent,
    poll_agent: ureq::Agent,
}

impl TelegramApi {
    pub fn new(token: &str) -> Self {
        Self {
            base: format!("{API_BASE}/bot{token}"),
            agent: ureq::AgentBuilder::new().timeout(HTTP_TIMEOUT).build(),
            poll_agent: ureq::AgentBuilder::new().timeout(POLL_HTTP_TIMEOUT).build(),
        }
    }

    /// Long-poll for updates after `offset`.
    pub fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, ApiError> {
        self.call(
            &self.poll_agent,
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": POLL_HOLD_SECS,
                "allowed_updates": ["message"],
            }),
        )
    }

    pub fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ApiError> {
        self.call::<serde_json::Value>(
            &self.agent,
            "sendMessage",
            json!({ "chat_id": chat_id, "text": text }),
        )?;
        Ok(())
    }

    /// Best-effort "typing..." indicator.
    pub fn send_typing(&self, chat_id: i64) -> Result<(), ApiError> {
        self.call::<serde_json::Value>(
            &self.agent,
            "sendChatAction",
            json!({ "chat_id": chat_id, "action": "typing" }),
        )?;
        Ok(())
    }

    pub fn set_webhook(&self, url: &str, secret: &str) -> Result<(), ApiError> {
        self.call::<serde_json::Value>(
            &self.agent,
            "setWebhook",
            json!({
                "url": url,
                "secret_token": secret,
                "allowed_updates": ["message"],
            }),
        )?;
        Ok(())
    }

    pub fn delete_webhook(&self) -> Result<(), ApiError> {
        self.call::<serde_json::Value>(&self.agent, "deleteWebhook", json!({}))?;
        Ok(())
    }

    fn call<T: DeserializeOwned>(
        &self,
        agent: &ureq::Agent,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T, ApiError> {
        let url = format!("{}/{method}", self.base);
        let response = agent
            .post(&url)
            .set("Content-Type", "application/json")
            .send_string(&payload.to_string())
            .map_err(map_http_error)?;
        let body = response
            .into_string()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let envelope: Envelope<T> =
            serde_json::from_str(&body).map_err(|e| ApiError::Malformed(e.to_string()))?;
        if !envelope.ok {
            return Err(ApiError::Rejected(
                envelope
                    .description
                    .unwrap_or_else(|| "no description".to_string()),
            ));
        }
        envelope
            .result
            .ok_or_else(|| ApiError::Malformed(format!("{method}: envelope without result")))
    }
}

fn map_http_error(err: ureq::Error) -> ApiError {
    match err {
        ureq::Error::Status(status, response) => {
            let mut detail = response.into_string().unwrap_or_default();
            detail.truncate(ERROR_DETAIL_MAX);
            ApiError::Status { status, detail }
        }
        ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
    }
}
