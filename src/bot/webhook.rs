//! Webhook transport (tiny_http).
//!
//! Registers the webhook with Telegram, then serves `POST /webhook` and
//! validates the secret token header on every delivery.

use std::io::Read;

use super::api::{ApiError, Update};
use super::Bot;
use crate::config::WebhookConfig;

const WEBHOOK_PATH: &str = "/webhook";
const SECRET_HEADER: &str = "X-Telegram-Bot-Api-Secret-Token";

pub fn run_webhook(bot: &Bot, config: &WebhookConfig) -> Result<(), ApiError> {
    let url = format!("{}{WEBHOOK_PATH}", config.public_url.trim_end_matches('/'));
    bot.api().set_webhook(&url, &config.secret)?;

    let server = tiny_http::Server::http(&config.listen_addr)
        .map_err(|e| ApiError::Transport(format!("webhook listener: {e}")))?;
    tracing::info!(addr = %config.listen_addr, url = %url, "webhook serving");

    for mut request in server.incoming_requests() {
        let status = process(bot, config, &mut request);
        if let Err(err) = request.respond(tiny_http::Response::empty(status)) {
            tracing::warn!(error = %err, "webhook response failed");
        }
    }
    Ok(())
}

fn process(bot: &Bot, config: &WebhookConfig, request: &mut tiny_http::Request) -> u16 {
    if *request.method() != tiny_http::Method::Post || request.url() != WEBHOOK_PATH {
        return 404;
    }

    let secret_ok = request.headers().iter().any(|header| {
        header.field.equiv(SECRET_HEADER) && header.value.as_str() == config.secret
    });
    if !secret_ok {
        tracing::warn!("webhook delivery with missing or wrong secret token");
        return 403;
    }

    let mut body = String::new();
    if request.as_reader().read_to_string(&mut body).is_err() {
        return 400;
    }
    match serde_json::from_str::<Update>(&body) {
        Ok(update) => {
            bot.handle_update(update);
            200
        }
        Err(err) => {
            tracing::warn!(error = %err, "webhook payload rejected");
            400
        }
    }
}
