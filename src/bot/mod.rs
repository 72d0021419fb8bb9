//! Telegram front end.
//!
//! Thin glue over [`Checker`]: parse inbound messages, run the pipeline,
//! render replies. Handler failures are logged and answered with a generic
//! notice; nothing here takes the process down.

use time::UtcOffset;

use crate::checker::Checker;
use crate::config::BotConfig;

mod api;
mod extract;
mod poll;
pub(crate) mod render;
mod webhook;

pub use api::{ApiError, Chat, Message, TelegramApi, Update, User};
pub use poll::run_polling;
pub use webhook::run_webhook;

pub struct Bot {
    api: TelegramApi,
    checker: Checker,
    config: BotConfig,
    display_offset: UtcOffset,
}

impl Bot {
    pub fn new(
        api: TelegramApi,
        checker: Checker,
        config: BotConfig,
        display_offset: UtcOffset,
    ) -> Self {
        Self {
            api,
            checker,
            config,
            display_offset,
        }
    }

    pub fn api(&self) -> &TelegramApi {
        &self.api
    }

    /// Dispatch one update. Never returns an error: failures are logged and
    /// the chat gets a generic notice (best effort).
    pub fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };
        let chat_id = message.chat.id;
        let user_id = message.from.as_ref().map(|user| user.id);

        if let Err(err) = self.dispatch(chat_id, user_id, text) {
            tracing::error!(chat_id, error = %err, "update handling failed");
            if let Err(err) = self.api.send_message(chat_id, render::FAILURE_TEXT) {
                tracing::warn!(chat_id, error = %err, "failure notice undeliverable");
            }
        }
    }

    fn dispatch(&self, chat_id: i64, user_id: Option<i64>, text: &str) -> Result<(), ApiError> {
        match parse_command(text.trim()) {
            Some(("start", _)) => self.api.send_message(chat_id, render::START_TEXT),
            Some(("help", _)) => self.api.send_message(chat_id, render::HELP_TEXT),
            Some(("stats", _)) => self
                .api
                .send_message(chat_id, &render::render_stats(self.checker.index().unique_len())),
            Some(("reload", _)) => self.reload(chat_id, user_id),
            Some(("check", arg)) => {
                if arg.is_empty() {
                    self.api.send_message(chat_id, render::CHECK_USAGE_TEXT)
                } else {
                    self.check(chat_id, vec![arg.to_string()])
                }
            }
            Some(_) => Ok(()), // unknown command: stay quiet
            None => {
                let codes = extract::extract_codes(text);
                if codes.is_empty() {
                    Ok(())
                } else {
                    self.check(chat_id, codes)
                }
            }
        }
    }

    fn check(&self, chat_id: i64, codes: Vec<String>) -> Result<(), ApiError> {
        if let Err(err) = self.api.send_typing(chat_id) {
            tracing::debug!(chat_id, error = %err, "typing action failed");
        }
        let outcomes = self.checker.check_all(codes);
        if outcomes.is_empty() {
            return Ok(());
        }
        self.api
            .send_message(chat_id, &render::render_outcomes(&outcomes, self.display_offset))
    }

    fn reload(&self, chat_id: i64, user_id: Option<i64>) -> Result<(), ApiError> {
        let allowed = user_id.is_some_and(|id| self.config.is_admin(id));
        if !allowed {
            return self.api.send_message(chat_id, render::RELOAD_DENIED_TEXT);
        }
        match self.checker.index().load() {
            Ok(report) => self.api.send_message(chat_id, &render::render_reload(&report)),
            Err(err) => {
                tracing::error!(error = %err, "manual reload failed");
                self.api.send_message(chat_id, render::RELOAD_FAILED_TEXT)
            }
        }
    }
}

/// `"/check@SomeBot abc"` → `("check", "abc")`. Non-commands return `None`.
fn parse_command(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let (head, tail) = match rest.split_once(char::is_whitespace) {
        Some((head, tail)) => (head, tail.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);
    Some((name, tail))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_parse_with_args_and_bot_suffix() {
        assert_eq!(parse_command("/check abc-1"), Some(("check", "abc-1")));
        assert_eq!(parse_command("/check@CodesBot abc"), Some(("check", "abc")));
        assert_eq!(parse_command("/stats"), Some(("stats", "")));
        assert_eq!(parse_command("plain text"), None);
    }

    #[test]
    fn command_args_are_trimmed() {
        assert_eq!(parse_command("/check   abc  "), Some(("check", "abc")));
    }
}
