//! Long-polling transport.

use std::time::Duration;

use super::Bot;

const RETRY_BASE: Duration = Duration::from_secs(1);
const RETRY_MAX: Duration = Duration::from_secs(30);

/// Drive the bot off `getUpdates` until the process is killed. Transport
/// errors back off and retry; they never end the loop.
pub fn run_polling(bot: &Bot) -> ! {
    // getUpdates conflicts with an active webhook registration.
    if let Err(err) = bot.api().delete_webhook() {
        tracing::warn!(error = %err, "webhook cleanup before polling failed");
    }

    tracing::info!("polling for updates");
    let mut offset: Option<i64> = None;
    let mut retry = RETRY_BASE;
    loop {
        match bot.api().get_updates(offset) {
            Ok(updates) => {
                retry = RETRY_BASE;
                for update in updates {
                    offset = Some(offset.unwrap_or(0).max(update.update_id + 1));
                    bot.handle_update(update);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, retry_secs = retry.as_secs(), "getUpdates failed");
                std::thread::sleep(retry);
                retry = (retry * 2).min(RETRY_MAX);
            }
        }
    }
}
