//! Telegram command listener: runs the pipeline when a chat asks for it.

use anyhow::Result;
use log::{error, info, warn};
use std::time::Duration;

use crate::find_tickers::TickerSource;
use crate::pipeline::{self, Mode};
use crate::storage_utils::AppConfig;
use crate::telegram::{DeliverySink, IncomingMessage, TelegramBot};

const USAGE: &str =
    "Commands:\n/screen - top bullish and bearish coins\n/trap - whale trap candidates";
const ERROR_BACKOFF: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run(Mode),
    Help,
}

/// Parses `/screen`, `/trap`, `/help` and `/start`, case-insensitively and
/// with an optional `@botname` suffix. Anything else is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let word = text.split_whitespace().next()?.to_lowercase();
    let name = word.strip_prefix('/')?;
    let name = name.split('@').next().unwrap_or(name);

    match name {
        "screen" => Some(Command::Run(Mode::Screen)),
        "trap" => Some(Command::Run(Mode::Trap)),
        "help" | "start" => Some(Command::Help),
        _ => None,
    }
}

/// With a configured chat id only that chat is served.
pub fn is_allowed(chat_id: i64, allowed: Option<&str>) -> bool {
    allowed.is_none_or(|allowed| allowed.trim() == chat_id.to_string())
}

async fn handle_message(
    message: &IncomingMessage,
    config: &AppConfig,
    source: &dyn TickerSource,
    bot: &dyn DeliverySink,
) {
    let Some(command) = message.text.as_deref().and_then(parse_command) else {
        return;
    };
    let chat_id = message.chat.id.to_string();

    if !is_allowed(message.chat.id, config.credentials.chat_id.as_deref()) {
        warn!("Ignoring {:?} from unlisted chat {}", command, chat_id);
        return;
    }

    match command {
        Command::Help => {
            if let Err(e) = bot.send_text(&chat_id, USAGE).await {
                warn!("Could not send usage to chat {}: {}", chat_id, e);
            }
        }
        Command::Run(mode) => {
            info!("Chat {} requested a {:?} run", chat_id, mode);
            match pipeline::run_once(source, bot, &chat_id, config, mode).await {
                Ok(summary) => info!("Run finished: {} assets scored", summary.scored),
                Err(e) => {
                    error!("Run for chat {} failed: {}", chat_id, e);
                    let notice = if e.is_fetch_failure() {
                        format!("⚠️ Market data unavailable, no report sent: {}", e)
                    } else {
                        format!("⚠️ Screening failed: {}", e)
                    };
                    if let Err(e) = bot.send_text(&chat_id, &notice).await {
                        warn!("Could not report failure to chat {}: {}", chat_id, e);
                    }
                }
            }
        }
    }
}

/// Long-polls Telegram until Ctrl-C. Commands are handled one at a time.
pub async fn listen(
    config: &AppConfig,
    source: &dyn TickerSource,
    bot: &TelegramBot,
) -> Result<()> {
    let poll_timeout = config.telegram.poll_timeout_secs;
    let mut offset: Option<i64> = None;

    info!("Listening for Telegram commands (Ctrl-C to stop)");
    loop {
        let updates = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down listener");
                return Ok(());
            }
            updates = bot.get_updates(offset, poll_timeout) => updates,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                error!("getUpdates failed: {}", e);
                tokio::time::sleep(ERROR_BACKOFF).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(message) = &update.message {
                handle_message(message, config, source, bot).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::{FixedSource, RecordingSink, Sent};
    use crate::telegram::Chat;
    use serde_json::json;

    fn message(chat_id: i64, text: &str) -> IncomingMessage {
        IncomingMessage {
            chat: Chat { id: chat_id },
            text: Some(text.to_string()),
        }
    }

    fn config_for_chat(chat_id: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.credentials.chat_id = Some(chat_id.to_string());
        config
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse_command("/trap"), Some(Command::Run(Mode::Trap)));
        assert_eq!(parse_command("  /TRAP  "), Some(Command::Run(Mode::Trap)));
        assert_eq!(parse_command("/screen now"), Some(Command::Run(Mode::Screen)));
        assert_eq!(parse_command("/trap@whale_bot"), Some(Command::Run(Mode::Trap)));
        assert_eq!(parse_command("/start"), Some(Command::Help));
        assert_eq!(parse_command("/help"), Some(Command::Help));
    }

    #[test]
    fn test_ignores_other_text() {
        assert_eq!(parse_command("trap"), None);
        assert_eq!(parse_command("/unknown"), None);
        assert_eq!(parse_command(""), None);
        assert_eq!(parse_command("hello /trap"), None);
    }

    #[test]
    fn test_chat_allow_list() {
        assert!(is_allowed(42, None));
        assert!(is_allowed(-100123, Some("-100123")));
        assert!(is_allowed(42, Some(" 42 ")));
        assert!(!is_allowed(7, Some("42")));
    }

    #[tokio::test]
    async fn test_failed_run_is_reported_to_chat() {
        let source = FixedSource(json!({ "code": -1003, "msg": "Too many requests" }));
        let sink = RecordingSink::default();

        handle_message(&message(42, "/trap"), &config_for_chat("42"), &source, &sink).await;

        let sent = sink.sent();
        assert_eq!(sent.len(), 1);
        match &sent[0] {
            Sent::Text(chat, text) => {
                assert_eq!(chat, "42");
                assert!(text.starts_with("⚠️ Market data unavailable"));
            }
            other => panic!("expected a failure notice, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_help_sends_usage() {
        let source = FixedSource(json!([]));
        let sink = RecordingSink::default();

        handle_message(&message(42, "/help"), &config_for_chat("42"), &source, &sink).await;

        assert_eq!(sink.sent(), vec![Sent::Text("42".to_string(), USAGE.to_string())]);
    }

    #[tokio::test]
    async fn test_unlisted_chat_gets_nothing() {
        let source = FixedSource(json!([]));
        let sink = RecordingSink::default();
        let config = config_for_chat("42");

        handle_message(&message(7, "/screen"), &config, &source, &sink).await;
        handle_message(&message(7, "/help"), &config, &source, &sink).await;

        assert!(sink.sent().is_empty());
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let source = FixedSource(json!([]));
        let sink = RecordingSink::default();

        handle_message(&message(42, "hello"), &AppConfig::default(), &source, &sink).await;

        assert!(sink.sent().is_empty());
    }
}
