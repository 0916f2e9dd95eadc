use tracing::{error, info};

use super::SoundboardBot;

/// Recognized text commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextCommand {
    Refresh,
}

impl TextCommand {
    /// Matches a whole message against `<prefix><name>`, exactly.
    pub fn parse(content: &str, prefix: &str) -> Option<Self> {
        match content.strip_prefix(prefix)? {
            "refresh" => Some(Self::Refresh),
            _ => None,
        }
    }

    /// Key into `command_responses`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
        }
    }
}

/// Handles a text message; anything that is not a command is ignored.
pub async fn handle_message(bot: &SoundboardBot, channel_id: u64, author_id: u64, content: &str) {
    if bot.bot_user_id() == Some(author_id) {
        return;
    }

    let Some(command) = TextCommand::parse(content, &bot.config().command_prefix) else {
        return;
    };

    info!("📝 Command {} received from {}", command.name(), author_id);

    match command {
        TextCommand::Refresh => {
            let _ = bot.refresh_sounds().await;
        }
    }

    let reply = bot.config().command_response(command.name());
    if let Err(e) = bot.platform().send_message(channel_id, &reply).await {
        error!("Error replying in channel {}: {}", channel_id, e);
    }
}
