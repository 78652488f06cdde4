//! Telegram relay: every text message goes to the assistant and the answer
//! is sent back to the same chat.

use std::sync::Arc;

use teloxide::prelude::*;

use crate::llm::chat::Assistant;

/// Telegram rejects messages over 4096 characters.
pub const MAX_MESSAGE_LENGTH: usize = 4000;

pub const ERROR_REPLY: &str = "Sorry, something went wrong while answering.";

/// Splits `text` into pieces of at most `max_chars` characters.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars.max(1))
        .map(|chunk| chunk.iter().collect())
        .collect()
}

/// What the bot sends back for one incoming message.
pub async fn reply_for(assistant: &Assistant, text: &str) -> Vec<String> {
    match assistant.respond(text).await {
        Ok(answer) if answer.is_empty() => vec!["(empty response)".to_string()],
        Ok(answer) => split_message(&answer, MAX_MESSAGE_LENGTH),
        Err(e) => {
            log::error!("Failed to answer message: {:#}", e);
            vec![ERROR_REPLY.to_string()]
        }
    }
}

pub async fn run_bot(token: &str, assistant: Arc<Assistant>) {
    let bot = Bot::new(token);
    log::info!("Telegram relay starting");

    let handler = Update::filter_message().endpoint(move |bot: Bot, msg: Message| {
        let assistant = assistant.clone();
        async move {
            // Stickers, photos and other non-text updates are ignored
            if let Some(text) = msg.text() {
                log::debug!("Message from chat {}", msg.chat.id);
                for chunk in reply_for(&assistant, text).await {
                    if let Err(e) = bot.send_message(msg.chat.id, chunk).await {
                        log::warn!("Failed to send telegram reply: {}", e);
                    }
                }
            }
            respond(())
        }
    });

    Dispatcher::builder(bot, handler)
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    log::info!("Telegram relay stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedProvider;

    #[test]
    fn splits_on_character_boundaries() {
        assert_eq!(split_message("", 4000), Vec::<String>::new());
        assert_eq!(split_message("short", 4000), vec!["short"]);

        let long = "é".repeat(9001);
        let parts = split_message(&long, MAX_MESSAGE_LENGTH);
        let sizes: Vec<usize> = parts.iter().map(|p| p.chars().count()).collect();
        assert_eq!(sizes, vec![4000, 4000, 1001]);
        assert_eq!(parts.concat(), long);
    }

    #[tokio::test]
    async fn long_answers_are_chunked() {
        let assistant = Assistant::new(Box::new(ScriptedProvider::replying(&"a".repeat(4500))));
        let replies = reply_for(&assistant, "compare").await;
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[1].len(), 500);
    }

    #[tokio::test]
    async fn failures_get_an_apology() {
        let assistant = Assistant::new(Box::new(ScriptedProvider::failing()));
        assert_eq!(reply_for(&assistant, "compare").await, vec![ERROR_REPLY]);
    }
}
