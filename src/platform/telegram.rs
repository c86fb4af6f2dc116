use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::AllowedUpdate;
use teloxide::update_listeners::Polling;
use teloxide::RequestError;
use tracing::{debug, info};

use crate::platform::{Content, InboundMessage, Sender};
use crate::relay::Relay;

/// Slack on top of the long-poll timeout before the HTTP client gives up
const POLL_REQUEST_MARGIN: Duration = Duration::from_secs(10);

/// Build a bot whose HTTP client outlives a long poll of `poll_timeout`.
///
/// teloxide's default client times out after 17s, which would cut every idle
/// `getUpdates` short once the poll timeout reaches that.
pub fn bot(token: &str, poll_timeout: Duration) -> Result<Bot> {
    let client = teloxide::net::default_reqwest_settings()
        .timeout(request_timeout(poll_timeout))
        .build()
        .context("Failed to build Telegram HTTP client")?;
    Ok(Bot::with_client(token, client))
}

fn request_timeout(poll_timeout: Duration) -> Duration {
    poll_timeout + POLL_REQUEST_MARGIN
}

/// Check the token against the Bot API, returning the bot's username
pub async fn authorize(bot: &Bot) -> Result<String> {
    let me = bot
        .get_me()
        .await
        .context("Failed to authorize with the Telegram Bot API")?;
    Ok(me.username().to_string())
}

/// Long-poll Telegram and hand every message from the relayed chat to `relay`.
///
/// Returns when polling stops (Ctrl-C). Deliveries still running are not awaited.
pub async fn run(bot: Bot, relay: Arc<Relay>, poll_timeout: Duration) -> Result<()> {
    let chat_id = relay.router().target_chat_id();

    info!(
        "Starting Telegram polling for chat {} (timeout {}s)...",
        chat_id,
        poll_timeout.as_secs()
    );

    let listener = Polling::builder(bot.clone())
        .timeout(poll_timeout)
        .allowed_updates(vec![AllowedUpdate::Message])
        .build();

    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![relay])
        .default_handler(|upd| async move {
            debug!("Ignoring update {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch_with_listener(
            listener,
            LoggingErrorHandler::with_custom_text("telegram polling"),
        )
        .await;

    info!("Telegram polling stopped");
    Ok(())
}

/// Handler tree: messages go to the relay, every other update falls through.
///
/// There is no chat filter here; `Router` decides which chat is relayed.
fn schema() -> UpdateHandler<RequestError> {
    Update::filter_message().endpoint(handle_message)
}

async fn handle_message(msg: Message, relay: Arc<Relay>) -> ResponseResult<()> {
    debug!("Got message {} in chat {}", msg.id.0, msg.chat.id.0);

    let Some(inbound) = inbound_from(&msg) else {
        debug!("Message {} has no sender, skipping", msg.id.0);
        return Ok(());
    };

    // Fire and forget; the next update must not wait on this delivery
    relay.dispatch(inbound);
    Ok(())
}

fn inbound_from(msg: &Message) -> Option<InboundMessage> {
    let user = msg.from.as_ref()?;
    let name = user
        .username
        .clone()
        .unwrap_or_else(|| user.full_name());

    Some(InboundMessage {
        chat_id: msg.chat.id.0,
        sender: Sender {
            id: user.id.0,
            name,
        },
        content: content_of(msg),
    })
}

fn content_of(msg: &Message) -> Content {
    if let Some(text) = msg.text() {
        return Content::Text(text.to_string());
    }

    let caption = msg.caption().map(str::to_string);
    if msg.photo().is_some() {
        Content::Photo { caption }
    } else if msg.video().is_some() {
        Content::Video { caption }
    } else if msg.audio().is_some() {
        Content::Audio { caption }
    } else if msg.voice().is_some() {
        Content::Voice { caption }
    } else if msg.animation().is_some() {
        // Animations also carry a document, so check them first
        Content::Animation { caption }
    } else if msg.document().is_some() {
        Content::Document { caption }
    } else if let Some(sticker) = msg.sticker() {
        Content::Sticker {
            emoji: sticker.emoji.clone(),
        }
    } else {
        Content::Unsupported
    }
}
