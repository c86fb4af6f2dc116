use std::collections::HashMap;
use std::sync::Arc;

use reqwest::Url;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::platform::InboundMessage;
use crate::webhook::WebhookSink;

/// Per-sender webhook overrides, fixed at startup
#[derive(Debug, Clone, Default)]
pub struct DestinationTable {
    entries: HashMap<u64, Url>,
}

impl DestinationTable {
    pub fn new(entries: HashMap<u64, Url>) -> Self {
        Self { entries }
    }

    pub fn lookup(&self, sender_id: u64) -> Option<&Url> {
        self.entries.get(&sender_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A text ready to be posted to a webhook
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub url: Url,
    pub text: String,
}

/// What to do with one inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Not from the relayed chat
    Ignored,
    /// From the relayed chat but carries nothing that can be forwarded
    Dropped,
    Forward(Outbound),
}

/// Decides whether and where a message is forwarded
#[derive(Debug, Clone)]
pub struct Router {
    target_chat_id: i64,
    default_webhook: Url,
    destinations: DestinationTable,
}

impl Router {
    pub fn new(target_chat_id: i64, default_webhook: Url, destinations: DestinationTable) -> Self {
        Self {
            target_chat_id,
            default_webhook,
            destinations,
        }
    }

    pub fn target_chat_id(&self) -> i64 {
        self.target_chat_id
    }

    /// The only chat filter; the Telegram handler forwards every message here.
    pub fn accepts(&self, msg: &InboundMessage) -> bool {
        msg.chat_id == self.target_chat_id
    }

    pub fn route(&self, msg: &InboundMessage) -> Route {
        if !self.accepts(msg) {
            return Route::Ignored;
        }

        let Some(text) = msg.content.display_text() else {
            error!(
                "Unable to get text from message by {} ({}) in chat {}",
                msg.sender.name, msg.sender.id, msg.chat_id
            );
            return Route::Dropped;
        };

        // A personal webhook already identifies the sender, so no prefix there
        match self.destinations.lookup(msg.sender.id) {
            Some(url) => Route::Forward(Outbound {
                url: url.clone(),
                text,
            }),
            None => Route::Forward(Outbound {
                url: self.default_webhook.clone(),
                text: format!("@{}: {}", msg.sender.name, text),
            }),
        }
    }
}

/// Routes messages and fires off one delivery task per forwarded message
pub struct Relay {
    router: Router,
    sink: Arc<dyn WebhookSink>,
}

impl Relay {
    pub fn new(router: Router, sink: Arc<dyn WebhookSink>) -> Self {
        Self { router, sink }
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Route `msg` and, if it is forwarded, spawn its delivery.
    ///
    /// Returns the delivery task so callers may observe it; the bot never joins
    /// it, and deliveries still in flight at shutdown are lost.
    pub fn dispatch(&self, msg: InboundMessage) -> Option<JoinHandle<()>> {
        let outbound = match self.router.route(&msg) {
            Route::Forward(outbound) => outbound,
            Route::Ignored | Route::Dropped => return None,
        };

        let sink = Arc::clone(&self.sink);
        Some(tokio::spawn(async move {
            debug!("Sending message: {}", outbound.text);
            if let Err(e) = sink.post(&outbound.url, &outbound.text).await {
                error!("Failed to deliver message: {:#}", e);
            }
        }))
    }
}
