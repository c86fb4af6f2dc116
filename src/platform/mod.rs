pub mod telegram;

/// A chat message received from the upstream platform, reduced to what the relay needs
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Platform-specific chat ID
    pub chat_id: i64,
    pub sender: Sender,
    pub content: Content,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sender {
    /// Platform-specific user ID
    pub id: u64,
    /// Username when the user has one, otherwise their full name
    pub name: String,
}

/// Message body. Media kinds keep their caption, if any.
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Text(String),
    Photo { caption: Option<String> },
    Video { caption: Option<String> },
    Audio { caption: Option<String> },
    Voice { caption: Option<String> },
    Document { caption: Option<String> },
    Animation { caption: Option<String> },
    Sticker { emoji: Option<String> },
    Unsupported,
}

impl Content {
    /// Text to forward for this body, or `None` if there is nothing to say.
    pub fn display_text(&self) -> Option<String> {
        let (label, caption) = match self {
            Content::Text(text) => {
                return if text.is_empty() {
                    None
                } else {
                    Some(text.clone())
                };
            }
            Content::Sticker { emoji } => {
                return Some(match emoji.as_deref() {
                    Some(e) if !e.is_empty() => format!("({} sticker)", e),
                    _ => "(sticker)".to_string(),
                });
            }
            Content::Unsupported => return None,
            Content::Photo { caption } => ("(photo)", caption),
            Content::Video { caption } => ("(video)", caption),
            Content::Audio { caption } => ("(audio)", caption),
            Content::Voice { caption } => ("(voice message)", caption),
            Content::Document { caption } => ("(document)", caption),
            Content::Animation { caption } => ("(GIF)", caption),
        };

        match caption.as_deref() {
            Some(c) if !c.is_empty() => Some(format!("{} {}", label, c)),
            _ => Some(label.to_string()),
        }
    }
}
