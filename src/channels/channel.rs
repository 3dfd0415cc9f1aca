//! Channel trait and the transport-neutral event / control types.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// Who sent an inbound event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sender {
    /// Numeric user id; also the private chat id replies go to.
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Sender {
    pub fn new(id: i64) -> Self {
        Self {
            id,
            username: None,
            first_name: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_first_name(mut self, first_name: impl Into<String>) -> Self {
        self.first_name = Some(first_name.into());
        self
    }

    /// Username, falling back to first name, then the numeric id.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| self.id.to_string())
    }
}

/// Kind of media attached to a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
        }
    }
}

impl std::str::FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "photo" => Ok(Self::Photo),
            "video" => Ok(Self::Video),
            other => Err(format!("unknown media kind: {other}")),
        }
    }
}

/// A provider-hosted media file, referenced by its provider token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    pub token: String,
    pub kind: MediaKind,
}

impl Media {
    pub fn photo(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            kind: MediaKind::Photo,
        }
    }

    pub fn video(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            kind: MediaKind::Video,
        }
    }
}

/// Reference to a message previously delivered by the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

/// One inbound event from the messaging channel.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// The `/start` command.
    SessionStart { from: Sender },
    /// Plain text (including other slash commands).
    Text { from: Sender, text: String },
    /// Photo or video, with optional caption.
    Media {
        from: Sender,
        media: Media,
        caption: Option<String>,
    },
    /// Geo-coordinate payload.
    Location { from: Sender, lat: f64, lon: f64 },
    /// Inline button press.
    ButtonPress {
        from: Sender,
        interaction_id: String,
        /// The message carrying the pressed button, when the channel knows it.
        message: Option<MessageRef>,
        payload: String,
    },
}

impl InboundEvent {
    pub fn sender(&self) -> &Sender {
        match self {
            Self::SessionStart { from }
            | Self::Text { from, .. }
            | Self::Media { from, .. }
            | Self::Location { from, .. }
            | Self::ButtonPress { from, .. } => from,
        }
    }
}

/// A reply-keyboard button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardButton {
    /// Sends its label back as text.
    Text(String),
    /// Asks the client to share the user's location.
    RequestLocation(String),
}

/// An inline button carrying a callback payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub label: String,
    pub payload: String,
}

impl InlineButton {
    pub fn new(label: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            payload: payload.into(),
        }
    }
}

/// Controls attached to an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Controls {
    /// Persistent reply keyboard under the input field.
    Keyboard(Vec<Vec<KeyboardButton>>),
    /// Buttons attached to the message itself.
    Inline(Vec<Vec<InlineButton>>),
    /// Remove a previously shown reply keyboard.
    Clear,
}

/// Stream of inbound events.
pub type EventStream = Pin<Box<dyn Stream<Item = InboundEvent> + Send>>;

/// Messaging channel collaborator.
#[async_trait]
pub trait Channel: Send + Sync {
    /// Channel name for logging.
    fn name(&self) -> &str;

    /// Start receiving inbound events.
    async fn start(&self) -> Result<EventStream, ChannelError>;

    /// Send a text message to a chat.
    async fn send_text(
        &self,
        to: i64,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<MessageRef, ChannelError>;

    /// Send a provider-hosted photo or video to a chat.
    async fn send_media(
        &self,
        to: i64,
        media: &Media,
        caption: Option<&str>,
    ) -> Result<MessageRef, ChannelError>;

    /// Replace the text (and inline controls) of a message already sent.
    /// `None` controls leave the message without buttons.
    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError>;

    /// Answer a button press, optionally with a short ephemeral notice.
    async fn acknowledge(&self, interaction_id: &str, text: Option<&str>)
    -> Result<(), ChannelError>;

    /// Check the channel is reachable.
    async fn health_check(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}
