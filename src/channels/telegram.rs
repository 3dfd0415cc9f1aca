//! Telegram channel — long-polls the Bot API for updates.
//!
//! Native Rust Telegram Bot API implementation over `reqwest`, adapted to
//! the bot's Channel trait (event stream, text/media sends, message edits
//! and callback answers).

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use crate::channels::{
    Channel, Controls, EventStream, InboundEvent, KeyboardButton, Media, MediaKind, MessageRef,
    Sender,
};
use crate::error::ChannelError;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

/// Maximum caption length for sendPhoto / sendVideo.
const TELEGRAM_MAX_CAPTION_LENGTH: usize = 1024;

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Server-side wait for `getUpdates`.
const POLL_TIMEOUT_SECS: u64 = 30;

/// Per-request ceiling; must outlast a long-poll.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(POLL_TIMEOUT_SECS + 15);

/// Pause before polling again after a failed `getUpdates`.
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram channel over Bot API long-polling.
pub struct TelegramChannel {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: SecretString) -> Result<Self, ChannelError> {
        Self::with_api_base(bot_token, TELEGRAM_API_BASE, REQUEST_TIMEOUT)
    }

    /// Channel against a custom Bot API server.
    pub fn with_api_base(
        bot_token: SecretString,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base,
            self.bot_token.expose_secret()
        )
    }

    /// POST a Bot API method and return its `result` field.
    async fn call(&self, method: &str, body: &Value) -> Result<Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: {e}")))?;

        let status = resp.status();
        let data: Value = resp
            .json()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: invalid response body: {e}")))?;

        if !status.is_success() || data.get("ok").and_then(Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("no description");
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("{method} failed ({status}): {description}"),
            });
        }

        Ok(data.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Send a single message chunk (≤4096 chars).
    async fn send_message_chunk(
        &self,
        chat_id: i64,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<MessageRef, ChannelError> {
        let mut body = json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(controls) = controls {
            body["reply_markup"] = reply_markup(controls);
        }

        let result = self.call("sendMessage", &body).await?;
        parse_sent_message(&result)
    }
}

// ── Channel trait implementation ────────────────────────────────────

#[async_trait]
impl Channel for TelegramChannel {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let url = self.api_url("getUpdates");
        let client = self.client.clone();

        tokio::spawn(async move {
            let mut offset: i64 = 0;

            tracing::info!("Telegram channel listening for updates...");

            loop {
                let body = json!({
                    "offset": offset,
                    "timeout": POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message", "callback_query"]
                });

                let resp = match client.post(&url).json(&body).send().await {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Telegram poll error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let data: Value = match resp.json().await {
                    Ok(d) => d,
                    Err(e) => {
                        tracing::warn!("Telegram parse error: {e}");
                        tokio::time::sleep(POLL_RETRY_DELAY).await;
                        continue;
                    }
                };

                let Some(results) = data.get("result").and_then(Value::as_array) else {
                    let description = data
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or("no description");
                    tracing::warn!("Telegram getUpdates rejected: {description}");
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                    continue;
                };

                for update in results {
                    // Advance offset past this update
                    if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                        offset = uid + 1;
                    }

                    let Some(event) = parse_update(update) else {
                        tracing::debug!("Telegram: ignoring unsupported update");
                        continue;
                    };

                    if tx.send(event).is_err() {
                        tracing::info!("Telegram listener channel closed");
                        return;
                    }
                }
            }
        });

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        Ok(Box::pin(stream))
    }

    async fn send_text(
        &self,
        to: i64,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<MessageRef, ChannelError> {
        let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
        let last = chunks.len().saturating_sub(1);

        let mut sent = None;
        for (i, chunk) in chunks.iter().enumerate() {
            // Controls ride on the last chunk so buttons sit under the full text
            let chunk_controls = if i == last { controls } else { None };
            sent = Some(self.send_message_chunk(to, chunk, chunk_controls).await?);
        }

        sent.ok_or_else(|| ChannelError::InvalidMessage("empty message".into()))
    }

    async fn send_media(
        &self,
        to: i64,
        media: &Media,
        caption: Option<&str>,
    ) -> Result<MessageRef, ChannelError> {
        let (method, field) = match media.kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Video => ("sendVideo", "video"),
        };

        let mut body = json!({ "chat_id": to });
        body[field] = Value::String(media.token.clone());
        if let Some(cap) = caption {
            body["caption"] = Value::String(truncate_chars(cap, TELEGRAM_MAX_CAPTION_LENGTH));
        }

        let result = self.call(method, &body).await?;
        tracing::debug!(chat_id = to, kind = media.kind.as_str(), "Telegram media sent");
        parse_sent_message(&result)
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        controls: Option<&Controls>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({
            "chat_id": message.chat_id,
            "message_id": message.message_id,
            "text": truncate_chars(text, TELEGRAM_MAX_MESSAGE_LENGTH),
        });
        // Only inline keyboards can be attached to an edited message;
        // omitting reply_markup strips the buttons.
        if let Some(inline) = controls.filter(|c| matches!(c, Controls::Inline(_))) {
            body["reply_markup"] = reply_markup(inline);
        }

        self.call("editMessageText", &body).await?;
        Ok(())
    }

    async fn acknowledge(
        &self,
        interaction_id: &str,
        text: Option<&str>,
    ) -> Result<(), ChannelError> {
        let mut body = json!({ "callback_query_id": interaction_id });
        if let Some(text) = text {
            body["text"] = Value::String(text.to_string());
        }
        self.call("answerCallbackQuery", &body).await?;
        Ok(())
    }

    async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Extract the sender from a `from` object.
fn parse_sender(from: &Value) -> Option<Sender> {
    let id = from.get("id").and_then(Value::as_i64)?;
    Some(Sender {
        id,
        username: from
            .get("username")
            .and_then(Value::as_str)
            .map(String::from),
        first_name: from
            .get("first_name")
            .and_then(Value::as_str)
            .map(String::from),
    })
}

/// Convert one `getUpdates` entry into an inbound event.
///
/// Returns `None` for update kinds the bot does not handle (stickers,
/// edited messages, channel posts without a sender, ...).
pub fn parse_update(update: &Value) -> Option<InboundEvent> {
    if let Some(query) = update.get("callback_query") {
        let from = parse_sender(query.get("from")?)?;
        let interaction_id = query.get("id").and_then(Value::as_str)?.to_string();
        let payload = query.get("data").and_then(Value::as_str)?.to_string();
        let message = query.get("message").and_then(|m| {
            Some(MessageRef {
                chat_id: m.get("chat")?.get("id")?.as_i64()?,
                message_id: m.get("message_id")?.as_i64()?,
            })
        });
        return Some(InboundEvent::ButtonPress {
            from,
            interaction_id,
            message,
            payload,
        });
    }

    let message = update.get("message")?;
    let from = parse_sender(message.get("from")?)?;

    if let Some(text) = message.get("text").and_then(Value::as_str) {
        if is_start_command(text) {
            return Some(InboundEvent::SessionStart { from });
        }
        return Some(InboundEvent::Text {
            from,
            text: text.to_string(),
        });
    }

    if let Some(location) = message.get("location") {
        let lat = location.get("latitude").and_then(Value::as_f64)?;
        let lon = location.get("longitude").and_then(Value::as_f64)?;
        return Some(InboundEvent::Location { from, lat, lon });
    }

    let caption = message
        .get("caption")
        .and_then(Value::as_str)
        .map(String::from);

    // Telegram provides multiple photo sizes; the last one is the largest.
    if let Some(photos) = message.get("photo").and_then(Value::as_array) {
        let token = photos.last()?.get("file_id").and_then(Value::as_str)?;
        return Some(InboundEvent::Media {
            from,
            media: Media::photo(token),
            caption,
        });
    }

    if let Some(video) = message.get("video") {
        let token = video.get("file_id").and_then(Value::as_str)?;
        return Some(InboundEvent::Media {
            from,
            media: Media::video(token),
            caption,
        });
    }

    None
}

/// `/start`, `/start <payload>` and `/start@BotName` all open a session.
fn is_start_command(text: &str) -> bool {
    let command = text.split_whitespace().next().unwrap_or_default();
    let command = command.split('@').next().unwrap_or_default();
    command == "/start"
}

/// Read the chat/message ids out of a sent `Message` result.
fn parse_sent_message(result: &Value) -> Result<MessageRef, ChannelError> {
    let chat_id = result
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_i64);
    let message_id = result.get("message_id").and_then(Value::as_i64);

    match (chat_id, message_id) {
        (Some(chat_id), Some(message_id)) => Ok(MessageRef {
            chat_id,
            message_id,
        }),
        _ => Err(ChannelError::InvalidMessage(
            "sent message without chat or message id".into(),
        )),
    }
}

/// Render controls as a Bot API `reply_markup` object.
fn reply_markup(controls: &Controls) -> Value {
    match controls {
        Controls::Keyboard(rows) => {
            let keyboard: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|button| match button {
                            KeyboardButton::Text(label) => json!({ "text": label }),
                            KeyboardButton::RequestLocation(label) => {
                                json!({ "text": label, "request_location": true })
                            }
                        })
                        .collect()
                })
                .collect();
            json!({ "keyboard": keyboard, "resize_keyboard": true })
        }
        Controls::Inline(rows) => {
            let keyboard: Vec<Vec<Value>> = rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|b| json!({ "text": b.label, "callback_data": b.payload }))
                        .collect()
                })
                .collect();
            json!({ "inline_keyboard": keyboard })
        }
        Controls::Clear => json!({ "remove_keyboard": true }),
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }

        // Never cut inside a multi-byte character
        let mut boundary = max_len;
        while !remaining.is_char_boundary(boundary) {
            boundary -= 1;
        }

        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .unwrap_or(boundary);

        // Don't split at position 0 (infinite loop guard)
        let split_at = if split_at == 0 { boundary } else { split_at };

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::InlineButton;

    fn channel() -> TelegramChannel {
        TelegramChannel::new(SecretString::from("123:ABC")).unwrap()
    }

    fn local_channel(addr: std::net::SocketAddr, timeout: Duration) -> TelegramChannel {
        TelegramChannel::with_api_base(
            SecretString::from("123:ABC"),
            format!("http://{addr}/"),
            timeout,
        )
        .unwrap()
    }

    #[test]
    fn telegram_channel_name() {
        assert_eq!(channel().name(), "telegram");
    }

    #[test]
    fn telegram_api_url() {
        assert_eq!(
            channel().api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn custom_api_base_drops_trailing_slash() {
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], 8081));
        assert_eq!(
            local_channel(addr, REQUEST_TIMEOUT).api_url("getMe"),
            "http://127.0.0.1:8081/bot123:ABC/getMe"
        );
    }

    // ── Update parsing ──────────────────────────────────────────────

    #[test]
    fn parses_text_message() {
        let update = json!({
            "update_id": 1,
            "message": {
                "message_id": 10,
                "from": {"id": 42, "username": "rider", "first_name": "Aigerim"},
                "chat": {"id": 42},
                "text": "Whoosh"
            }
        });
        let event = parse_update(&update).unwrap();
        assert_eq!(
            event,
            InboundEvent::Text {
                from: Sender::new(42).with_username("rider").with_first_name("Aigerim"),
                text: "Whoosh".into(),
            }
        );
    }

    #[test]
    fn start_command_variants_open_a_session() {
        for text in ["/start", "/start deep-link", "/start@PatrolBot"] {
            let update = json!({
                "message": {"from": {"id": 1}, "chat": {"id": 1}, "text": text}
            });
            assert!(
                matches!(parse_update(&update), Some(InboundEvent::SessionStart { .. })),
                "{text} should be a session start"
            );
        }
        let update = json!({
            "message": {"from": {"id": 1}, "chat": {"id": 1}, "text": "/started"}
        });
        assert!(matches!(parse_update(&update), Some(InboundEvent::Text { .. })));
    }

    #[test]
    fn parses_location() {
        let update = json!({
            "message": {
                "from": {"id": 5},
                "chat": {"id": 5},
                "location": {"latitude": 47.1, "longitude": 51.9}
            }
        });
        assert_eq!(
            parse_update(&update),
            Some(InboundEvent::Location {
                from: Sender::new(5),
                lat: 47.1,
                lon: 51.9
            })
        );
    }

    #[test]
    fn photo_uses_largest_size_and_keeps_caption() {
        let update = json!({
            "message": {
                "from": {"id": 5},
                "chat": {"id": 5},
                "photo": [
                    {"file_id": "small", "width": 90},
                    {"file_id": "large", "width": 1280}
                ],
                "caption": "blocks the sidewalk"
            }
        });
        match parse_update(&update).unwrap() {
            InboundEvent::Media { media, caption, .. } => {
                assert_eq!(media, Media::photo("large"));
                assert_eq!(caption.as_deref(), Some("blocks the sidewalk"));
            }
            other => panic!("expected media, got {other:?}"),
        }
    }

    #[test]
    fn parses_video() {
        let update = json!({
            "message": {"from": {"id": 5}, "chat": {"id": 5}, "video": {"file_id": "vid-1"}}
        });
        match parse_update(&update).unwrap() {
            InboundEvent::Media { media, caption, .. } => {
                assert_eq!(media, Media::video("vid-1"));
                assert!(caption.is_none());
            }
            other => panic!("expected media, got {other:?}"),
        }
    }

    #[test]
    fn parses_callback_query() {
        let update = json!({
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 9, "username": "mod"},
                "data": "confirm:abc",
                "message": {"message_id": 77, "chat": {"id": 9}}
            }
        });
        assert_eq!(
            parse_update(&update),
            Some(InboundEvent::ButtonPress {
                from: Sender::new(9).with_username("mod"),
                interaction_id: "cb-1".into(),
                message: Some(MessageRef {
                    chat_id: 9,
                    message_id: 77
                }),
                payload: "confirm:abc".into(),
            })
        );
    }

    #[test]
    fn ignores_unsupported_updates() {
        let sticker = json!({
            "message": {"from": {"id": 1}, "chat": {"id": 1}, "sticker": {"file_id": "s"}}
        });
        assert!(parse_update(&sticker).is_none());

        let no_sender = json!({ "message": {"chat": {"id": 1}, "text": "hi"} });
        assert!(parse_update(&no_sender).is_none());

        let edited = json!({ "edited_message": {"from": {"id": 1}, "text": "hi"} });
        assert!(parse_update(&edited).is_none());
    }

    // ── Outbound helpers ────────────────────────────────────────────

    #[test]
    fn reply_keyboard_markup() {
        let controls = Controls::Keyboard(vec![vec![
            KeyboardButton::RequestLocation("Send location".into()),
            KeyboardButton::Text("Back".into()),
        ]]);
        assert_eq!(
            reply_markup(&controls),
            json!({
                "keyboard": [[
                    {"text": "Send location", "request_location": true},
                    {"text": "Back"}
                ]],
                "resize_keyboard": true
            })
        );
    }

    #[test]
    fn inline_keyboard_markup() {
        let controls = Controls::Inline(vec![vec![InlineButton::new("Approve", "confirm:t")]]);
        assert_eq!(
            reply_markup(&controls),
            json!({"inline_keyboard": [[{"text": "Approve", "callback_data": "confirm:t"}]]})
        );
    }

    #[test]
    fn clear_removes_keyboard() {
        assert_eq!(reply_markup(&Controls::Clear), json!({"remove_keyboard": true}));
    }

    #[test]
    fn sent_message_ref_is_parsed() {
        let result = json!({"message_id": 3, "chat": {"id": -100}});
        assert_eq!(
            parse_sent_message(&result).unwrap(),
            MessageRef {
                chat_id: -100,
                message_id: 3
            }
        );
        assert!(parse_sent_message(&json!({"message_id": 3})).is_err());
    }

    #[tokio::test]
    async fn send_text_reports_refused_connection() {
        // Bind then drop to get a local port nothing listens on
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let ch = local_channel(addr, Duration::from_secs(5));

        let err = ch.send_text(123456, "hello", None).await.unwrap_err();
        assert!(
            matches!(&err, ChannelError::Http(msg) if msg.starts_with("sendMessage")),
            "{err:?}"
        );
    }

    #[tokio::test]
    async fn hung_request_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept and hold the connection without ever answering
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });
        let ch = local_channel(addr, Duration::from_millis(200));

        let result = tokio::time::timeout(
            Duration::from_secs(10),
            ch.send_text(123456, "hello", None),
        )
        .await
        .expect("request was not bounded by the client timeout");
        assert!(matches!(result, Err(ChannelError::Http(_))), "{result:?}");
        server.abort();
    }

    // ── Message splitting tests ─────────────────────────────────────

    #[test]
    fn split_message_short() {
        let chunks = split_message("Hello", 4096);
        assert_eq!(chunks, vec!["Hello"]);
    }

    #[test]
    fn split_message_over_limit_on_newline() {
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_no_good_split_point() {
        let msg = "a".repeat(5000);
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 4096);
        assert_eq!(chunks[1].len(), 904);
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        // Two-byte Cyrillic characters: 4096 is never a safe cut inside them
        let msg = "ж".repeat(2500);
        let chunks = split_message(&msg, 4095);
        assert_eq!(chunks.concat(), msg);
        assert!(chunks.iter().all(|c| c.len() <= 4095));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_chars("жжж", 2), "жж");
        assert_eq!(truncate_chars("ab", 5), "ab");
    }
}
