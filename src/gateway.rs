//! Messaging gateway client.
//!
//! Thin wrapper over the Telegram Bot API behind the [`Gateway`] trait so
//! handlers, the broadcast engine and their tests never talk to the network
//! directly. Transport is one `POST` per method call; keyboards and command
//! menus are assembled from `teloxide` types and serialised into the
//! payload.

use crate::config::Settings;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use teloxide::types::{BotCommand, BotCommandScope, ChatId, InlineKeyboardMarkup, Recipient};
use thiserror::Error;

/// Errors surfaced by gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The request never produced a readable response.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    /// Telegram answered with `ok: false`.
    #[error("telegram api error: {0}")]
    Api(String),
}

/// Outbound messaging surface used by handlers and the broadcast engine.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), GatewayError>;

    /// Send a text message with an inline keyboard.
    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), GatewayError>;

    /// Send the UI card: the configured media with a caption when a media
    /// source is set, a plain text message otherwise.
    async fn send_card(
        &self,
        chat_id: i64,
        caption: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), GatewayError>;

    /// Answer a callback query, optionally as a popup alert.
    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), GatewayError>;

    /// Copy an arbitrary message to a recipient (reply-based admin
    /// broadcast).
    async fn copy_message(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_id: i32,
    ) -> Result<(), GatewayError>;

    /// Replace the default command menu.
    async fn set_default_commands(&self, commands: &[BotCommand]) -> Result<(), GatewayError>;

    /// Replace the command menu for one chat.
    async fn set_chat_commands(
        &self,
        chat_id: i64,
        commands: &[BotCommand],
    ) -> Result<(), GatewayError>;
}

/// Media attached to the UI card, picked from the configured URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaKind {
    Photo,
    Video,
    Animation,
}

impl MediaKind {
    fn from_url(raw: &str) -> Self {
        let path = raw.split('?').next().unwrap_or(raw).to_ascii_lowercase();
        if path.ends_with(".mp4") {
            Self::Video
        } else if path.ends_with(".gif") {
            Self::Animation
        } else {
            Self::Photo
        }
    }

    const fn method(self) -> &'static str {
        match self {
            Self::Photo => "sendPhoto",
            Self::Video => "sendVideo",
            Self::Animation => "sendAnimation",
        }
    }

    const fn field(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Animation => "animation",
        }
    }
}

/// Bot API client. One instance per process, shared behind an `Arc`.
pub struct TelegramGateway {
    client: reqwest::Client,
    base: String,
    ui_media: Option<(MediaKind, String)>,
}

impl TelegramGateway {
    /// Build the client from settings.
    #[must_use]
    pub fn new(settings: &Settings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(20))
            .build()
            .unwrap_or_default();

        let ui_media = settings
            .ui_media_url
            .as_ref()
            .filter(|url| !url.is_empty())
            .map(|url| (MediaKind::from_url(url), url.clone()));

        Self {
            client,
            base: format!("https://api.telegram.org/bot{}", settings.telegram_token),
            ui_media,
        }
    }

    /// Call one Bot API method, returning its `result` value.
    async fn call(&self, method: &str, payload: &Value) -> Result<Value, GatewayError> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        let body: Value = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                return Err(GatewayError::Api(format!(
                    "status {status} with unreadable body: {e}"
                )))
            }
        };

        if body.get("ok").and_then(Value::as_bool) == Some(true) {
            Ok(body.get("result").cloned().unwrap_or(Value::Null))
        } else {
            let description = body
                .get("description")
                .and_then(Value::as_str)
                .unwrap_or("unknown error");
            Err(GatewayError::Api(description.to_string()))
        }
    }
}

#[async_trait]
impl Gateway for TelegramGateway {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<(), GatewayError> {
        self.call("sendMessage", &json!({ "chat_id": chat_id, "text": text }))
            .await?;
        Ok(())
    }

    async fn send_keyboard(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), GatewayError> {
        self.call(
            "sendMessage",
            &json!({ "chat_id": chat_id, "text": text, "reply_markup": keyboard }),
        )
        .await?;
        Ok(())
    }

    async fn send_card(
        &self,
        chat_id: i64,
        caption: &str,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), GatewayError> {
        match &self.ui_media {
            Some((kind, url)) => {
                let mut payload = json!({
                    "chat_id": chat_id,
                    "caption": caption,
                    "reply_markup": keyboard,
                });
                payload[kind.field()] = Value::String(url.clone());
                self.call(kind.method(), &payload).await?;
            }
            None => {
                self.send_keyboard(chat_id, caption, keyboard).await?;
            }
        }
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: &str,
        show_alert: bool,
    ) -> Result<(), GatewayError> {
        let mut payload = json!({ "callback_query_id": callback_id });
        if !text.is_empty() {
            payload["text"] = Value::String(text.to_string());
        }
        if show_alert {
            payload["show_alert"] = Value::Bool(true);
        }
        self.call("answerCallbackQuery", &payload).await?;
        Ok(())
    }

    async fn copy_message(
        &self,
        to_chat: i64,
        from_chat: i64,
        message_id: i32,
    ) -> Result<(), GatewayError> {
        self.call(
            "copyMessage",
            &json!({
                "chat_id": to_chat,
                "from_chat_id": from_chat,
                "message_id": message_id,
            }),
        )
        .await?;
        Ok(())
    }

    async fn set_default_commands(&self, commands: &[BotCommand]) -> Result<(), GatewayError> {
        self.call("setMyCommands", &json!({ "commands": commands }))
            .await?;
        Ok(())
    }

    async fn set_chat_commands(
        &self,
        chat_id: i64,
        commands: &[BotCommand],
    ) -> Result<(), GatewayError> {
        let scope = BotCommandScope::Chat {
            chat_id: Recipient::Id(ChatId(chat_id)),
        };
        self.call(
            "setMyCommands",
            &json!({ "commands": commands, "scope": scope }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_kind_from_url() {
        assert_eq!(MediaKind::from_url("https://cdn.example/card.mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_url("https://cdn.example/card.GIF"), MediaKind::Animation);
        assert_eq!(MediaKind::from_url("https://cdn.example/card.png"), MediaKind::Photo);
        assert_eq!(
            MediaKind::from_url("https://cdn.example/card.mp4?sig=abc"),
            MediaKind::Video
        );
    }
}
