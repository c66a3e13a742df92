//! Inline keyboard and command menu assembly.

use crate::bot::catalog::{Catalog, MessageKey};
use crate::bot::update::{CallbackAction, ACCESS_DATA};
use crate::config::Settings;
use crate::gate::locale::SUPPORTED_LANGS;
use crate::gate::poll::Poll;
use teloxide::types::{BotCommand, InlineKeyboardButton, InlineKeyboardMarkup};
use tracing::warn;
use url::Url;

/// Build a URL button, dropping it when the target does not parse.
fn url_button(label: String, raw: &str) -> Option<InlineKeyboardButton> {
    match Url::parse(raw) {
        Ok(url) => Some(InlineKeyboardButton::url(label, url)),
        Err(e) => {
            warn!("Dropping keyboard button with bad URL {raw}: {e}");
            None
        }
    }
}

fn lang_label(code: &str) -> String {
    match code {
        "en" => "🇬🇧 EN".to_string(),
        "ru" => "🇷🇺 RU".to_string(),
        "es" => "🇪🇸 ES".to_string(),
        other => other.to_uppercase(),
    }
}

/// The UI card keyboard: share and channel links on top, the ACCESS button,
/// then one language button per supported code.
#[must_use]
pub fn ui_card_keyboard(
    settings: &Settings,
    catalog: &Catalog,
    lang: &str,
    user_id: i64,
    count: i64,
    goal: u32,
) -> InlineKeyboardMarkup {
    let mut rows: Vec<Vec<InlineKeyboardButton>> = Vec::new();

    let mut top = Vec::new();
    if let Some(share_url) = settings.share_url.as_ref().filter(|url| !url.is_empty()) {
        let share_target = share_url.replace("{id}", &user_id.to_string());
        let label = catalog.render(
            lang,
            MessageKey::ShareButton,
            &[("count", count.to_string()), ("goal", goal.to_string())],
        );
        let share_link = format!("https://t.me/share/url?url={share_target}");
        top.extend(url_button(label, &share_link));
    }
    if let Some(channel_url) = settings.channel_url.as_ref().filter(|url| !url.is_empty()) {
        let label = catalog.render(lang, MessageKey::ChannelButton, &[]);
        top.extend(url_button(label, channel_url));
    }
    if !top.is_empty() {
        rows.push(top);
    }

    rows.push(vec![InlineKeyboardButton::callback(
        catalog.render(lang, MessageKey::AccessButton, &[]),
        ACCESS_DATA.to_string(),
    )]);

    rows.push(
        SUPPORTED_LANGS
            .iter()
            .map(|code| {
                InlineKeyboardButton::callback(lang_label(code), CallbackAction::lang_data(code))
            })
            .collect(),
    );

    InlineKeyboardMarkup::new(rows)
}

/// Keyboard shown after the gate unlocks: just the channel link, if any.
#[must_use]
pub fn unlocked_keyboard(
    settings: &Settings,
    catalog: &Catalog,
    lang: &str,
) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = settings
        .channel_url
        .as_ref()
        .filter(|url| !url.is_empty())
        .and_then(|url| url_button(catalog.render(lang, MessageKey::ChannelButton, &[]), url))
        .map(|button| vec![vec![button]])
        .unwrap_or_default();
    InlineKeyboardMarkup::new(rows)
}

/// One button per poll option, tagged with `(poll, option index)`.
#[must_use]
pub fn poll_keyboard(poll: &Poll) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(poll.options.iter().enumerate().map(|(index, option)| {
        vec![InlineKeyboardButton::callback(
            option.clone(),
            CallbackAction::vote_data(poll.id, index),
        )]
    }))
}

/// Command menu every user sees.
#[must_use]
pub fn user_menu() -> Vec<BotCommand> {
    vec![
        BotCommand::new("start", "Open the access gate"),
        BotCommand::new("menu", "Show the gate card"),
    ]
}

/// Command menu registered for operator chats, on top of the user menu.
#[must_use]
pub fn admin_menu() -> Vec<BotCommand> {
    let mut commands = user_menu();
    commands.extend([
        BotCommand::new("broadcast", "Send a text to every subscriber"),
        BotCommand::new("blast", "Resend the gate card to every subscriber"),
        BotCommand::new("setteaser", "Store the daily teaser"),
        BotCommand::new("teaser", "Send the stored teaser"),
        BotCommand::new("drop", "Reply to a message to send it out"),
        BotCommand::new("poll", "Create and send a poll"),
        BotCommand::new("results", "Show poll results"),
        BotCommand::new("unlock", "Clear a stuck broadcast flag"),
    ]);
    commands
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bot::catalog::Catalog;

    fn settings() -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            admin_ids_str: None,
            goal: 6,
            share_url: Some("https://t.me/gatebot?start={id}".to_string()),
            channel_url: Some("https://t.me/+exclusive".to_string()),
            ui_media_url: None,
            upstash_redis_rest_url: None,
            upstash_redis_rest_token: None,
            broadcast_delay_ms: 0,
            fanout_limit: 100,
            locale_cache_size: 100,
            listen_addr: "127.0.0.1:0".to_string(),
        }
    }

    #[test]
    fn test_ui_card_keyboard_rows() {
        let catalog = Catalog::load().expect("catalog validates");
        let markup = ui_card_keyboard(&settings(), &catalog, "en", 555, 2, 6);

        // Links row, access row, language row.
        assert_eq!(markup.inline_keyboard.len(), 3);
        assert_eq!(markup.inline_keyboard[0].len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "ACCESS");
        assert_eq!(markup.inline_keyboard[2].len(), SUPPORTED_LANGS.len());
        // The share label reflects live progress.
        assert_eq!(markup.inline_keyboard[0][0].text, "2/6 SHARE");
    }

    #[test]
    fn test_ui_card_keyboard_without_links() {
        let catalog = Catalog::load().expect("catalog validates");
        let mut bare = settings();
        bare.share_url = None;
        bare.channel_url = None;

        let markup = ui_card_keyboard(&bare, &catalog, "en", 555, 0, 6);
        assert_eq!(markup.inline_keyboard.len(), 2);
    }

    #[test]
    fn test_poll_keyboard_tags_options() {
        let poll = Poll {
            id: 3,
            question: "Q?".to_string(),
            options: vec!["A".to_string(), "B".to_string()],
        };
        let markup = poll_keyboard(&poll);
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "B");
    }
}
