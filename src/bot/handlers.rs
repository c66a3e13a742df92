//! Join, message and button handlers.
//!
//! Every handler registers the interacting user first, resolves their
//! locale, and only then acts. Partial application under store failure is
//! tolerated because registration and counter writes are idempotent.

use crate::bot::admin::AdminCommand;
use crate::bot::catalog::MessageKey;
use crate::bot::router::App;
use crate::bot::update::{CallbackAction, MessageEvent, PressEvent};
use crate::bot::views;
use crate::gate::locale::LocaleError;
use crate::gate::progress::{progress_bar, BAR_WIDTH};
use crate::gateway::GatewayError;
use anyhow::Result;
use tracing::{debug, info};

impl App {
    pub(crate) async fn on_join_request(&self, user_id: i64) -> Result<()> {
        self.registry.register(user_id).await;
        info!("Join request from {user_id}");
        self.send_ui_card(user_id).await?;
        Ok(())
    }

    pub(crate) async fn on_message(&self, event: MessageEvent) -> Result<()> {
        let MessageEvent {
            chat_id,
            user_id,
            first_name,
            text,
            reply_message_id,
        } = event;

        // Always save the user when they talk to the bot.
        if let Some(user_id) = user_id {
            self.registry.register(user_id).await;
        }

        let Some(text) = text else { return Ok(()) };
        let text = text.trim();

        if let Some(parsed) = AdminCommand::parse(text, reply_message_id.is_some()) {
            let Some(user_id) = user_id else { return Ok(()) };
            if !self.admins.contains(&user_id) {
                let user_name = first_name.as_deref().unwrap_or("Unknown");
                info!("⛔️ Denied admin command from {user_id} ({user_name})");
                self.gateway.send_text(chat_id, "Owner only.").await?;
                return Ok(());
            }
            return match parsed {
                Ok(command) => self.on_admin_command(chat_id, command, reply_message_id).await,
                Err(usage) => {
                    self.gateway.send_text(chat_id, &usage.to_string()).await?;
                    Ok(())
                }
            };
        }

        if text == "/start" || text == "/menu" {
            self.send_ui_card(chat_id).await?;
            return Ok(());
        }

        if let Some(payload) = text.strip_prefix("/start ") {
            if let (Some(user_id), Ok(referrer)) = (user_id, payload.trim().parse::<i64>()) {
                if let Some(count) = self.progress.credit(referrer, user_id).await {
                    self.notify_share_progress(referrer, count).await;
                }
            }
            self.send_ui_card(chat_id).await?;
            return Ok(());
        }

        // Anything else: keep quiet by default.
        Ok(())
    }

    pub(crate) async fn on_button_press(&self, event: PressEvent) -> Result<()> {
        let PressEvent {
            callback_id,
            user_id,
            data,
        } = event;

        self.registry.register(user_id).await;
        let lang = self.locales.get(user_id).await;

        match data.as_deref().and_then(CallbackAction::parse) {
            Some(CallbackAction::Access) => self.answer_access(&callback_id, user_id, &lang).await,
            Some(CallbackAction::SetLanguage(code)) => {
                self.answer_language(&callback_id, user_id, &code).await
            }
            Some(CallbackAction::Vote { poll_id, option }) => {
                self.answer_vote(&callback_id, user_id, poll_id, option, &lang).await
            }
            None => {
                // Unknown payloads are still answered so the client stops
                // showing a spinner.
                self.gateway.answer_callback(&callback_id, "", false).await?;
                Ok(())
            }
        }
    }

    /// Send the localized UI card with live share progress.
    pub(crate) async fn send_ui_card(&self, user_id: i64) -> Result<(), GatewayError> {
        let lang = self.locales.get(user_id).await;
        let count = self.progress.get(user_id).await;
        let caption = self.catalog.render(&lang, MessageKey::Welcome, &[]);
        let keyboard = views::ui_card_keyboard(
            &self.settings,
            &self.catalog,
            &lang,
            user_id,
            count,
            self.progress.goal(),
        );
        self.gateway.send_card(user_id, &caption, &keyboard).await
    }

    async fn answer_access(&self, callback_id: &str, user_id: i64, lang: &str) -> Result<()> {
        let count = self.progress.get(user_id).await;
        let goal = self.progress.goal();

        if self.progress.is_unlocked(count) {
            let text = self.catalog.render(lang, MessageKey::AccessUnlocked, &[]);
            self.gateway.answer_callback(callback_id, &text, true).await?;
            let keyboard = views::unlocked_keyboard(&self.settings, &self.catalog, lang);
            self.gateway.send_keyboard(user_id, &text, &keyboard).await?;
        } else {
            let text = self.catalog.render(
                lang,
                MessageKey::AccessLocked,
                &[
                    ("count", count.to_string()),
                    ("goal", goal.to_string()),
                    ("bar", progress_bar(count, goal, BAR_WIDTH)),
                ],
            );
            self.gateway.answer_callback(callback_id, &text, true).await?;
        }
        Ok(())
    }

    async fn answer_language(&self, callback_id: &str, user_id: i64, code: &str) -> Result<()> {
        match self.locales.set(user_id, code).await {
            Ok(()) => {
                let text = self.catalog.render(code, MessageKey::LanguageSet, &[]);
                self.gateway.answer_callback(callback_id, &text, false).await?;
            }
            Err(LocaleError::Unsupported(code)) => {
                // Stale button from an older card; the stored language is
                // left untouched.
                debug!("Ignoring unsupported language {code} from {user_id}");
                self.gateway.answer_callback(callback_id, "", false).await?;
            }
        }
        Ok(())
    }

    async fn answer_vote(
        &self,
        callback_id: &str,
        user_id: i64,
        poll_id: u64,
        option: usize,
        lang: &str,
    ) -> Result<()> {
        let key = match self.polls.record_vote(poll_id, user_id, option).await {
            Ok(()) => MessageKey::VoteRecorded,
            Err(e) => {
                debug!("Rejected vote from {user_id}: {e}");
                MessageKey::VoteRejected
            }
        };
        let text = self.catalog.render(lang, key, &[]);
        self.gateway.answer_callback(callback_id, &text, false).await?;
        Ok(())
    }

    /// Best-effort progress note to a referrer; a blocked chat must not
    /// fail the newcomer's own update.
    async fn notify_share_progress(&self, referrer: i64, count: i64) {
        let lang = self.locales.get(referrer).await;
        let goal = self.progress.goal();
        let text = self.catalog.render(
            &lang,
            MessageKey::ShareProgress,
            &[
                ("count", count.to_string()),
                ("goal", goal.to_string()),
                ("bar", progress_bar(count, goal, BAR_WIDTH)),
            ],
        );
        if let Err(e) = self.gateway.send_text(referrer, &text).await {
            debug!("Could not notify {referrer} about share progress: {e}");
        }
    }
}
