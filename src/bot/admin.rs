//! Admin command surface.
//!
//! Commands are parsed from message text and restricted to the configured
//! allow-list. Broadcast-class commands take a store-resident
//! mutual-exclusion flag first; the flag has no expiry on purpose and is
//! cleared manually with `/unlock` if a job dies mid-flight.

use crate::bot::router::App;
use crate::bot::views;
use crate::gate::broadcast::BroadcastReport;
use crate::gate::poll;
use crate::gateway::GatewayError;
use crate::store::{BROADCAST_LOCK_KEY, TEASER_KEY};
use anyhow::Result;
use std::future::Future;
use thiserror::Error;
use tracing::{info, warn};

const LOCKED_MSG: &str = "Another broadcast is already in progress. Use /unlock if it is stuck.";

/// Operator commands, parsed from message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    /// `/broadcast <text>`: fan a text message out to every subscriber.
    Broadcast(String),
    /// `/blast`: resend the full localized UI card to every subscriber.
    Blast,
    /// `/setteaser <text>`: store the daily teaser.
    SetTeaser(String),
    /// `/teaser`: fan the stored teaser out.
    SendTeaser,
    /// `/drop` as a reply: copy the replied-to message to every subscriber.
    Drop,
    /// `/poll question | option | option [| ...]`: create and distribute.
    CreatePoll(String),
    /// `/results <pollId>`: question plus per-option tallies.
    Results(u64),
    /// `/unlock`: manually clear the broadcast flag.
    Unlock,
}

/// Malformed admin command, answered as a usage line. No state is mutated.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Usage: /broadcast <message>")]
    BroadcastUsage,
    #[error("Usage: /setteaser <text>")]
    TeaserUsage,
    #[error("Usage: /poll question | option | option [| ...]")]
    PollUsage,
    #[error("Usage: /results <poll id>")]
    ResultsUsage,
    #[error("Reply to the message you want to send out, then issue /drop.")]
    DropUsage,
}

impl AdminCommand {
    /// Parse `text` as an admin command. Returns `None` when the text is
    /// not an admin command at all; `Some(Err(_))` carries the usage line
    /// for a malformed one. `has_reply` marks whether the message replies
    /// to another one, which `/drop` requires.
    #[must_use]
    pub fn parse(text: &str, has_reply: bool) -> Option<Result<Self, CommandError>> {
        let trimmed = text.trim();
        let (command, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((command, rest)) => (command, rest.trim()),
            None => (trimmed, ""),
        };

        let parsed = match command {
            "/broadcast" if rest.is_empty() => Err(CommandError::BroadcastUsage),
            "/broadcast" => Ok(Self::Broadcast(rest.to_string())),
            "/blast" => Ok(Self::Blast),
            "/setteaser" if rest.is_empty() => Err(CommandError::TeaserUsage),
            "/setteaser" => Ok(Self::SetTeaser(rest.to_string())),
            "/teaser" => Ok(Self::SendTeaser),
            "/drop" if has_reply => Ok(Self::Drop),
            "/drop" => Err(CommandError::DropUsage),
            "/poll" if rest.is_empty() => Err(CommandError::PollUsage),
            "/poll" => Ok(Self::CreatePoll(rest.to_string())),
            "/results" => rest.parse().map(Self::Results).map_err(|_| CommandError::ResultsUsage),
            "/unlock" => Ok(Self::Unlock),
            _ => return None,
        };
        Some(parsed)
    }
}

fn summary(report: &BroadcastReport) -> String {
    format!(
        "Delivered to {} subscribers ({} failed).",
        report.succeeded, report.failed
    )
}

impl App {
    pub(crate) async fn on_admin_command(
        &self,
        chat_id: i64,
        command: AdminCommand,
        reply_message_id: Option<i32>,
    ) -> Result<()> {
        info!("Admin command in {chat_id}: {command:?}");
        match command {
            AdminCommand::Broadcast(text) => self.admin_broadcast_text(chat_id, text).await,
            AdminCommand::Blast => self.admin_blast(chat_id).await,
            AdminCommand::SetTeaser(text) => {
                self.store.set(TEASER_KEY, &text).await;
                self.gateway.send_text(chat_id, "Teaser saved.").await?;
                Ok(())
            }
            AdminCommand::SendTeaser => self.admin_send_teaser(chat_id).await,
            AdminCommand::Drop => self.admin_drop(chat_id, reply_message_id).await,
            AdminCommand::CreatePoll(spec) => self.admin_create_poll(chat_id, &spec).await,
            AdminCommand::Results(poll_id) => self.admin_results(chat_id, poll_id).await,
            AdminCommand::Unlock => {
                self.store.del(BROADCAST_LOCK_KEY).await;
                self.gateway.send_text(chat_id, "Broadcast flag cleared.").await?;
                Ok(())
            }
        }
    }

    /// Run one fan-out under the store-resident flag. Returns `None` (after
    /// telling the admin) when another broadcast holds the flag.
    async fn locked_fanout<F, Fut>(
        &self,
        chat_id: i64,
        send: F,
    ) -> Result<Option<BroadcastReport>>
    where
        F: FnMut(i64) -> Fut,
        Fut: Future<Output = Result<(), GatewayError>>,
    {
        if !self.store.set_nx(BROADCAST_LOCK_KEY, "1").await {
            self.gateway.send_text(chat_id, LOCKED_MSG).await?;
            return Ok(None);
        }

        let targets = self.registry.list_all(self.settings.fanout_limit).await;
        let report = self.broadcaster.run(&targets, send).await;

        self.store.del(BROADCAST_LOCK_KEY).await;
        Ok(Some(report))
    }

    async fn admin_broadcast_text(&self, chat_id: i64, text: String) -> Result<()> {
        let report = self
            .locked_fanout(chat_id, |target| {
                let gateway = self.gateway.clone();
                let text = text.clone();
                async move { gateway.send_text(target, &text).await }
            })
            .await?;

        if let Some(report) = report {
            self.gateway.send_text(chat_id, &summary(&report)).await?;
        }
        Ok(())
    }

    async fn admin_blast(&self, chat_id: i64) -> Result<()> {
        let report = self
            .locked_fanout(chat_id, |target| {
                // The card is localized per recipient, so each send renders
                // its own payload.
                let app = self.clone();
                async move { app.send_ui_card(target).await }
            })
            .await?;

        if let Some(report) = report {
            self.gateway.send_text(chat_id, &summary(&report)).await?;
        }
        Ok(())
    }

    async fn admin_send_teaser(&self, chat_id: i64) -> Result<()> {
        let Some(teaser) = self.store.get(TEASER_KEY).await else {
            self.gateway
                .send_text(chat_id, "No teaser is set. Store one with /setteaser first.")
                .await?;
            return Ok(());
        };

        let report = self
            .locked_fanout(chat_id, |target| {
                let gateway = self.gateway.clone();
                let teaser = teaser.clone();
                async move { gateway.send_text(target, &teaser).await }
            })
            .await?;

        if let Some(report) = report {
            self.gateway.send_text(chat_id, &summary(&report)).await?;
        }
        Ok(())
    }

    async fn admin_drop(&self, chat_id: i64, reply_message_id: Option<i32>) -> Result<()> {
        let Some(message_id) = reply_message_id else {
            self.gateway
                .send_text(chat_id, &CommandError::DropUsage.to_string())
                .await?;
            return Ok(());
        };

        let report = self
            .locked_fanout(chat_id, |target| {
                let gateway = self.gateway.clone();
                async move { gateway.copy_message(target, chat_id, message_id).await }
            })
            .await?;

        if let Some(report) = report {
            self.gateway.send_text(chat_id, &summary(&report)).await?;
        }
        Ok(())
    }

    async fn admin_create_poll(&self, chat_id: i64, spec: &str) -> Result<()> {
        let (question, options) = match poll::parse_spec(spec) {
            Ok(parsed) => parsed,
            Err(_) => {
                self.gateway
                    .send_text(chat_id, &CommandError::PollUsage.to_string())
                    .await?;
                return Ok(());
            }
        };

        let created = match self.polls.create(&question, &options).await {
            Ok(created) => created,
            Err(e) => {
                self.gateway
                    .send_text(chat_id, &format!("Poll was not created: {e}"))
                    .await?;
                return Ok(());
            }
        };

        if !self.store.set_nx(BROADCAST_LOCK_KEY, "1").await {
            self.gateway
                .send_text(chat_id, &format!("Poll #{} created but not sent: {LOCKED_MSG}", created.id))
                .await?;
            return Ok(());
        }
        let report = match self.distribute_poll(created.id).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Distribution of poll {} failed: {e}", created.id);
                BroadcastReport::default()
            }
        };
        self.store.del(BROADCAST_LOCK_KEY).await;

        self.gateway
            .send_text(chat_id, &format!("Poll #{} created. {}", created.id, summary(&report)))
            .await?;
        Ok(())
    }

    /// Fan a poll out to every subscriber with one button per option.
    /// The `/poll` command does this under the broadcast flag; this entry
    /// point runs a bare distribution.
    ///
    /// # Errors
    ///
    /// Returns `PollError::UnknownPoll` when no such poll exists.
    pub async fn distribute_poll(&self, poll_id: u64) -> Result<BroadcastReport, poll::PollError> {
        let record = self
            .polls
            .get(poll_id)
            .await
            .ok_or(poll::PollError::UnknownPoll(poll_id))?;
        let keyboard = views::poll_keyboard(&record);
        let targets = self.registry.list_all(self.settings.fanout_limit).await;

        Ok(self
            .broadcaster
            .run(&targets, |target| {
                let gateway = self.gateway.clone();
                let question = record.question.clone();
                let keyboard = keyboard.clone();
                async move { gateway.send_keyboard(target, &question, &keyboard).await }
            })
            .await)
    }

    async fn admin_results(&self, chat_id: i64, poll_id: u64) -> Result<()> {
        let Some(record) = self.polls.get(poll_id).await else {
            self.gateway
                .send_text(chat_id, &poll::PollError::UnknownPoll(poll_id).to_string())
                .await?;
            return Ok(());
        };

        let counts = match self.polls.tally(poll_id).await {
            Ok(counts) => counts,
            Err(e) => {
                warn!("Tally for poll {poll_id} failed: {e}");
                vec![0; record.options.len()]
            }
        };

        let mut lines = vec![format!("Poll #{}: {}", record.id, record.question)];
        for (option, count) in record.options.iter().zip(&counts) {
            lines.push(format!("{count} — {option}"));
        }
        self.gateway.send_text(chat_id, &lines.join("\n")).await?;
        Ok(())
    }
}
