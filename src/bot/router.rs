//! Update router and application state.
//!
//! [`App`] owns every gate component and is shared behind an `Arc` by the
//! webhook server. `handle_update` is the single entry point: it classifies
//! the raw update, dispatches, and swallows every internal failure; the
//! upstream gateway redelivers unacknowledged updates indefinitely, so the
//! caller must always be able to ack.

use crate::bot::catalog::{Catalog, CatalogError};
use crate::bot::update::{Inbound, RawUpdate};
use crate::bot::views;
use crate::config::Settings;
use crate::gate::broadcast::Broadcaster;
use crate::gate::locale::LocaleStore;
use crate::gate::poll::PollStore;
use crate::gate::progress::ProgressTracker;
use crate::gate::registry::SubscriberRegistry;
use crate::gateway::Gateway;
use crate::store::Store;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// Aggregated application state shared by every handler.
#[derive(Clone)]
pub struct App {
    pub(crate) settings: Arc<Settings>,
    pub(crate) admins: Arc<HashSet<i64>>,
    pub(crate) store: Arc<dyn Store>,
    pub(crate) gateway: Arc<dyn Gateway>,
    pub(crate) registry: SubscriberRegistry,
    pub(crate) locales: LocaleStore,
    pub(crate) progress: ProgressTracker,
    pub(crate) polls: PollStore,
    pub(crate) broadcaster: Broadcaster,
    pub(crate) catalog: Arc<Catalog>,
}

impl App {
    /// Wire the gate together.
    ///
    /// # Errors
    ///
    /// Fails only when the message catalog does not validate, which is a
    /// build defect rather than a runtime condition.
    pub fn new(
        settings: Arc<Settings>,
        store: Arc<dyn Store>,
        gateway: Arc<dyn Gateway>,
    ) -> Result<Self, CatalogError> {
        let catalog = Arc::new(Catalog::load()?);
        let admins = Arc::new(settings.admin_ids());

        Ok(Self {
            registry: SubscriberRegistry::new(store.clone()),
            locales: LocaleStore::new(store.clone(), settings.locale_cache_size),
            progress: ProgressTracker::new(store.clone(), settings.goal),
            polls: PollStore::new(store.clone()),
            broadcaster: Broadcaster::new(Duration::from_millis(settings.broadcast_delay_ms)),
            admins,
            catalog,
            settings,
            store,
            gateway,
        })
    }

    /// Handle one webhook update. Never fails: internal errors are logged
    /// and swallowed so the webhook can always answer with a trivial ack.
    pub async fn handle_update(&self, raw: RawUpdate) {
        let Some(inbound) = raw.classify() else {
            debug!("Ignoring update with no recognised shape");
            return;
        };

        if let Err(e) = self.dispatch(inbound).await {
            error!("Update handling failed: {e:#}");
        }
    }

    async fn dispatch(&self, inbound: Inbound) -> anyhow::Result<()> {
        match inbound {
            Inbound::JoinRequest { user_id } => self.on_join_request(user_id).await,
            Inbound::Message(event) => self.on_message(event).await,
            Inbound::ButtonPress(event) => self.on_button_press(event).await,
        }
    }

    /// Register the default and per-admin command menus with the gateway.
    /// Called once at startup; failures are logged but never fatal.
    pub async fn register_command_menus(&self) {
        if let Err(e) = self.gateway.set_default_commands(&views::user_menu()).await {
            warn!("Could not register the default command menu: {e}");
        }
        let admin_menu = views::admin_menu();
        for &admin_id in self.admins.iter() {
            if let Err(e) = self.gateway.set_chat_commands(admin_id, &admin_menu).await {
                warn!("Could not register the admin menu for {admin_id}: {e}");
            }
        }
    }
}
