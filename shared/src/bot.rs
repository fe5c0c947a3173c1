//! The bot's shared context: store, messenger, configuration and randomness.

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::DutyConfig;
use crate::store::DutyStore;
use crate::telegram::{self, Messenger};

/// Everything an operation needs, built once per process.
///
/// Operations live in `duty`, `reputation` and `broadcast` as `impl DutyBot` blocks.
pub struct DutyBot {
    store: Arc<dyn DutyStore>,
    messenger: Arc<dyn Messenger>,
    config: Arc<DutyConfig>,
    rng: Mutex<StdRng>,
}

impl DutyBot {
    pub fn new(
        store: Arc<dyn DutyStore>,
        messenger: Arc<dyn Messenger>,
        config: Arc<DutyConfig>,
    ) -> Self {
        Self::with_rng(store, messenger, config, StdRng::from_entropy())
    }

    /// Create a bot with a specific random source (seeded in tests).
    pub fn with_rng(
        store: Arc<dyn DutyStore>,
        messenger: Arc<dyn Messenger>,
        config: Arc<DutyConfig>,
        rng: StdRng,
    ) -> Self {
        Self {
            store,
            messenger,
            config,
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &DutyConfig {
        &self.config
    }

    pub(crate) fn store(&self) -> &dyn DutyStore {
        self.store.as_ref()
    }

    /// Never hold the guard across an await.
    pub(crate) fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Best-effort send to any chat.
    pub async fn notify(&self, chat_id: i64, text: &str) {
        telegram::notify(self.messenger.as_ref(), chat_id, text).await;
    }

    /// Best-effort send to the group chat.
    pub async fn notify_group(&self, text: &str) {
        self.notify(self.config.group_chat_id, text).await;
    }
}
