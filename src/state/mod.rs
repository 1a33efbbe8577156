/// Live panel sessions.
pub mod panel;
/// Roster cache.
pub mod roster;
mod sse;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{RwLock, watch};
use uuid::Uuid;

use crate::{config::AppConfig, dao::club_store::ClubStore, error::ServiceError};

pub use self::sse::SseHub;
use self::{panel::LivePanel, roster::RosterCache};

/// Shared handle on [`AppState`] passed to handlers and background tasks.
pub type SharedState = Arc<AppState>;

/// Central application state: storage handle, configuration, roster and open panels.
pub struct AppState {
    club_store: RwLock<Option<Arc<dyn ClubStore>>>,
    degraded: watch::Sender<bool>,
    config: Arc<AppConfig>,
    roster: RosterCache,
    panels: DashMap<Uuid, Arc<LivePanel>>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            club_store: RwLock::new(None),
            degraded: degraded_tx,
            config: Arc::new(config),
            roster: RosterCache::new(),
            panels: DashMap::new(),
        })
    }

    /// Obtain a handle to the current club store, if one is installed.
    pub async fn club_store(&self) -> Option<Arc<dyn ClubStore>> {
        let guard = self.club_store.read().await;
        guard.as_ref().cloned()
    }

    /// Same as [`AppState::club_store`] but fails with [`ServiceError::Degraded`].
    pub async fn require_club_store(&self) -> Result<Arc<dyn ClubStore>, ServiceError> {
        self.club_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new club store implementation and leave degraded mode.
    pub async fn set_club_store(&self, store: Arc<dyn ClubStore>) {
        {
            let mut guard = self.club_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Cached club roster.
    pub fn roster(&self) -> &RosterCache {
        &self.roster
    }

    /// Registry of open panels keyed by their identifier.
    pub fn panels(&self) -> &DashMap<Uuid, Arc<LivePanel>> {
        &self.panels
    }

    /// Look up an open panel on behalf of a client, marking it as used.
    pub fn panel(&self, id: Uuid) -> Result<Arc<LivePanel>, ServiceError> {
        let panel = self
            .panels
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::NotFound(format!("panel `{id}`")))?;
        panel.touch();
        Ok(panel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::club_store::memory::MemoryClubStore;

    #[tokio::test]
    async fn installing_a_store_leaves_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        assert!(state.is_degraded());
        assert!(matches!(
            state.require_club_store().await,
            Err(ServiceError::Degraded)
        ));

        state.set_club_store(Arc::new(MemoryClubStore::new())).await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());
        assert!(state.require_club_store().await.is_ok());
    }
}
