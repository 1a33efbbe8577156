use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;
use uuid::Uuid;

use crate::dao::models::PlayerEntity;

/// Ordered snapshot of the club's players.
pub type RosterSnapshot = Arc<IndexMap<Uuid, PlayerEntity>>;

/// Synchronously readable roster, replaced wholesale on every refresh.
pub struct RosterCache {
    players: watch::Sender<RosterSnapshot>,
}

impl Default for RosterCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RosterCache {
    /// Start with an empty roster.
    pub fn new() -> Self {
        let (players, _rx) = watch::channel(Arc::new(IndexMap::new()));
        Self { players }
    }

    /// Swap in a new list of players, keeping the order they were supplied in.
    pub fn replace(&self, players: Vec<PlayerEntity>) -> usize {
        let snapshot: IndexMap<Uuid, PlayerEntity> = players
            .into_iter()
            .map(|player| (player.id, player))
            .collect();
        let count = snapshot.len();
        self.players.send_replace(Arc::new(snapshot));
        count
    }

    /// Current players, cheap to clone.
    pub fn snapshot(&self) -> RosterSnapshot {
        self.players.borrow().clone()
    }

    /// Name stored on baskets and statistics; falls back to the id when the roster misses it.
    pub fn display_name(&self, id: Uuid) -> String {
        self.players
            .borrow()
            .get(&id)
            .map(|player| player.name.clone())
            .unwrap_or_else(|| id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str) -> PlayerEntity {
        PlayerEntity {
            id: Uuid::new_v4(),
            name: name.into(),
            nickname: None,
            photo_url: None,
            jersey_number: 7,
        }
    }

    #[test]
    fn replace_keeps_supplied_order() {
        let cache = RosterCache::new();
        let players = vec![player("Zoé"), player("Ana"), player("Malik")];
        let ids: Vec<Uuid> = players.iter().map(|p| p.id).collect();

        assert_eq!(cache.replace(players), 3);
        let snapshot = cache.snapshot();
        assert_eq!(snapshot.keys().copied().collect::<Vec<_>>(), ids);
    }

    #[test]
    fn unknown_player_name_falls_back_to_id() {
        let cache = RosterCache::new();
        let known = player("Ana");
        let known_id = known.id;
        cache.replace(vec![known]);

        assert_eq!(cache.display_name(known_id), "Ana");
        let stranger = Uuid::new_v4();
        assert_eq!(cache.display_name(stranger), stranger.to_string());
    }
}
