//! In-process [`ClubStore`] used for local runs and tests.
//!
//! Documents live behind a single lock so increments and claims are atomic, and every
//! mutation is announced on a broadcast channel that feeds the realtime subscriptions.

use std::{
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::{future::BoxFuture, stream::BoxStream};
use indexmap::IndexMap;
use rand::seq::IndexedRandom;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{
    RwLock,
    broadcast::{self, error::RecvError},
};
use uuid::Uuid;

use crate::dao::{
    club_store::ClubStore,
    models::{
        BasketEntity, EventEntity, GameEntity, GameRef, PlayerEntity, PlayerGameStatEntity,
        ScoreSlot, ScoreboardEntity, SideId, TeamEntity,
    },
    storage::{StorageError, StorageResult},
};

const CHANGE_CAPACITY: usize = 64;

/// Failures of the in-memory backend.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    /// The store was switched offline to simulate an outage.
    #[error("memory store is offline")]
    Offline,
    /// A score increment targeted a game that does not exist.
    #[error("game `{game_id}` not found")]
    MissingGame {
        /// Game the write targeted.
        game_id: Uuid,
    },
    /// The seed file could not be read.
    #[error("failed to read seed file `{path}`")]
    SeedRead {
        /// Location of the seed file.
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// The seed file is not valid JSON for [`MemorySeed`].
    #[error("failed to parse seed file `{path}`")]
    SeedParse {
        /// Location of the seed file.
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<MemoryStoreError> for StorageError {
    fn from(err: MemoryStoreError) -> Self {
        StorageError::unavailable(err.to_string(), err)
    }
}

/// Documents loaded into a fresh memory store.
#[derive(Debug, Default, Deserialize)]
pub struct MemorySeed {
    /// Events, with their enrolled rosters.
    #[serde(default)]
    pub events: Vec<EventEntity>,
    /// Teams of internal tournaments.
    #[serde(default)]
    pub teams: Vec<TeamEntity>,
    /// Games, scores included.
    #[serde(default)]
    pub games: Vec<GameEntity>,
    /// Club players.
    #[serde(default)]
    pub players: Vec<PlayerEntity>,
}

impl MemorySeed {
    /// Read a seed from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, MemoryStoreError> {
        let display = path.display().to_string();
        let contents = std::fs::read_to_string(path).map_err(|source| {
            MemoryStoreError::SeedRead {
                path: display.clone(),
                source,
            }
        })?;
        serde_json::from_str(&contents).map_err(|source| MemoryStoreError::SeedParse {
            path: display,
            source,
        })
    }
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Baskets(GameRef),
    Scores(GameRef),
    /// The store went offline; every subscription re-reads and fails.
    Outage,
}

#[derive(Default)]
struct MemoryData {
    events: IndexMap<Uuid, EventEntity>,
    teams: IndexMap<Uuid, TeamEntity>,
    games: IndexMap<Uuid, GameEntity>,
    baskets: Vec<BasketEntity>,
    statistics: IndexMap<(Uuid, Uuid), PlayerGameStatEntity>,
    players: IndexMap<Uuid, PlayerEntity>,
}

struct MemoryInner {
    data: RwLock<MemoryData>,
    changes: broadcast::Sender<Change>,
    offline: AtomicBool,
}

/// [`ClubStore`] keeping every document in process memory.
#[derive(Clone)]
pub struct MemoryClubStore {
    inner: Arc<MemoryInner>,
}

impl Default for MemoryClubStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryClubStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::from_data(MemoryData::default())
    }

    /// Create a store pre-populated with `seed`.
    pub fn with_seed(seed: MemorySeed) -> Self {
        Self::from_data(MemoryData {
            events: seed.events.into_iter().map(|e| (e.id, e)).collect(),
            teams: seed.teams.into_iter().map(|t| (t.id, t)).collect(),
            games: seed.games.into_iter().map(|g| (g.id, g)).collect(),
            players: seed.players.into_iter().map(|p| (p.id, p)).collect(),
            ..MemoryData::default()
        })
    }

    fn from_data(data: MemoryData) -> Self {
        let (changes, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            inner: Arc::new(MemoryInner {
                data: RwLock::new(data),
                changes,
                offline: AtomicBool::new(false),
            }),
        }
    }

    /// Toggle a simulated outage: while offline every call fails and open
    /// subscriptions end with an error.
    pub fn set_offline(&self, offline: bool) {
        self.inner.offline.store(offline, Ordering::SeqCst);
        if offline {
            self.notify(Change::Outage);
        }
    }

    fn ensure_online(&self) -> Result<(), MemoryStoreError> {
        if self.inner.offline.load(Ordering::SeqCst) {
            Err(MemoryStoreError::Offline)
        } else {
            Ok(())
        }
    }

    fn notify(&self, change: Change) {
        let _ = self.inner.changes.send(change);
    }

    async fn snapshot_baskets(&self, game: GameRef) -> StorageResult<Vec<BasketEntity>> {
        self.ensure_online()?;
        let data = self.inner.data.read().await;
        let mut baskets: Vec<BasketEntity> = data
            .baskets
            .iter()
            .filter(|basket| basket.game_id == game.game_id)
            .cloned()
            .collect();
        baskets.sort_by_key(BasketEntity::order_key);
        Ok(baskets)
    }

    async fn snapshot_scores(&self, game: GameRef) -> StorageResult<ScoreboardEntity> {
        self.ensure_online()?;
        let data = self.inner.data.read().await;
        Ok(data
            .games
            .get(&game.game_id)
            .map(GameEntity::scoreboard)
            .unwrap_or_default())
    }

    async fn latest_basket(
        &self,
        game: GameRef,
        side: SideId,
    ) -> StorageResult<Option<BasketEntity>> {
        self.ensure_online()?;
        let data = self.inner.data.read().await;
        Ok(data
            .baskets
            .iter()
            .filter(|basket| basket.game_id == game.game_id && basket.side == side)
            .max_by_key(|basket| basket.order_key())
            .cloned())
    }

    async fn increment_score(
        &self,
        game: GameRef,
        slot: ScoreSlot,
        delta: i32,
    ) -> StorageResult<()> {
        self.ensure_online()?;
        {
            let mut data = self.inner.data.write().await;
            let entity = data
                .games
                .get_mut(&game.game_id)
                .ok_or(MemoryStoreError::MissingGame {
                    game_id: game.game_id,
                })?;
            match slot {
                ScoreSlot::A => entity.team_a_final += delta,
                ScoreSlot::B => entity.team_b_final += delta,
            }
        }
        self.notify(Change::Scores(game));
        Ok(())
    }

    async fn claim_unassigned_basket(
        &self,
        game: GameRef,
        side: SideId,
        points: u8,
        player_id: Uuid,
        player_name: String,
    ) -> StorageResult<Option<BasketEntity>> {
        self.ensure_online()?;
        let claimed = {
            let mut data = self.inner.data.write().await;
            let candidates: Vec<usize> = data
                .baskets
                .iter()
                .enumerate()
                .filter(|(_, basket)| {
                    basket.game_id == game.game_id
                        && basket.side == side
                        && basket.points == points
                        && basket.is_unassigned()
                })
                .map(|(index, _)| index)
                .collect();

            // Baskets of a tier are interchangeable; any of them may be claimed.
            let Some(&index) = candidates.choose(&mut rand::rng()) else {
                return Ok(None);
            };
            let basket = &mut data.baskets[index];
            basket.player_id = Some(player_id);
            basket.player_name = Some(player_name);
            basket.clone()
        };
        self.notify(Change::Baskets(game));
        Ok(Some(claimed))
    }

    /// Subscribe before taking the first snapshot so no change can slip in between.
    fn watch<T, F, Fut>(
        &self,
        game: GameRef,
        wanted: fn(Change, GameRef) -> bool,
        snapshot: F,
    ) -> BoxStream<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: Fn(MemoryClubStore) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = StorageResult<T>> + Send,
    {
        let store = self.clone();
        let mut changes = self.inner.changes.subscribe();
        // Like a change stream, the subscription ends after delivering an error.
        Box::pin(async_stream::stream! {
            let mut stale = true;
            loop {
                if stale {
                    let next = snapshot(store.clone()).await;
                    let failed = next.is_err();
                    yield next;
                    if failed {
                        break;
                    }
                    stale = false;
                }
                match changes.recv().await {
                    Ok(Change::Outage) => stale = true,
                    Ok(change) if wanted(change, game) => stale = true,
                    Ok(_) => continue,
                    // Missed notifications are covered by a fresh full snapshot.
                    Err(RecvError::Lagged(_)) => stale = true,
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn baskets_changed(change: Change, game: GameRef) -> bool {
    matches!(change, Change::Baskets(changed) if changed == game)
}

fn scores_changed(change: Change, game: GameRef) -> bool {
    matches!(change, Change::Scores(changed) if changed == game)
}

impl ClubStore for MemoryClubStore {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.data.read().await.events.get(&id).cloned())
        })
    }

    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.inner.data.write().await.events.insert(event.id, event);
            Ok(())
        })
    }

    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let data = store.inner.data.read().await;
            Ok(data
                .teams
                .values()
                .filter(|team| team.event_id == event_id)
                .cloned()
                .collect())
        })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.inner.data.write().await.teams.insert(team.id, team);
            Ok(())
        })
    }

    fn find_game(&self, game: GameRef) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let data = store.inner.data.read().await;
            Ok(data
                .games
                .get(&game.game_id)
                .filter(|entity| entity.event_id == game.event_id)
                .cloned())
        })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let reference = game.reference();
            store.inner.data.write().await.games.insert(game.id, game);
            store.notify(Change::Scores(reference));
            Ok(())
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            Ok(store.inner.data.read().await.players.values().cloned().collect())
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store.inner.data.write().await.players.insert(player.id, player);
            Ok(())
        })
    }

    fn insert_basket(&self, basket: BasketEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let game = GameRef {
                event_id: basket.event_id,
                game_id: basket.game_id,
            };
            store.inner.data.write().await.baskets.push(basket);
            store.notify(Change::Baskets(game));
            Ok(())
        })
    }

    fn latest_basket(
        &self,
        game: GameRef,
        side: SideId,
    ) -> BoxFuture<'static, StorageResult<Option<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_basket(game, side).await })
    }

    fn delete_basket(&self, game: GameRef, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let removed = {
                let mut data = store.inner.data.write().await;
                let before = data.baskets.len();
                data.baskets
                    .retain(|basket| !(basket.game_id == game.game_id && basket.id == id));
                data.baskets.len() != before
            };
            if removed {
                store.notify(Change::Baskets(game));
            }
            Ok(removed)
        })
    }

    fn increment_score(
        &self,
        game: GameRef,
        slot: ScoreSlot,
        delta: i32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.increment_score(game, slot, delta).await })
    }

    fn list_baskets(&self, game: GameRef) -> BoxFuture<'static, StorageResult<Vec<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.snapshot_baskets(game).await })
    }

    fn claim_unassigned_basket(
        &self,
        game: GameRef,
        side: SideId,
        points: u8,
        player_id: Uuid,
        player_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .claim_unassigned_basket(game, side, points, player_id, player_name)
                .await
        })
    }

    fn player_baskets(
        &self,
        game: GameRef,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let baskets = store.snapshot_baskets(game).await?;
            Ok(baskets
                .into_iter()
                .filter(|basket| basket.player_id == Some(player_id))
                .collect())
        })
    }

    fn save_statistic(&self, stat: PlayerGameStatEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store
                .inner
                .data
                .write()
                .await
                .statistics
                .insert((stat.game_id, stat.player_id), stat);
            Ok(())
        })
    }

    fn delete_statistic(
        &self,
        game: GameRef,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            store
                .inner
                .data
                .write()
                .await
                .statistics
                .shift_remove(&(game.game_id, player_id));
            Ok(())
        })
    }

    fn list_statistics(
        &self,
        game: GameRef,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerGameStatEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let data = store.inner.data.read().await;
            Ok(data
                .statistics
                .values()
                .filter(|stat| stat.game_id == game.game_id)
                .cloned()
                .collect())
        })
    }

    fn list_event_statistics(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerGameStatEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let data = store.inner.data.read().await;
            Ok(data
                .statistics
                .values()
                .filter(|stat| stat.event_id == event_id)
                .cloned()
                .collect())
        })
    }

    fn watch_baskets(&self, game: GameRef) -> BoxStream<'static, StorageResult<Vec<BasketEntity>>> {
        self.watch(game, baskets_changed, move |store| async move {
            store.snapshot_baskets(game).await
        })
    }

    fn watch_scores(&self, game: GameRef) -> BoxStream<'static, StorageResult<ScoreboardEntity>> {
        self.watch(game, scores_changed, move |store| async move {
            store.snapshot_scores(game).await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online().map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.health_check()
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;

    use super::*;
    use crate::dao::models::{EventKind, EventStatus, Modality};

    fn seeded() -> (MemoryClubStore, GameRef) {
        let event_id = Uuid::new_v4();
        let game = GameEntity {
            id: Uuid::new_v4(),
            event_id,
            adversary: Some("Rivals".into()),
            team_a_id: None,
            team_b_id: None,
            date: "2026-03-01".into(),
            team_a_final: 0,
            team_b_final: 0,
        };
        let reference = game.reference();
        let store = MemoryClubStore::with_seed(MemorySeed {
            events: vec![EventEntity {
                id: event_id,
                name: "Spring Cup".into(),
                date: "2026-03-01".into(),
                modality: Modality::FiveOnFive,
                kind: EventKind::Friendly,
                status: EventStatus::InProgress,
                roster: vec![],
            }],
            games: vec![game],
            ..MemorySeed::default()
        });
        (store, reference)
    }

    #[tokio::test]
    async fn latest_basket_follows_insertion_order() {
        let (store, game) = seeded();
        let first = BasketEntity::unassigned(game, SideId::Home, 2);
        let second = BasketEntity::unassigned(game, SideId::Home, 3);
        let other_side = BasketEntity::unassigned(game, SideId::Opponent, 1);
        store.insert_basket(first).await.unwrap();
        store.insert_basket(second.clone()).await.unwrap();
        store.insert_basket(other_side).await.unwrap();

        let latest = ClubStore::latest_basket(&store, game, SideId::Home)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn claim_never_hands_out_the_same_basket_twice() {
        let (store, game) = seeded();
        store
            .insert_basket(BasketEntity::unassigned(game, SideId::Home, 2))
            .await
            .unwrap();

        let player = Uuid::new_v4();
        let first =
            ClubStore::claim_unassigned_basket(&store, game, SideId::Home, 2, player, "Ana".into())
                .await
                .unwrap();
        let second =
            ClubStore::claim_unassigned_basket(&store, game, SideId::Home, 2, player, "Ana".into())
                .await
                .unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn watch_delivers_initial_and_updated_snapshots() {
        let (store, game) = seeded();
        let mut scores = store.watch_scores(game);

        assert_eq!(scores.next().await.unwrap().unwrap().team_a_final, 0);
        ClubStore::increment_score(&store, game, ScoreSlot::A, 3)
            .await
            .unwrap();
        assert_eq!(scores.next().await.unwrap().unwrap().team_a_final, 3);
    }

    #[tokio::test]
    async fn offline_store_rejects_calls() {
        let (store, game) = seeded();
        store.set_offline(true);
        assert!(store.list_baskets(game).await.is_err());
        assert!(store.health_check().await.is_err());
        store.set_offline(false);
        assert!(store.list_baskets(game).await.is_ok());
    }

    #[tokio::test]
    async fn outage_ends_open_subscriptions() {
        let (store, game) = seeded();
        let mut baskets = store.watch_baskets(game);
        assert!(baskets.next().await.unwrap().is_ok());

        store.set_offline(true);
        assert!(baskets.next().await.unwrap().is_err());
        assert!(baskets.next().await.is_none());
    }
}
