use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, future::BoxFuture, stream::BoxStream};
use mongodb::{
    Client, Collection, Database, IndexModel,
    bson::{Document, doc},
    options::{FullDocumentType, IndexOptions, ReturnDocument},
};
use serde::{Serialize, de::DeserializeOwned};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{
        MongoBasketDocument, MongoEventDocument, MongoGameDocument, MongoPlayerDocument,
        MongoStatisticDocument, MongoTeamDocument, doc_id, statistic_id,
    },
};
use crate::dao::{
    club_store::ClubStore,
    models::{
        BasketEntity, EventEntity, GameEntity, GameRef, PlayerEntity, PlayerGameStatEntity,
        ScoreSlot, ScoreboardEntity, SideId, TeamEntity,
    },
    storage::{StorageError, StorageResult},
};

const EVENT_COLLECTION: &str = "events";
const TEAM_COLLECTION: &str = "teams";
const GAME_COLLECTION: &str = "games";
const BASKET_COLLECTION: &str = "baskets";
const STATISTIC_COLLECTION: &str = "statistics";
const PLAYER_COLLECTION: &str = "players";

/// Basket log order: timestamp, then the time-ordered id for baskets sharing a millisecond.
fn log_order() -> Document {
    doc! {"recorded_at": 1, "_id": 1}
}

fn latest_first() -> Document {
    doc! {"recorded_at": -1, "_id": -1}
}

fn game_filter(game: GameRef) -> Document {
    doc! {"event_id": game.event_id.to_string(), "game_id": game.game_id.to_string()}
}

/// [`ClubStore`] backed by MongoDB collections and change streams.
#[derive(Clone)]
pub struct MongoClubStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    #[allow(dead_code)]
    client: Client,
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoClubStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { client, database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let indexes: [(&'static str, &'static str, Document); 4] = [
            (
                BASKET_COLLECTION,
                "basket_log_idx",
                doc! {"game_id": 1, "side": 1, "recorded_at": -1, "_id": -1},
            ),
            (
                BASKET_COLLECTION,
                "basket_player_idx",
                doc! {"game_id": 1, "player_id": 1},
            ),
            (TEAM_COLLECTION, "team_event_idx", doc! {"event_id": 1}),
            (
                STATISTIC_COLLECTION,
                "statistic_event_idx",
                doc! {"event_id": 1, "game_id": 1},
            ),
        ];

        let database = self.database().await;
        for (collection, name, keys) in indexes {
            let index = IndexModel::builder()
                .keys(keys)
                .options(IndexOptions::builder().name(Some(name.to_owned())).build())
                .build();
            database
                .collection::<Document>(collection)
                .create_index(index)
                .await
                .map_err(|source| MongoDaoError::EnsureIndex {
                    collection,
                    index: name,
                    source,
                })?;
        }

        Ok(())
    }

    async fn database(&self) -> Database {
        let guard = self.inner.state.read().await;
        guard.database.clone()
    }

    async fn collection<T>(&self, name: &str) -> Collection<T>
    where
        T: Send + Sync,
    {
        self.database().await.collection::<T>(name)
    }

    async fn find_one<T>(&self, name: &'static str, filter: Document) -> MongoResult<Option<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        self.collection::<T>(name)
            .await
            .find_one(filter)
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: name,
                source,
            })
    }

    async fn find_many<T>(
        &self,
        name: &'static str,
        filter: Document,
        sort: Option<Document>,
    ) -> MongoResult<Vec<T>>
    where
        T: DeserializeOwned + Send + Sync,
    {
        let read_error = |source| MongoDaoError::Read {
            collection: name,
            source,
        };
        let collection = self.collection::<T>(name).await;
        let mut find = collection.find(filter);
        if let Some(sort) = sort {
            find = find.sort(sort);
        }
        find.await
            .map_err(read_error)?
            .try_collect()
            .await
            .map_err(read_error)
    }

    async fn upsert<T>(&self, name: &'static str, id: String, document: T) -> MongoResult<()>
    where
        T: Serialize + Send + Sync,
    {
        self.collection::<T>(name)
            .await
            .replace_one(doc! {"_id": id.clone()}, &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: name,
                id,
                source,
            })?;
        Ok(())
    }

    async fn find_game(&self, game: GameRef) -> MongoResult<Option<GameEntity>> {
        let mut filter = doc_id(game.game_id);
        filter.insert("event_id", game.event_id.to_string());
        let document: Option<MongoGameDocument> = self.find_one(GAME_COLLECTION, filter).await?;
        Ok(document.map(Into::into))
    }

    async fn scoreboard(&self, game: GameRef) -> MongoResult<ScoreboardEntity> {
        Ok(self
            .find_game(game)
            .await?
            .map(|entity| entity.scoreboard())
            .unwrap_or_default())
    }

    async fn list_baskets(&self, game: GameRef) -> MongoResult<Vec<BasketEntity>> {
        let documents: Vec<MongoBasketDocument> = self
            .find_many(BASKET_COLLECTION, game_filter(game), Some(log_order()))
            .await?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn latest_basket(&self, game: GameRef, side: SideId) -> MongoResult<Option<BasketEntity>> {
        let mut filter = game_filter(game);
        filter.insert("side", side.to_string());
        let document = self
            .collection::<MongoBasketDocument>(BASKET_COLLECTION)
            .await
            .find_one(filter)
            .sort(latest_first())
            .await
            .map_err(|source| MongoDaoError::Read {
                collection: BASKET_COLLECTION,
                source,
            })?;
        Ok(document.map(Into::into))
    }

    async fn insert_basket(&self, basket: BasketEntity) -> MongoResult<()> {
        let id = basket.id.to_string();
        let document: MongoBasketDocument = basket.into();
        self.collection::<MongoBasketDocument>(BASKET_COLLECTION)
            .await
            .insert_one(&document)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: BASKET_COLLECTION,
                id,
                source,
            })?;
        Ok(())
    }

    async fn delete_basket(&self, game: GameRef, id: Uuid) -> MongoResult<bool> {
        let mut filter = game_filter(game);
        filter.insert("_id", id.to_string());
        let result = self
            .collection::<MongoBasketDocument>(BASKET_COLLECTION)
            .await
            .delete_one(filter)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: BASKET_COLLECTION,
                id: id.to_string(),
                source,
            })?;
        Ok(result.deleted_count > 0)
    }

    async fn increment_score(&self, game: GameRef, slot: ScoreSlot, delta: i32) -> MongoResult<()> {
        let field = slot.field_name();
        let mut filter = doc_id(game.game_id);
        filter.insert("event_id", game.event_id.to_string());
        let result = self
            .collection::<MongoGameDocument>(GAME_COLLECTION)
            .await
            .update_one(filter, doc! {"$inc": {field: delta}})
            .await
            .map_err(|source| MongoDaoError::Increment {
                game_id: game.game_id,
                field,
                source,
            })?;

        if result.matched_count == 0 {
            return Err(MongoDaoError::MissingGame {
                game_id: game.game_id,
            });
        }
        Ok(())
    }

    async fn claim_unassigned_basket(
        &self,
        game: GameRef,
        side: SideId,
        points: u8,
        player_id: Uuid,
        player_name: String,
    ) -> MongoResult<Option<BasketEntity>> {
        let mut filter = game_filter(game);
        filter.insert("side", side.to_string());
        filter.insert("points", i32::from(points));
        filter.insert("player_id", mongodb::bson::Bson::Null);

        let claimed = self
            .collection::<MongoBasketDocument>(BASKET_COLLECTION)
            .await
            .find_one_and_update(
                filter,
                doc! {"$set": {"player_id": player_id.to_string(), "player_name": player_name}},
            )
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: BASKET_COLLECTION,
                id: format!("{side}/{points}"),
                source,
            })?;
        Ok(claimed.map(Into::into))
    }

    async fn player_baskets(&self, game: GameRef, player_id: Uuid) -> MongoResult<Vec<BasketEntity>> {
        let mut filter = game_filter(game);
        filter.insert("player_id", player_id.to_string());
        let documents: Vec<MongoBasketDocument> = self
            .find_many(BASKET_COLLECTION, filter, Some(log_order()))
            .await?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    async fn delete_statistic(&self, game: GameRef, player_id: Uuid) -> MongoResult<()> {
        let id = statistic_id(game.game_id, player_id);
        self.collection::<MongoStatisticDocument>(STATISTIC_COLLECTION)
            .await
            .delete_one(doc! {"_id": id.clone()})
            .await
            .map_err(|source| MongoDaoError::Write {
                collection: STATISTIC_COLLECTION,
                id,
                source,
            })?;
        Ok(())
    }

    async fn list_statistics(&self, filter: Document) -> MongoResult<Vec<PlayerGameStatEntity>> {
        let documents: Vec<MongoStatisticDocument> =
            self.find_many(STATISTIC_COLLECTION, filter, None).await?;
        Ok(documents.into_iter().map(Into::into).collect())
    }

    /// Open a change stream and re-read a full snapshot after every matching change.
    ///
    /// Requires a replica set or sharded deployment; the error is delivered on the stream
    /// when the server refuses to open the change stream.
    fn watch_snapshots<T, F, Fut>(
        &self,
        collection: &'static str,
        pipeline: Vec<Document>,
        snapshot: F,
    ) -> BoxStream<'static, StorageResult<T>>
    where
        T: Send + 'static,
        F: Fn(MongoClubStore) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = MongoResult<T>> + Send,
    {
        let store = self.clone();
        Box::pin(async_stream::stream! {
            let changes = store
                .collection::<Document>(collection)
                .await
                .watch()
                .pipeline(pipeline)
                .full_document(FullDocumentType::UpdateLookup)
                .await;
            let mut changes = match changes {
                Ok(changes) => changes,
                Err(source) => {
                    yield Err(StorageError::from(MongoDaoError::Watch { collection, source }));
                    return;
                }
            };

            yield snapshot(store.clone()).await.map_err(StorageError::from);

            while let Some(change) = changes.next().await {
                match change {
                    Ok(_) => {
                        debug!(collection, "change stream delivery");
                        yield snapshot(store.clone()).await.map_err(StorageError::from);
                    }
                    Err(source) => {
                        yield Err(StorageError::from(MongoDaoError::Watch { collection, source }));
                        break;
                    }
                }
            }
        })
    }
}

impl ClubStore for MongoClubStore {
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let document: Option<MongoEventDocument> =
                store.find_one(EVENT_COLLECTION, doc_id(id)).await?;
            Ok(document.map(Into::into))
        })
    }

    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = event.id.to_string();
            let document: MongoEventDocument = event.into();
            store
                .upsert(EVENT_COLLECTION, id, document)
                .await
                .map_err(Into::into)
        })
    }

    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<MongoTeamDocument> = store
                .find_many(
                    TEAM_COLLECTION,
                    doc! {"event_id": event_id.to_string()},
                    Some(doc! {"name": 1}),
                )
                .await?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = team.id.to_string();
            let document: MongoTeamDocument = team.into();
            store
                .upsert(TEAM_COLLECTION, id, document)
                .await
                .map_err(Into::into)
        })
    }

    fn find_game(&self, game: GameRef) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_game(game).await.map_err(Into::into) })
    }

    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = game.id.to_string();
            let document: MongoGameDocument = game.into();
            store
                .upsert(GAME_COLLECTION, id, document)
                .await
                .map_err(Into::into)
        })
    }

    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let documents: Vec<MongoPlayerDocument> = store
                .find_many(PLAYER_COLLECTION, doc! {}, Some(doc! {"name": 1}))
                .await?;
            Ok(documents.into_iter().map(Into::into).collect())
        })
    }

    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = player.id.to_string();
            let document: MongoPlayerDocument = player.into();
            store
                .upsert(PLAYER_COLLECTION, id, document)
                .await
                .map_err(Into::into)
        })
    }

    fn insert_basket(&self, basket: BasketEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.insert_basket(basket).await.map_err(Into::into) })
    }

    fn latest_basket(
        &self,
        game: GameRef,
        side: SideId,
    ) -> BoxFuture<'static, StorageResult<Option<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_basket(game, side).await.map_err(Into::into) })
    }

    fn delete_basket(&self, game: GameRef, id: Uuid) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        Box::pin(async move { store.delete_basket(game, id).await.map_err(Into::into) })
    }

    fn increment_score(
        &self,
        game: GameRef,
        slot: ScoreSlot,
        delta: i32,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .increment_score(game, slot, delta)
                .await
                .map_err(Into::into)
        })
    }

    fn list_baskets(&self, game: GameRef) -> BoxFuture<'static, StorageResult<Vec<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_baskets(game).await.map_err(Into::into) })
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
                .map_err(Into::into)
        })
    }

    fn player_baskets(
        &self,
        game: GameRef,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BasketEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .player_baskets(game, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn save_statistic(&self, stat: PlayerGameStatEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let id = statistic_id(stat.game_id, stat.player_id);
            let document: MongoStatisticDocument = stat.into();
            store
                .upsert(STATISTIC_COLLECTION, id, document)
                .await
                .map_err(Into::into)
        })
    }

    fn delete_statistic(
        &self,
        game: GameRef,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .delete_statistic(game, player_id)
                .await
                .map_err(Into::into)
        })
    }

    fn list_statistics(
        &self,
        game: GameRef,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerGameStatEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_statistics(game_filter(game))
                .await
                .map_err(Into::into)
        })
    }

    fn list_event_statistics(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerGameStatEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            store
                .list_statistics(doc! {"event_id": event_id.to_string()})
                .await
                .map_err(Into::into)
        })
    }

    fn watch_baskets(&self, game: GameRef) -> BoxStream<'static, StorageResult<Vec<BasketEntity>>> {
        // Deleted documents carry no body, so every delete triggers a re-read.
        let pipeline = vec![doc! {"$match": {"$or": [
            {"fullDocument.game_id": game.game_id.to_string()},
            {"operationType": "delete"},
        ]}}];
        self.watch_snapshots(BASKET_COLLECTION, pipeline, move |store| async move {
            store.list_baskets(game).await
        })
    }

    fn watch_scores(&self, game: GameRef) -> BoxStream<'static, StorageResult<ScoreboardEntity>> {
        let pipeline = vec![doc! {"$match": {"documentKey._id": game.game_id.to_string()}}];
        self.watch_snapshots(GAME_COLLECTION, pipeline, move |store| async move {
            store.scoreboard(game).await
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
