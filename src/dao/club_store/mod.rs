pub mod memory;
/// MongoDB backend.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use futures::{future::BoxFuture, stream::BoxStream};
use uuid::Uuid;

use crate::dao::{
    models::{
        BasketEntity, EventEntity, GameEntity, GameRef, PlayerEntity, PlayerGameStatEntity,
        ScoreSlot, ScoreboardEntity, SideId, TeamEntity,
    },
    storage::StorageResult,
};

/// Abstraction over the document store holding events, games, baskets and statistics.
///
/// Every write is a single-document operation; the store offers no transaction spanning
/// several calls. `increment_score` and `claim_unassigned_basket` are atomic on the
/// backend so concurrent panels never lose an update or claim the same basket twice.
pub trait ClubStore: Send + Sync {
    /// Event by id.
    fn find_event(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<EventEntity>>>;
    /// Upsert an event.
    fn save_event(&self, event: EventEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Teams formed for an event.
    fn list_teams(&self, event_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<TeamEntity>>>;
    /// Upsert a team.
    fn save_team(&self, team: TeamEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Game by path.
    fn find_game(&self, game: GameRef) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Upsert a game, scores included.
    fn save_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Every club player.
    fn list_players(&self) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Upsert a player.
    fn save_player(&self, player: PlayerEntity) -> BoxFuture<'static, StorageResult<()>>;

    /// Append a basket to the game's log.
    fn insert_basket(&self, basket: BasketEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Most recent basket recorded for `side` (timestamp descending, limit 1).
    fn latest_basket(
        &self,
        game: GameRef,
        side: SideId,
    ) -> BoxFuture<'static, StorageResult<Option<BasketEntity>>>;
    /// Remove a basket; returns `false` when it was already gone.
    fn delete_basket(&self, game: GameRef, id: Uuid) -> BoxFuture<'static, StorageResult<bool>>;
    /// Atomically add `delta` to one of the game's score fields.
    fn increment_score(
        &self,
        game: GameRef,
        slot: ScoreSlot,
        delta: i32,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Full basket log of the game in insertion order.
    fn list_baskets(&self, game: GameRef) -> BoxFuture<'static, StorageResult<Vec<BasketEntity>>>;
    /// Attach a player to any unassigned basket matching `(side, points)`.
    ///
    /// The update is conditional on the basket still being unassigned; `None` means no
    /// basket of that tier was left to claim.
    fn claim_unassigned_basket(
        &self,
        game: GameRef,
        side: SideId,
        points: u8,
        player_id: Uuid,
        player_name: String,
    ) -> BoxFuture<'static, StorageResult<Option<BasketEntity>>>;
    /// Every basket of the game attributed to `player_id`.
    fn player_baskets(
        &self,
        game: GameRef,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<BasketEntity>>>;

    /// Upsert the statistic of `(game, player)`.
    fn save_statistic(&self, stat: PlayerGameStatEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Remove the statistic of `(game, player)`; missing documents are ignored.
    fn delete_statistic(
        &self,
        game: GameRef,
        player_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Statistics of every player of a game.
    fn list_statistics(
        &self,
        game: GameRef,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerGameStatEntity>>>;
    /// Statistics of every game of an event.
    fn list_event_statistics(
        &self,
        event_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<PlayerGameStatEntity>>>;

    /// Realtime subscription to the game's basket log.
    ///
    /// Yields the current ordered log immediately, then a fresh snapshot after every change.
    /// Dropping the stream cancels the subscription.
    fn watch_baskets(&self, game: GameRef) -> BoxStream<'static, StorageResult<Vec<BasketEntity>>>;
    /// Realtime subscription to the game's two score fields.
    fn watch_scores(&self, game: GameRef) -> BoxStream<'static, StorageResult<ScoreboardEntity>>;

    /// Cheap round-trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection in place.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
