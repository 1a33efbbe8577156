use std::cmp::Reverse;

use indexmap::IndexMap;
use tracing::info;
use uuid::Uuid;

use crate::{
    dao::models::{EventStatus, GameRef},
    dto::event::{EventStatusResponse, GameBoxScore, LeaderboardEntry, PlayerStatSummary},
    error::ServiceError,
    state::{SharedState, panel::Role},
};

/// Move an event forward in its lifecycle. Admin only; never goes backwards.
pub async fn advance_status(
    state: &SharedState,
    role: Role,
    event_id: Uuid,
    next: EventStatus,
) -> Result<EventStatusResponse, ServiceError> {
    role.require_admin("changing an event status")?;
    let store = state.require_club_store().await?;
    let mut event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}`")))?;

    if !event.status.can_advance_to(next) {
        return Err(ServiceError::InvalidState(format!(
            "event `{event_id}` cannot move from {:?} to {next:?}",
            event.status
        )));
    }

    let previous = event.status;
    event.status = next;
    store.save_event(event).await?;
    info!(%event_id, from = ?previous, to = ?next, "event status advanced");

    Ok(EventStatusResponse {
        event_id,
        status: next,
    })
}

/// Box score of a game: running scores plus every player's statistic, best first.
pub async fn game_statistics(
    state: &SharedState,
    event_id: Uuid,
    game_id: Uuid,
) -> Result<GameBoxScore, ServiceError> {
    let store = state.require_club_store().await?;
    let game_ref = GameRef { event_id, game_id };
    let game = store
        .find_game(game_ref)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;

    let mut players: Vec<PlayerStatSummary> = store
        .list_statistics(game_ref)
        .await?
        .into_iter()
        .map(PlayerStatSummary::from)
        .collect();
    players.sort_by(|a, b| {
        b.total_points
            .cmp(&a.total_points)
            .then_with(|| a.player_name.cmp(&b.player_name))
    });

    Ok(GameBoxScore {
        event_id,
        game_id,
        team_a_final: game.team_a_final,
        team_b_final: game.team_b_final,
        players,
    })
}

/// Points of every player across all games of an event.
pub async fn leaderboard(
    state: &SharedState,
    event_id: Uuid,
) -> Result<Vec<LeaderboardEntry>, ServiceError> {
    let store = state.require_club_store().await?;
    store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}`")))?;

    let mut entries: IndexMap<Uuid, LeaderboardEntry> = IndexMap::new();
    for stat in store.list_event_statistics(event_id).await? {
        let entry = entries
            .entry(stat.player_id)
            .or_insert_with(|| LeaderboardEntry {
                player_id: stat.player_id,
                player_name: stat.player_name.clone(),
                games_played: 0,
                total_points: 0,
                one_pointers: 0,
                two_pointers: 0,
                three_pointers: 0,
            });
        entry.games_played += 1;
        entry.total_points += stat.total_points;
        entry.one_pointers += stat.one_pointers;
        entry.two_pointers += stat.two_pointers;
        entry.three_pointers += stat.three_pointers;
    }

    let mut board: Vec<LeaderboardEntry> = entries.into_values().collect();
    board.sort_by_key(|entry| (Reverse(entry.total_points), entry.player_name.clone()));
    Ok(board)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{
            club_store::ClubStore,
            models::{BasketEntity, GameEntity, SideId},
        },
        services::{attribution_service, scoring_service, test_support::Fixture},
    };

    #[tokio::test]
    async fn status_only_moves_forward_and_requires_admin() {
        let fixture = Fixture::friendly().await;
        let event_id = fixture.game.event_id;

        let forbidden =
            advance_status(&fixture.state, Role::Player, event_id, EventStatus::Finished).await;
        assert!(matches!(forbidden, Err(ServiceError::Forbidden(_))));

        let done = advance_status(&fixture.state, Role::Admin, event_id, EventStatus::Finished)
            .await
            .unwrap();
        assert_eq!(done.status, EventStatus::Finished);

        let backwards =
            advance_status(&fixture.state, Role::Admin, event_id, EventStatus::InProgress).await;
        assert!(matches!(backwards, Err(ServiceError::InvalidState(_))));
    }

    #[tokio::test]
    async fn box_score_and_leaderboard_follow_assignments() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let (p1, p2) = (fixture.members[0], fixture.members[1]);

        for points in [3, 2, 2] {
            scoring_service::add_basket(&fixture.state, &panel, SideId::Home, points)
                .await
                .unwrap();
        }
        for (player, points) in [(p1, 3), (p2, 2), (p1, 2)] {
            attribution_service::assign_basket(
                &fixture.state,
                &panel,
                player,
                SideId::Home,
                points,
            )
            .await
            .unwrap();
        }

        let box_score = game_statistics(
            &fixture.state,
            fixture.game.event_id,
            fixture.game.game_id,
        )
        .await
        .unwrap();
        assert_eq!(box_score.team_a_final, 7);
        assert_eq!(box_score.players[0].player_id, p1);
        assert_eq!(box_score.players[0].total_points, 5);

        // Second game of the same event for p2.
        let second = GameEntity {
            id: Uuid::new_v4(),
            ..fixture.game_entity().await
        };
        let second_ref = second.reference();
        fixture.store.save_game(second).await.unwrap();
        let mut basket = BasketEntity::unassigned(second_ref, SideId::Home, 3);
        basket.player_id = Some(p2);
        basket.player_name = Some(fixture.state.roster().display_name(p2));
        fixture.store.insert_basket(basket).await.unwrap();
        attribution_service::recompute_player_stat(&fixture.store, second_ref, p2)
            .await
            .unwrap();

        let board = leaderboard(&fixture.state, fixture.game.event_id)
            .await
            .unwrap();
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].total_points, 5);
        let p2_line = board.iter().find(|entry| entry.player_id == p2).unwrap();
        assert_eq!(p2_line.games_played, 2);
        assert_eq!(p2_line.three_pointers, 1);
    }
}
