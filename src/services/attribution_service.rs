//! Statistic attribution engine: hand unassigned baskets to players and keep their
//! per-game statistic in sync with the baskets they own.

use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    dao::{
        club_store::ClubStore,
        models::{GameRef, PlayerGameStatEntity, SideId},
        storage::StorageResult,
    },
    dto::{
        event::PlayerStatSummary,
        panel::{AssignmentResponse, UnassignedCounts},
    },
    error::ServiceError,
    services::sse_events,
    state::{SharedState, panel::LivePanel},
};

/// Count the unassigned baskets of `side` per point value. `None` on a closed panel.
pub async fn list_unassigned(
    state: &SharedState,
    panel: &LivePanel,
    side: SideId,
) -> Result<Option<UnassignedCounts>, ServiceError> {
    let Some(context) = panel.context().await else {
        return Ok(None);
    };
    context.role.require_admin("listing unassigned baskets")?;
    let descriptor = context.require_side(side)?;

    let store = state.require_club_store().await?;
    let baskets = store.list_baskets(context.game).await?;
    Ok(Some(UnassignedCounts::tally(
        &descriptor.id.to_string(),
        &baskets,
    )))
}

/// Attribute one unassigned `(side, points)` basket to `player_id` and recompute the
/// player's statistic. `None` on a closed panel.
pub async fn assign_basket(
    state: &SharedState,
    panel: &LivePanel,
    player_id: Uuid,
    side: SideId,
    points: u8,
) -> Result<Option<AssignmentResponse>, ServiceError> {
    let Some(context) = panel.context().await else {
        debug!(panel_id = %panel.id(), "assign_basket ignored on closed panel");
        return Ok(None);
    };
    context.role.require_admin("assigning a basket")?;
    let descriptor = context.require_side(side)?;
    context.check_points(points)?;
    if !descriptor.has_player(player_id) {
        return Err(ServiceError::PlayerNotOnRoster { player_id, side });
    }

    let result: Result<AssignmentResponse, ServiceError> = async {
        let store = state.require_club_store().await?;
        let player_name = state.roster().display_name(player_id);
        let claimed = store
            .claim_unassigned_basket(context.game, side, points, player_id, player_name)
            .await?
            .ok_or(ServiceError::NoUnassignedBasketAvailable { side, points })?;
        let statistic = recompute_player_stat(store.as_ref(), context.game, player_id).await?;

        info!(
            panel_id = %context.panel_id,
            basket_id = %claimed.id,
            %player_id,
            points,
            "basket assigned"
        );
        Ok(AssignmentResponse {
            basket_id: claimed.id,
            points: claimed.points,
            statistic: statistic.map(PlayerStatSummary::from),
        })
    }
    .await;
    sse_events::alert_on_failure(panel, "assign_basket", result).map(Some)
}

/// Rebuild the statistic of `(game, player)` from every basket the player owns.
///
/// The statistic document is removed when no basket is left.
pub async fn recompute_player_stat(
    store: &dyn ClubStore,
    game: GameRef,
    player_id: Uuid,
) -> StorageResult<Option<PlayerGameStatEntity>> {
    let baskets = store.player_baskets(game, player_id).await?;
    match PlayerGameStatEntity::from_baskets(game, player_id, &baskets) {
        Some(stat) => {
            store.save_statistic(stat.clone()).await?;
            Ok(Some(stat))
        }
        None => {
            store.delete_statistic(game, player_id).await?;
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::BasketEntity, services::scoring_service, services::test_support::Fixture,
        state::panel::Role,
    };

    #[tokio::test]
    async fn two_unassigned_baskets_go_to_two_players() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let (p1, p2) = (fixture.members[0], fixture.members[1]);

        for _ in 0..2 {
            scoring_service::add_basket(&fixture.state, &panel, SideId::Home, 2)
                .await
                .unwrap();
        }

        for player in [p1, p2] {
            let outcome = assign_basket(&fixture.state, &panel, player, SideId::Home, 2)
                .await
                .unwrap()
                .unwrap();
            let statistic = outcome.statistic.unwrap();
            assert_eq!(statistic.total_points, 2);
            assert_eq!(statistic.two_pointers, 1);
        }

        let counts = list_unassigned(&fixture.state, &panel, SideId::Home)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(counts.total(), 0);

        let statistics = fixture.statistics().await;
        assert_eq!(statistics.len(), 2);
        for stat in statistics {
            assert_eq!((stat.total_points, stat.two_pointers), (2, 1));
        }
    }

    #[tokio::test]
    async fn assignment_stores_the_roster_name() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let player = fixture.members[0];

        scoring_service::add_basket(&fixture.state, &panel, SideId::Home, 1)
            .await
            .unwrap();
        assign_basket(&fixture.state, &panel, player, SideId::Home, 1)
            .await
            .unwrap();

        let baskets = fixture.baskets().await;
        assert_eq!(baskets[0].player_id, Some(player));
        assert_eq!(
            baskets[0].player_name.as_deref(),
            Some(fixture.state.roster().display_name(player).as_str())
        );
    }

    #[tokio::test]
    async fn player_outside_the_roster_leaves_the_store_untouched() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;

        scoring_service::add_basket(&fixture.state, &panel, SideId::Home, 2)
            .await
            .unwrap();
        let before = fixture.baskets().await;

        let stranger = Uuid::new_v4();
        let result = assign_basket(&fixture.state, &panel, stranger, SideId::Home, 2).await;
        assert!(matches!(result, Err(ServiceError::PlayerNotOnRoster { .. })));

        let opponent =
            assign_basket(&fixture.state, &panel, fixture.members[0], SideId::Opponent, 2).await;
        assert!(matches!(opponent, Err(ServiceError::PlayerNotOnRoster { .. })));

        assert_eq!(fixture.baskets().await, before);
        assert!(fixture.statistics().await.is_empty());
    }

    #[tokio::test]
    async fn exhausted_tier_reports_no_unassigned_basket() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let player = fixture.members[0];

        scoring_service::add_basket(&fixture.state, &panel, SideId::Home, 2)
            .await
            .unwrap();
        let result = assign_basket(&fixture.state, &panel, player, SideId::Home, 3).await;
        assert!(matches!(
            result,
            Err(ServiceError::NoUnassignedBasketAvailable { points: 3, .. })
        ));

        assign_basket(&fixture.state, &panel, player, SideId::Home, 2)
            .await
            .unwrap();
        let again = assign_basket(&fixture.state, &panel, player, SideId::Home, 2).await;
        assert!(matches!(
            again,
            Err(ServiceError::NoUnassignedBasketAvailable { .. })
        ));
    }

    #[tokio::test]
    async fn internal_games_check_the_team_members() {
        let fixture = Fixture::internal().await;
        let panel = fixture.open(Role::Admin).await;
        let [red, blue] = fixture.team_sides();
        let red_player = fixture.members[0];

        scoring_service::add_basket(&fixture.state, &panel, blue, 2)
            .await
            .unwrap();
        let wrong_team = assign_basket(&fixture.state, &panel, red_player, blue, 2).await;
        assert!(matches!(
            wrong_team,
            Err(ServiceError::PlayerNotOnRoster { .. })
        ));

        scoring_service::add_basket(&fixture.state, &panel, red, 2)
            .await
            .unwrap();
        assign_basket(&fixture.state, &panel, red_player, red, 2)
            .await
            .unwrap();
        assert_eq!(fixture.scores().await.team_a_final, 2);
        assert_eq!(fixture.scores().await.team_b_final, 2);
    }

    #[tokio::test]
    async fn recompute_matches_a_fresh_recount() {
        let fixture = Fixture::friendly().await;
        let player = fixture.members[0];
        let game = fixture.game;

        for points in [1, 2, 3, 3] {
            let mut basket = BasketEntity::unassigned(game, SideId::Home, points);
            basket.player_id = Some(player);
            basket.player_name = Some("Ana".into());
            fixture.store.insert_basket(basket).await.unwrap();
        }

        let stat = recompute_player_stat(&fixture.store, game, player)
            .await
            .unwrap()
            .unwrap();
        let recount =
            PlayerGameStatEntity::from_baskets(game, player, &fixture.baskets().await).unwrap();
        assert_eq!(stat, recount);
        assert_eq!(stat.total_points, 9);
        assert_eq!(fixture.statistics().await, vec![stat]);
    }
}
