//! Scoring engine: append and undo baskets, keeping each side's score equal to the sum of
//! its baskets through atomic increments.

use tracing::{debug, info};

use crate::{
    dao::{club_store::ClubStore, models::BasketEntity, models::SideId},
    error::ServiceError,
    services::{attribution_service, sse_events},
    state::{
        SharedState,
        panel::{LivePanel, PanelContext, SideDescriptor},
    },
};

/// Record a basket of `points` for `side`. No-op on a panel that is not open.
pub async fn add_basket(
    state: &SharedState,
    panel: &LivePanel,
    side: SideId,
    points: u8,
) -> Result<(), ServiceError> {
    let Some(context) = panel.context().await else {
        debug!(panel_id = %panel.id(), "add_basket ignored on closed panel");
        return Ok(());
    };
    context.role.require_admin("recording a basket")?;
    let descriptor = context.require_side(side)?;
    context.check_points(points)?;

    let result: Result<(), ServiceError> = async {
        let store = state.require_club_store().await?;
        record_basket(store.as_ref(), &context, descriptor, points).await
    }
    .await;
    sse_events::alert_on_failure(panel, "add_basket", result)
}

/// Remove the latest basket of `side`. No-op when the side has none or the panel is closed.
pub async fn undo_last_basket(
    state: &SharedState,
    panel: &LivePanel,
    side: SideId,
) -> Result<(), ServiceError> {
    let Some(context) = panel.context().await else {
        debug!(panel_id = %panel.id(), "undo_last_basket ignored on closed panel");
        return Ok(());
    };
    context.role.require_admin("undoing a basket")?;
    let descriptor = context.require_side(side)?;

    let result: Result<(), ServiceError> = async {
        let store = state.require_club_store().await?;
        if descriptor.is_tracked() {
            undo_tracked(store.as_ref(), &context, descriptor).await
        } else {
            let step = state.config().opponent_undo_step;
            store
                .increment_score(context.game, descriptor.slot, -step)
                .await
                .map_err(ServiceError::score_update)?;
            info!(
                panel_id = %context.panel_id,
                side = %descriptor.id,
                step,
                "opponent score decremented"
            );
            Ok(())
        }
    }
    .await;
    sse_events::alert_on_failure(panel, "undo_last_basket", result)
}

/// Insert then increment. The two writes are not transactional.
async fn record_basket(
    store: &dyn ClubStore,
    context: &PanelContext,
    side: &SideDescriptor,
    points: u8,
) -> Result<(), ServiceError> {
    if side.is_tracked() {
        store
            .insert_basket(BasketEntity::unassigned(context.game, side.id, points))
            .await
            .map_err(ServiceError::score_update)?;
    }
    store
        .increment_score(context.game, side.slot, i32::from(points))
        .await
        .map_err(ServiceError::score_update)?;

    info!(panel_id = %context.panel_id, side = %side.id, points, "basket recorded");
    Ok(())
}

async fn undo_tracked(
    store: &dyn ClubStore,
    context: &PanelContext,
    side: &SideDescriptor,
) -> Result<(), ServiceError> {
    let latest = store
        .latest_basket(context.game, side.id)
        .await
        .map_err(ServiceError::score_update)?;
    let Some(basket) = latest else {
        debug!(panel_id = %context.panel_id, side = %side.id, "no basket to undo");
        return Ok(());
    };

    let deleted = store
        .delete_basket(context.game, basket.id)
        .await
        .map_err(ServiceError::score_update)?;
    if !deleted {
        // Another panel removed it first and already took the points back.
        debug!(panel_id = %context.panel_id, basket_id = %basket.id, "basket already undone");
        return Ok(());
    }

    store
        .increment_score(context.game, side.slot, -i32::from(basket.points))
        .await
        .map_err(ServiceError::score_update)?;

    if let Some(player_id) = basket.player_id {
        attribution_service::recompute_player_stat(store, context.game, player_id)
            .await
            .map_err(ServiceError::score_update)?;
    }

    info!(
        panel_id = %context.panel_id,
        side = %side.id,
        basket_id = %basket.id,
        points = basket.points,
        "basket undone"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{GameRef, Modality, ScoreSlot},
        services::test_support::Fixture,
        state::panel::Role,
    };
    use std::time::{Duration, SystemTime};
    use uuid::Uuid;

    fn basket_at(game: GameRef, side: SideId, points: u8, offset_ms: u64) -> BasketEntity {
        let mut basket = BasketEntity::unassigned(game, side, points);
        basket.recorded_at = SystemTime::UNIX_EPOCH + Duration::from_millis(1_000_000 + offset_ms);
        basket
    }

    async fn assert_score_matches_baskets(fixture: &Fixture, side: SideId) {
        let scores = fixture.scores().await;
        let sum: i32 = fixture
            .baskets()
            .await
            .iter()
            .filter(|basket| basket.side == side)
            .map(|basket| i32::from(basket.points))
            .sum();
        assert_eq!(scores.team_a_final, sum);
    }

    #[tokio::test]
    async fn tracked_side_score_always_equals_basket_sum() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;

        for points in [2, 3, 1, 2] {
            add_basket(&fixture.state, &panel, SideId::Home, points).await.unwrap();
            assert_score_matches_baskets(&fixture, SideId::Home).await;
        }
        for _ in 0..2 {
            undo_last_basket(&fixture.state, &panel, SideId::Home).await.unwrap();
            assert_score_matches_baskets(&fixture, SideId::Home).await;
        }

        assert_eq!(fixture.scores().await.team_a_final, 5);
        assert_eq!(fixture.baskets().await.len(), 2);
    }

    #[tokio::test]
    async fn undo_removes_the_latest_basket_of_the_side() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let game = fixture.game;

        let first = basket_at(game, SideId::Home, 2, 0);
        let second = basket_at(game, SideId::Home, 3, 1_000);
        for basket in [first.clone(), second.clone()] {
            fixture.store.insert_basket(basket.clone()).await.unwrap();
            fixture
                .store
                .increment_score(game, ScoreSlot::A, i32::from(basket.points))
                .await
                .unwrap();
        }
        assert_eq!(fixture.scores().await.team_a_final, 5);

        undo_last_basket(&fixture.state, &panel, SideId::Home).await.unwrap();

        let remaining = fixture.baskets().await;
        assert_eq!(remaining, vec![first]);
        assert_eq!(fixture.scores().await.team_a_final, 2);
    }

    #[tokio::test]
    async fn undo_without_baskets_is_a_no_op() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;

        undo_last_basket(&fixture.state, &panel, SideId::Home).await.unwrap();
        assert_eq!(fixture.scores().await.team_a_final, 0);
    }

    #[tokio::test]
    async fn opponent_undo_uses_the_fixed_step() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;

        for _ in 0..3 {
            add_basket(&fixture.state, &panel, SideId::Opponent, 2).await.unwrap();
        }
        undo_last_basket(&fixture.state, &panel, SideId::Opponent).await.unwrap();

        assert_eq!(fixture.scores().await.team_b_final, 5);
        assert!(fixture.baskets().await.is_empty());
    }

    #[tokio::test]
    async fn undoing_an_assigned_basket_recomputes_the_statistic() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let player = fixture.members[0];

        add_basket(&fixture.state, &panel, SideId::Home, 3).await.unwrap();
        attribution_service::assign_basket(&fixture.state, &panel, player, SideId::Home, 3)
            .await
            .unwrap();
        assert_eq!(fixture.statistics().await.len(), 1);

        undo_last_basket(&fixture.state, &panel, SideId::Home).await.unwrap();
        assert!(fixture.statistics().await.is_empty());
    }

    #[tokio::test]
    async fn players_cannot_score() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Player).await;

        let result = add_basket(&fixture.state, &panel, SideId::Home, 2).await;
        assert!(matches!(result, Err(ServiceError::Forbidden(_))));
        assert!(fixture.baskets().await.is_empty());
    }

    #[tokio::test]
    async fn modality_limits_basket_points() {
        let fixture = Fixture::with_modality(Modality::ThreeOnThree).await;
        let panel = fixture.open(Role::Admin).await;

        let result = add_basket(&fixture.state, &panel, SideId::Home, 3).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        add_basket(&fixture.state, &panel, SideId::Home, 2).await.unwrap();
        assert_eq!(fixture.scores().await.team_a_final, 2);
    }

    #[tokio::test]
    async fn unknown_side_is_rejected() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;

        let result = add_basket(&fixture.state, &panel, SideId::Team(Uuid::new_v4()), 2).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn commands_before_open_are_no_ops() {
        let fixture = Fixture::friendly().await;
        let panel = LivePanel::new(Uuid::new_v4(), 4);

        add_basket(&fixture.state, &panel, SideId::Home, 2).await.unwrap();
        undo_last_basket(&fixture.state, &panel, SideId::Home).await.unwrap();
        assert!(fixture.baskets().await.is_empty());
        assert_eq!(fixture.scores().await.team_a_final, 0);
    }

    #[tokio::test]
    async fn store_failures_surface_as_score_update_failed_and_alert() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        let mut events = panel.output().hub().subscribe();

        fixture.store.set_offline(true);
        let result = add_basket(&fixture.state, &panel, SideId::Home, 2).await;
        fixture.store.set_offline(false);

        assert!(matches!(result, Err(ServiceError::ScoreUpdateFailed { .. })));
        let mut alerted = false;
        while let Ok(event) = events.try_recv() {
            alerted |= event.event.as_deref() == Some(sse_events::EVENT_PANEL_ALERT);
        }
        assert!(alerted);
        assert_eq!(fixture.scores().await.team_a_final, 0);
    }
}
