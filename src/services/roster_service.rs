use tracing::info;

use crate::{
    dao::club_store::ClubStore,
    dto::roster::{RosterPlayer, RosterRefreshResponse},
    error::ServiceError,
    state::{SharedState, panel::Role},
};

/// Reload the roster cache from the store. Returns the number of players loaded.
pub async fn reload(state: &SharedState, store: &dyn ClubStore) -> Result<usize, ServiceError> {
    let players = store.list_players().await?;
    let count = state.roster().replace(players);
    info!(players = count, "roster cache refreshed");
    Ok(count)
}

/// Admin-triggered roster refresh.
pub async fn refresh(state: &SharedState, role: Role) -> Result<RosterRefreshResponse, ServiceError> {
    role.require_admin("refreshing the roster")?;
    let store = state.require_club_store().await?;
    let players = reload(state, store.as_ref()).await?;
    Ok(RosterRefreshResponse { players })
}

/// Current roster snapshot in cache order.
pub fn list(state: &SharedState) -> Vec<RosterPlayer> {
    state
        .roster()
        .snapshot()
        .values()
        .map(RosterPlayer::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dao::models::PlayerEntity, services::test_support::Fixture};
    use uuid::Uuid;

    #[tokio::test]
    async fn refresh_picks_up_new_players() {
        let fixture = Fixture::friendly().await;
        let before = list(&fixture.state).len();

        fixture
            .store
            .save_player(PlayerEntity {
                id: Uuid::new_v4(),
                name: "Inès".into(),
                nickname: Some("Ice".into()),
                photo_url: None,
                jersey_number: 23,
            })
            .await
            .unwrap();

        assert!(matches!(
            refresh(&fixture.state, Role::Player).await,
            Err(ServiceError::Forbidden(_))
        ));
        let refreshed = refresh(&fixture.state, Role::Admin).await.unwrap();
        assert_eq!(refreshed.players, before + 1);
        assert!(list(&fixture.state).iter().any(|player| player.name == "Inès"));
    }
}
