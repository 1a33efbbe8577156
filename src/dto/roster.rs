use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::PlayerEntity;

/// Player as exposed by the roster cache.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterPlayer {
    pub id: Uuid,
    pub name: String,
    pub nickname: Option<String>,
    pub photo_url: Option<String>,
    pub jersey_number: u8,
}

impl From<&PlayerEntity> for RosterPlayer {
    fn from(player: &PlayerEntity) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            nickname: player.nickname.clone(),
            photo_url: player.photo_url.clone(),
            jersey_number: player.jersey_number,
        }
    }
}

/// Result of reloading the roster cache.
#[derive(Debug, Serialize, ToSchema)]
pub struct RosterRefreshResponse {
    pub players: usize,
}
