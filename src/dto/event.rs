use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::dao::models::{EventStatus, PlayerGameStatEntity};

/// Move an event to a later lifecycle status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AdvanceStatusRequest {
    /// `upcoming`, `in_progress` or `finished`.
    #[schema(value_type = String)]
    pub status: EventStatus,
}

/// Status of an event after a transition.
#[derive(Debug, Serialize, ToSchema)]
pub struct EventStatusResponse {
    pub event_id: Uuid,
    #[schema(value_type = String)]
    pub status: EventStatus,
}

/// Scoring line of one player in one game.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct PlayerStatSummary {
    pub player_id: Uuid,
    pub player_name: String,
    pub total_points: u32,
    pub one_pointers: u32,
    pub two_pointers: u32,
    pub three_pointers: u32,
}

impl From<PlayerGameStatEntity> for PlayerStatSummary {
    fn from(stat: PlayerGameStatEntity) -> Self {
        Self {
            player_id: stat.player_id,
            player_name: stat.player_name,
            total_points: stat.total_points,
            one_pointers: stat.one_pointers,
            two_pointers: stat.two_pointers,
            three_pointers: stat.three_pointers,
        }
    }
}

/// Final or running box score of a game.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameBoxScore {
    pub event_id: Uuid,
    pub game_id: Uuid,
    pub team_a_final: i32,
    pub team_b_final: i32,
    /// Players sorted by total points, best first.
    pub players: Vec<PlayerStatSummary>,
}

/// Cumulated scoring of a player across every game of an event.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct LeaderboardEntry {
    pub player_id: Uuid,
    pub player_name: String,
    pub games_played: u32,
    pub total_points: u32,
    pub one_pointers: u32,
    pub two_pointers: u32,
    pub three_pointers: u32,
}
