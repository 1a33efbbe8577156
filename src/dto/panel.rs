use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{BasketEntity, ScoreSlot},
    dto::{event::PlayerStatSummary, format_system_time, validation::validate_side_id},
    state::panel::{Role, SideDescriptor},
};

/// Payload used to open a live panel on one game.
#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenPanelRequest {
    pub event_id: Uuid,
    pub game_id: Uuid,
}

/// Returned once a panel is open and subscribed.
#[derive(Debug, Serialize, ToSchema)]
pub struct PanelOpenedResponse {
    pub panel_id: Uuid,
    /// Role the panel was opened with (`admin` or `player`).
    pub role: String,
    pub sides: Vec<SideSummary>,
}

/// Static description of one side of the game.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct SideSummary {
    /// Score slot the side writes to (`a` or `b`).
    pub slot: String,
    /// `home`, `opponent` or the team identifier.
    pub id: String,
    pub name: String,
    /// Whether baskets of this side are logged and attributable to players.
    pub tracked: bool,
}

impl From<&SideDescriptor> for SideSummary {
    fn from(side: &SideDescriptor) -> Self {
        Self {
            slot: slot_label(side.slot).to_owned(),
            id: side.id.to_string(),
            name: side.name.clone(),
            tracked: side.is_tracked(),
        }
    }
}

pub(crate) fn slot_label(slot: ScoreSlot) -> &'static str {
    match slot {
        ScoreSlot::A => "a",
        ScoreSlot::B => "b",
    }
}

pub(crate) fn role_label(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Player => "player",
    }
}

/// Record a basket for a side.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AddBasketRequest {
    #[validate(custom(function = validate_side_id))]
    pub side: String,
    #[validate(range(min = 1, max = 3))]
    pub points: u8,
}

/// Remove the most recent basket of a side.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UndoBasketRequest {
    #[validate(custom(function = validate_side_id))]
    pub side: String,
}

/// Attribute one unassigned basket of `(side, points)` to a player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct AssignBasketRequest {
    pub player_id: Uuid,
    #[validate(custom(function = validate_side_id))]
    pub side: String,
    #[validate(range(min = 1, max = 3))]
    pub points: u8,
}

/// Outcome of a successful attribution.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentResponse {
    pub basket_id: Uuid,
    pub points: u8,
    /// Statistic of the player after recomputation; absent when the basket was undone
    /// by another panel in the meantime.
    pub statistic: Option<PlayerStatSummary>,
}

/// Unassigned baskets of one side, counted per point value.
#[derive(Debug, Clone, Default, Serialize, ToSchema, PartialEq, Eq)]
pub struct UnassignedCounts {
    pub side: String,
    pub one_pointers: u32,
    pub two_pointers: u32,
    pub three_pointers: u32,
}

impl UnassignedCounts {
    /// Count the unassigned baskets of `side` in `baskets`.
    pub fn tally<'a>(side: &str, baskets: impl IntoIterator<Item = &'a BasketEntity>) -> Self {
        let mut counts = Self {
            side: side.to_owned(),
            ..Self::default()
        };
        for basket in baskets
            .into_iter()
            .filter(|basket| basket.is_unassigned() && basket.side.to_string() == side)
        {
            match basket.points {
                1 => counts.one_pointers += 1,
                2 => counts.two_pointers += 1,
                3 => counts.three_pointers += 1,
                _ => {}
            }
        }
        counts
    }

    /// Number of unassigned baskets for a given point value.
    pub fn for_points(&self, points: u8) -> u32 {
        match points {
            1 => self.one_pointers,
            2 => self.two_pointers,
            3 => self.three_pointers,
            _ => 0,
        }
    }

    pub fn total(&self) -> u32 {
        self.one_pointers + self.two_pointers + self.three_pointers
    }
}

/// One side of the rendered panel, including its running score.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct SideView {
    #[serde(flatten)]
    pub side: SideSummary,
    pub score: i32,
}

/// Row of the live basket log.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct LogEntry {
    pub basket_id: Uuid,
    pub side: String,
    pub points: u8,
    /// RFC 3339 timestamp of the basket.
    pub recorded_at: String,
    pub player_id: Option<Uuid>,
    pub player_name: Option<String>,
}

impl From<&BasketEntity> for LogEntry {
    fn from(basket: &BasketEntity) -> Self {
        Self {
            basket_id: basket.id,
            side: basket.side.to_string(),
            points: basket.points,
            recorded_at: format_system_time(basket.recorded_at),
            player_id: basket.player_id,
            player_name: basket.player_name.clone(),
        }
    }
}

/// Full render of a panel, pushed as `panel.render` and served by `GET /panels/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema, PartialEq, Eq)]
pub struct PanelView {
    pub panel_id: Uuid,
    pub event_id: Uuid,
    pub game_id: Uuid,
    pub sides: Vec<SideView>,
    /// Baskets of the tracked sides, oldest first.
    pub log: Vec<LogEntry>,
    /// Only rendered for admins.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unassigned: Option<Vec<UnassignedCounts>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{GameRef, SideId};

    #[test]
    fn tally_only_counts_unassigned_baskets_of_the_side() {
        let game = GameRef {
            event_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
        };
        let mut claimed = BasketEntity::unassigned(game, SideId::Home, 2);
        claimed.player_id = Some(Uuid::new_v4());
        let baskets = vec![
            BasketEntity::unassigned(game, SideId::Home, 2),
            BasketEntity::unassigned(game, SideId::Home, 3),
            BasketEntity::unassigned(game, SideId::Opponent, 2),
            claimed,
        ];

        let counts = UnassignedCounts::tally("home", &baskets);
        assert_eq!(counts.for_points(2), 1);
        assert_eq!(counts.for_points(3), 1);
        assert_eq!(counts.total(), 2);
    }

    #[test]
    fn basket_requests_reject_bad_sides_and_points() {
        let bad_side = AddBasketRequest {
            side: "visitors".into(),
            points: 2,
        };
        assert!(bad_side.validate().is_err());

        let bad_points = AddBasketRequest {
            side: "home".into(),
            points: 4,
        };
        assert!(bad_points.validate().is_err());

        let ok = AddBasketRequest {
            side: "opponent".into(),
            points: 3,
        };
        assert!(ok.validate().is_ok());
    }
}
