use std::{fmt, str::FromStr, time::SystemTime};

use serde::{Deserialize, Serialize};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use thiserror::Error;
use uuid::Uuid;

/// Literal side identifier used for the club's own side in external and friendly games.
pub const HOME_SIDE_ID: &str = "home";
/// Literal side identifier used for the untracked adversary in external and friendly games.
pub const OPPONENT_SIDE_ID: &str = "opponent";

/// Court format played during an event.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Modality {
    /// Full court, five players per side.
    FiveOnFive,
    /// Half court, three players per side.
    ThreeOnThree,
}

impl Modality {
    /// Point values a single basket may carry in this format.
    pub fn allowed_points(self) -> &'static [u8] {
        match self {
            Modality::FiveOnFive => &[1, 2, 3],
            Modality::ThreeOnThree => &[1, 2],
        }
    }
}

/// Kind of competition an event represents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Tournament organised by someone else; the club plays as a single side.
    ExternalTournament,
    /// Tournament played between teams formed inside the club.
    InternalTournament,
    /// One-off friendly match against an adversary.
    Friendly,
}

impl EventKind {
    /// Whether games of this event oppose two internal teams.
    pub fn is_internal(self) -> bool {
        matches!(self, EventKind::InternalTournament)
    }
}

/// Lifecycle status of an event. Transitions only move forward.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Scheduled but not started.
    Upcoming,
    /// Games are being played.
    InProgress,
    /// Closed; no further transition.
    Finished,
}

impl EventStatus {
    /// Whether moving from `self` to `next` respects the one-directional lifecycle.
    pub fn can_advance_to(self, next: EventStatus) -> bool {
        next > self
    }
}

/// Competition container persisted by the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EventEntity {
    /// Stable identifier of the event.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Calendar date (ISO 8601) of the event.
    pub date: String,
    /// Court format.
    pub modality: Modality,
    /// Kind of competition.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Lifecycle status.
    pub status: EventStatus,
    /// Players enrolled in external tournaments and friendlies.
    #[serde(default)]
    pub roster: Vec<Uuid>,
}

/// Team formed for an internal tournament.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TeamEntity {
    /// Stable identifier of the team.
    pub id: Uuid,
    /// Event owning the team.
    pub event_id: Uuid,
    /// Display name.
    pub name: String,
    /// Logo hosted on the asset host.
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Player ids belonging to the team.
    #[serde(default)]
    pub members: Vec<Uuid>,
}

/// One match within an event.
///
/// External and friendly games only name the `adversary`; internal games reference two teams.
/// The running scores are always stored as side A / side B.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Stable identifier of the game.
    pub id: Uuid,
    /// Event owning the game.
    pub event_id: Uuid,
    /// Name of the adversary (external tournaments and friendlies).
    #[serde(default)]
    pub adversary: Option<String>,
    /// Team playing as side A (internal tournaments).
    #[serde(default)]
    pub team_a_id: Option<Uuid>,
    /// Team playing as side B (internal tournaments).
    #[serde(default)]
    pub team_b_id: Option<Uuid>,
    /// Calendar date (ISO 8601) of the game.
    pub date: String,
    /// Running score of side A.
    #[serde(default)]
    pub team_a_final: i32,
    /// Running score of side B.
    #[serde(default)]
    pub team_b_final: i32,
}

impl GameEntity {
    /// Address of this game inside its event.
    pub fn reference(&self) -> GameRef {
        GameRef {
            event_id: self.event_id,
            game_id: self.id,
        }
    }

    /// Current pair of running scores.
    pub fn scoreboard(&self) -> ScoreboardEntity {
        ScoreboardEntity {
            team_a_final: self.team_a_final,
            team_b_final: self.team_b_final,
        }
    }
}

/// Path of a game document (`events/{event_id}/games/{game_id}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GameRef {
    /// Parent event.
    pub event_id: Uuid,
    /// Game inside the event.
    pub game_id: Uuid,
}

/// The two running score fields of a game.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreboardEntity {
    /// Score of side A.
    pub team_a_final: i32,
    /// Score of side B.
    pub team_b_final: i32,
}

impl ScoreboardEntity {
    /// Score stored in `slot`.
    pub fn get(&self, slot: ScoreSlot) -> i32 {
        match slot {
            ScoreSlot::A => self.team_a_final,
            ScoreSlot::B => self.team_b_final,
        }
    }
}

/// Which score field of the game a side writes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreSlot {
    /// `team_a_final`.
    A,
    /// `team_b_final`.
    B,
}

impl ScoreSlot {
    /// Name of the document field holding the score.
    pub fn field_name(self) -> &'static str {
        match self {
            ScoreSlot::A => "team_a_final",
            ScoreSlot::B => "team_b_final",
        }
    }
}

/// Identifier of one side of a game as recorded on baskets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum SideId {
    /// Internal team.
    Team(Uuid),
    /// The club's own side in external tournaments and friendlies.
    Home,
    /// The adversary in external tournaments and friendlies. Never tracked per player.
    Opponent,
}

impl fmt::Display for SideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SideId::Team(id) => write!(f, "{id}"),
            SideId::Home => f.write_str(HOME_SIDE_ID),
            SideId::Opponent => f.write_str(OPPONENT_SIDE_ID),
        }
    }
}

/// Raised when a side identifier is neither a literal side nor a team id.
#[derive(Debug, Error)]
#[error("invalid side identifier `{0}`")]
pub struct InvalidSideId(pub String);

impl FromStr for SideId {
    type Err = InvalidSideId;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            HOME_SIDE_ID => Ok(SideId::Home),
            OPPONENT_SIDE_ID => Ok(SideId::Opponent),
            other => Uuid::parse_str(other)
                .map(SideId::Team)
                .map_err(|_| InvalidSideId(other.to_owned())),
        }
    }
}

/// One scoring occurrence. Immutable except for the player assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BasketEntity {
    /// Time-ordered identifier (UUID v7), used to break timestamp ties.
    pub id: Uuid,
    /// Event owning the game.
    pub event_id: Uuid,
    /// Game the basket was scored in.
    pub game_id: Uuid,
    /// Side the basket was recorded under.
    pub side: SideId,
    /// Point value (1, 2 or 3).
    pub points: u8,
    /// Insertion timestamp.
    pub recorded_at: SystemTime,
    /// Player the basket was attributed to, if any.
    #[serde(default)]
    pub player_id: Option<Uuid>,
    /// Display name of the attributed player.
    #[serde(default)]
    pub player_name: Option<String>,
}

impl BasketEntity {
    /// Build a fresh unassigned basket stamped with the current time.
    pub fn unassigned(game: GameRef, side: SideId, points: u8) -> Self {
        Self {
            id: Uuid::now_v7(),
            event_id: game.event_id,
            game_id: game.game_id,
            side,
            points,
            recorded_at: SystemTime::now(),
            player_id: None,
            player_name: None,
        }
    }

    /// Ordering key matching insertion order: timestamp first, then the v7 id.
    pub fn order_key(&self) -> (SystemTime, Uuid) {
        (self.recorded_at, self.id)
    }

    /// Whether the basket is still waiting for a player.
    pub fn is_unassigned(&self) -> bool {
        self.player_id.is_none()
    }
}

/// Derived scoring summary of one player in one game.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerGameStatEntity {
    /// Event owning the game.
    pub event_id: Uuid,
    /// Game the statistic belongs to.
    pub game_id: Uuid,
    /// Player the statistic describes.
    pub player_id: Uuid,
    /// Display name of the player.
    pub player_name: String,
    /// Sum of points of every assigned basket.
    pub total_points: u32,
    /// Count of 1-point baskets.
    pub one_pointers: u32,
    /// Count of 2-point baskets.
    pub two_pointers: u32,
    /// Count of 3-point baskets.
    pub three_pointers: u32,
}

impl PlayerGameStatEntity {
    /// Recount a player's statistic from the full set of their assigned baskets.
    ///
    /// Returns `None` when the player has no basket left, in which case no statistic
    /// document should exist for the pair.
    pub fn from_baskets(game: GameRef, player_id: Uuid, baskets: &[BasketEntity]) -> Option<Self> {
        let owned: Vec<&BasketEntity> = baskets
            .iter()
            .filter(|basket| basket.player_id == Some(player_id))
            .collect();
        let first = owned.first()?;

        let mut stat = Self {
            event_id: game.event_id,
            game_id: game.game_id,
            player_id,
            player_name: first
                .player_name
                .clone()
                .unwrap_or_else(|| player_id.to_string()),
            total_points: 0,
            one_pointers: 0,
            two_pointers: 0,
            three_pointers: 0,
        };

        for basket in owned {
            stat.total_points += u32::from(basket.points);
            match basket.points {
                1 => stat.one_pointers += 1,
                2 => stat.two_pointers += 1,
                3 => stat.three_pointers += 1,
                _ => {}
            }
        }

        Some(stat)
    }
}

/// Club member as supplied by the roster service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// Stable identifier of the player.
    pub id: Uuid,
    /// Full name.
    pub name: String,
    /// Optional nickname.
    #[serde(default)]
    pub nickname: Option<String>,
    /// Photo hosted on the asset host.
    #[serde(default)]
    pub photo_url: Option<String>,
    /// Jersey number.
    pub jersey_number: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> GameRef {
        GameRef {
            event_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
        }
    }

    fn assigned(game: GameRef, player: Uuid, points: u8) -> BasketEntity {
        let mut basket = BasketEntity::unassigned(game, SideId::Home, points);
        basket.player_id = Some(player);
        basket.player_name = Some("Ana".into());
        basket
    }

    #[test]
    fn side_id_round_trips_through_strings() {
        let team = Uuid::new_v4();
        assert_eq!("home".parse::<SideId>().unwrap(), SideId::Home);
        assert_eq!("opponent".parse::<SideId>().unwrap(), SideId::Opponent);
        assert_eq!(team.to_string().parse::<SideId>().unwrap(), SideId::Team(team));
        assert!("visitors".parse::<SideId>().is_err());
    }

    #[test]
    fn stat_recount_counts_every_tier() {
        let game = game();
        let player = Uuid::new_v4();
        let other = Uuid::new_v4();
        let baskets = vec![
            assigned(game, player, 2),
            assigned(game, player, 3),
            assigned(game, other, 2),
            assigned(game, player, 1),
            assigned(game, player, 2),
        ];

        let stat = PlayerGameStatEntity::from_baskets(game, player, &baskets).unwrap();
        assert_eq!(stat.total_points, 8);
        assert_eq!(stat.one_pointers, 1);
        assert_eq!(stat.two_pointers, 2);
        assert_eq!(stat.three_pointers, 1);
        assert_eq!(stat.player_name, "Ana");
    }

    #[test]
    fn stat_recount_without_baskets_is_none() {
        let game = game();
        let baskets = vec![BasketEntity::unassigned(game, SideId::Home, 2)];
        assert!(PlayerGameStatEntity::from_baskets(game, Uuid::new_v4(), &baskets).is_none());
    }

    #[test]
    fn event_status_only_moves_forward() {
        assert!(EventStatus::Upcoming.can_advance_to(EventStatus::InProgress));
        assert!(EventStatus::InProgress.can_advance_to(EventStatus::Finished));
        assert!(!EventStatus::Finished.can_advance_to(EventStatus::InProgress));
        assert!(!EventStatus::InProgress.can_advance_to(EventStatus::InProgress));
    }

    #[test]
    fn three_on_three_has_no_three_pointers() {
        assert_eq!(Modality::ThreeOnThree.allowed_points(), &[1, 2]);
        assert_eq!(Modality::FiveOnFive.allowed_points(), &[1, 2, 3]);
    }
}
