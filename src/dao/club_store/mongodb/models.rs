//! MongoDB document shapes. Identifiers are stored as strings so filters stay readable
//! in the shell and match the ids other clients of the database write.

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, serde_as};
use uuid::Uuid;

use crate::dao::models::{
    BasketEntity, EventEntity, EventKind, EventStatus, GameEntity, Modality, PlayerEntity,
    PlayerGameStatEntity, SideId, TeamEntity,
};

pub fn doc_id(id: Uuid) -> Document {
    doc! {"_id": id.to_string()}
}

/// Compound key of a statistic document: one per (game, player).
pub fn statistic_id(game_id: Uuid, player_id: Uuid) -> String {
    format!("{game_id}:{player_id}")
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEventDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    name: String,
    date: String,
    modality: Modality,
    #[serde(rename = "type")]
    kind: EventKind,
    status: EventStatus,
    #[serde(default)]
    #[serde_as(as = "Vec<DisplayFromStr>")]
    roster: Vec<Uuid>,
}

impl From<EventEntity> for MongoEventDocument {
    fn from(value: EventEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            date: value.date,
            modality: value.modality,
            kind: value.kind,
            status: value.status,
            roster: value.roster,
        }
    }
}

impl From<MongoEventDocument> for EventEntity {
    fn from(value: MongoEventDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            date: value.date,
            modality: value.modality,
            kind: value.kind,
            status: value.status,
            roster: value.roster,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoTeamDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    name: String,
    #[serde(default)]
    logo_url: Option<String>,
    #[serde(default)]
    #[serde_as(as = "Vec<DisplayFromStr>")]
    members: Vec<Uuid>,
}

impl From<TeamEntity> for MongoTeamDocument {
    fn from(value: TeamEntity) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            logo_url: value.logo_url,
            members: value.members,
        }
    }
}

impl From<MongoTeamDocument> for TeamEntity {
    fn from(value: MongoTeamDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            name: value.name,
            logo_url: value.logo_url,
            members: value.members,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoGameDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    #[serde(default)]
    adversary: Option<String>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    team_a_id: Option<Uuid>,
    #[serde_as(as = "Option<DisplayFromStr>")]
    team_b_id: Option<Uuid>,
    date: String,
    #[serde(default)]
    team_a_final: i32,
    #[serde(default)]
    team_b_final: i32,
}

impl From<GameEntity> for MongoGameDocument {
    fn from(value: GameEntity) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            adversary: value.adversary,
            team_a_id: value.team_a_id,
            team_b_id: value.team_b_id,
            date: value.date,
            team_a_final: value.team_a_final,
            team_b_final: value.team_b_final,
        }
    }
}

impl From<MongoGameDocument> for GameEntity {
    fn from(value: MongoGameDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            adversary: value.adversary,
            team_a_id: value.team_a_id,
            team_b_id: value.team_b_id,
            date: value.date,
            team_a_final: value.team_a_final,
            team_b_final: value.team_b_final,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoBasketDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    game_id: Uuid,
    side: SideId,
    points: i32,
    recorded_at: DateTime,
    #[serde_as(as = "Option<DisplayFromStr>")]
    player_id: Option<Uuid>,
    #[serde(default)]
    player_name: Option<String>,
}

impl From<BasketEntity> for MongoBasketDocument {
    fn from(value: BasketEntity) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            game_id: value.game_id,
            side: value.side,
            points: i32::from(value.points),
            recorded_at: DateTime::from_system_time(value.recorded_at),
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

impl From<MongoBasketDocument> for BasketEntity {
    fn from(value: MongoBasketDocument) -> Self {
        Self {
            id: value.id,
            event_id: value.event_id,
            game_id: value.game_id,
            side: value.side,
            points: u8::try_from(value.points).unwrap_or_default(),
            recorded_at: value.recorded_at.to_system_time(),
            player_id: value.player_id,
            player_name: value.player_name,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStatisticDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde_as(as = "DisplayFromStr")]
    event_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    game_id: Uuid,
    #[serde_as(as = "DisplayFromStr")]
    player_id: Uuid,
    player_name: String,
    total_points: i64,
    one_pointers: i64,
    two_pointers: i64,
    three_pointers: i64,
}

impl From<PlayerGameStatEntity> for MongoStatisticDocument {
    fn from(value: PlayerGameStatEntity) -> Self {
        Self {
            id: statistic_id(value.game_id, value.player_id),
            event_id: value.event_id,
            game_id: value.game_id,
            player_id: value.player_id,
            player_name: value.player_name,
            total_points: i64::from(value.total_points),
            one_pointers: i64::from(value.one_pointers),
            two_pointers: i64::from(value.two_pointers),
            three_pointers: i64::from(value.three_pointers),
        }
    }
}

impl From<MongoStatisticDocument> for PlayerGameStatEntity {
    fn from(value: MongoStatisticDocument) -> Self {
        let count = |raw: i64| u32::try_from(raw).unwrap_or_default();
        Self {
            event_id: value.event_id,
            game_id: value.game_id,
            player_id: value.player_id,
            player_name: value.player_name,
            total_points: count(value.total_points),
            one_pointers: count(value.one_pointers),
            two_pointers: count(value.two_pointers),
            three_pointers: count(value.three_pointers),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoPlayerDocument {
    #[serde(rename = "_id")]
    #[serde_as(as = "DisplayFromStr")]
    id: Uuid,
    name: String,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    jersey_number: i32,
}

impl From<PlayerEntity> for MongoPlayerDocument {
    fn from(value: PlayerEntity) -> Self {
        Self {
            id: value.id,
            name: value.name,
            nickname: value.nickname,
            photo_url: value.photo_url,
            jersey_number: i32::from(value.jersey_number),
        }
    }
}

impl From<MongoPlayerDocument> for PlayerEntity {
    fn from(value: MongoPlayerDocument) -> Self {
        Self {
            id: value.id,
            name: value.name,
            nickname: value.nickname,
            photo_url: value.photo_url,
            jersey_number: u8::try_from(value.jersey_number).unwrap_or_default(),
        }
    }
}
