//! Shared fixtures for service tests: a memory store seeded with one event and game.

use std::{sync::Arc, time::Duration};

use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        club_store::{
            ClubStore,
            memory::{MemoryClubStore, MemorySeed},
        },
        models::{
            BasketEntity, EventEntity, EventKind, EventStatus, GameEntity, GameRef, Modality,
            PlayerEntity, PlayerGameStatEntity, ScoreboardEntity, SideId, TeamEntity,
        },
    },
    dto::panel::PanelView,
    services::panel_service,
    state::{
        AppState, SharedState,
        panel::{LivePanel, Role},
    },
};

pub struct Fixture {
    pub state: SharedState,
    pub store: MemoryClubStore,
    pub game: GameRef,
    /// Players enrolled on the tracked side (side A for internal games).
    pub members: Vec<Uuid>,
    teams: Option<[Uuid; 2]>,
}

fn player(name: &str, jersey_number: u8) -> PlayerEntity {
    PlayerEntity {
        id: Uuid::new_v4(),
        name: name.into(),
        nickname: None,
        photo_url: None,
        jersey_number,
    }
}

fn event(kind: EventKind, modality: Modality, roster: Vec<Uuid>) -> EventEntity {
    EventEntity {
        id: Uuid::new_v4(),
        name: "Spring cup".into(),
        date: "2026-04-12".into(),
        modality,
        kind,
        status: EventStatus::InProgress,
        roster,
    }
}

fn game(event: &EventEntity) -> GameEntity {
    GameEntity {
        id: Uuid::new_v4(),
        event_id: event.id,
        adversary: None,
        team_a_id: None,
        team_b_id: None,
        date: event.date.clone(),
        team_a_final: 0,
        team_b_final: 0,
    }
}

impl Fixture {
    /// 5-on-5 friendly against "Rivals" with two enrolled players.
    pub async fn friendly() -> Self {
        Self::with_modality(Modality::FiveOnFive).await
    }

    /// Friendly played in `modality`.
    pub async fn with_modality(modality: Modality) -> Self {
        let players = vec![player("Ana", 4), player("Bea", 7), player("Carla", 11)];
        let members: Vec<Uuid> = players.iter().take(2).map(|p| p.id).collect();
        let event = event(EventKind::Friendly, modality, members.clone());
        let mut game = game(&event);
        game.adversary = Some("Rivals".into());

        Self::build(
            MemorySeed {
                events: vec![event],
                teams: Vec::new(),
                games: vec![game.clone()],
                players,
            },
            game.reference(),
            members,
            None,
        )
        .await
    }

    /// Internal tournament game between two teams; `members` belong to the side A team.
    pub async fn internal() -> Self {
        let players = vec![
            player("Ana", 4),
            player("Bea", 7),
            player("Carla", 11),
            player("Dora", 15),
        ];
        let event = event(EventKind::InternalTournament, Modality::FiveOnFive, Vec::new());
        let red = TeamEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: "Red".into(),
            logo_url: None,
            members: vec![players[0].id, players[1].id],
        };
        let blue = TeamEntity {
            id: Uuid::new_v4(),
            event_id: event.id,
            name: "Blue".into(),
            logo_url: None,
            members: vec![players[2].id, players[3].id],
        };
        let mut game = game(&event);
        game.team_a_id = Some(red.id);
        game.team_b_id = Some(blue.id);
        let teams = [red.id, blue.id];
        let members = red.members.clone();

        Self::build(
            MemorySeed {
                events: vec![event],
                teams: vec![red, blue],
                games: vec![game.clone()],
                players,
            },
            game.reference(),
            members,
            Some(teams),
        )
        .await
    }

    async fn build(
        seed: MemorySeed,
        game: GameRef,
        members: Vec<Uuid>,
        teams: Option<[Uuid; 2]>,
    ) -> Self {
        let players = seed.players.clone();
        let store = MemoryClubStore::with_seed(seed);
        let state = AppState::new(AppConfig::default());
        state.set_club_store(Arc::new(store.clone())).await;
        state.roster().replace(players);

        Self {
            state,
            store,
            game,
            members,
            teams,
        }
    }

    /// Open a panel on the fixture game and return the registered instance.
    pub async fn open(&self, role: Role) -> Arc<LivePanel> {
        let opened =
            panel_service::open_panel(&self.state, role, self.game.event_id, self.game.game_id)
                .await
                .expect("panel opens");
        self.state.panel(opened.panel_id).expect("panel registered")
    }

    /// Side identifiers of the two internal teams, side A first.
    pub fn team_sides(&self) -> [SideId; 2] {
        let [a, b] = self.teams.expect("internal fixture");
        [SideId::Team(a), SideId::Team(b)]
    }

    pub async fn game_entity(&self) -> GameEntity {
        self.store
            .find_game(self.game)
            .await
            .unwrap()
            .expect("fixture game exists")
    }

    pub async fn scores(&self) -> ScoreboardEntity {
        self.game_entity().await.scoreboard()
    }

    pub async fn baskets(&self) -> Vec<BasketEntity> {
        self.store.list_baskets(self.game).await.unwrap()
    }

    pub async fn statistics(&self) -> Vec<PlayerGameStatEntity> {
        self.store.list_statistics(self.game).await.unwrap()
    }
}

/// Wait until the panel's latest render satisfies `predicate`.
pub async fn wait_for_view<F>(panel: &LivePanel, predicate: F) -> PanelView
where
    F: Fn(&PanelView) -> bool,
{
    let mut watcher = panel.output().view_watcher();
    let view = tokio::time::timeout(
        Duration::from_secs(2),
        watcher.wait_for(|view| view.as_ref().is_some_and(&predicate)),
    )
    .await
    .expect("render within timeout")
    .expect("panel output alive")
    .clone();
    view.expect("rendered view")
}
