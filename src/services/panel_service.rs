//! Panel session controller: opening a panel on a game, keeping it fed by the store's
//! realtime subscriptions, and closing it.

use std::{sync::Arc, time::Duration};

use futures::{StreamExt, stream};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    dao::{
        club_store::ClubStore,
        models::{
            BasketEntity, EventEntity, GameEntity, GameRef, ScoreSlot, ScoreboardEntity, SideId,
            TeamEntity,
        },
        storage::StorageResult,
    },
    dto::panel::{
        LogEntry, PanelOpenedResponse, PanelView, SideSummary, SideView, UnassignedCounts,
        role_label,
    },
    error::ServiceError,
    services::sse_events,
    state::{
        SharedState,
        panel::{LivePanel, PanelContext, PanelOutput, Role, SideDescriptor, Subscription},
    },
};

/// Open a panel on `game_id` for a requester holding `role` and register it.
pub async fn open_panel(
    state: &SharedState,
    role: Role,
    event_id: Uuid,
    game_id: Uuid,
) -> Result<PanelOpenedResponse, ServiceError> {
    let store = state.require_club_store().await?;
    let game_ref = GameRef { event_id, game_id };

    let event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("event `{event_id}`")))?;
    let game = store
        .find_game(game_ref)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("game `{game_id}`")))?;
    let teams = if event.kind.is_internal() {
        store.list_teams(event_id).await?
    } else {
        Vec::new()
    };

    let sides = describe_sides(state.config(), &event, &game, &teams)?;
    let panel = Arc::new(LivePanel::new(Uuid::new_v4(), state.config().sse_capacity));
    let context = Arc::new(PanelContext {
        panel_id: panel.id(),
        role,
        game: game_ref,
        modality: event.modality,
        sides,
    });

    open(&panel, store, context.clone()).await;
    state.panels().insert(panel.id(), panel.clone());
    info!(
        panel_id = %panel.id(),
        %event_id,
        %game_id,
        admin = role.is_admin(),
        "live panel opened"
    );

    Ok(PanelOpenedResponse {
        panel_id: panel.id(),
        role: role_label(role).to_owned(),
        sides: context.sides.iter().map(SideSummary::from).collect(),
    })
}

/// Start the subscription task of `panel` and attach the session.
pub async fn open(panel: &LivePanel, store: Arc<dyn ClubStore>, context: Arc<PanelContext>) {
    let task = tokio::spawn(run_render_loop(
        store,
        context.clone(),
        panel.output().clone(),
    ));
    panel.attach(context, Subscription::new(task)).await;
}

/// Map a game onto its two score slots.
///
/// Internal tournaments oppose two teams of the event; every other kind opposes the club's
/// own side (`home`) to an untracked `opponent`.
pub fn describe_sides(
    config: &AppConfig,
    event: &EventEntity,
    game: &GameEntity,
    teams: &[TeamEntity],
) -> Result<[SideDescriptor; 2], ServiceError> {
    if event.kind.is_internal() {
        let (Some(team_a_id), Some(team_b_id)) = (game.team_a_id, game.team_b_id) else {
            return Err(ServiceError::MalformedGameState(format!(
                "internal game `{}` must reference two teams",
                game.id
            )));
        };
        if team_a_id == team_b_id {
            return Err(ServiceError::MalformedGameState(format!(
                "game `{}` opposes team `{team_a_id}` to itself",
                game.id
            )));
        }

        let team_side = |slot: ScoreSlot, team_id: Uuid| {
            teams
                .iter()
                .find(|team| team.id == team_id)
                .map(|team| SideDescriptor {
                    slot,
                    id: SideId::Team(team.id),
                    name: team.name.clone(),
                    roster: Some(team.members.clone()),
                })
                .ok_or_else(|| {
                    ServiceError::MalformedGameState(format!(
                        "team `{team_id}` of game `{}` is not part of the event",
                        game.id
                    ))
                })
        };

        return Ok([
            team_side(ScoreSlot::A, team_a_id)?,
            team_side(ScoreSlot::B, team_b_id)?,
        ]);
    }

    let adversary = game
        .adversary
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            ServiceError::MalformedGameState(format!("game `{}` has no adversary", game.id))
        })?;

    Ok([
        SideDescriptor {
            slot: ScoreSlot::A,
            id: SideId::Home,
            name: config.home_side_name.clone(),
            roster: Some(event.roster.clone()),
        },
        SideDescriptor {
            slot: ScoreSlot::B,
            id: SideId::Opponent,
            name: adversary.to_owned(),
            roster: None,
        },
    ])
}

/// Close a registered panel. Closing an unknown or already closed panel is a no-op.
pub async fn close_panel(state: &SharedState, panel_id: Uuid) {
    let Some((_, panel)) = state.panels().remove(&panel_id) else {
        debug!(%panel_id, "close requested for unknown panel");
        return;
    };
    close(&panel).await;
}

/// Cancel the panel's subscriptions and notify its stream. Idempotent.
pub async fn close(panel: &LivePanel) {
    if panel.detach().await {
        sse_events::broadcast_closed(panel.output(), panel.id());
        panel.output().store_view(None);
        info!(panel_id = %panel.id(), "live panel closed");
    }
}

/// Latest render of a registered panel.
pub fn latest_view(state: &SharedState, panel_id: Uuid) -> Result<PanelView, ServiceError> {
    state
        .panel(panel_id)?
        .output()
        .latest_view()
        .ok_or_else(|| {
            ServiceError::InvalidState(format!("panel `{panel_id}` has not rendered yet"))
        })
}

/// Full render of the panel from the latest snapshots of both subscriptions.
pub fn render_view(
    context: &PanelContext,
    scores: ScoreboardEntity,
    baskets: &[BasketEntity],
) -> PanelView {
    let mut ordered: Vec<&BasketEntity> = baskets.iter().collect();
    ordered.sort_by_key(|basket| basket.order_key());

    let unassigned = context.role.is_admin().then(|| {
        context
            .sides
            .iter()
            .filter(|side| side.is_tracked())
            .map(|side| UnassignedCounts::tally(&side.id.to_string(), baskets))
            .collect()
    });

    PanelView {
        panel_id: context.panel_id,
        event_id: context.game.event_id,
        game_id: context.game.game_id,
        sides: context
            .sides
            .iter()
            .map(|side| SideView {
                side: SideSummary::from(side),
                score: scores.get(side.slot),
            })
            .collect(),
        log: ordered.into_iter().map(LogEntry::from).collect(),
        unassigned,
    }
}

enum Delivery {
    Baskets(StorageResult<Vec<BasketEntity>>),
    Scores(StorageResult<ScoreboardEntity>),
}

const RESUBSCRIBE_INITIAL_DELAY: Duration = Duration::from_millis(200);
const RESUBSCRIBE_MAX_DELAY: Duration = Duration::from_secs(10);

/// Follow both subscriptions for as long as the panel is open.
///
/// A failed or ended subscription pair is dropped and reopened with exponential
/// backoff; the fresh subscriptions start with full snapshots, so nothing missed in
/// between is lost.
async fn run_render_loop(
    store: Arc<dyn ClubStore>,
    context: Arc<PanelContext>,
    output: Arc<PanelOutput>,
) {
    let panel_id = context.panel_id;
    let mut delay = RESUBSCRIBE_INITIAL_DELAY;
    let mut interrupted = false;

    loop {
        let baskets = store.watch_baskets(context.game).map(Delivery::Baskets);
        let scores = store.watch_scores(context.game).map(Delivery::Scores);
        let mut deliveries = stream::select(baskets, scores);

        let mut log: Option<Vec<BasketEntity>> = None;
        let mut scoreboard: Option<ScoreboardEntity> = None;
        let mut failure: Option<String> = None;

        while let Some(delivery) = deliveries.next().await {
            match delivery {
                Delivery::Baskets(Ok(snapshot)) => log = Some(snapshot),
                Delivery::Scores(Ok(snapshot)) => scoreboard = Some(snapshot),
                Delivery::Baskets(Err(err)) | Delivery::Scores(Err(err)) => {
                    failure = Some(err.to_string());
                    break;
                }
            }

            if let (Some(baskets), Some(scores)) = (&log, scoreboard) {
                let view = render_view(&context, scores, baskets);
                sse_events::broadcast_render(&output, view);
                if interrupted {
                    info!(%panel_id, "panel subscriptions restored");
                    interrupted = false;
                }
                delay = RESUBSCRIBE_INITIAL_DELAY;
            }
        }

        let reason = failure.unwrap_or_else(|| "subscription ended".to_owned());
        if interrupted {
            debug!(%panel_id, error = %reason, ?delay, "panel resubscription failed");
        } else {
            warn!(%panel_id, error = %reason, "panel subscription interrupted; resubscribing");
            sse_events::broadcast_alert(&output, panel_id, "live updates interrupted");
            interrupted = true;
        }

        sleep(delay).await;
        delay = (delay * 2).min(RESUBSCRIBE_MAX_DELAY);
    }
}

/// Close every panel nobody has used for `idle_for`.
///
/// A panel counts as used while an SSE client is connected to it or whenever it is
/// looked up through the registry. Returns the number of panels closed.
pub async fn close_idle_panels(state: &SharedState, idle_for: Duration) -> usize {
    let idle: Vec<Uuid> = state
        .panels()
        .iter()
        .filter_map(|entry| {
            let panel = entry.value();
            if panel.output().hub().receiver_count() > 0 {
                panel.touch();
                return None;
            }
            (panel.idle_time() >= idle_for).then(|| panel.id())
        })
        .collect();

    for panel_id in &idle {
        info!(%panel_id, ?idle_for, "closing abandoned panel");
        close_panel(state, *panel_id).await;
    }
    idle.len()
}

/// Periodically close abandoned panels, using the configured idle timeout.
pub async fn run_idle_sweep(state: SharedState) {
    let idle_for = state.config().panel_idle_timeout;
    let period = (idle_for / 2).clamp(Duration::from_secs(1), Duration::from_secs(30));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let closed = close_idle_panels(&state, idle_for).await;
        if closed > 0 {
            debug!(closed, open = state.panels().len(), "idle panel sweep");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::models::{EventKind, EventStatus, Modality},
        services::test_support::{Fixture, wait_for_view},
    };

    fn event(kind: EventKind) -> EventEntity {
        EventEntity {
            id: Uuid::new_v4(),
            name: "Spring cup".into(),
            date: "2026-04-12".into(),
            modality: Modality::FiveOnFive,
            kind,
            status: EventStatus::InProgress,
            roster: vec![Uuid::new_v4()],
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

    #[test]
    fn friendly_game_maps_to_home_and_untracked_opponent() {
        let config = AppConfig::default();
        let event = event(EventKind::Friendly);
        let mut game = game(&event);
        game.adversary = Some("Rivals".into());

        let [home, opponent] = describe_sides(&config, &event, &game, &[]).unwrap();
        assert_eq!(home.id, SideId::Home);
        assert_eq!(home.name, "Club");
        assert_eq!(home.roster.as_deref(), Some(event.roster.as_slice()));
        assert_eq!(opponent.id, SideId::Opponent);
        assert_eq!(opponent.slot, ScoreSlot::B);
        assert!(!opponent.is_tracked());
    }

    #[test]
    fn games_without_side_identifiers_are_malformed() {
        let config = AppConfig::default();

        let external = event(EventKind::ExternalTournament);
        let mut no_adversary = game(&external);
        no_adversary.adversary = Some("  ".into());
        assert!(matches!(
            describe_sides(&config, &external, &no_adversary, &[]),
            Err(ServiceError::MalformedGameState(_))
        ));

        let internal = event(EventKind::InternalTournament);
        let team = TeamEntity {
            id: Uuid::new_v4(),
            event_id: internal.id,
            name: "Red".into(),
            logo_url: None,
            members: Vec::new(),
        };
        let mut half_set = game(&internal);
        half_set.team_a_id = Some(team.id);
        assert!(matches!(
            describe_sides(&config, &internal, &half_set, &[team.clone()]),
            Err(ServiceError::MalformedGameState(_))
        ));

        let mut stranger = game(&internal);
        stranger.team_a_id = Some(team.id);
        stranger.team_b_id = Some(Uuid::new_v4());
        assert!(matches!(
            describe_sides(&config, &internal, &stranger, &[team]),
            Err(ServiceError::MalformedGameState(_))
        ));
    }

    #[tokio::test]
    async fn opening_a_malformed_game_registers_nothing() {
        let fixture = Fixture::friendly().await;
        let mut game = fixture.game_entity().await;
        game.adversary = None;
        fixture.store.save_game(game).await.unwrap();

        let result = open_panel(
            &fixture.state,
            Role::Admin,
            fixture.game.event_id,
            fixture.game.game_id,
        )
        .await;
        assert!(matches!(result, Err(ServiceError::MalformedGameState(_))));
        assert!(fixture.state.panels().is_empty());
    }

    #[tokio::test]
    async fn open_renders_initial_snapshot_and_follows_deliveries() {
        let fixture = Fixture::friendly().await;
        let opened = open_panel(
            &fixture.state,
            Role::Admin,
            fixture.game.event_id,
            fixture.game.game_id,
        )
        .await
        .unwrap();
        let panel = fixture.state.panel(opened.panel_id).unwrap();
        let mut events = panel.output().hub().subscribe();

        let view = wait_for_view(&panel, |view| view.log.is_empty()).await;
        assert_eq!(view.sides[0].score, 0);
        assert_eq!(view.unassigned.as_ref().map(Vec::len), Some(1));

        fixture
            .store
            .insert_basket(BasketEntity::unassigned(fixture.game, SideId::Home, 2))
            .await
            .unwrap();
        let view = wait_for_view(&panel, |view| view.log.len() == 1).await;
        assert_eq!(view.log[0].points, 2);

        let published = events.recv().await.unwrap();
        assert_eq!(published.event.as_deref(), Some(sse_events::EVENT_PANEL_RENDER));
    }

    #[tokio::test]
    async fn player_panels_do_not_render_the_unassigned_distribution() {
        let fixture = Fixture::friendly().await;
        let opened = open_panel(
            &fixture.state,
            Role::Player,
            fixture.game.event_id,
            fixture.game.game_id,
        )
        .await
        .unwrap();
        let panel = fixture.state.panel(opened.panel_id).unwrap();

        let view = wait_for_view(&panel, |_| true).await;
        assert!(view.unassigned.is_none());
        assert_eq!(opened.role, "player");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_safe_before_open() {
        let never_opened = LivePanel::new(Uuid::new_v4(), 4);
        close(&never_opened).await;
        close(&never_opened).await;

        let fixture = Fixture::friendly().await;
        let opened = open_panel(
            &fixture.state,
            Role::Admin,
            fixture.game.event_id,
            fixture.game.game_id,
        )
        .await
        .unwrap();
        let panel = fixture.state.panel(opened.panel_id).unwrap();
        let mut events = panel.output().hub().subscribe();

        close_panel(&fixture.state, opened.panel_id).await;
        close_panel(&fixture.state, opened.panel_id).await;
        close(&panel).await;

        assert!(fixture.state.panel(opened.panel_id).is_err());
        assert!(panel.context().await.is_none());
        assert!(panel.output().latest_view().is_none());

        let mut closed_events = 0;
        while let Ok(event) = events.try_recv() {
            if event.event.as_deref() == Some(sse_events::EVENT_PANEL_CLOSED) {
                closed_events += 1;
            }
        }
        assert_eq!(closed_events, 1);
    }

    #[tokio::test]
    async fn interrupted_subscriptions_alert_and_resume() {
        let fixture = Fixture::friendly().await;
        let panel = fixture.open(Role::Admin).await;
        wait_for_view(&panel, |view| view.log.is_empty()).await;
        let mut events = panel.output().hub().subscribe();

        fixture.store.set_offline(true);
        let alert = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let event = events.recv().await.expect("hub alive");
                if event.event.as_deref() == Some(sse_events::EVENT_PANEL_ALERT) {
                    break event;
                }
            }
        })
        .await
        .expect("alert within timeout");
        assert!(alert.data.contains("live updates interrupted"));
        fixture.store.set_offline(false);

        fixture
            .store
            .insert_basket(BasketEntity::unassigned(fixture.game, SideId::Home, 3))
            .await
            .unwrap();
        let view = wait_for_view(&panel, |view| view.log.len() == 1).await;
        assert_eq!(view.log[0].points, 3);
        assert!(fixture.state.panel(panel.id()).is_ok());
    }

    #[tokio::test]
    async fn abandoned_panels_are_closed_by_the_idle_sweep() {
        let fixture = Fixture::friendly().await;
        let abandoned = fixture.open(Role::Player).await;
        let watched = fixture.open(Role::Player).await;
        let client = watched.output().hub().subscribe();

        assert_eq!(
            close_idle_panels(&fixture.state, Duration::from_secs(60)).await,
            0
        );
        assert_eq!(close_idle_panels(&fixture.state, Duration::ZERO).await, 1);
        assert!(fixture.state.panel(abandoned.id()).is_err());
        assert!(abandoned.context().await.is_none());
        assert!(watched.context().await.is_some());

        // Once the last SSE client leaves, the idle clock starts running.
        drop(client);
        assert_eq!(close_idle_panels(&fixture.state, Duration::ZERO).await, 1);
        assert!(fixture.state.panels().is_empty());
    }
}
