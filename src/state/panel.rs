//! Per-panel session state: who opened it, how the game's sides map onto score slots,
//! and the handle keeping its realtime subscription alive.

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use tokio::{
    sync::{RwLock, watch},
    task::JoinHandle,
};
use uuid::Uuid;

use crate::{
    dao::models::{GameRef, Modality, ScoreSlot, SideId},
    dto::panel::PanelView,
    error::ServiceError,
    state::SseHub,
};

/// Role claim supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// May score, undo and attribute baskets.
    Admin,
    /// Read-only viewer.
    Player,
}

impl Role {
    /// Map a raw claim to a role. Only the exact string `admin` grants the admin role.
    pub fn from_claim(claim: Option<&str>) -> Self {
        match claim {
            Some("admin") => Role::Admin,
            _ => Role::Player,
        }
    }

    /// Whether the role may mutate the game.
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }

    /// Fail with `Forbidden` unless the role may mutate.
    pub fn require_admin(self, action: &str) -> Result<(), ServiceError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ServiceError::Forbidden(format!("{action} requires the admin role")))
        }
    }
}

/// One side of a game normalised onto a score slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideDescriptor {
    /// Score field the side writes to.
    pub slot: ScoreSlot,
    /// Identifier recorded on the side's baskets.
    pub id: SideId,
    /// Display name.
    pub name: String,
    /// Players allowed on this side; `None` for the untracked opponent.
    pub roster: Option<Vec<Uuid>>,
}

impl SideDescriptor {
    /// Tracked sides log every basket and accept attributions.
    pub fn is_tracked(&self) -> bool {
        self.roster.is_some()
    }

    /// Whether `player_id` may be credited with baskets of this side.
    pub fn has_player(&self, player_id: Uuid) -> bool {
        self.roster
            .as_ref()
            .is_some_and(|roster| roster.contains(&player_id))
    }
}

/// Everything a command needs to know about an open panel.
#[derive(Debug, Clone)]
pub struct PanelContext {
    /// Panel the context belongs to.
    pub panel_id: Uuid,
    /// Role captured when the panel was opened.
    pub role: Role,
    /// Game the panel follows.
    pub game: GameRef,
    /// Court format of the event, restricting basket values.
    pub modality: Modality,
    /// Side A then side B.
    pub sides: [SideDescriptor; 2],
}

impl PanelContext {
    /// Side of the game identified by `id`, if it plays in it.
    pub fn side(&self, id: SideId) -> Option<&SideDescriptor> {
        self.sides.iter().find(|side| side.id == id)
    }

    /// Resolve `id` to one of the panel's sides.
    pub fn require_side(&self, id: SideId) -> Result<&SideDescriptor, ServiceError> {
        self.side(id).ok_or_else(|| {
            ServiceError::InvalidInput(format!("side `{id}` does not play in this game"))
        })
    }

    /// Reject point values the event's modality does not allow.
    pub fn check_points(&self, points: u8) -> Result<(), ServiceError> {
        if self.modality.allowed_points().contains(&points) {
            Ok(())
        } else {
            Err(ServiceError::InvalidInput(format!(
                "a {points}-point basket is not allowed in this modality"
            )))
        }
    }
}

/// Handle on the background task feeding a panel. Dropping it cancels the subscriptions.
pub struct Subscription {
    task: JoinHandle<()>,
}

impl Subscription {
    /// Take ownership of the task feeding the panel.
    pub fn new(task: JoinHandle<()>) -> Self {
        Self { task }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Sinks a panel renders into: the SSE hub and the retained latest view.
pub struct PanelOutput {
    hub: SseHub,
    view: watch::Sender<Option<PanelView>>,
}

impl PanelOutput {
    /// Create the sinks, buffering up to `capacity` SSE events.
    pub fn new(capacity: usize) -> Self {
        let (view, _rx) = watch::channel(None);
        Self {
            hub: SseHub::new(capacity),
            view,
        }
    }

    /// Hub the panel's SSE clients subscribe to.
    pub fn hub(&self) -> &SseHub {
        &self.hub
    }

    /// Last render, `None` before the first one and after close.
    pub fn latest_view(&self) -> Option<PanelView> {
        self.view.borrow().clone()
    }

    /// Replace the retained render.
    pub fn store_view(&self, view: Option<PanelView>) {
        self.view.send_replace(view);
    }

    /// Watch the retained view, e.g. to wait for the first render.
    pub fn view_watcher(&self) -> watch::Receiver<Option<PanelView>> {
        self.view.subscribe()
    }
}

struct PanelSession {
    context: Arc<PanelContext>,
    _subscription: Subscription,
}

/// A live panel. Open once it holds a session, closed (and inert) otherwise.
pub struct LivePanel {
    id: Uuid,
    output: Arc<PanelOutput>,
    session: RwLock<Option<PanelSession>>,
    last_used: Mutex<Instant>,
}

impl LivePanel {
    /// Create a closed panel whose SSE hub buffers `capacity` events.
    pub fn new(id: Uuid, capacity: usize) -> Self {
        Self {
            id,
            output: Arc::new(PanelOutput::new(capacity)),
            session: RwLock::new(None),
            last_used: Mutex::new(Instant::now()),
        }
    }

    /// Identifier of the panel in the registry.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Render sinks shared with the subscription task.
    pub fn output(&self) -> &Arc<PanelOutput> {
        &self.output
    }

    /// Record that a client used the panel.
    pub fn touch(&self) {
        if let Ok(mut last_used) = self.last_used.lock() {
            *last_used = Instant::now();
        }
    }

    /// Time since a client last used the panel.
    pub fn idle_time(&self) -> Duration {
        self.last_used
            .lock()
            .map(|last_used| last_used.elapsed())
            .unwrap_or_default()
    }

    /// Install an opened session, cancelling the subscription of any previous one.
    pub async fn attach(&self, context: Arc<PanelContext>, subscription: Subscription) {
        let mut guard = self.session.write().await;
        *guard = Some(PanelSession {
            context,
            _subscription: subscription,
        });
    }

    /// Context of the open session, `None` before open or after close.
    pub async fn context(&self) -> Option<Arc<PanelContext>> {
        let guard = self.session.read().await;
        guard.as_ref().map(|session| session.context.clone())
    }

    /// Drop the session and its subscription. Returns whether the panel was open.
    pub async fn detach(&self) -> bool {
        let session = {
            let mut guard = self.session.write().await;
            guard.take()
        };
        session.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_admin_claim_grants_admin_role() {
        assert_eq!(Role::from_claim(Some("admin")), Role::Admin);
        assert_eq!(Role::from_claim(Some("ADMIN")), Role::Player);
        assert_eq!(Role::from_claim(Some(" admin ")), Role::Player);
        assert_eq!(Role::from_claim(Some("player")), Role::Player);
        assert_eq!(Role::from_claim(Some("coach")), Role::Player);
        assert_eq!(Role::from_claim(None), Role::Player);
        assert!(Role::Player.require_admin("scoring").is_err());
    }

    #[test]
    fn untracked_side_has_no_players() {
        let member = Uuid::new_v4();
        let home = SideDescriptor {
            slot: ScoreSlot::A,
            id: SideId::Home,
            name: "Club".into(),
            roster: Some(vec![member]),
        };
        let opponent = SideDescriptor {
            slot: ScoreSlot::B,
            id: SideId::Opponent,
            name: "Rivals".into(),
            roster: None,
        };
        assert!(home.is_tracked() && home.has_player(member));
        assert!(!opponent.is_tracked());
        assert!(!opponent.has_player(member));
    }

    #[tokio::test]
    async fn detach_aborts_the_subscription_task() {
        let panel = LivePanel::new(Uuid::new_v4(), 4);
        let task = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let abort = task.abort_handle();
        let context = Arc::new(PanelContext {
            panel_id: panel.id(),
            role: Role::Admin,
            game: GameRef {
                event_id: Uuid::new_v4(),
                game_id: Uuid::new_v4(),
            },
            modality: Modality::FiveOnFive,
            sides: [
                SideDescriptor {
                    slot: ScoreSlot::A,
                    id: SideId::Home,
                    name: "Club".into(),
                    roster: Some(Vec::new()),
                },
                SideDescriptor {
                    slot: ScoreSlot::B,
                    id: SideId::Opponent,
                    name: "Rivals".into(),
                    roster: None,
                },
            ],
        });

        panel.attach(context, Subscription::new(task)).await;
        assert!(panel.context().await.is_some());

        assert!(panel.detach().await);
        for _ in 0..16 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
        assert!(panel.context().await.is_none());
        assert!(!panel.detach().await);
    }
}
