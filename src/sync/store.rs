//! The seam to the shared keyed store.
//!
//! Everything the authority and participants exchange flows through
//! [`TableStore`]: the per-game action inbox, the published state
//! snapshot, the roster, and a notification feed that spares clients
//! from polling. [`MemoryStore`] is the in-process implementation used
//! by tests and single-process deployments; a networked store
//! implements the same trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::game::entities::{
    ActionRecord, Chips, GameId, GameState, Handle, PlayerId, SeatIndex,
};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum StoreError {
    #[error("unknown game {0}")]
    UnknownGame(GameId),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A membership announcement, written by the joining participant and
/// consumed by the authority, which assigns the actual seat.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct RosterEntry {
    pub game_id: GameId,
    pub player_id: PlayerId,
    pub handle: Handle,
    /// Requested seat. The authority falls back to the next open seat
    /// when it is taken.
    pub seat_idx: SeatIndex,
    pub stack: Chips,
}

/// A published snapshot plus its monotonically increasing revision.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct StateRecord {
    pub state: GameState,
    pub revision: u64,
    pub updated_at: DateTime<Utc>,
}

/// Pushed to subscribers whenever the game's shared data changes.
#[derive(Clone, Debug, PartialEq)]
pub enum TableNotification {
    ActionSubmitted,
    StatePublished,
    RosterJoined(RosterEntry),
    RosterLeft(PlayerId),
}

/// The durable keyed store every table lives in.
///
/// Implementations must make [`publish_state`] replace the previous
/// snapshot atomically and must deliver every mutation to subscribers,
/// though subscribers may observe them after a delay.
///
/// [`publish_state`]: TableStore::publish_state
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Append a submitted action to the game's inbox.
    async fn append_action(&self, record: ActionRecord) -> Result<(), StoreError>;

    /// Actions not yet consumed by the authority, in submission order.
    async fn unprocessed_actions(&self, game_id: GameId) -> Result<Vec<ActionRecord>, StoreError>;

    /// Flip a record to processed. Returns true when the record was
    /// present and not yet processed; a repeat call (re-delivery)
    /// returns false instead of failing.
    async fn mark_processed(&self, game_id: GameId, record_id: Uuid) -> Result<bool, StoreError>;

    /// Replace the published snapshot. Returns the new revision.
    async fn publish_state(&self, state: GameState) -> Result<u64, StoreError>;

    /// The most recently published snapshot, if any.
    async fn latest_state(&self, game_id: GameId) -> Result<Option<StateRecord>, StoreError>;

    async fn join_roster(&self, entry: RosterEntry) -> Result<(), StoreError>;

    async fn leave_roster(&self, game_id: GameId, player_id: PlayerId) -> Result<(), StoreError>;

    async fn roster(&self, game_id: GameId) -> Result<Vec<RosterEntry>, StoreError>;

    /// Subscribe to change notifications for one game.
    async fn subscribe(
        &self,
        game_id: GameId,
    ) -> Result<broadcast::Receiver<TableNotification>, StoreError>;
}

const NOTIFY_CAPACITY: usize = 256;

#[derive(Debug)]
struct GameRow {
    inbox: Vec<ActionRecord>,
    state: Option<StateRecord>,
    roster: Vec<RosterEntry>,
    notify: broadcast::Sender<TableNotification>,
}

impl GameRow {
    fn new() -> Self {
        let (notify, _) = broadcast::channel(NOTIFY_CAPACITY);
        Self {
            inbox: Vec::new(),
            state: None,
            roster: Vec::new(),
            notify,
        }
    }

    fn announce(&self, notification: TableNotification) {
        // No subscribers is fine; the authority catches up on its tick.
        let _ = self.notify.send(notification);
    }
}

/// In-process [`TableStore`] backed by a mutex-guarded map. Games are
/// created lazily on first touch.
#[derive(Debug, Default)]
pub struct MemoryStore {
    games: Mutex<HashMap<GameId, GameRow>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_row<T>(
        &self,
        game_id: GameId,
        f: impl FnOnce(&mut GameRow) -> T,
    ) -> Result<T, StoreError> {
        let mut games = self
            .games
            .lock()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(f(games.entry(game_id).or_insert_with(GameRow::new)))
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    async fn append_action(&self, record: ActionRecord) -> Result<(), StoreError> {
        self.with_row(record.game_id, |row| {
            log::debug!(
                "Action {} appended to inbox for game {}",
                record.action.kind,
                record.game_id
            );
            row.inbox.push(record);
            row.announce(TableNotification::ActionSubmitted);
        })
    }

    async fn unprocessed_actions(&self, game_id: GameId) -> Result<Vec<ActionRecord>, StoreError> {
        self.with_row(game_id, |row| {
            row.inbox.iter().filter(|r| !r.processed).copied().collect()
        })
    }

    async fn mark_processed(&self, game_id: GameId, record_id: Uuid) -> Result<bool, StoreError> {
        self.with_row(game_id, |row| {
            // Duplicated delivery can leave the same id in the inbox
            // twice; consume every copy at once.
            let mut fresh = false;
            for record in row.inbox.iter_mut().filter(|r| r.id == record_id) {
                fresh |= !record.processed;
                record.processed = true;
            }
            // Consumed records have no further use; drop them so the
            // inbox stays bounded by the in-flight window.
            row.inbox.retain(|r| !r.processed);
            fresh
        })
    }

    async fn publish_state(&self, state: GameState) -> Result<u64, StoreError> {
        self.with_row(state.game_id, |row| {
            let revision = row.state.as_ref().map_or(1, |r| r.revision + 1);
            row.state = Some(StateRecord {
                state,
                revision,
                updated_at: Utc::now(),
            });
            row.announce(TableNotification::StatePublished);
            revision
        })
    }

    async fn latest_state(&self, game_id: GameId) -> Result<Option<StateRecord>, StoreError> {
        self.with_row(game_id, |row| row.state.clone())
    }

    async fn join_roster(&self, entry: RosterEntry) -> Result<(), StoreError> {
        self.with_row(entry.game_id, |row| {
            if row.roster.iter().any(|e| e.player_id == entry.player_id) {
                return;
            }
            row.roster.push(entry.clone());
            row.announce(TableNotification::RosterJoined(entry));
        })
    }

    async fn leave_roster(&self, game_id: GameId, player_id: PlayerId) -> Result<(), StoreError> {
        self.with_row(game_id, |row| {
            let before = row.roster.len();
            row.roster.retain(|e| e.player_id != player_id);
            if row.roster.len() != before {
                row.announce(TableNotification::RosterLeft(player_id));
            }
        })
    }

    async fn roster(&self, game_id: GameId) -> Result<Vec<RosterEntry>, StoreError> {
        self.with_row(game_id, |row| row.roster.clone())
    }

    async fn subscribe(
        &self,
        game_id: GameId,
    ) -> Result<broadcast::Receiver<TableNotification>, StoreError> {
        self.with_row(game_id, |row| row.notify.subscribe())
    }
}
