//! Per-game handle over a [`TableStore`].
//!
//! An [`ActionChannel`] binds a store to one game id so controllers
//! never pass the id around. It is cheap to clone; every clone talks to
//! the same underlying store.

use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::game::entities::{ActionRecord, GameId, GameState, PlayerAction, PlayerId};
use crate::sync::store::{RosterEntry, StateRecord, StoreError, TableNotification, TableStore};

#[derive(Clone)]
pub struct ActionChannel {
    store: Arc<dyn TableStore>,
    game_id: GameId,
}

impl ActionChannel {
    #[must_use]
    pub fn new(store: Arc<dyn TableStore>, game_id: GameId) -> Self {
        Self { store, game_id }
    }

    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    /// Submit an action into the game's inbox.
    pub async fn submit(&self, action: PlayerAction) -> Result<(), StoreError> {
        self.store
            .append_action(ActionRecord::new(self.game_id, action))
            .await
    }

    pub async fn unprocessed_actions(&self) -> Result<Vec<ActionRecord>, StoreError> {
        self.store.unprocessed_actions(self.game_id).await
    }

    /// Consume a record. Returns true when this call was the one that
    /// consumed it.
    pub async fn mark_processed(&self, record_id: Uuid) -> Result<bool, StoreError> {
        self.store.mark_processed(self.game_id, record_id).await
    }

    pub async fn publish(&self, state: GameState) -> Result<u64, StoreError> {
        self.store.publish_state(state).await
    }

    pub async fn latest_state(&self) -> Result<Option<StateRecord>, StoreError> {
        self.store.latest_state(self.game_id).await
    }

    pub async fn join_roster(&self, entry: RosterEntry) -> Result<(), StoreError> {
        self.store.join_roster(entry).await
    }

    pub async fn leave_roster(&self, player_id: PlayerId) -> Result<(), StoreError> {
        self.store.leave_roster(self.game_id, player_id).await
    }

    pub async fn roster(&self) -> Result<Vec<RosterEntry>, StoreError> {
        self.store.roster(self.game_id).await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<TableNotification>, StoreError> {
        self.store.subscribe(self.game_id).await
    }
}
