//! The participant side of the protocol.
//!
//! A [`ParticipantController`] never touches the rules engine. It
//! submits actions into the shared inbox and renders whatever snapshot
//! the authority last published. Reconnecting is just the connect
//! handshake again: subscribe first, then fetch the latest snapshot, so
//! no publish can slip between the two.

use log::{debug, info};
use std::fmt;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::game::entities::{ActionKind, Chips, GameState, Handle, PlayerAction, PlayerId, SeatIndex};
use crate::sync::channel::ActionChannel;
use crate::sync::store::{RosterEntry, StoreError, TableNotification};

#[derive(Debug, Error)]
pub enum ParticipantError {
    #[error("not connected to the table")]
    NotConnected,
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        write!(f, "{repr}")
    }
}

pub struct ParticipantController {
    player_id: PlayerId,
    channel: ActionChannel,
    status: ConnectionStatus,
    latest: Option<GameState>,
    notifications: Option<broadcast::Receiver<TableNotification>>,
}

impl ParticipantController {
    #[must_use]
    pub fn new(player_id: PlayerId, channel: ActionChannel) -> Self {
        Self {
            player_id,
            channel,
            status: ConnectionStatus::Disconnected,
            latest: None,
            notifications: None,
        }
    }

    #[must_use]
    pub fn player_id(&self) -> PlayerId {
        self.player_id
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// The last snapshot this controller has seen, if any.
    #[must_use]
    pub fn latest(&self) -> Option<&GameState> {
        self.latest.as_ref()
    }

    /// True when the published snapshot says it is this player's turn.
    #[must_use]
    pub fn is_my_turn(&self) -> bool {
        self.latest.as_ref().is_some_and(|state| {
            state
                .positions
                .next_action_idx
                .and_then(|pos| state.seats.get(pos))
                .is_some_and(|p| p.id == self.player_id)
        })
    }

    /// Connect (or reconnect) to the table. Subscribes before fetching
    /// the snapshot: a publish racing the handshake either lands in the
    /// fetch or waits in the subscription, never both missed.
    pub async fn connect(&mut self) -> Result<(), StoreError> {
        self.status = ConnectionStatus::Connecting;
        let notifications = self.channel.subscribe().await?;
        self.latest = self.channel.latest_state().await?.map(|r| r.state);
        self.notifications = Some(notifications);
        self.status = ConnectionStatus::Connected;
        info!(
            "game {}: participant {} connected",
            self.channel.game_id(),
            self.player_id
        );
        Ok(())
    }

    pub fn disconnect(&mut self) {
        self.notifications = None;
        self.status = ConnectionStatus::Disconnected;
        info!(
            "game {}: participant {} disconnected",
            self.channel.game_id(),
            self.player_id
        );
    }

    /// Announce this player on the roster. The authority assigns the
    /// actual seat; `seat_idx` is only a preference.
    pub async fn join_table(
        &self,
        handle: Handle,
        seat_idx: SeatIndex,
        stack: Chips,
    ) -> Result<(), ParticipantError> {
        if self.status != ConnectionStatus::Connected {
            return Err(ParticipantError::NotConnected);
        }
        self.channel
            .join_roster(RosterEntry {
                game_id: self.channel.game_id(),
                player_id: self.player_id,
                handle,
                seat_idx,
                stack,
            })
            .await?;
        Ok(())
    }

    pub async fn leave_table(&self) -> Result<(), ParticipantError> {
        if self.status != ConnectionStatus::Connected {
            return Err(ParticipantError::NotConnected);
        }
        self.channel.leave_roster(self.player_id).await?;
        Ok(())
    }

    /// Submit an action for the authority to consume. Fire and forget:
    /// acceptance shows up in the next published snapshot.
    pub async fn submit(&self, kind: ActionKind) -> Result<(), ParticipantError> {
        if self.status != ConnectionStatus::Connected {
            return Err(ParticipantError::NotConnected);
        }
        debug!(
            "game {}: participant {} submitting {kind}",
            self.channel.game_id(),
            self.player_id
        );
        self.channel
            .submit(PlayerAction::new(self.player_id, kind))
            .await?;
        Ok(())
    }

    /// Drain pending notifications and refresh the local snapshot if
    /// the authority published since the last poll. Returns the fresh
    /// snapshot when there was one.
    pub async fn poll(&mut self) -> Result<Option<&GameState>, ParticipantError> {
        let Some(notifications) = self.notifications.as_mut() else {
            return Err(ParticipantError::NotConnected);
        };

        let mut refresh = false;
        loop {
            match notifications.try_recv() {
                Ok(TableNotification::StatePublished) => refresh = true,
                Ok(_) => {}
                // Missed notifications may include a publish.
                Err(broadcast::error::TryRecvError::Lagged(_)) => refresh = true,
                Err(broadcast::error::TryRecvError::Empty)
                | Err(broadcast::error::TryRecvError::Closed) => break,
            }
        }

        if !refresh {
            return Ok(None);
        }
        self.latest = self.channel.latest_state().await?.map(|r| r.state);
        Ok(self.latest.as_ref())
    }
}
