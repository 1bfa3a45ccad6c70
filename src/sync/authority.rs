//! The authority side of the protocol.
//!
//! Exactly one [`AuthorityController`] owns a table's [`RulesEngine`].
//! It drains the shared action inbox, applies each action at most once,
//! publishes a full snapshot after every mutation, and drives the timed
//! transitions (street advance, next hand) through tasks tagged with
//! the hand they belong to so a stale task can never touch a later
//! hand.

use log::{debug, error, info, warn};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant};

use crate::game::constants::MIN_PLAYERS;
use crate::game::engine::{EngineError, RulesEngine};
use crate::game::entities::{GameState, Phase, PlayerAction, PlayerId};
use crate::sync::channel::ActionChannel;
use crate::sync::config::TableConfig;
use crate::sync::store::{RosterEntry, StoreError, TableNotification};

const TICK_PERIOD: Duration = Duration::from_millis(250);

/// Requests for a running authority loop.
#[derive(Debug)]
pub enum AuthorityCommand {
    /// Stop the loop after the current iteration.
    Close,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum TaskKind {
    AdvancePhase,
    StartNextHand,
}

/// A delayed transition, valid only for the hand it was scheduled in.
#[derive(Clone, Copy, Debug)]
struct ScheduledTask {
    hand: u64,
    due: Instant,
    kind: TaskKind,
}

pub struct AuthorityController {
    engine: RulesEngine,
    channel: ActionChannel,
    config: TableConfig,
    tasks: Vec<ScheduledTask>,
}

impl AuthorityController {
    /// Build the authority for one table, rehydrating the engine from
    /// the latest published snapshot when there is one. Seats any
    /// roster members the snapshot does not know about, then publishes
    /// so participants start from the authority's view.
    pub async fn new(channel: ActionChannel, config: TableConfig) -> Result<Self, StoreError> {
        let engine = match channel.latest_state().await? {
            Some(record) => {
                info!(
                    "game {}: rehydrating from revision {} (hand {}, {})",
                    channel.game_id(),
                    record.revision,
                    record.state.hand_counter,
                    record.state.phase
                );
                RulesEngine::from_snapshot(record.state, config.max_seats)
            }
            None => RulesEngine::new(channel.game_id(), config.blinds(), config.max_seats),
        };

        let mut authority = Self {
            engine,
            channel,
            config,
            tasks: Vec::new(),
        };
        for entry in authority.channel.roster().await? {
            authority.seat_entry(&entry);
        }
        // A rehydrated hand that was already over needs its follow-up
        // rescheduled; the old task died with the old process.
        if authority.engine.phase() == Phase::Ended {
            authority.schedule(TaskKind::StartNextHand, authority.config.showdown_delay);
        }
        authority.publish().await?;
        Ok(authority)
    }

    /// The authority's current view of the table.
    #[must_use]
    pub fn state(&self) -> GameState {
        self.engine.snapshot()
    }

    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    fn schedule(&mut self, kind: TaskKind, delay: Duration) {
        let hand = self.engine.hand_counter();
        // One transition of each kind per hand; a second would skip a
        // street when it fired.
        if self.tasks.iter().any(|t| t.kind == kind && t.hand == hand) {
            return;
        }
        self.tasks.push(ScheduledTask {
            hand,
            due: Instant::now() + delay,
            kind,
        });
    }

    async fn publish(&self) -> Result<(), StoreError> {
        let revision = self.channel.publish(self.engine.snapshot()).await?;
        debug!(
            "game {}: published revision {} ({})",
            self.engine.game_id(),
            revision,
            self.engine.phase()
        );
        Ok(())
    }

    /// Drain the inbox. Each record is marked processed before it is
    /// applied, so a re-delivered record is a no-op.
    pub async fn process_pending_actions(&mut self) -> Result<(), StoreError> {
        for record in self.channel.unprocessed_actions().await? {
            if self.channel.mark_processed(record.id).await? {
                self.apply_action(record.action).await?;
            }
        }
        Ok(())
    }

    async fn apply_action(&mut self, action: PlayerAction) -> Result<(), StoreError> {
        if self.engine.current_actor() != Some(action.actor) {
            debug!(
                "game {}: dropping {} from {}, not their turn",
                self.engine.game_id(),
                action.kind,
                action.actor
            );
            return Ok(());
        }
        if !self.engine.apply(action.actor, action.kind) {
            debug!(
                "game {}: engine rejected {} from {}",
                self.engine.game_id(),
                action.kind,
                action.actor
            );
            return Ok(());
        }
        info!(
            "game {}: {} {}",
            self.engine.game_id(),
            action.actor,
            action.kind
        );
        self.settle_after_action().await
    }

    /// Resolve the consequences of an accepted action, then publish.
    async fn settle_after_action(&mut self) -> Result<(), StoreError> {
        if self.in_betting_phase() {
            if self.engine.players_in_hand() <= 1 {
                // Win by fold resolves on the spot.
                self.engine.determine_winner();
            } else if self.engine.is_betting_round_complete() {
                self.publish().await?;
                self.schedule(TaskKind::AdvancePhase, self.config.phase_delay);
                return Ok(());
            } else if let Err(e) = self.engine.set_next_player() {
                error!("game {}: {e}", self.engine.game_id());
            }
        }
        self.publish().await?;
        if self.engine.phase() == Phase::Ended {
            self.schedule(TaskKind::StartNextHand, self.config.showdown_delay);
        }
        Ok(())
    }

    fn in_betting_phase(&self) -> bool {
        matches!(
            self.engine.phase(),
            Phase::Preflop | Phase::Flop | Phase::Turn | Phase::River
        )
    }

    /// Run every task whose deadline has passed. Tasks tagged with an
    /// older hand are dropped unexecuted.
    pub async fn run_due_tasks(&mut self, now: Instant) -> Result<(), StoreError> {
        let mut due: Vec<ScheduledTask> = Vec::new();
        self.tasks.retain(|task| {
            if task.due <= now {
                due.push(*task);
                false
            } else {
                true
            }
        });
        due.sort_by_key(|task| task.due);

        for task in due {
            if task.hand != self.engine.hand_counter() {
                debug!(
                    "game {}: dropping stale {:?} for hand {}",
                    self.engine.game_id(),
                    task.kind,
                    task.hand
                );
                continue;
            }
            match task.kind {
                TaskKind::AdvancePhase => {
                    if let Err(e) = self.engine.advance_phase() {
                        error!("game {}: {e}", self.engine.game_id());
                    }
                    self.publish().await?;
                    if self.engine.phase() == Phase::Ended {
                        self.schedule(TaskKind::StartNextHand, self.config.showdown_delay);
                    }
                }
                TaskKind::StartNextHand => match self.engine.start_new_hand() {
                    Ok(()) => {
                        info!(
                            "game {}: hand {} started",
                            self.engine.game_id(),
                            self.engine.hand_counter()
                        );
                        self.publish().await?;
                        if self.engine.phase() == Phase::Ended {
                            // Blinds put everyone all in and the hand
                            // already resolved.
                            self.schedule(TaskKind::StartNextHand, self.config.showdown_delay);
                        }
                    }
                    Err(EngineError::NotEnoughPlayers) => {
                        info!(
                            "game {}: waiting for players",
                            self.engine.game_id()
                        );
                        self.publish().await?;
                    }
                    Err(e) => error!("game {}: {e}", self.engine.game_id()),
                },
            }
        }
        Ok(())
    }

    /// Bring the engine's seats back in line with the shared roster.
    /// Covers membership changes announced while nobody was listening,
    /// so a missed notification only delays a join or leave by a tick.
    async fn reconcile_roster(&mut self) -> Result<(), StoreError> {
        let roster = self.channel.roster().await?;
        let departed: Vec<PlayerId> = self
            .engine
            .seats()
            .iter()
            .map(|p| p.id)
            .filter(|id| !roster.iter().any(|e| e.player_id == *id))
            .collect();
        for player_id in departed {
            self.handle_roster_leave(player_id).await?;
        }
        for entry in roster {
            if !self.engine.contains_player(entry.player_id) {
                self.handle_roster_join(entry).await?;
            }
        }
        Ok(())
    }

    fn seat_entry(&mut self, entry: &RosterEntry) -> bool {
        if self.engine.contains_player(entry.player_id) {
            return false;
        }
        let seated = match self.engine.add_player(
            entry.player_id,
            entry.handle.clone(),
            entry.seat_idx,
            entry.stack,
        ) {
            Ok(()) => true,
            Err(EngineError::SeatOccupied(_) | EngineError::SeatOutOfRange(_)) => {
                // Requested seat is unavailable; take the next open one.
                match self.engine.next_open_seat() {
                    Some(seat_idx) => self
                        .engine
                        .add_player(entry.player_id, entry.handle.clone(), seat_idx, entry.stack)
                        .is_ok(),
                    None => false,
                }
            }
            Err(_) => false,
        };
        if seated {
            info!(
                "game {}: {} joined with ${}",
                self.engine.game_id(),
                entry.handle,
                entry.stack
            );
        } else {
            warn!(
                "game {}: no seat for {}",
                self.engine.game_id(),
                entry.handle
            );
        }
        seated
    }

    /// Seat a new roster member. Starts play as soon as enough funded
    /// players are at a waiting table.
    pub async fn handle_roster_join(&mut self, entry: RosterEntry) -> Result<(), StoreError> {
        if !self.seat_entry(&entry) {
            return Ok(());
        }
        if self.engine.phase() == Phase::Waiting && self.engine.funded_players() >= MIN_PLAYERS {
            match self.engine.start_new_hand() {
                Ok(()) => info!(
                    "game {}: hand {} started",
                    self.engine.game_id(),
                    self.engine.hand_counter()
                ),
                Err(e) => debug!("game {}: {e}", self.engine.game_id()),
            }
        }
        self.publish().await?;
        if self.engine.phase() == Phase::Ended {
            self.schedule(TaskKind::StartNextHand, self.config.showdown_delay);
        }
        Ok(())
    }

    /// Unseat a departed member. A mid-hand departure folds them, which
    /// may end the betting round or the whole hand.
    pub async fn handle_roster_leave(&mut self, player_id: PlayerId) -> Result<(), StoreError> {
        let was_on_move = self.engine.current_actor() == Some(player_id);
        if !self.engine.remove_player(player_id) {
            return Ok(());
        }
        info!("game {}: {} left", self.engine.game_id(), player_id);

        if self.in_betting_phase() {
            if self.engine.players_in_hand() <= 1 {
                self.engine.determine_winner();
            } else if self.engine.is_betting_round_complete() {
                self.publish().await?;
                self.schedule(TaskKind::AdvancePhase, self.config.phase_delay);
                return Ok(());
            } else if was_on_move
                && let Err(e) = self.engine.set_next_player()
            {
                error!("game {}: {e}", self.engine.game_id());
            }
        }
        self.publish().await?;
        if self.engine.phase() == Phase::Ended {
            self.schedule(TaskKind::StartNextHand, self.config.showdown_delay);
        }
        Ok(())
    }

    /// Drive the table until a [`AuthorityCommand::Close`] arrives or
    /// the store goes away. Notifications wake the loop immediately;
    /// the tick covers delayed tasks and anything a lagged subscription
    /// skipped.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<AuthorityCommand>,
    ) -> Result<(), StoreError> {
        let mut notifications = self.channel.subscribe().await?;
        let mut ticker = interval(TICK_PERIOD);
        info!("game {}: authority running", self.engine.game_id());

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(AuthorityCommand::Close) | None => break,
                },
                notification = notifications.recv() => match notification {
                    Ok(TableNotification::ActionSubmitted) => {
                        self.process_pending_actions().await?;
                    }
                    Ok(TableNotification::RosterJoined(entry)) => {
                        self.handle_roster_join(entry).await?;
                    }
                    Ok(TableNotification::RosterLeft(player_id)) => {
                        self.handle_roster_leave(player_id).await?;
                    }
                    // Our own publishes echo back; nothing to do.
                    Ok(TableNotification::StatePublished) => {}
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(
                            "game {}: missed {missed} notifications, catching up",
                            self.engine.game_id()
                        );
                        self.process_pending_actions().await?;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                },
                _ = ticker.tick() => {
                    self.run_due_tasks(Instant::now()).await?;
                    self.reconcile_roster().await?;
                    self.process_pending_actions().await?;
                }
            }
        }
        info!("game {}: authority stopped", self.engine.game_id());
        Ok(())
    }
}
