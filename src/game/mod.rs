//! Poker rules engine - deck, betting state machine, and showdown.
//!
//! This module provides the authoritative game logic:
//! - Card, deck, and seat entities with a serializable table snapshot
//! - The betting/phase state machine with side-pot accounting
//! - Hand evaluation behind the [`eval::HandEvaluator`] contract

pub mod constants;
pub mod engine;
pub mod entities;
pub mod eval;

pub use engine::{EngineError, RulesEngine};
pub use entities::{
    ActionKind, ActionRecord, Blinds, Card, Chips, Deck, GameId, GameState, Handle, HandOutcome,
    Phase, PlayPositions, Player, PlayerAction, PlayerId, SeatIndex, SidePot, Suit, Value,
};
pub use eval::{HandEvaluator, HandRanking, Rank, SevenCardEvaluator};
