//! # Holdem Sync
//!
//! A Texas Hold'em rules engine plus the authority synchronization
//! protocol that lets a small group of trusted participants play
//! synchronized hands, with one process as the single source of truth.
//!
//! ## Architecture
//!
//! - One [`game::RulesEngine`] per table, owned exclusively by an
//!   [`sync::AuthorityController`] that consumes submitted actions
//!   exactly once and publishes a full [`game::GameState`] snapshot
//!   after every mutation.
//! - [`sync::ParticipantController`]s submit actions and render the
//!   latest published snapshot; they never touch the engine.
//! - Both sides talk through an [`sync::ActionChannel`] over a
//!   [`sync::TableStore`], the seam to the external durable keyed
//!   store. [`sync::MemoryStore`] is the in-process implementation.
//!
//! ## Example
//!
//! ```
//! use holdem_sync::game::{Blinds, GameId, RulesEngine};
//!
//! let mut engine = RulesEngine::new(GameId::new(), Blinds { small: 5, big: 10 }, 9);
//! assert_eq!(engine.funded_players(), 0);
//! ```

/// Core game logic, entities, and the rules state machine.
pub mod game;
pub use game::{
    constants::{self, DEFAULT_BIG_BLIND, DEFAULT_BUY_IN, DEFAULT_SMALL_BLIND},
    engine::{EngineError, RulesEngine},
    entities, eval,
};

/// Authority synchronization: stores, channel, and the two controllers.
pub mod sync;
pub use sync::{
    ActionChannel, AuthorityController, ConnectionStatus, MemoryStore, ParticipantController,
    TableConfig, TableStore,
};
