//! Authority synchronization over a shared keyed store.
//!
//! One [`AuthorityController`] per table owns the rules engine and is
//! the only writer of game state. [`ParticipantController`]s submit
//! actions and render published snapshots. The [`TableStore`] trait is
//! the seam to the actual store; [`MemoryStore`] keeps everything in
//! process.

pub mod authority;
pub mod channel;
pub mod config;
pub mod participant;
pub mod store;

pub use authority::{AuthorityCommand, AuthorityController};
pub use channel::ActionChannel;
pub use config::TableConfig;
pub use participant::{ConnectionStatus, ParticipantController, ParticipantError};
pub use store::{MemoryStore, RosterEntry, StateRecord, StoreError, TableNotification, TableStore};
