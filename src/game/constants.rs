//! Table limits and defaults.

use super::entities::Chips;

/// Hard cap on seats at one table.
pub const MAX_SEATS: usize = 9;

/// A hand needs at least this many funded players.
pub const MIN_PLAYERS: usize = 2;

/// Community cards dealt over a full hand.
pub const BOARD_SIZE: usize = 5;

/// Hole cards dealt to each seat.
pub const HOLE_CARDS: usize = 2;

/// Longest display handle we keep.
pub const MAX_HANDLE_LENGTH: usize = 16;

// A player folding every hand survives 60 rounds of the big blind
// on the default buy-in.
pub const DEFAULT_BUY_IN: Chips = 600;
pub const DEFAULT_BIG_BLIND: Chips = DEFAULT_BUY_IN / 60;
pub const DEFAULT_SMALL_BLIND: Chips = DEFAULT_BIG_BLIND / 2;
