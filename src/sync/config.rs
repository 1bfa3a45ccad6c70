//! Table configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::game::constants::{
    DEFAULT_BIG_BLIND, DEFAULT_BUY_IN, DEFAULT_SMALL_BLIND, MAX_SEATS, MIN_PLAYERS,
};
use crate::game::entities::{Blinds, Chips};

/// Per-table settings supplied at creation time by the surrounding
/// application.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TableConfig {
    pub small_blind: Chips,
    pub big_blind: Chips,
    /// Starting stack for a joining player.
    pub buy_in: Chips,
    /// Seats at the table (2-9).
    pub max_seats: usize,
    /// Pause between a completed betting round and the next street,
    /// purely so humans can follow along.
    pub phase_delay: Duration,
    /// Pause after a showdown before the next hand starts.
    pub showdown_delay: Duration,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            small_blind: DEFAULT_SMALL_BLIND,
            big_blind: DEFAULT_BIG_BLIND,
            buy_in: DEFAULT_BUY_IN,
            max_seats: MAX_SEATS,
            phase_delay: Duration::from_millis(1500),
            showdown_delay: Duration::from_secs(5),
        }
    }
}

impl TableConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.big_blind <= self.small_blind {
            return Err("Big blind must be greater than small blind".to_string());
        }
        if self.max_seats < MIN_PLAYERS || self.max_seats > MAX_SEATS {
            return Err(format!(
                "Max seats must be between {MIN_PLAYERS} and {MAX_SEATS}"
            ));
        }
        if self.buy_in < self.big_blind {
            return Err("Buy-in must cover at least the big blind".to_string());
        }
        Ok(())
    }

    #[must_use]
    pub fn blinds(&self) -> Blinds {
        Blinds {
            small: self.small_blind,
            big: self.big_blind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(TableConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_bad_settings() {
        let mut config = TableConfig {
            big_blind: 5,
            small_blind: 10,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());

        config = TableConfig {
            max_seats: 1,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());

        config = TableConfig {
            max_seats: 10,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());

        config = TableConfig {
            buy_in: 5,
            ..TableConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
