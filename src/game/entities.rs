use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

use super::constants;

#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Suit {
    Club,
    Spade,
    Diamond,
    Heart,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Club, Suit::Spade, Suit::Diamond, Suit::Heart];
}

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::Club => "♣",
            Self::Spade => "♠",
            Self::Diamond => "♦",
            Self::Heart => "♥",
        };
        write!(f, "{repr}")
    }
}

/// Placeholder for card values (2u8 ... ace=14u8).
pub type Value = u8;

/// A card is a tuple of a uInt8 value and a suit.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Card(pub Value, pub Suit);

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let value = match self.0 {
            14 => "A",
            11 => "J",
            12 => "Q",
            13 => "K",
            v => &v.to_string(),
        };
        let repr = format!("{value}/{}", self.1);
        write!(f, "{repr:>4}")
    }
}

/// A deck of cards owned by exactly one engine. The top of the deck is
/// the end of the vector.
#[derive(Debug)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Deck {
    /// All 52 distinct cards, unshuffled.
    #[must_use]
    pub fn standard() -> Self {
        let mut cards = Vec::with_capacity(52);
        for value in 2..=14u8 {
            for suit in Suit::ALL {
                cards.push(Card(value, suit));
            }
        }
        Self { cards }
    }

    /// The 52 cards minus the ones already visible somewhere. Used when
    /// an authority rehydrates mid-hand: the undealt remainder is
    /// reconstructed and reshuffled.
    #[must_use]
    pub fn without(known: &[Card]) -> Self {
        let mut deck = Self::standard();
        deck.cards.retain(|card| !known.contains(card));
        deck
    }

    pub fn shuffle(&mut self) {
        self.cards.shuffle(&mut rand::rng());
    }

    /// Remove and return the top card.
    pub fn draw(&mut self) -> Option<Card> {
        self.cards.pop()
    }

    #[must_use]
    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::standard()
    }
}

/// Type alias for whole chips. All bets and stacks are whole chips
/// (there's no point arguing over fractions).
pub type Chips = u32;

/// Type alias for fixed seat positions at the table.
pub type SeatIndex = usize;

/// The external, authenticated participant identifier.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PlayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// One table's identifier in the external stores.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct GameId(pub Uuid);

impl GameId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for GameId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A display handle. Whitespace is folded to underscores and the length
/// capped so handles render cleanly in fixed-width UIs.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
pub struct Handle(String);

impl Handle {
    pub fn new(s: &str) -> Self {
        // Cap by characters, not bytes; a byte-level truncate panics
        // mid-codepoint on multibyte names.
        let handle: String = s
            .chars()
            .take(constants::MAX_HANDLE_LENGTH)
            .map(|c| if c.is_ascii_whitespace() { '_' } else { c })
            .collect();
        Self(handle)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<'de> Deserialize<'de> for Handle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::new(&s))
    }
}

impl From<String> for Handle {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl From<&str> for Handle {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Blinds {
    pub small: Chips,
    pub big: Chips,
}

impl fmt::Display for Blinds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = format!("${}/{}", self.small, self.big);
        write!(f, "{repr}")
    }
}

/// Phases of one table. `Waiting` is the initial phase and the phase
/// entered whenever fewer than two funded players remain.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Ord, PartialEq, PartialOrd, Serialize)]
pub enum Phase {
    Waiting,
    Preflop,
    Flop,
    Turn,
    River,
    Showdown,
    Ended,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repr = match self {
            Self::Waiting => "waiting",
            Self::Preflop => "preflop",
            Self::Flop => "flop",
            Self::Turn => "turn",
            Self::River => "river",
            Self::Showdown => "showdown",
            Self::Ended => "ended",
        };
        write!(f, "{repr}")
    }
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ActionKind {
    AllIn,
    Call,
    Check,
    Fold,
    Raise(Chips),
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let repr = match self {
            Self::AllIn => "all-ins",
            Self::Call => "calls",
            Self::Check => "checks",
            Self::Fold => "folds",
            Self::Raise(amount) => &format!("raises ${amount}"),
        };
        write!(f, "{repr}")
    }
}

/// A participant-submitted action. Ephemeral; consumed once by the
/// authority.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct PlayerAction {
    pub actor: PlayerId,
    pub kind: ActionKind,
    pub submitted_at: DateTime<Utc>,
}

impl PlayerAction {
    #[must_use]
    pub fn new(actor: PlayerId, kind: ActionKind) -> Self {
        Self {
            actor,
            kind,
            submitted_at: Utc::now(),
        }
    }
}

/// One row of the action inbox. The authority flips `processed` the
/// moment it consumes the record, which is what makes re-delivery safe.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct ActionRecord {
    pub id: Uuid,
    pub game_id: GameId,
    pub action: PlayerAction,
    pub processed: bool,
}

impl ActionRecord {
    #[must_use]
    pub fn new(game_id: GameId, action: PlayerAction) -> Self {
        Self {
            id: Uuid::new_v4(),
            game_id,
            action,
            processed: false,
        }
    }
}

/// A sub-pot only the listed players can win.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SidePot {
    pub amount: Chips,
    pub eligible: Vec<PlayerId>,
}

/// A seated player, owned exclusively by one engine.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Player {
    pub id: PlayerId,
    pub handle: Handle,
    pub seat_idx: SeatIndex,
    pub stack: Chips,
    /// Zero or two hole cards.
    pub cards: Vec<Card>,
    /// Chips put in during the current betting round.
    pub round_bet: Chips,
    /// Chips put in over the whole hand. Feeds side-pot tiers.
    pub hand_bet: Chips,
    pub folded: bool,
    pub all_in: bool,
    pub has_acted: bool,
}

impl Player {
    #[must_use]
    pub fn new(id: PlayerId, handle: Handle, seat_idx: SeatIndex, stack: Chips) -> Self {
        Self {
            id,
            handle,
            seat_idx,
            stack,
            cards: Vec::with_capacity(constants::HOLE_CARDS),
            round_bet: 0,
            hand_bet: 0,
            folded: false,
            all_in: false,
            has_acted: false,
        }
    }

    pub fn reset_for_hand(&mut self) {
        self.cards.clear();
        self.round_bet = 0;
        self.hand_bet = 0;
        self.folded = false;
        self.all_in = false;
        self.has_acted = false;
    }

    pub fn reset_for_round(&mut self) {
        self.round_bet = 0;
        self.has_acted = false;
    }

    /// Still contesting the pot.
    #[must_use]
    pub fn in_hand(&self) -> bool {
        !self.folded && !self.cards.is_empty()
    }

    /// Has a move left to make this round.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.in_hand() && !self.all_in && self.stack > 0
    }

    /// Move up to `amount` chips from the stack into the pot, flagging
    /// all-in when the stack runs dry. Returns what actually moved.
    pub fn put_chips_in(&mut self, amount: Chips) -> Chips {
        let paid = amount.min(self.stack);
        self.stack -= paid;
        self.round_bet += paid;
        self.hand_bet += paid;
        if self.stack == 0 {
            self.all_in = true;
        }
        paid
    }
}

/// Positions within the roster for the current hand. Indices are
/// positions in the seats vector (which is kept sorted by seat index),
/// not raw seat numbers.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PlayPositions {
    pub dealer_idx: usize,
    pub small_blind_idx: usize,
    pub big_blind_idx: usize,
    pub next_action_idx: Option<usize>,
}

/// How the last completed hand ended, for UI.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HandOutcome {
    pub winners: Vec<PlayerId>,
    pub description: String,
}

/// The authoritative snapshot. Published whole after every mutation;
/// each publish fully replaces the previous one.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct GameState {
    pub game_id: GameId,
    pub hand_counter: u64,
    pub phase: Phase,
    pub blinds: Blinds,
    /// Seats ordered by seat index.
    pub seats: Vec<Player>,
    pub board: Vec<Card>,
    /// The main pot. Until showdown this is everything contributed this
    /// hand; at showdown the side-pot tiers are split out.
    pub pot: Chips,
    pub side_pots: Vec<SidePot>,
    pub bet_to_match: Chips,
    pub positions: PlayPositions,
    pub last_outcome: Option<HandOutcome>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn standard_deck_is_52_distinct_cards() {
        let mut deck = Deck::standard();
        let mut seen = HashSet::new();
        while let Some(card) = deck.draw() {
            assert!((2..=14).contains(&card.0));
            assert!(seen.insert(card));
        }
        assert_eq!(seen.len(), 52);
    }

    #[test]
    fn shuffled_deck_still_covers_rank_by_suit() {
        let mut deck = Deck::standard();
        deck.shuffle();
        let mut seen = HashSet::new();
        while let Some(card) = deck.draw() {
            seen.insert(card);
        }
        for value in 2..=14u8 {
            for suit in Suit::ALL {
                assert!(seen.contains(&Card(value, suit)));
            }
        }
    }

    #[test]
    fn draw_exhausts_after_52() {
        let mut deck = Deck::standard();
        for _ in 0..52 {
            assert!(deck.draw().is_some());
        }
        assert!(deck.draw().is_none());
        assert_eq!(deck.remaining(), 0);
    }

    #[test]
    fn deck_without_excludes_known_cards() {
        let known = [Card(14, Suit::Spade), Card(2, Suit::Heart)];
        let mut deck = Deck::without(&known);
        assert_eq!(deck.remaining(), 50);
        while let Some(card) = deck.draw() {
            assert!(!known.contains(&card));
        }
    }

    #[test]
    fn card_display_face_cards() {
        assert!(format!("{}", Card(14, Suit::Spade)).contains('A'));
        assert!(format!("{}", Card(13, Suit::Heart)).contains('K'));
        assert!(format!("{}", Card(12, Suit::Diamond)).contains('Q'));
        assert!(format!("{}", Card(11, Suit::Club)).contains('J'));
        assert!(format!("{}", Card(10, Suit::Club)).contains("10"));
    }

    #[test]
    fn handle_folds_whitespace_and_truncates() {
        assert_eq!(Handle::new("alice bob").to_string(), "alice_bob");
        let long = "a".repeat(100);
        assert_eq!(
            Handle::new(&long).to_string().len(),
            constants::MAX_HANDLE_LENGTH
        );
    }

    #[test]
    fn handle_truncates_multibyte_names_on_character_boundaries() {
        // Six Japanese characters: 18 bytes, well under the cap.
        assert_eq!(Handle::new("ああああああ").to_string(), "ああああああ");

        let long = "あ".repeat(100);
        let capped = Handle::new(&long).to_string();
        assert_eq!(capped.chars().count(), constants::MAX_HANDLE_LENGTH);

        // The deserializer runs the same sanitizer; no payload may
        // panic the reader.
        let via_json: Handle = serde_json::from_str(&format!("\"{long}\"")).unwrap();
        assert_eq!(via_json.to_string(), capped);
    }

    #[test]
    fn blinds_display() {
        let blinds = Blinds { small: 5, big: 10 };
        assert_eq!(blinds.to_string(), "$5/10");
    }

    #[test]
    fn put_chips_in_caps_at_stack_and_flags_all_in() {
        let mut player = Player::new(PlayerId::new(), "shorty".into(), 0, 30);
        let paid = player.put_chips_in(100);
        assert_eq!(paid, 30);
        assert_eq!(player.stack, 0);
        assert!(player.all_in);
        assert_eq!(player.round_bet, 30);
        assert_eq!(player.hand_bet, 30);
    }

    #[test]
    fn reset_for_round_keeps_hand_bet() {
        let mut player = Player::new(PlayerId::new(), "p".into(), 0, 100);
        player.put_chips_in(40);
        player.has_acted = true;
        player.reset_for_round();
        assert_eq!(player.round_bet, 0);
        assert!(!player.has_acted);
        assert_eq!(player.hand_bet, 40);
    }

    #[test]
    fn game_state_round_trips_through_json() {
        let state = GameState {
            game_id: GameId::new(),
            hand_counter: 3,
            phase: Phase::Flop,
            blinds: Blinds { small: 5, big: 10 },
            seats: vec![Player::new(PlayerId::new(), "alice".into(), 0, 600)],
            board: vec![
                Card(14, Suit::Spade),
                Card(9, Suit::Club),
                Card(2, Suit::Heart),
            ],
            pot: 60,
            side_pots: vec![],
            bet_to_match: 0,
            positions: PlayPositions::default(),
            last_outcome: None,
        };
        let raw = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, state);
    }
}
