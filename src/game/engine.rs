//! The betting/phase state machine for one table.
//!
//! Exactly one [`RulesEngine`] exists per game, owned by the authority.
//! Participant-facing validation is intentionally quiet: a bad action is
//! a `false` return and a debug log line, never an error another player
//! can observe. Errors are reserved for invariant violations
//! (double-seating, deck exhaustion) and leave state untouched.

use log::debug;
use thiserror::Error;

use super::constants::{BOARD_SIZE, HOLE_CARDS, MIN_PLAYERS};
use super::entities::{
    ActionKind, Blinds, Card, Chips, Deck, GameId, GameState, Handle, HandOutcome, Phase,
    PlayPositions, Player, PlayerId, SeatIndex, SidePot,
};
use super::eval::{HandEvaluator, HandRanking, SevenCardEvaluator};

#[derive(Debug, Error, Eq, PartialEq)]
pub enum EngineError {
    #[error("deck exhausted")]
    DeckExhausted,
    #[error("seat {0} is occupied")]
    SeatOccupied(SeatIndex),
    #[error("seat {0} is out of range")]
    SeatOutOfRange(SeatIndex),
    #[error("participant already seated")]
    DuplicateParticipant,
    #[error("need 2+ funded players")]
    NotEnoughPlayers,
}

/// The rules engine: deck, roster, betting state and pot accounting for
/// one table. Mutating operations either succeed completely or leave
/// the engine unchanged.
pub struct RulesEngine {
    game_id: GameId,
    blinds: Blinds,
    max_seats: usize,
    deck: Deck,
    /// Kept sorted by seat index.
    seats: Vec<Player>,
    board: Vec<Card>,
    phase: Phase,
    bet_to_match: Chips,
    positions: PlayPositions,
    hand_counter: u64,
    /// Chips contributed this hand by players since removed from the
    /// roster. They stay in the pot.
    dead_chips: Chips,
    /// Final pot partition of the last resolved hand.
    side_pots: Vec<SidePot>,
    last_outcome: Option<HandOutcome>,
    evaluator: Box<dyn HandEvaluator + Send + Sync>,
}

impl RulesEngine {
    #[must_use]
    pub fn new(game_id: GameId, blinds: Blinds, max_seats: usize) -> Self {
        Self::with_evaluator(game_id, blinds, max_seats, Box::new(SevenCardEvaluator))
    }

    #[must_use]
    pub fn with_evaluator(
        game_id: GameId,
        blinds: Blinds,
        max_seats: usize,
        evaluator: Box<dyn HandEvaluator + Send + Sync>,
    ) -> Self {
        Self {
            game_id,
            blinds,
            max_seats,
            deck: Deck::standard(),
            seats: Vec::with_capacity(max_seats),
            board: Vec::with_capacity(BOARD_SIZE),
            phase: Phase::Waiting,
            bet_to_match: 0,
            positions: PlayPositions::default(),
            hand_counter: 0,
            dead_chips: 0,
            side_pots: Vec::new(),
            last_outcome: None,
            evaluator,
        }
    }

    /// Rebuild a live engine from the last published snapshot. The
    /// undealt deck is reconstructed from the cards nobody has seen and
    /// reshuffled.
    #[must_use]
    pub fn from_snapshot(state: GameState, max_seats: usize) -> Self {
        let mut known: Vec<Card> = state.board.clone();
        for seat in &state.seats {
            known.extend(&seat.cards);
        }
        let mut deck = Deck::without(&known);
        deck.shuffle();
        // Anything in the published pot beyond the seats' own counters
        // was contributed by players who have since left.
        let seat_bets: Chips = state.seats.iter().map(|p| p.hand_bet).sum();
        let dead_chips = state.pot.saturating_sub(seat_bets);
        Self {
            game_id: state.game_id,
            blinds: state.blinds,
            max_seats,
            deck,
            seats: state.seats,
            board: state.board,
            phase: state.phase,
            bet_to_match: state.bet_to_match,
            positions: state.positions,
            hand_counter: state.hand_counter,
            dead_chips,
            side_pots: state.side_pots,
            last_outcome: state.last_outcome,
            evaluator: Box::new(SevenCardEvaluator),
        }
    }

    // === Accessors ===

    #[must_use]
    pub fn game_id(&self) -> GameId {
        self.game_id
    }

    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[must_use]
    pub fn hand_counter(&self) -> u64 {
        self.hand_counter
    }

    #[must_use]
    pub fn seats(&self) -> &[Player] {
        &self.seats
    }

    #[must_use]
    pub fn board(&self) -> &[Card] {
        &self.board
    }

    #[must_use]
    pub fn bet_to_match(&self) -> Chips {
        self.bet_to_match
    }

    #[must_use]
    pub fn positions(&self) -> PlayPositions {
        self.positions
    }

    #[must_use]
    pub fn contains_player(&self, id: PlayerId) -> bool {
        self.position_of(id).is_some()
    }

    /// The participant whose turn it is, if any.
    #[must_use]
    pub fn current_actor(&self) -> Option<PlayerId> {
        let pos = self.positions.next_action_idx?;
        self.seats.get(pos).map(|p| p.id)
    }

    /// Lowest unoccupied seat index, if the table has room.
    #[must_use]
    pub fn next_open_seat(&self) -> Option<SeatIndex> {
        (0..self.max_seats).find(|idx| !self.seats.iter().any(|p| p.seat_idx == *idx))
    }

    #[must_use]
    pub fn funded_players(&self) -> usize {
        self.seats.iter().filter(|p| p.stack > 0).count()
    }

    /// Players still contesting the pot (not folded, possibly all in).
    #[must_use]
    pub fn players_in_hand(&self) -> usize {
        self.seats.iter().filter(|p| p.in_hand()).count()
    }

    fn position_of(&self, id: PlayerId) -> Option<usize> {
        self.seats.iter().position(|p| p.id == id)
    }

    /// Everything contributed this hand and not yet paid out.
    fn pot_total(&self) -> Chips {
        self.seats.iter().map(|p| p.hand_bet).sum::<Chips>() + self.dead_chips
    }

    // === Roster ===

    pub fn add_player(
        &mut self,
        id: PlayerId,
        handle: Handle,
        seat_idx: SeatIndex,
        stack: Chips,
    ) -> Result<(), EngineError> {
        if seat_idx >= self.max_seats {
            return Err(EngineError::SeatOutOfRange(seat_idx));
        }
        if self.seats.iter().any(|p| p.id == id) {
            return Err(EngineError::DuplicateParticipant);
        }
        if self.seats.iter().any(|p| p.seat_idx == seat_idx) {
            return Err(EngineError::SeatOccupied(seat_idx));
        }
        let pos = self
            .seats
            .iter()
            .position(|p| p.seat_idx > seat_idx)
            .unwrap_or(self.seats.len());
        // Existing roster positions at or after the insertion point
        // slide right.
        let positions = &mut self.positions;
        for idx in [
            &mut positions.dealer_idx,
            &mut positions.small_blind_idx,
            &mut positions.big_blind_idx,
        ] {
            if *idx >= pos {
                *idx += 1;
            }
        }
        if let Some(idx) = positions.next_action_idx.as_mut()
            && *idx >= pos
        {
            *idx += 1;
        }
        self.seats.insert(pos, Player::new(id, handle, seat_idx, stack));
        Ok(())
    }

    /// Remove a participant. A seat holding the current turn is folded
    /// first so the betting round still completes. Returns false if the
    /// id is not seated.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        let Some(pos) = self.position_of(id) else {
            return false;
        };
        if self.positions.next_action_idx == Some(pos) {
            self.fold(id);
        }
        let removed = self.seats.remove(pos);
        self.dead_chips += removed.hand_bet;
        let len = self.seats.len();
        let positions = &mut self.positions;
        for idx in [
            &mut positions.dealer_idx,
            &mut positions.small_blind_idx,
            &mut positions.big_blind_idx,
        ] {
            if *idx > pos {
                *idx -= 1;
            }
            if len > 0 {
                *idx %= len;
            } else {
                *idx = 0;
            }
        }
        match positions.next_action_idx.as_mut() {
            Some(idx) if *idx > pos => *idx -= 1,
            Some(idx) if *idx == pos => positions.next_action_idx = None,
            _ => {}
        }
        if len < MIN_PLAYERS && matches!(self.phase, Phase::Waiting | Phase::Ended) {
            self.phase = Phase::Waiting;
        }
        true
    }

    // === Hand lifecycle ===

    /// Start the next hand: rotate the button, post blinds, deal. Only
    /// valid between hands; a stale call mid-hand is a no-op.
    pub fn start_new_hand(&mut self) -> Result<(), EngineError> {
        if !matches!(self.phase, Phase::Waiting | Phase::Ended) {
            debug!(
                "game {}: ignoring start_new_hand during {}",
                self.game_id, self.phase
            );
            return Ok(());
        }
        if self.funded_players() < MIN_PLAYERS {
            self.phase = Phase::Waiting;
            return Err(EngineError::NotEnoughPlayers);
        }

        self.hand_counter += 1;
        self.board.clear();
        self.side_pots.clear();
        self.dead_chips = 0;
        for player in &mut self.seats {
            player.reset_for_hand();
            // Busted seats sit the hand out until they top up or leave.
            if player.stack == 0 {
                player.folded = true;
            }
        }

        let dealer = self
            .next_funded_after(self.positions.dealer_idx)
            .ok_or(EngineError::NotEnoughPlayers)?;
        // Heads-up the dealer posts the small blind.
        let (small_blind, big_blind) = if self.funded_players() == MIN_PLAYERS {
            let bb = self.next_funded_after(dealer).unwrap_or(dealer);
            (dealer, bb)
        } else {
            let sb = self.next_funded_after(dealer).unwrap_or(dealer);
            let bb = self.next_funded_after(sb).unwrap_or(sb);
            (sb, bb)
        };
        let small = self.blinds.small;
        let big = self.blinds.big;
        self.seats[small_blind].put_chips_in(small);
        self.seats[big_blind].put_chips_in(big);
        self.bet_to_match = big;

        self.deck = Deck::standard();
        self.deck.shuffle();
        // Deal one card at a time around the table, twice, starting
        // left of the dealer, the way a physical deal goes.
        let len = self.seats.len();
        for _ in 0..HOLE_CARDS {
            for offset in 1..=len {
                let pos = (dealer + offset) % len;
                if !self.seats[pos].folded {
                    let card = self.deck.draw().ok_or(EngineError::DeckExhausted)?;
                    self.seats[pos].cards.push(card);
                }
            }
        }

        self.phase = Phase::Preflop;
        self.positions = PlayPositions {
            dealer_idx: dealer,
            small_blind_idx: small_blind,
            big_blind_idx: big_blind,
            next_action_idx: self.next_actor_after(big_blind),
        };
        if self.positions.next_action_idx.is_none() {
            // Blinds put everyone all-in. Run the board out and resolve.
            self.run_out_board()?;
            self.determine_winner();
        }
        Ok(())
    }

    fn next_funded_after(&self, pos: usize) -> Option<usize> {
        let len = self.seats.len();
        if len == 0 {
            return None;
        }
        (1..=len)
            .map(|offset| (pos + offset) % len)
            .find(|&p| self.seats[p].stack > 0)
    }

    fn next_actor_after(&self, pos: usize) -> Option<usize> {
        let len = self.seats.len();
        if len == 0 {
            return None;
        }
        (1..=len)
            .map(|offset| (pos + offset) % len)
            .find(|&p| self.seats[p].can_act())
    }

    // === Betting operations ===

    /// Position of `id` if and only if it holds the turn and can act.
    fn acting_position(&self, id: PlayerId) -> Option<usize> {
        if !matches!(
            self.phase,
            Phase::Preflop | Phase::Flop | Phase::Turn | Phase::River
        ) {
            debug!("game {}: action outside a betting phase", self.game_id);
            return None;
        }
        let pos = self.position_of(id)?;
        if self.positions.next_action_idx != Some(pos) {
            debug!("game {}: {} acted out of turn", self.game_id, id);
            return None;
        }
        if !self.seats[pos].can_act() {
            debug!("game {}: {} has no move", self.game_id, id);
            return None;
        }
        Some(pos)
    }

    pub fn fold(&mut self, id: PlayerId) -> bool {
        let Some(pos) = self.acting_position(id) else {
            return false;
        };
        let player = &mut self.seats[pos];
        player.folded = true;
        player.has_acted = true;
        true
    }

    pub fn check(&mut self, id: PlayerId) -> bool {
        let Some(pos) = self.acting_position(id) else {
            return false;
        };
        if self.seats[pos].round_bet < self.bet_to_match {
            debug!("game {}: {} checked into a live bet", self.game_id, id);
            return false;
        }
        self.seats[pos].has_acted = true;
        true
    }

    pub fn call(&mut self, id: PlayerId) -> bool {
        let Some(pos) = self.acting_position(id) else {
            return false;
        };
        let owed = self.bet_to_match - self.seats[pos].round_bet;
        self.seats[pos].put_chips_in(owed);
        self.seats[pos].has_acted = true;
        true
    }

    /// Raise by `amount` on top of the current bet-to-match, capped at
    /// the raiser's stack. Everyone else still in the hand owes a
    /// response to a full raise, so their `has_acted` flags reset.
    pub fn raise(&mut self, id: PlayerId, amount: Chips) -> bool {
        if amount == 0 {
            debug!("game {}: {} raised nothing", self.game_id, id);
            return false;
        }
        let Some(pos) = self.acting_position(id) else {
            return false;
        };
        let target = self.bet_to_match + amount;
        let owed = target - self.seats[pos].round_bet;
        self.seats[pos].put_chips_in(owed);
        self.finish_aggressive_action(pos);
        true
    }

    /// Push the whole stack in. Reopens the action only when the total
    /// exceeds the current bet-to-match.
    pub fn all_in(&mut self, id: PlayerId) -> bool {
        let Some(pos) = self.acting_position(id) else {
            return false;
        };
        let stack = self.seats[pos].stack;
        self.seats[pos].put_chips_in(stack);
        self.finish_aggressive_action(pos);
        true
    }

    fn finish_aggressive_action(&mut self, pos: usize) {
        if self.seats[pos].round_bet > self.bet_to_match {
            self.bet_to_match = self.seats[pos].round_bet;
            for (other, player) in self.seats.iter_mut().enumerate() {
                if other != pos && player.can_act() {
                    player.has_acted = false;
                }
            }
        }
        self.seats[pos].has_acted = true;
    }

    pub fn apply(&mut self, id: PlayerId, kind: ActionKind) -> bool {
        match kind {
            ActionKind::Fold => self.fold(id),
            ActionKind::Check => self.check(id),
            ActionKind::Call => self.call(id),
            ActionKind::Raise(amount) => self.raise(id, amount),
            ActionKind::AllIn => self.all_in(id),
        }
    }

    // === Round / phase progression ===

    #[must_use]
    pub fn is_betting_round_complete(&self) -> bool {
        if self.players_in_hand() <= 1 {
            return true;
        }
        self.seats
            .iter()
            .filter(|p| p.can_act())
            .all(|p| p.has_acted && p.round_bet == self.bet_to_match)
    }

    /// Move the turn to the next seat that can act. When nobody can
    /// (everyone remaining is all-in), the hand fast-forwards: the
    /// board runs out and the showdown resolves immediately.
    pub fn set_next_player(&mut self) -> Result<Option<usize>, EngineError> {
        let from = self
            .positions
            .next_action_idx
            .unwrap_or(self.positions.dealer_idx);
        match self.next_actor_after(from) {
            Some(pos) => {
                self.positions.next_action_idx = Some(pos);
                Ok(Some(pos))
            }
            None => {
                self.positions.next_action_idx = None;
                if self.players_in_hand() > 1 {
                    self.run_out_board()?;
                    self.determine_winner();
                }
                Ok(None)
            }
        }
    }

    /// Advance to the next street: reset the round, deal the street's
    /// community cards, hand the turn to the first eligible seat after
    /// the dealer. On the river this resolves the showdown instead.
    /// Calling it outside a betting phase is a harmless no-op, which is
    /// what makes stale delayed transitions safe.
    pub fn advance_phase(&mut self) -> Result<(), EngineError> {
        let (next, cards_to_deal) = match self.phase {
            Phase::Preflop => (Phase::Flop, 3),
            Phase::Flop => (Phase::Turn, 1),
            Phase::Turn => (Phase::River, 1),
            Phase::River => {
                self.phase = Phase::Showdown;
                self.determine_winner();
                return Ok(());
            }
            _ => {
                debug!(
                    "game {}: ignoring advance_phase during {}",
                    self.game_id, self.phase
                );
                return Ok(());
            }
        };

        for player in &mut self.seats {
            player.reset_for_round();
        }
        self.bet_to_match = 0;
        for _ in 0..cards_to_deal {
            let card = self.deck.draw().ok_or(EngineError::DeckExhausted)?;
            self.board.push(card);
        }
        self.phase = next;
        // Post-flop action starts left of the dealer, not the blinds.
        self.positions.next_action_idx = self.next_actor_after(self.positions.dealer_idx);
        if self.positions.next_action_idx.is_none() && self.players_in_hand() > 1 {
            self.run_out_board()?;
            self.determine_winner();
        }
        Ok(())
    }

    fn run_out_board(&mut self) -> Result<(), EngineError> {
        while self.board.len() < BOARD_SIZE {
            let card = self.deck.draw().ok_or(EngineError::DeckExhausted)?;
            self.board.push(card);
        }
        self.phase = Phase::Showdown;
        self.positions.next_action_idx = None;
        Ok(())
    }

    // === Showdown ===

    /// Partition this hand's contributions into pots. Tier boundaries
    /// come from the contribution totals of players still in the hand;
    /// folded chips fill the pots but folded seats are never eligible.
    fn compute_pots(&self) -> Vec<SidePot> {
        let mut tiers: Vec<Chips> = self
            .seats
            .iter()
            .filter(|p| p.in_hand() && p.hand_bet > 0)
            .map(|p| p.hand_bet)
            .collect();
        tiers.sort_unstable();
        tiers.dedup();

        let mut pots = Vec::with_capacity(tiers.len());
        let mut prev = 0;
        for &tier in &tiers {
            let amount: Chips = self
                .seats
                .iter()
                .map(|p| p.hand_bet.min(tier).saturating_sub(p.hand_bet.min(prev)))
                .sum();
            let eligible: Vec<PlayerId> = self
                .seats
                .iter()
                .filter(|p| p.in_hand() && p.hand_bet >= tier)
                .map(|p| p.id)
                .collect();
            pots.push(SidePot { amount, eligible });
            prev = tier;
        }
        // A folded seat can have contributed past the deepest live
        // stack; those chips still belong in the last pot.
        let leftover: Chips = self
            .seats
            .iter()
            .map(|p| p.hand_bet.saturating_sub(p.hand_bet.min(prev)))
            .sum();
        if leftover > 0
            && let Some(last) = pots.last_mut()
        {
            last.amount += leftover;
        }
        // Contributions of players removed mid-hand sweeten the main pot.
        if self.dead_chips > 0
            && let Some(main) = pots.first_mut()
        {
            main.amount += self.dead_chips;
        }
        pots
    }

    /// Resolve the hand: uncontested pots go to the last player
    /// standing without any hand comparison; otherwise each pot is
    /// evaluated over its eligible hands and split among the best, odd
    /// chips going to the winner seated closest clockwise from the
    /// dealer. Ends the hand.
    pub fn determine_winner(&mut self) -> Option<HandOutcome> {
        if self.players_in_hand() == 0 || self.pot_total() == 0 {
            return None;
        }

        let outcome = if self.players_in_hand() == 1 {
            let total = self.pot_total();
            let pos = self.seats.iter().position(|p| p.in_hand())?;
            self.side_pots = vec![SidePot {
                amount: total,
                eligible: vec![self.seats[pos].id],
            }];
            let winner = &mut self.seats[pos];
            winner.stack += total;
            HandOutcome {
                winners: vec![winner.id],
                description: format!("{} wins ${total} uncontested", winner.handle),
            }
        } else {
            let pots = self.compute_pots();
            self.side_pots = pots.clone();
            let rankings: Vec<(PlayerId, HandRanking)> = self
                .seats
                .iter()
                .filter(|p| p.in_hand())
                .map(|p| {
                    let mut cards = p.cards.clone();
                    cards.extend(&self.board);
                    (p.id, self.evaluator.evaluate(&cards))
                })
                .collect();

            let mut all_winners: Vec<PlayerId> = Vec::new();
            let mut best_description = String::new();
            for pot in &pots {
                let best = rankings
                    .iter()
                    .filter(|(id, _)| pot.eligible.contains(id))
                    .map(|(_, ranking)| ranking)
                    .max()?
                    .clone();
                let winners: Vec<PlayerId> = rankings
                    .iter()
                    .filter(|(id, ranking)| pot.eligible.contains(id) && *ranking == best)
                    .map(|(id, _)| *id)
                    .collect();
                let share = pot.amount / winners.len() as Chips;
                let remainder = pot.amount % winners.len() as Chips;
                for id in &winners {
                    if let Some(player) = self.seats.iter_mut().find(|p| p.id == *id) {
                        player.stack += share;
                    }
                }
                if remainder > 0
                    && let Some(first) = self.first_clockwise_of(&winners)
                    && let Some(player) = self.seats.iter_mut().find(|p| p.id == first)
                {
                    player.stack += remainder;
                }
                // The main pot (first tier) names the hand of record.
                if best_description.is_empty() {
                    let names: Vec<String> = winners
                        .iter()
                        .filter_map(|id| self.seats.iter().find(|p| p.id == *id))
                        .map(|p| p.handle.to_string())
                        .collect();
                    best_description = if names.len() == 1 {
                        format!("{} wins with {best}", names[0])
                    } else {
                        format!("{} split with {best}", names.join(", "))
                    };
                }
                for id in winners {
                    if !all_winners.contains(&id) {
                        all_winners.push(id);
                    }
                }
            }
            HandOutcome {
                winners: all_winners,
                description: best_description,
            }
        };

        // Paid out in full; the contribution counters go back to zero
        // so the published pot reads empty.
        for player in &mut self.seats {
            player.round_bet = 0;
            player.hand_bet = 0;
        }
        self.dead_chips = 0;
        self.bet_to_match = 0;
        self.positions.next_action_idx = None;
        self.phase = Phase::Ended;
        self.last_outcome = Some(outcome.clone());
        Some(outcome)
    }

    /// Of `candidates`, the one seated closest clockwise from the
    /// dealer. Decides where odd chips go on a split.
    fn first_clockwise_of(&self, candidates: &[PlayerId]) -> Option<PlayerId> {
        let len = self.seats.len();
        (1..=len)
            .map(|offset| (self.positions.dealer_idx + offset) % len)
            .map(|pos| self.seats[pos].id)
            .find(|id| candidates.contains(id))
    }

    // === Snapshots ===

    /// An immutable value snapshot of the whole table, suitable for
    /// publishing. Every mutation is followed by one of these.
    #[must_use]
    pub fn snapshot(&self) -> GameState {
        GameState {
            game_id: self.game_id,
            hand_counter: self.hand_counter,
            phase: self.phase,
            blinds: self.blinds,
            seats: self.seats.clone(),
            board: self.board.clone(),
            pot: self.pot_total(),
            side_pots: self.side_pots.clone(),
            bet_to_match: self.bet_to_match,
            positions: self.positions,
            last_outcome: self.last_outcome.clone(),
        }
    }
}
