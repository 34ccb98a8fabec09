//! In-memory baseline implementation of [`TableEngine`].
//!
//! Implements seat reservations, blinds, dealing, betting-round rotation and
//! automatic-action execution for no-limit hold'em tables. Showdown does not
//! rank hands: the pot is split evenly between the players still in the hand,
//! which keeps the session layer fully exercisable while hand evaluation
//! stays out of scope.

use std::collections::HashMap;

use crate::table::types::{
    Action, AutomaticAction, AutomaticActionsInfo, Card, ChipRange, ForcedBets, LegalActions, Pot,
    Rank, Reservation, Round, SeatState, Suit, TableSnapshot, Winner,
};
use crate::table::{TableEngine, TableError};

/// All tables managed by one engine instance, keyed by table id.
#[derive(Default)]
pub struct InMemoryTables {
    tables: HashMap<String, HoldemTable>,
}

impl InMemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, id: &str) -> Result<&HoldemTable, TableError> {
        self.tables.get(id).ok_or(TableError::TableNotFound)
    }

    fn table_mut(&mut self, id: &str) -> Result<&mut HoldemTable, TableError> {
        self.tables.get_mut(id).ok_or(TableError::TableNotFound)
    }
}

struct HoldemTable {
    id: String,
    forced_bets: ForcedBets,
    num_seats: usize,
    reservations: Vec<Option<Reservation>>,
    seats: Vec<Option<SeatState>>,
    button: usize,
    hand: Option<Hand>,
    winners: Option<Vec<Vec<Winner>>>,
}

struct Hand {
    deck: Vec<Card>,
    community: Vec<Card>,
    hole: Vec<Option<Vec<Card>>>,
    in_hand: Vec<bool>,
    all_in: Vec<bool>,
    automatic: Vec<Option<AutomaticAction>>,
    round: Round,
    pot: u64,
    completed: bool,
    betting: Option<Betting>,
}

struct Betting {
    to_act: usize,
    bet_to_match: u64,
    acted: Vec<bool>,
}

fn shuffled_deck() -> Vec<Card> {
    let mut deck: Vec<Card> = Suit::ALL
        .iter()
        .flat_map(|&suit| Rank::ALL.iter().map(move |&rank| Card { rank, suit }))
        .collect();
    fastrand::shuffle(&mut deck);
    deck
}

impl HoldemTable {
    fn new(id: &str, forced_bets: ForcedBets, num_seats: usize) -> Self {
        Self {
            id: id.to_string(),
            forced_bets,
            num_seats,
            reservations: vec![None; num_seats],
            seats: vec![None; num_seats],
            button: 0,
            hand: None,
            winners: None,
        }
    }

    fn hand(&self) -> Result<&Hand, TableError> {
        self.hand.as_ref().ok_or(TableError::NoHandInProgress)
    }

    fn hand_mut(&mut self) -> Result<&mut Hand, TableError> {
        self.hand.as_mut().ok_or(TableError::NoHandInProgress)
    }

    /// Next seat index, scanning circularly from `start`, matching `pred`.
    fn next_seat(&self, start: usize, pred: impl Fn(usize) -> bool) -> Option<usize> {
        (0..self.num_seats)
            .map(|offset| (start + offset) % self.num_seats)
            .find(|&i| pred(i))
    }

    fn committed(&self, index: usize) -> u64 {
        self.seats[index].map_or(0, |s| s.bet_size)
    }

    /// Moves up to `amount` additional chips from the seat's stack into its
    /// current bet, marking the seat all-in when the stack empties.
    fn commit(&mut self, index: usize, amount: u64) {
        let Some(seat) = self.seats[index].as_mut() else {
            return;
        };
        let paid = amount.min(seat.stack);
        seat.stack -= paid;
        seat.bet_size += paid;
        let emptied = seat.stack == 0;
        if emptied {
            if let Some(hand) = self.hand.as_mut() {
                hand.all_in[index] = true;
            }
        }
    }

    fn active_players(&self) -> Vec<usize> {
        match &self.hand {
            Some(hand) => (0..self.num_seats).filter(|&i| hand.in_hand[i]).collect(),
            None => Vec::new(),
        }
    }

    fn can_act(&self, index: usize) -> bool {
        match &self.hand {
            Some(hand) => hand.in_hand[index] && !hand.all_in[index],
            None => false,
        }
    }

    fn count_can_act(&self) -> usize {
        (0..self.num_seats).filter(|&i| self.can_act(i)).count()
    }

    fn start_hand(&mut self) -> Result<(), TableError> {
        if self.hand.is_some() {
            return Err(TableError::HandInProgress);
        }
        let dealt: Vec<usize> = (0..self.num_seats)
            .filter(|&i| self.seats[i].is_some_and(|s| s.stack > 0))
            .collect();
        if dealt.len() < 2 {
            return Err(TableError::NotEnoughPlayers);
        }

        self.winners = None;
        let is_dealt = |i: usize| dealt.contains(&i);
        self.button = self
            .next_seat((self.button + 1) % self.num_seats, &is_dealt)
            .expect("at least two dealt seats");

        // Heads-up: the button posts the small blind and acts first preflop.
        let small_blind = if dealt.len() == 2 {
            self.button
        } else {
            self.next_seat((self.button + 1) % self.num_seats, &is_dealt)
                .expect("dealt seat")
        };
        let big_blind = self
            .next_seat((small_blind + 1) % self.num_seats, &is_dealt)
            .expect("dealt seat");

        let mut hand = Hand {
            deck: shuffled_deck(),
            community: Vec::new(),
            hole: vec![None; self.num_seats],
            in_hand: (0..self.num_seats).map(is_dealt).collect(),
            all_in: vec![false; self.num_seats],
            automatic: vec![None; self.num_seats],
            round: Round::Preflop,
            pot: 0,
            completed: false,
            betting: None,
        };
        for &seat in &dealt {
            hand.hole[seat] = Some(vec![
                hand.deck.pop().expect("fresh deck"),
                hand.deck.pop().expect("fresh deck"),
            ]);
        }
        self.hand = Some(hand);

        let forced = self.forced_bets;
        if forced.ante > 0 {
            for &seat in &dealt {
                self.commit(seat, forced.ante);
            }
        }
        self.commit(small_blind, forced.small_blind);
        self.commit(big_blind, forced.big_blind);

        let first = self
            .next_seat((big_blind + 1) % self.num_seats, |i| self.can_act(i))
            .unwrap_or(big_blind);
        let hand = self.hand.as_mut().expect("hand just created");
        hand.betting = Some(Betting {
            to_act: first,
            bet_to_match: forced.big_blind + forced.ante,
            acted: vec![false; self.num_seats],
        });
        Ok(())
    }

    fn legal_actions_for(&self, index: usize) -> Option<LegalActions> {
        let hand = self.hand.as_ref()?;
        let betting = hand.betting.as_ref()?;
        let committed = self.committed(index);
        let seat = self.seats[index]?;
        let max = committed + seat.stack;

        let mut actions = vec![Action::Fold];
        let chip_range;
        if betting.bet_to_match > committed {
            actions.push(Action::Call);
            if max > betting.bet_to_match {
                actions.push(Action::Raise);
                let min = (betting.bet_to_match + self.forced_bets.big_blind).min(max);
                chip_range = Some(ChipRange { min, max });
            } else {
                chip_range = None;
            }
        } else {
            actions.push(Action::Check);
            if seat.stack > 0 {
                actions.push(Action::Bet);
                let min = (committed + self.forced_bets.big_blind).min(max);
                chip_range = Some(ChipRange { min, max });
            } else {
                chip_range = None;
            }
        }
        Some(LegalActions {
            actions,
            chip_range,
        })
    }

    /// Applies one concrete action for the seat currently to act. Does not
    /// advance the turn; `action_taken` drives rotation and presets.
    fn apply_action(&mut self, action: Action, bet_size: Option<u64>) -> Result<(), TableError> {
        let betting = self
            .hand()?
            .betting
            .as_ref()
            .ok_or(TableError::NoBettingRound)?;
        let actor = betting.to_act;
        let bet_to_match = betting.bet_to_match;
        let committed = self.committed(actor);
        let legal = self
            .legal_actions_for(actor)
            .ok_or(TableError::NoBettingRound)?;
        if !legal.actions.contains(&action) {
            return Err(TableError::IllegalAction(format!(
                "{action} is not a legal action right now"
            )));
        }

        match action {
            Action::Fold => {
                let hand = self.hand_mut()?;
                hand.in_hand[actor] = false;
                hand.automatic[actor] = None;
            }
            Action::Check => {}
            Action::Call => {
                self.commit(actor, bet_to_match - committed);
            }
            Action::Bet | Action::Raise => {
                let target = bet_size.ok_or_else(|| {
                    TableError::IllegalAction(format!("{action} requires a bet size"))
                })?;
                let range = legal.chip_range.ok_or_else(|| {
                    TableError::IllegalAction("no chips left to raise with".to_string())
                })?;
                // An all-in below the minimum raise is always allowed.
                if target > range.max || (target < range.min && target != range.max) {
                    return Err(TableError::IllegalAction(format!(
                        "bet size {target} outside [{}, {}]",
                        range.min, range.max
                    )));
                }
                self.commit(actor, target - committed);
                let hand = self.hand_mut()?;
                let betting = hand.betting.as_mut().expect("betting round open");
                betting.bet_to_match = target;
                // Aggression reopens the action for everyone else.
                betting.acted = vec![false; betting.acted.len()];
            }
        }

        let hand = self.hand_mut()?;
        if let Some(betting) = hand.betting.as_mut() {
            betting.acted[actor] = true;
        }
        Ok(())
    }

    /// Resolves a preset into the concrete action to execute when the seat's
    /// turn arrives, or `None` when the preset cannot apply.
    fn resolve_preset(&self, index: usize, preset: AutomaticAction) -> Option<(Action, Option<u64>)> {
        let betting = self.hand.as_ref()?.betting.as_ref()?;
        let owing = betting.bet_to_match > self.committed(index);
        match preset {
            AutomaticAction::Fold => Some((Action::Fold, None)),
            AutomaticAction::CheckFold => Some(if owing {
                (Action::Fold, None)
            } else {
                (Action::Check, None)
            }),
            AutomaticAction::Check => (!owing).then_some((Action::Check, None)),
            AutomaticAction::Call | AutomaticAction::CallAny => Some(if owing {
                (Action::Call, None)
            } else {
                (Action::Check, None)
            }),
            AutomaticAction::AllIn => {
                let max = self.committed(index) + self.seats[index].map_or(0, |s| s.stack);
                if max > betting.bet_to_match {
                    Some((
                        if betting.bet_to_match > 0 {
                            Action::Raise
                        } else {
                            Action::Bet
                        },
                        Some(max),
                    ))
                } else {
                    Some((Action::Call, None))
                }
            }
        }
    }

    /// After an action: close the round if nobody is left to act, otherwise
    /// pass the turn along, executing presets as turns arrive.
    fn advance_turn(&mut self) -> Result<(), TableError> {
        loop {
            let Some(betting) = self.hand()?.betting.as_ref() else {
                return Ok(());
            };
            let bet_to_match = betting.bet_to_match;
            let current = betting.to_act;
            let acted = betting.acted.clone();

            if self.active_players().len() <= 1 {
                self.hand_mut()?.betting = None;
                return Ok(());
            }

            let next = self.next_seat((current + 1) % self.num_seats, |i| {
                self.can_act(i) && (!acted[i] || self.committed(i) < bet_to_match)
            });
            let Some(next) = next else {
                self.hand_mut()?.betting = None;
                return Ok(());
            };
            self.hand_mut()?.betting.as_mut().expect("betting open").to_act = next;

            let Some(preset) = self.hand()?.automatic[next] else {
                return Ok(());
            };
            let Some((action, bet_size)) = self.resolve_preset(next, preset) else {
                // Preset no longer applies (e.g. `check` facing a bet):
                // drop it and wait for manual input.
                self.hand_mut()?.automatic[next] = None;
                return Ok(());
            };
            self.hand_mut()?.automatic[next] = None;
            self.apply_action(action, bet_size)?;
        }
    }

    fn action_taken(&mut self, action: Action, bet_size: Option<u64>) -> Result<(), TableError> {
        self.apply_action(action, bet_size)?;
        self.advance_turn()
    }

    fn collect_bets(&mut self) {
        let mut collected = 0;
        for seat in self.seats.iter_mut().flatten() {
            collected += seat.bet_size;
            seat.bet_size = 0;
        }
        if let Some(hand) = self.hand.as_mut() {
            hand.pot += collected;
        }
    }

    fn deal_community(&mut self, count: usize) {
        if let Some(hand) = self.hand.as_mut() {
            for _ in 0..count {
                if let Some(card) = hand.deck.pop() {
                    hand.community.push(card);
                }
            }
        }
    }

    fn end_betting_round(&mut self) -> Result<(), TableError> {
        let hand = self.hand()?;
        if hand.betting.is_some() {
            return Err(TableError::BettingRoundOpen);
        }
        if hand.completed {
            return Err(TableError::NoBettingRound);
        }
        self.collect_bets();

        if self.active_players().len() <= 1 {
            self.hand_mut()?.completed = true;
            return Ok(());
        }

        loop {
            let next_round = match self.hand()?.round {
                Round::Preflop => Round::Flop,
                Round::Flop => Round::Turn,
                Round::Turn => Round::River,
                Round::River => {
                    self.hand_mut()?.completed = true;
                    return Ok(());
                }
            };
            self.deal_community(if next_round == Round::Flop { 3 } else { 1 });
            self.hand_mut()?.round = next_round;

            // With fewer than two seats able to act the street runs out
            // without betting.
            if self.count_can_act() >= 2 {
                let first = self
                    .next_seat((self.button + 1) % self.num_seats, |i| self.can_act(i))
                    .expect("two seats can act");
                let num_seats = self.num_seats;
                self.hand_mut()?.betting = Some(Betting {
                    to_act: first,
                    bet_to_match: 0,
                    acted: vec![false; num_seats],
                });
                return Ok(());
            }
        }
    }

    fn showdown(&mut self) -> Result<(), TableError> {
        if !self.hand()?.completed {
            return Err(TableError::BettingRoundsIncomplete);
        }
        self.collect_bets();

        let winners_seats = self.active_players();
        if winners_seats.is_empty() {
            // Everyone stood up mid-hand; the pot has no claimant.
            self.winners = Some(Vec::new());
            self.hand = None;
            return Ok(());
        }
        let pot = self.hand()?.pot;
        let share = pot / winners_seats.len() as u64;
        let mut remainder = pot % winners_seats.len() as u64;

        let mut pot_winners = Vec::with_capacity(winners_seats.len());
        for &index in &winners_seats {
            let extra = if remainder > 0 {
                remainder -= 1;
                1
            } else {
                0
            };
            if let Some(seat) = self.seats[index].as_mut() {
                seat.stack += share + extra;
            }
            let hole_cards = self.hand()?.hole[index].clone().unwrap_or_default();
            pot_winners.push(Winner {
                seat_index: index,
                hole_cards,
                ranking: None,
            });
        }
        for seat in self.seats.iter_mut().flatten() {
            seat.total_chips = seat.stack;
        }

        self.winners = Some(vec![pot_winners]);
        self.hand = None;
        Ok(())
    }

    fn stand_up(&mut self, index: usize) -> Result<(), TableError> {
        if index >= self.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        if self.seats[index].is_none() {
            return Err(TableError::SeatEmpty);
        }

        if let Some(hand) = self.hand.as_mut() {
            if hand.in_hand[index] {
                // Chips already committed this round stay in play.
                if let Some(seat) = self.seats[index].as_ref() {
                    hand.pot += seat.bet_size;
                }
                hand.in_hand[index] = false;
                hand.automatic[index] = None;
                hand.hole[index] = None;
            }
        }
        self.seats[index] = None;

        if self.hand.is_some() {
            let leaver_had_turn = self
                .hand()?
                .betting
                .as_ref()
                .is_some_and(|b| b.to_act == index);
            if self.active_players().len() <= 1 {
                self.hand_mut()?.betting = None;
            } else if leaver_had_turn {
                self.advance_turn()?;
            }
        }
        Ok(())
    }

    fn can_set_automatic_actions(&self, index: usize) -> bool {
        match &self.hand {
            Some(hand) => match &hand.betting {
                Some(betting) => {
                    index < self.num_seats
                        && hand.in_hand[index]
                        && !hand.all_in[index]
                        && betting.to_act != index
                }
                None => false,
            },
            None => false,
        }
    }

    fn legal_automatic_actions(&self, index: usize) -> Vec<AutomaticAction> {
        let Some(betting) = self.hand.as_ref().and_then(|h| h.betting.as_ref()) else {
            return Vec::new();
        };
        if betting.bet_to_match > self.committed(index) {
            vec![
                AutomaticAction::Fold,
                AutomaticAction::Call,
                AutomaticAction::CallAny,
                AutomaticAction::AllIn,
            ]
        } else {
            vec![
                AutomaticAction::Fold,
                AutomaticAction::CheckFold,
                AutomaticAction::Check,
                AutomaticAction::CallAny,
                AutomaticAction::AllIn,
            ]
        }
    }

    fn snapshot(&self) -> TableSnapshot {
        let hand = self.hand.as_ref();
        let betting_open = hand.is_some_and(|h| h.betting.is_some());
        TableSnapshot {
            id: self.id.clone(),
            reservations: self.reservations.clone(),
            seats: self.seats.clone(),
            forced_bets: self.forced_bets,
            is_hand_in_progress: hand.is_some(),
            is_betting_round_in_progress: hand.map(|h| h.betting.is_some()),
            are_betting_rounds_completed: hand.map(|h| h.completed),
            hand_players: hand.map(|h| {
                (0..self.num_seats)
                    .map(|i| if h.in_hand[i] { self.seats[i] } else { None })
                    .collect()
            }),
            button: hand.map(|_| self.button),
            legal_actions: if betting_open {
                let to_act = hand.and_then(|h| h.betting.as_ref()).map(|b| b.to_act);
                to_act.and_then(|i| self.legal_actions_for(i))
            } else {
                None
            },
            player_to_act: hand.and_then(|h| h.betting.as_ref()).map(|b| b.to_act),
            num_active_players: hand.map(|_| self.active_players().len()),
            pots: hand.map(|h| {
                vec![Pot {
                    size: h.pot,
                    eligible_players: self.active_players(),
                }]
            }),
            round_of_betting: hand.map(|h| h.round),
            community_cards: hand.map(|h| h.community.clone()),
            winners: if hand.is_some() {
                None
            } else {
                Some(self.winners.clone().unwrap_or_default())
            },
        }
    }
}

impl TableEngine for InMemoryTables {
    fn create_table(
        &mut self,
        id: &str,
        forced_bets: ForcedBets,
        num_seats: usize,
    ) -> Result<(), TableError> {
        if self.tables.contains_key(id) {
            return Err(TableError::TableExists);
        }
        self.tables
            .insert(id.to_string(), HoldemTable::new(id, forced_bets, num_seats));
        Ok(())
    }

    fn snapshot(&self, id: &str) -> Result<TableSnapshot, TableError> {
        Ok(self.table(id)?.snapshot())
    }

    fn reservations(&self, id: &str) -> Result<Vec<Option<Reservation>>, TableError> {
        Ok(self.table(id)?.reservations.clone())
    }

    fn set_reservation(
        &mut self,
        id: &str,
        index: usize,
        reservation: Reservation,
    ) -> Result<(), TableError> {
        let table = self.table_mut(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        if table.reservations[index].is_some() {
            return Err(TableError::SeatReserved);
        }
        if table
            .reservations
            .iter()
            .flatten()
            .any(|r| r.uid == reservation.uid)
        {
            return Err(TableError::AlreadyReserved);
        }
        table.reservations[index] = Some(reservation);
        Ok(())
    }

    fn update_reservation(
        &mut self,
        id: &str,
        index: usize,
        reservation: Reservation,
    ) -> Result<(), TableError> {
        let table = self.table_mut(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        let existing = table.reservations[index]
            .as_ref()
            .ok_or(TableError::MissingReservation)?;
        if existing.uid != reservation.uid {
            return Err(TableError::ReservationOwnedByOther);
        }
        table.reservations[index] = Some(reservation);
        Ok(())
    }

    fn cancel_reservation(&mut self, id: &str, index: usize) -> Result<(), TableError> {
        let table = self.table_mut(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        if table.reservations[index].is_none() {
            return Err(TableError::MissingReservation);
        }
        if table.seats[index].is_some() {
            return Err(TableError::SeatStillOccupied);
        }
        table.reservations[index] = None;
        Ok(())
    }

    fn sit_down(&mut self, id: &str, index: usize, buy_in: u64) -> Result<(), TableError> {
        let table = self.table_mut(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        if table.seats[index].is_some() {
            return Err(TableError::SeatOccupied);
        }
        table.seats[index] = Some(SeatState {
            total_chips: buy_in,
            stack: buy_in,
            bet_size: 0,
        });
        Ok(())
    }

    fn stand_up(&mut self, id: &str, index: usize) -> Result<(), TableError> {
        self.table_mut(id)?.stand_up(index)
    }

    fn start_hand(&mut self, id: &str) -> Result<(), TableError> {
        self.table_mut(id)?.start_hand()
    }

    fn action_taken(
        &mut self,
        id: &str,
        action: Action,
        bet_size: Option<u64>,
    ) -> Result<(), TableError> {
        self.table_mut(id)?.action_taken(action, bet_size)
    }

    fn end_betting_round(&mut self, id: &str) -> Result<(), TableError> {
        self.table_mut(id)?.end_betting_round()
    }

    fn showdown(&mut self, id: &str) -> Result<(), TableError> {
        self.table_mut(id)?.showdown()
    }

    fn set_automatic_action(
        &mut self,
        id: &str,
        index: usize,
        action: Option<AutomaticAction>,
    ) -> Result<(), TableError> {
        let table = self.table_mut(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        if action.is_some() && !table.can_set_automatic_actions(index) {
            return Err(TableError::AutomaticActionNotAllowed);
        }
        table.hand_mut()?.automatic[index] = action;
        Ok(())
    }

    fn seats(&self, id: &str) -> Result<Vec<Option<SeatState>>, TableError> {
        Ok(self.table(id)?.seats.clone())
    }

    fn num_seated_players(&self, id: &str) -> Result<usize, TableError> {
        Ok(self.table(id)?.seats.iter().flatten().count())
    }

    fn is_hand_in_progress(&self, id: &str) -> Result<bool, TableError> {
        Ok(self.table(id)?.hand.is_some())
    }

    fn is_betting_round_in_progress(&self, id: &str) -> Result<bool, TableError> {
        Ok(self.table(id)?.hand.as_ref().is_some_and(|h| h.betting.is_some()))
    }

    fn are_betting_rounds_completed(&self, id: &str) -> Result<bool, TableError> {
        Ok(self.table(id)?.hand()?.completed)
    }

    fn player_to_act(&self, id: &str) -> Result<usize, TableError> {
        self.table(id)?
            .hand()?
            .betting
            .as_ref()
            .map(|b| b.to_act)
            .ok_or(TableError::NoBettingRound)
    }

    fn hand_players(&self, id: &str) -> Result<Vec<Option<SeatState>>, TableError> {
        let table = self.table(id)?;
        let hand = table.hand()?;
        Ok((0..table.num_seats)
            .map(|i| if hand.in_hand[i] { table.seats[i] } else { None })
            .collect())
    }

    fn hole_cards(&self, id: &str, index: usize) -> Result<Vec<Card>, TableError> {
        let table = self.table(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        Ok(table
            .hand
            .as_ref()
            .and_then(|h| h.hole[index].clone())
            .unwrap_or_default())
    }

    fn automatic_actions(&self, id: &str) -> Result<Vec<Option<AutomaticAction>>, TableError> {
        Ok(self.table(id)?.hand()?.automatic.clone())
    }

    fn can_set_automatic_actions(&self, id: &str, index: usize) -> Result<bool, TableError> {
        Ok(self.table(id)?.can_set_automatic_actions(index))
    }

    fn automatic_actions_info(
        &self,
        id: &str,
        index: usize,
    ) -> Result<AutomaticActionsInfo, TableError> {
        let table = self.table(id)?;
        if index >= table.num_seats {
            return Err(TableError::SeatIndexOutOfRange);
        }
        let betting_open = table.hand.as_ref().is_some_and(|h| h.betting.is_some());
        Ok(AutomaticActionsInfo {
            automatic_action: table.hand.as_ref().and_then(|h| h.automatic[index]),
            can_set_automatic_actions: betting_open && table.can_set_automatic_actions(index),
            legal_automatic_actions: if betting_open {
                table.legal_automatic_actions(index)
            } else {
                Vec::new()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_with_players(stacks: &[(usize, u64)]) -> InMemoryTables {
        let mut engine = InMemoryTables::new();
        engine
            .create_table("t1", ForcedBets::default(), 9)
            .unwrap();
        for &(index, stack) in stacks {
            engine
                .set_reservation("t1", index, Reservation::for_uid(format!("u{index}")))
                .unwrap();
            engine.sit_down("t1", index, stack).unwrap();
        }
        engine
    }

    #[test]
    fn reservation_rules_are_enforced() {
        let mut engine = InMemoryTables::new();
        engine
            .create_table("t1", ForcedBets::default(), 9)
            .unwrap();

        engine
            .set_reservation("t1", 2, Reservation::for_uid("alice"))
            .unwrap();
        assert_eq!(
            engine.set_reservation("t1", 2, Reservation::for_uid("bob")),
            Err(TableError::SeatReserved)
        );
        assert_eq!(
            engine.set_reservation("t1", 5, Reservation::for_uid("alice")),
            Err(TableError::AlreadyReserved)
        );
        assert_eq!(
            engine.set_reservation("t1", 11, Reservation::for_uid("bob")),
            Err(TableError::SeatIndexOutOfRange)
        );
        assert_eq!(
            engine.set_reservation("nope", 0, Reservation::for_uid("bob")),
            Err(TableError::TableNotFound)
        );
    }

    #[test]
    fn cancel_requires_standing_up_first() {
        let mut engine = engine_with_players(&[(0, 100)]);
        assert_eq!(
            engine.cancel_reservation("t1", 0),
            Err(TableError::SeatStillOccupied)
        );
        engine.stand_up("t1", 0).unwrap();
        engine.cancel_reservation("t1", 0).unwrap();
        assert_eq!(
            engine.cancel_reservation("t1", 0),
            Err(TableError::MissingReservation)
        );
    }

    #[test]
    fn start_hand_posts_blinds_and_deals() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100), (2, 100)]);
        engine.start_hand("t1").unwrap();

        assert!(engine.is_hand_in_progress("t1").unwrap());
        assert!(engine.is_betting_round_in_progress("t1").unwrap());

        let seats = engine.seats("t1").unwrap();
        let posted: u64 = seats.iter().flatten().map(|s| s.bet_size).sum();
        assert_eq!(posted, 3); // small blind 1 + big blind 2

        for index in [0, 1, 2] {
            assert_eq!(engine.hole_cards("t1", index).unwrap().len(), 2);
        }
        assert!(engine.hole_cards("t1", 3).unwrap().is_empty());
        assert_eq!(
            engine.start_hand("t1"),
            Err(TableError::HandInProgress)
        );
    }

    #[test]
    fn start_hand_requires_two_players() {
        let mut engine = engine_with_players(&[(0, 100)]);
        assert_eq!(engine.start_hand("t1"), Err(TableError::NotEnoughPlayers));
    }

    #[test]
    fn checking_around_closes_the_betting_round() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100)]);
        engine.start_hand("t1").unwrap();

        // Heads-up preflop: button/small blind acts first and calls,
        // big blind checks.
        engine.action_taken("t1", Action::Call, None).unwrap();
        assert!(engine.is_betting_round_in_progress("t1").unwrap());
        engine.action_taken("t1", Action::Check, None).unwrap();

        assert!(!engine.is_betting_round_in_progress("t1").unwrap());
        assert!(!engine.are_betting_rounds_completed("t1").unwrap());

        engine.end_betting_round("t1").unwrap();
        assert_eq!(engine.snapshot("t1").unwrap().round_of_betting, Some(Round::Flop));
        assert_eq!(engine.snapshot("t1").unwrap().community_cards.unwrap().len(), 3);
        assert!(engine.is_betting_round_in_progress("t1").unwrap());
    }

    #[test]
    fn fold_out_completes_the_hand_and_splits_nothing() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100)]);
        engine.start_hand("t1").unwrap();
        let actor = engine.player_to_act("t1").unwrap();

        engine.action_taken("t1", Action::Fold, None).unwrap();
        assert!(!engine.is_betting_round_in_progress("t1").unwrap());

        engine.end_betting_round("t1").unwrap();
        assert!(engine.are_betting_rounds_completed("t1").unwrap());

        engine.showdown("t1").unwrap();
        assert!(!engine.is_hand_in_progress("t1").unwrap());

        let winners = engine.snapshot("t1").unwrap().winners.unwrap();
        assert_eq!(winners.len(), 1);
        assert_eq!(winners[0].len(), 1);
        assert_ne!(winners[0][0].seat_index, actor);

        // Chips are conserved across the hand.
        let seats = engine.seats("t1").unwrap();
        let total: u64 = seats.iter().flatten().map(|s| s.stack).sum();
        assert_eq!(total, 200);
    }

    #[test]
    fn out_of_range_raise_is_rejected_without_mutation() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100)]);
        engine.start_hand("t1").unwrap();
        let before = engine.seats("t1").unwrap();

        let err = engine
            .action_taken("t1", Action::Raise, Some(5000))
            .unwrap_err();
        assert!(matches!(err, TableError::IllegalAction(_)));
        assert_eq!(engine.seats("t1").unwrap(), before);
    }

    #[test]
    fn preset_executes_when_turn_arrives() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100), (2, 100)]);
        engine.start_hand("t1").unwrap();

        // Three-handed first hand: button 1, small blind 2, big blind 0,
        // so the button acts first. Big blind presets call-any; once the
        // button and small blind call, the preset resolves to a check and
        // the round closes.
        assert_eq!(engine.player_to_act("t1").unwrap(), 1);
        engine
            .set_automatic_action("t1", 0, Some(AutomaticAction::CallAny))
            .unwrap();

        engine.action_taken("t1", Action::Call, None).unwrap();
        assert_eq!(engine.player_to_act("t1").unwrap(), 2);
        engine.action_taken("t1", Action::Call, None).unwrap();

        assert!(!engine.is_betting_round_in_progress("t1").unwrap());
    }

    #[test]
    fn check_preset_is_dropped_when_facing_a_bet() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100), (2, 100)]);
        engine.start_hand("t1").unwrap();

        engine
            .set_automatic_action("t1", 2, Some(AutomaticAction::Check))
            .unwrap();
        // The button raises; seat 2's check preset no longer applies and
        // must be dropped, leaving seat 2 to act manually.
        engine.action_taken("t1", Action::Raise, Some(6)).unwrap();

        assert_eq!(engine.player_to_act("t1").unwrap(), 2);
        assert_eq!(engine.automatic_actions("t1").unwrap()[2], None);
    }

    #[test]
    fn automatic_action_eligibility_excludes_actor_and_folded() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100), (2, 100)]);
        engine.start_hand("t1").unwrap();

        assert!(!engine.can_set_automatic_actions("t1", 1).unwrap()); // to act
        assert!(engine.can_set_automatic_actions("t1", 0).unwrap());
        assert!(engine.can_set_automatic_actions("t1", 2).unwrap());

        engine.action_taken("t1", Action::Fold, None).unwrap();
        assert!(!engine.can_set_automatic_actions("t1", 1).unwrap()); // folded
    }

    #[test]
    fn stand_up_mid_hand_folds_the_seat() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100), (2, 100)]);
        engine.start_hand("t1").unwrap();

        engine.stand_up("t1", 2).unwrap();
        assert!(engine.seats("t1").unwrap()[2].is_none());
        assert!(engine.hand_players("t1").unwrap()[2].is_none());
        assert!(engine.is_hand_in_progress("t1").unwrap());
    }

    #[test]
    fn showdown_splits_pot_between_remaining_players() {
        let mut engine = engine_with_players(&[(0, 100), (1, 100)]);
        engine.start_hand("t1").unwrap();

        // Call/check through every street.
        engine.action_taken("t1", Action::Call, None).unwrap();
        engine.action_taken("t1", Action::Check, None).unwrap();
        for _ in 0..3 {
            engine.end_betting_round("t1").unwrap();
            engine.action_taken("t1", Action::Check, None).unwrap();
            engine.action_taken("t1", Action::Check, None).unwrap();
        }
        engine.end_betting_round("t1").unwrap();
        assert!(engine.are_betting_rounds_completed("t1").unwrap());

        engine.showdown("t1").unwrap();
        let seats = engine.seats("t1").unwrap();
        assert_eq!(seats[0].unwrap().stack, 100);
        assert_eq!(seats[1].unwrap().stack, 100);

        let winners = engine.snapshot("t1").unwrap().winners.unwrap();
        assert_eq!(winners[0].len(), 2);
    }
}
