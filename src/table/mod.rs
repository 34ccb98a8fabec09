//! Table engine boundary.
//!
//! The session layer never holds game state of its own; every mutation and
//! query goes through [`TableEngine`]. Calls are synchronous and either
//! succeed or fail with a [`TableError`]; a failure is a rejection of the
//! triggering operation, never a partial mutation.

pub mod engine;
pub mod types;

pub use engine::InMemoryTables;
pub use types::{
    Action, AutomaticAction, AutomaticActionsInfo, Card, ChipRange, ForcedBets, LegalActions, Pot,
    Rank, Reservation, Round, SeatState, Suit, TableSnapshot, Winner,
};

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("Table not found")]
    TableNotFound,

    #[error("Table already exists")]
    TableExists,

    #[error("Seat index out of range")]
    SeatIndexOutOfRange,

    #[error("Seat is already reserved")]
    SeatReserved,

    #[error("Player already has a reserved seat at this table")]
    AlreadyReserved,

    #[error("Missing reservation")]
    MissingReservation,

    #[error("Reservation owned by someone else")]
    ReservationOwnedByOther,

    #[error("You need to stand up before cancelling the reservation")]
    SeatStillOccupied,

    #[error("Seat is already occupied")]
    SeatOccupied,

    #[error("Seat is empty")]
    SeatEmpty,

    #[error("Hand already in progress")]
    HandInProgress,

    #[error("No hand in progress")]
    NoHandInProgress,

    #[error("No betting round in progress")]
    NoBettingRound,

    #[error("Betting round still in progress")]
    BettingRoundOpen,

    #[error("Betting rounds not yet completed")]
    BettingRoundsIncomplete,

    #[error("Not enough seated players to start a hand")]
    NotEnoughPlayers,

    #[error("Illegal action: {0}")]
    IllegalAction(String),

    #[error("Cannot set an automatic action for this seat")]
    AutomaticActionNotAllowed,
}

/// Narrow interface over the poker table state machine, addressed by table
/// identifier. Mutating methods take `&mut self`; the orchestrator serializes
/// access, so no interior locking happens here.
pub trait TableEngine: Send {
    fn create_table(
        &mut self,
        id: &str,
        forced_bets: ForcedBets,
        num_seats: usize,
    ) -> Result<(), TableError>;

    fn snapshot(&self, id: &str) -> Result<TableSnapshot, TableError>;

    // -- Reservations --

    fn reservations(&self, id: &str) -> Result<Vec<Option<Reservation>>, TableError>;

    fn set_reservation(
        &mut self,
        id: &str,
        index: usize,
        reservation: Reservation,
    ) -> Result<(), TableError>;

    /// Replaces an existing reservation at `index`; the new reservation must
    /// carry the same identity.
    fn update_reservation(
        &mut self,
        id: &str,
        index: usize,
        reservation: Reservation,
    ) -> Result<(), TableError>;

    fn cancel_reservation(&mut self, id: &str, index: usize) -> Result<(), TableError>;

    // -- Seating & hand lifecycle --

    fn sit_down(&mut self, id: &str, index: usize, buy_in: u64) -> Result<(), TableError>;

    fn stand_up(&mut self, id: &str, index: usize) -> Result<(), TableError>;

    fn start_hand(&mut self, id: &str) -> Result<(), TableError>;

    /// Applies the current actor's action, then executes any preset
    /// automatic actions for the seats that follow.
    fn action_taken(
        &mut self,
        id: &str,
        action: Action,
        bet_size: Option<u64>,
    ) -> Result<(), TableError>;

    fn end_betting_round(&mut self, id: &str) -> Result<(), TableError>;

    fn showdown(&mut self, id: &str) -> Result<(), TableError>;

    fn set_automatic_action(
        &mut self,
        id: &str,
        index: usize,
        action: Option<AutomaticAction>,
    ) -> Result<(), TableError>;

    // -- Queries --

    fn seats(&self, id: &str) -> Result<Vec<Option<SeatState>>, TableError>;

    fn num_seated_players(&self, id: &str) -> Result<usize, TableError>;

    fn is_hand_in_progress(&self, id: &str) -> Result<bool, TableError>;

    fn is_betting_round_in_progress(&self, id: &str) -> Result<bool, TableError>;

    fn are_betting_rounds_completed(&self, id: &str) -> Result<bool, TableError>;

    fn player_to_act(&self, id: &str) -> Result<usize, TableError>;

    /// Seat states of the players dealt into the current hand, `None` for
    /// seats that folded or were never dealt in.
    fn hand_players(&self, id: &str) -> Result<Vec<Option<SeatState>>, TableError>;

    fn hole_cards(&self, id: &str, index: usize) -> Result<Vec<Card>, TableError>;

    fn automatic_actions(&self, id: &str) -> Result<Vec<Option<AutomaticAction>>, TableError>;

    fn can_set_automatic_actions(&self, id: &str, index: usize) -> Result<bool, TableError>;

    fn automatic_actions_info(
        &self,
        id: &str,
        index: usize,
    ) -> Result<AutomaticActionsInfo, TableError>;
}
