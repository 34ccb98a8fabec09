//! Table domain types shared between the engine and the session layer.
//!
//! These structs are also the serialized shapes clients see, so field
//! names are part of the wire contract (camelCase throughout). Snapshot
//! fields that only make sense while a hand or betting round is running are
//! explicit `Option`s, omitted from JSON when absent.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "T")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two,
        Rank::Three,
        Rank::Four,
        Rank::Five,
        Rank::Six,
        Rank::Seven,
        Rank::Eight,
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

/// A betting action taken by the player holding the turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Fold,
    Check,
    Call,
    Bet,
    Raise,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Fold => "fold",
            Action::Check => "check",
            Action::Call => "call",
            Action::Bet => "bet",
            Action::Raise => "raise",
        };
        f.write_str(name)
    }
}

/// A preset applied automatically when a seat's turn arrives without
/// manual input. Wire names match the client vocabulary exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutomaticAction {
    #[serde(rename = "fold")]
    Fold,
    #[serde(rename = "check/fold")]
    CheckFold,
    #[serde(rename = "check")]
    Check,
    #[serde(rename = "call")]
    Call,
    #[serde(rename = "call any")]
    CallAny,
    #[serde(rename = "all-in")]
    AllIn,
}

/// The blind/ante structure a table enforces each hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForcedBets {
    pub ante: u64,
    pub small_blind: u64,
    pub big_blind: u64,
}

impl Default for ForcedBets {
    fn default() -> Self {
        Self {
            ante: 0,
            small_blind: 1,
            big_blind: 2,
        }
    }
}

/// A seat reservation: the identity that claimed the seat, later upgraded
/// with a display profile when the player sits down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub uid: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub avatar_style: Option<String>,
}

impl Reservation {
    pub fn for_uid(uid: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            name: None,
            avatar_style: None,
        }
    }
}

/// Chip state of an occupied seat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatState {
    pub total_chips: u64,
    pub stack: u64,
    pub bet_size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChipRange {
    pub min: u64,
    pub max: u64,
}

/// Legal actions for the player to act, with the bet range when betting or
/// raising is among them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegalActions {
    pub actions: Vec<Action>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub chip_range: Option<ChipRange>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pot {
    pub size: u64,
    pub eligible_players: Vec<usize>,
}

/// One pot winner at showdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub seat_index: usize,
    pub hole_cards: Vec<Card>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub ranking: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Round {
    Preflop,
    Flop,
    Turn,
    River,
}

/// A seat's automatic-action status, computed per recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomaticActionsInfo {
    pub automatic_action: Option<AutomaticAction>,
    pub can_set_automatic_actions: bool,
    pub legal_automatic_actions: Vec<AutomaticAction>,
}

/// Full serialized table state.
///
/// Hand-scoped fields are present only while a hand is in progress;
/// `legalActions` and `playerToAct` additionally require an open betting
/// round; `winners` is present only between hands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableSnapshot {
    pub id: String,
    pub reservations: Vec<Option<Reservation>>,
    pub seats: Vec<Option<SeatState>>,
    pub forced_bets: ForcedBets,
    pub is_hand_in_progress: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_betting_round_in_progress: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub are_betting_rounds_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub hand_players: Option<Vec<Option<SeatState>>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub button: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub legal_actions: Option<LegalActions>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub player_to_act: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub num_active_players: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pots: Option<Vec<Pot>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub round_of_betting: Option<Round>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub community_cards: Option<Vec<Card>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub winners: Option<Vec<Vec<Winner>>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn card_serializes_with_short_rank_names() {
        let card = Card {
            rank: Rank::Ten,
            suit: Suit::Spades,
        };
        assert_eq!(
            serde_json::to_value(card).unwrap(),
            json!({"rank": "T", "suit": "spades"})
        );
    }

    #[test]
    fn automatic_action_wire_names() {
        assert_eq!(
            serde_json::to_value(AutomaticAction::CheckFold).unwrap(),
            json!("check/fold")
        );
        assert_eq!(
            serde_json::to_value(AutomaticAction::CallAny).unwrap(),
            json!("call any")
        );
        let parsed: AutomaticAction = serde_json::from_value(json!("call any")).unwrap();
        assert_eq!(parsed, AutomaticAction::CallAny);
    }

    #[test]
    fn snapshot_omits_hand_fields_between_hands() {
        let snapshot = TableSnapshot {
            id: "t1".into(),
            reservations: vec![None; 9],
            seats: vec![None; 9],
            forced_bets: ForcedBets::default(),
            is_hand_in_progress: false,
            is_betting_round_in_progress: None,
            are_betting_rounds_completed: None,
            hand_players: None,
            button: None,
            legal_actions: None,
            player_to_act: None,
            num_active_players: None,
            pots: None,
            round_of_betting: None,
            community_cards: None,
            winners: Some(vec![]),
        };
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["isHandInProgress"], false);
        assert!(value.get("playerToAct").is_none());
        assert!(value.get("communityCards").is_none());
        assert!(value.get("winners").is_some());
    }

    #[test]
    fn reservation_omits_profile_until_upgraded() {
        let value = serde_json::to_value(Reservation::for_uid("u1")).unwrap();
        assert_eq!(value, json!({"uid": "u1"}));
    }
}
