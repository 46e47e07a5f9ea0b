use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod bot;
pub mod hand;
pub mod room;

pub use bot::{decide, legal_plays, BotDecision};
pub use hand::{beats, classify, highest_card, HandType};
pub use room::{
    BotDifficulty, GameError, GameMode, GameResult, GameRoom, PlayedHand, Player, PlayerId,
    RoomState, Seat, TableTheme, TurnAction, TurnReport,
};

pub const DECK_SIZE: usize = 52;
pub const TABLE_SIZE: usize = 4;
pub const HAND_SIZE: usize = DECK_SIZE / TABLE_SIZE;

/// Suits in tiebreak order, diamonds lowest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Suit {
    Diamonds = 1,
    Clubs = 2,
    Hearts = 3,
    Spades = 4,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Diamonds, Suit::Clubs, Suit::Hearts, Suit::Spades];

    pub fn order(&self) -> u8 {
        *self as u8
    }

    fn from_char(ch: char) -> Option<Self> {
        match ch {
            'D' => Some(Suit::Diamonds),
            'C' => Some(Suit::Clubs),
            'H' => Some(Suit::Hearts),
            'S' => Some(Suit::Spades),
            _ => None,
        }
    }

    fn to_char(self) -> char {
        match self {
            Suit::Diamonds => 'D',
            Suit::Clubs => 'C',
            Suit::Hearts => 'H',
            Suit::Spades => 'S',
        }
    }
}

/// Ranks in game order: three is the lowest card, two the highest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Rank {
    Three = 1,
    Four = 2,
    Five = 3,
    Six = 4,
    Seven = 5,
    Eight = 6,
    Nine = 7,
    Ten = 8,
    Jack = 9,
    Queen = 10,
    King = 11,
    Ace = 12,
    Two = 13,
}

impl Rank {
    pub const ALL: [Rank; 13] = [
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
        Rank::Two,
    ];

    /// Position in the 13-step ladder, 1 for three up to 13 for two.
    pub fn order(&self) -> u8 {
        *self as u8
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "3" => Some(Rank::Three),
            "4" => Some(Rank::Four),
            "5" => Some(Rank::Five),
            "6" => Some(Rank::Six),
            "7" => Some(Rank::Seven),
            "8" => Some(Rank::Eight),
            "9" => Some(Rank::Nine),
            "10" => Some(Rank::Ten),
            "J" => Some(Rank::Jack),
            "Q" => Some(Rank::Queen),
            "K" => Some(Rank::King),
            "A" => Some(Rank::Ace),
            "2" => Some(Rank::Two),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
            Rank::Two => "2",
        }
    }
}

/// A playing card. The derived ordering is the canonical game order: rank
/// first, suit as tiebreak. On the wire a card is its code, e.g. `"10S"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Card {
    pub rank: Rank,
    pub suit: Suit,
}

pub const THREE_OF_DIAMONDS: Card = Card {
    rank: Rank::Three,
    suit: Suit::Diamonds,
};

impl Card {
    pub fn new(rank: Rank, suit: Suit) -> Self {
        Card { rank, suit }
    }

    pub fn code(&self) -> String {
        format!("{}{}", self.rank.as_str(), self.suit.to_char())
    }

    pub fn from_code(code: &str) -> Option<Self> {
        let suit_char = code.chars().last()?;
        let suit = Suit::from_char(suit_char)?;
        let rank = Rank::parse(&code[..code.len() - suit_char.len_utf8()])?;
        Some(Card { rank, suit })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<Card> for String {
    fn from(card: Card) -> Self {
        card.code()
    }
}

impl TryFrom<String> for Card {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Card::from_code(&value).ok_or_else(|| format!("unknown card code {value:?}"))
    }
}

pub fn standard_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(DECK_SIZE);
    for suit in Suit::ALL.iter() {
        for rank in Rank::ALL.iter() {
            deck.push(Card::new(*rank, *suit));
        }
    }
    deck
}

pub fn shuffled_deck(seed: u64) -> Vec<Card> {
    let mut deck = standard_deck();
    let mut rng = StdRng::seed_from_u64(seed);
    deck.shuffle(&mut rng);
    deck
}

/// Deals a freshly shuffled deck round-robin into one sorted hand per seat.
pub fn deal(seed: u64) -> Vec<Vec<Card>> {
    let deck = shuffled_deck(seed);
    let mut hands = vec![Vec::with_capacity(HAND_SIZE); TABLE_SIZE];
    for (i, card) in deck.into_iter().enumerate() {
        hands[i % TABLE_SIZE].push(card);
    }
    for hand in hands.iter_mut() {
        sort_hand(hand);
    }
    hands
}

pub fn sort_hand(hand: &mut [Card]) {
    hand.sort();
}
