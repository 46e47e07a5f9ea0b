use crate::{Card, Rank};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandType {
    Single,
    Double,
    Triple,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandType {
    /// Strength ladder for five-card hands. Singles, doubles and triples sit
    /// at zero; they never meet a five-card hand because sizes must match.
    pub fn ladder(&self) -> u8 {
        match self {
            HandType::Single | HandType::Double | HandType::Triple => 0,
            HandType::Straight => 1,
            HandType::Flush => 2,
            HandType::FullHouse => 3,
            HandType::FourOfAKind => 4,
            HandType::StraightFlush => 5,
            HandType::RoyalFlush => 6,
        }
    }

    pub fn card_count(&self) -> usize {
        match self {
            HandType::Single => 1,
            HandType::Double => 2,
            HandType::Triple => 3,
            _ => 5,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HandType::Single => "single",
            HandType::Double => "double",
            HandType::Triple => "triple",
            HandType::Straight => "straight",
            HandType::Flush => "flush",
            HandType::FullHouse => "full_house",
            HandType::FourOfAKind => "four_of_a_kind",
            HandType::StraightFlush => "straight_flush",
            HandType::RoyalFlush => "royal_flush",
        }
    }
}

impl fmt::Display for HandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn counts_by_rank(cards: &[Card]) -> BTreeMap<Rank, usize> {
    let mut counts = BTreeMap::new();
    for card in cards.iter() {
        *counts.entry(card.rank).or_insert(0) += 1;
    }
    counts
}

fn all_same_rank(cards: &[Card]) -> bool {
    cards.windows(2).all(|pair| pair[0].rank == pair[1].rank)
}

fn is_consecutive(sorted: &[Card]) -> bool {
    sorted
        .windows(2)
        .all(|pair| pair[1].rank.order() == pair[0].rank.order() + 1)
}

/// Classifies a proposed play, or `None` when it is not a legal shape.
pub fn classify(cards: &[Card]) -> Option<HandType> {
    match cards.len() {
        1 => Some(HandType::Single),
        2 if all_same_rank(cards) => Some(HandType::Double),
        3 if all_same_rank(cards) => Some(HandType::Triple),
        5 => classify_five(cards),
        _ => None,
    }
}

fn classify_five(cards: &[Card]) -> Option<HandType> {
    let mut sorted = cards.to_vec();
    sorted.sort();
    let flush = sorted.iter().all(|card| card.suit == sorted[0].suit);
    let straight = is_consecutive(&sorted);
    let counts = counts_by_rank(&sorted);

    if straight && flush {
        if sorted[4].rank == Rank::Ace && sorted[0].rank == Rank::Ten {
            return Some(HandType::RoyalFlush);
        }
        return Some(HandType::StraightFlush);
    }
    if counts.values().any(|count| *count == 4) {
        return Some(HandType::FourOfAKind);
    }
    if counts.values().any(|count| *count == 3) && counts.values().any(|count| *count == 2) {
        return Some(HandType::FullHouse);
    }
    if flush {
        return Some(HandType::Flush);
    }
    if straight {
        return Some(HandType::Straight);
    }
    None
}

/// The rank appearing most often; the triple of a full house, the quad of
/// four of a kind.
fn dominant_rank(cards: &[Card]) -> Option<Rank> {
    counts_by_rank(cards)
        .into_iter()
        .max_by_key(|(rank, count)| (*count, *rank))
        .map(|(rank, _)| rank)
}

pub fn highest_card(cards: &[Card]) -> Option<Card> {
    cards.iter().max().copied()
}

/// Whether `candidate` beats `incumbent` when the trick requires `required`.
pub fn beats(candidate: &[Card], incumbent: &[Card], required: HandType) -> bool {
    if candidate.len() != incumbent.len() {
        return false;
    }
    let (Some(next), Some(prev)) = (classify(candidate), classify(incumbent)) else {
        return false;
    };
    if next != required || prev != required {
        return false;
    }
    match required {
        HandType::Single | HandType::Double | HandType::Triple => {
            highest_card(candidate) > highest_card(incumbent)
        }
        _ => beats_five(candidate, incumbent, next, prev),
    }
}

fn beats_five(candidate: &[Card], incumbent: &[Card], next: HandType, prev: HandType) -> bool {
    if next.ladder() != prev.ladder() {
        return next.ladder() > prev.ladder();
    }
    match next {
        HandType::Flush => candidate[0].suit > incumbent[0].suit,
        HandType::Straight | HandType::StraightFlush | HandType::RoyalFlush => {
            highest_card(candidate) > highest_card(incumbent)
        }
        HandType::FullHouse | HandType::FourOfAKind => {
            dominant_rank(candidate) > dominant_rank(incumbent)
        }
        HandType::Single | HandType::Double | HandType::Triple => false,
    }
}
