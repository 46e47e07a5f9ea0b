//! Decision making for computer-controlled seats.
//!
//! `decide` is pure apart from the random source it is handed: it reads the
//! room, never mutates it, and answers with the cards to play or a pass. The
//! caller feeds the answer back through the same `play_cards`/`pass_turn`
//! path a human uses.

use crate::hand::{beats, classify, HandType};
use crate::room::{BotDifficulty, GameRoom};
use crate::{Card, Rank, THREE_OF_DIAMONDS};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

const EASY_PASS_CHANCE: f64 = 0.3;
const TWO_PREMIUM: u32 = 100;
const AGGRESSION_FACTOR: f64 = 1.5;
const CLOSE_TO_WINNING: usize = 3;
const OPPONENT_CLOSE_TO_WINNING: usize = 2;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BotDecision {
    Pass,
    Play(Vec<Card>),
}

pub fn decide<R: Rng + ?Sized>(
    room: &GameRoom,
    bot_id: &str,
    difficulty: BotDifficulty,
    rng: &mut R,
) -> BotDecision {
    let Some(bot) = room.player(bot_id) else {
        return BotDecision::Pass;
    };
    let mut hand = bot.cards.clone();
    hand.sort();

    if room.is_highest_rule_active && room.highest_rule_target_id.as_deref() == Some(bot_id) {
        let forced = room
            .player_index(bot_id)
            .and_then(|idx| room.forced_card(idx));
        if let Some(card) = forced {
            return BotDecision::Play(vec![card]);
        }
    }

    let (Some(last), Some(required)) = (&room.last_played_hand, room.current_hand_type) else {
        if !room.opening_played && hand.contains(&THREE_OF_DIAMONDS) {
            return BotDecision::Play(vec![THREE_OF_DIAMONDS]);
        }
        return match hand.first() {
            Some(lowest) => BotDecision::Play(vec![*lowest]),
            None => BotDecision::Pass,
        };
    };

    let mut options = legal_plays(&hand, &last.cards, required);
    if options.is_empty() {
        return BotDecision::Pass;
    }
    options.sort_by_key(|option| strength(option));

    match difficulty {
        BotDifficulty::Easy => {
            if rng.gen_bool(EASY_PASS_CHANCE) {
                return BotDecision::Pass;
            }
            match options.choose(rng) {
                Some(option) => BotDecision::Play(option.clone()),
                None => BotDecision::Pass,
            }
        }
        BotDifficulty::Medium => BotDecision::Play(options.swap_remove(0)),
        BotDifficulty::Hard => {
            let someone_close = room
                .players
                .iter()
                .any(|player| player.card_count <= OPPONENT_CLOSE_TO_WINNING);
            if hand.len() <= CLOSE_TO_WINNING || someone_close {
                let bar = strength(&last.cards) as f64 * AGGRESSION_FACTOR;
                if let Some(strongest) = options.iter().rev().find(|o| strength(o) as f64 > bar) {
                    return BotDecision::Play(strongest.clone());
                }
            }
            BotDecision::Play(options.swap_remove(0))
        }
    }
}

/// Rough value of a set of cards. Twos carry a heavy premium so bots hold on
/// to them.
pub fn strength(cards: &[Card]) -> u32 {
    cards
        .iter()
        .map(|card| {
            let premium = if card.rank == Rank::Two { TWO_PREMIUM } else { 0 };
            card.rank.order() as u32 + premium
        })
        .sum()
}

/// Every play of the required type from `hand` that beats `incumbent`.
pub fn legal_plays(hand: &[Card], incumbent: &[Card], required: HandType) -> Vec<Vec<Card>> {
    let candidates: Vec<Vec<Card>> = match required {
        HandType::Single => hand.iter().map(|card| vec![*card]).collect(),
        HandType::Double => same_rank_sets(hand, 2),
        HandType::Triple => same_rank_sets(hand, 3),
        _ => combinations(hand, 5)
            .into_iter()
            .filter(|combo| classify(combo) == Some(required))
            .collect(),
    };
    candidates
        .into_iter()
        .filter(|candidate: &Vec<Card>| beats(candidate, incumbent, required))
        .collect()
}

fn same_rank_sets(hand: &[Card], size: usize) -> Vec<Vec<Card>> {
    let mut by_rank: BTreeMap<Rank, Vec<Card>> = BTreeMap::new();
    for card in hand {
        by_rank.entry(card.rank).or_default().push(*card);
    }
    by_rank
        .values()
        .filter(|group| group.len() >= size)
        .flat_map(|group| combinations(group, size))
        .collect()
}

// At most C(13, 5) = 1287 subsets for a full hand.
fn combinations(cards: &[Card], size: usize) -> Vec<Vec<Card>> {
    if size == 0 {
        return vec![Vec::new()];
    }
    if cards.len() < size {
        return Vec::new();
    }
    let mut out = Vec::new();
    for (i, first) in cards.iter().enumerate() {
        for mut rest in combinations(&cards[i + 1..], size - 1) {
            rest.insert(0, *first);
            out.push(rest);
        }
    }
    out
}
