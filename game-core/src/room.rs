use crate::hand::{beats, classify, highest_card, HandType};
use crate::{deal, Card, TABLE_SIZE, THREE_OF_DIAMONDS};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Opaque, stable player identifier handed in by the transport.
pub type PlayerId = String;

pub const DEFAULT_TURN_TIMER_SECS: u32 = 30;
pub const WIN_XP: u32 = 50;
pub const PARTICIPATION_XP: u32 = 10;

const BOT_NAMES: [&str; 4] = ["Alice Bot", "Bob Bot", "Charlie Bot", "Diana Bot"];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomState {
    Waiting,
    Dealing,
    Playing,
    RoundReset,
    Finished,
}

impl fmt::Display for RoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RoomState::Waiting => "waiting",
            RoomState::Dealing => "dealing",
            RoomState::Playing => "playing",
            RoomState::RoundReset => "round_reset",
            RoomState::Finished => "finished",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BotDifficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    #[default]
    Online,
    Local,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableTheme {
    #[default]
    Classic,
    Green,
    Blue,
    Purple,
    Gold,
}

/// Fixed seating around the table, in turn order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seat {
    Bottom,
    Left,
    Top,
    Right,
}

impl Seat {
    pub const ALL: [Seat; TABLE_SIZE] = [Seat::Bottom, Seat::Left, Seat::Top, Seat::Right];
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("room is full")]
    RoomFull,
    #[error("room is not accepting players")]
    RoomNotJoinable,
    #[error("not allowed while the room is {0}")]
    InvalidState(RoomState),
    #[error("player is not seated in this room")]
    PlayerNotSeated,
    #[error("not your turn")]
    NotYourTurn,
    #[error("you don't have these cards")]
    CardsNotOwned,
    #[error("invalid hand type")]
    InvalidHandType,
    #[error("must play {0}")]
    MustFollowType(HandType),
    #[error("cards are not strong enough")]
    TooWeak,
    #[error("must include the three of diamonds in the first play")]
    MustLeadWithConstraint,
    #[error("cannot pass")]
    CannotPass,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub is_bot: bool,
    pub bot_difficulty: Option<BotDifficulty>,
    pub is_ready: bool,
    pub cards: Vec<Card>,
    pub card_count: usize,
    pub has_passed: bool,
    pub is_current_turn: bool,
    pub seat: Seat,
}

impl Player {
    fn human(id: PlayerId, name: String, seat: Seat) -> Self {
        Player {
            id,
            name,
            is_bot: false,
            bot_difficulty: None,
            is_ready: true,
            cards: Vec::new(),
            card_count: 0,
            has_passed: false,
            is_current_turn: false,
            seat,
        }
    }

    fn bot(id: PlayerId, name: String, seat: Seat, difficulty: BotDifficulty) -> Self {
        Player {
            is_bot: true,
            bot_difficulty: Some(difficulty),
            ..Player::human(id, name, seat)
        }
    }

    pub fn holds(&self, card: &Card) -> bool {
        self.cards.contains(card)
    }

    fn set_cards(&mut self, cards: Vec<Card>) {
        self.card_count = cards.len();
        self.cards = cards;
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayedHand {
    pub player_id: PlayerId,
    pub cards: Vec<Card>,
    pub hand_type: HandType,
    pub timestamp: u64,
}

/// What a finished game reports for each player, for an external stats store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub player_id: PlayerId,
    pub position: usize,
    pub is_win: bool,
    pub xp_earned: u32,
    pub game_mode: GameMode,
    pub bot_difficulty: BotDifficulty,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnAction {
    Played(PlayedHand),
    /// A pass by the highest-rule target, converted into their highest card.
    ForcedPlay(PlayedHand),
    Passed,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub player_id: PlayerId,
    pub action: TurnAction,
    pub round_reset: bool,
    pub winner_id: Option<PlayerId>,
    pub highest_rule_target: Option<PlayerId>,
    pub next_player_id: Option<PlayerId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRoom {
    pub id: String,
    pub code: String,
    pub host_id: PlayerId,
    pub players: Vec<Player>,
    pub state: RoomState,
    pub current_turn_index: usize,
    pub current_hand_type: Option<HandType>,
    pub last_played_hand: Option<PlayedHand>,
    pub played_hands_history: Vec<PlayedHand>,
    pub round_starter_index: usize,
    pub passed_players: Vec<PlayerId>,
    pub winner_id: Option<PlayerId>,
    pub turn_timer_secs: u32,
    pub turn_start_time: Option<u64>,
    pub is_highest_rule_active: bool,
    pub highest_rule_target_id: Option<PlayerId>,
    pub bot_difficulty: BotDifficulty,
    pub game_mode: GameMode,
    pub table_theme: TableTheme,
    /// Cards that left a hand this game.
    pub cards_played: usize,
    /// Whether any hand has been played since the deal.
    pub opening_played: bool,
    #[serde(skip)]
    next_bot_serial: usize,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

impl GameRoom {
    pub fn new(
        id: String,
        code: String,
        host_id: PlayerId,
        host_name: String,
        game_mode: GameMode,
        bot_difficulty: BotDifficulty,
    ) -> Self {
        let host = Player::human(host_id.clone(), host_name, Seat::Bottom);
        GameRoom {
            id,
            code,
            host_id,
            players: vec![host],
            state: RoomState::Waiting,
            current_turn_index: 0,
            current_hand_type: None,
            last_played_hand: None,
            played_hands_history: Vec::new(),
            round_starter_index: 0,
            passed_players: Vec::new(),
            winner_id: None,
            turn_timer_secs: DEFAULT_TURN_TIMER_SECS,
            turn_start_time: None,
            is_highest_rule_active: false,
            highest_rule_target_id: None,
            bot_difficulty,
            game_mode,
            table_theme: TableTheme::default(),
            cards_played: 0,
            opening_played: false,
            next_bot_serial: 0,
        }
    }

    pub fn with_turn_timer(mut self, secs: u32) -> Self {
        self.turn_timer_secs = secs;
        self
    }

    pub fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|player| player.id == player_id)
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|player| player.id == player_id)
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= TABLE_SIZE
    }

    pub fn has_humans(&self) -> bool {
        self.players.iter().any(|player| !player.is_bot)
    }

    pub fn current_player(&self) -> Option<&Player> {
        match self.state {
            RoomState::Playing => self.players.get(self.current_turn_index),
            _ => None,
        }
    }

    /// The bot whose turn it is, if the game is waiting on one.
    pub fn bot_to_act(&self) -> Option<&Player> {
        self.current_player().filter(|player| player.is_bot)
    }

    pub fn cards_in_hands(&self) -> usize {
        self.players.iter().map(|player| player.cards.len()).sum()
    }

    fn seat_player(&mut self, player: Player) {
        self.players.push(player);
        self.players.sort_by_key(|player| player.seat);
    }

    fn free_seat(&self) -> Option<Seat> {
        Seat::ALL
            .into_iter()
            .find(|seat| self.players.iter().all(|player| player.seat != *seat))
    }

    /// The error `join` would return for this player, without seating them.
    pub fn can_accept(&self, player_id: &str) -> Result<(), GameError> {
        if self.player_index(player_id).is_some() {
            return Ok(());
        }
        if self.state != RoomState::Waiting {
            return Err(GameError::RoomNotJoinable);
        }
        self.free_seat().map(|_| ()).ok_or(GameError::RoomFull)
    }

    /// Seats a player. Joining again with an id already seated is a no-op.
    pub fn join(&mut self, player_id: PlayerId, name: String) -> Result<(), GameError> {
        self.can_accept(&player_id)?;
        if self.player_index(&player_id).is_some() {
            return Ok(());
        }
        let seat = self.free_seat().ok_or(GameError::RoomFull)?;
        self.seat_player(Player::human(player_id, name, seat));
        Ok(())
    }

    pub fn add_bot(&mut self) -> Result<PlayerId, GameError> {
        if self.state != RoomState::Waiting {
            return Err(GameError::InvalidState(self.state));
        }
        let seat = self.free_seat().ok_or(GameError::RoomFull)?;
        let ordinal = self.players.iter().filter(|player| player.is_bot).count();
        let name = BOT_NAMES
            .get(ordinal)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("Bot {}", ordinal + 1));
        self.next_bot_serial += 1;
        let id = format!("bot-{}", self.next_bot_serial);
        self.seat_player(Player::bot(id.clone(), name, seat, self.bot_difficulty));
        Ok(id)
    }

    /// Removes a player and hands the host role to the next seat. A game in
    /// progress cannot continue short-handed, so it is abandoned and the room
    /// goes back to waiting.
    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let idx = self.player_index(player_id)?;
        let removed = self.players.remove(idx);
        if self.players.is_empty() {
            return Some(removed);
        }
        if self.host_id == removed.id {
            let next_host = self
                .players
                .iter()
                .filter(|player| !player.is_bot)
                .find(|player| player.seat > removed.seat)
                .or_else(|| self.players.iter().find(|player| !player.is_bot))
                .unwrap_or(&self.players[idx % self.players.len()]);
            self.host_id = next_host.id.clone();
        }
        if matches!(
            self.state,
            RoomState::Dealing | RoomState::Playing | RoomState::RoundReset
        ) {
            self.abandon_game();
        }
        Some(removed)
    }

    fn abandon_game(&mut self) {
        for player in self.players.iter_mut() {
            player.set_cards(Vec::new());
            player.has_passed = false;
            player.is_current_turn = false;
        }
        self.clear_trick();
        self.played_hands_history.clear();
        self.current_turn_index = 0;
        self.round_starter_index = 0;
        self.winner_id = None;
        self.turn_start_time = None;
        self.cards_played = 0;
        self.opening_played = false;
        self.state = RoomState::Waiting;
    }

    pub fn set_difficulty(&mut self, difficulty: BotDifficulty) -> Result<(), GameError> {
        if self.state != RoomState::Waiting {
            return Err(GameError::InvalidState(self.state));
        }
        self.bot_difficulty = difficulty;
        for player in self.players.iter_mut().filter(|player| player.is_bot) {
            player.bot_difficulty = Some(difficulty);
        }
        Ok(())
    }

    pub fn set_table_theme(&mut self, theme: TableTheme) {
        self.table_theme = theme;
    }

    /// Fills empty seats with bots, deals, and hands the lead to whoever holds
    /// the three of diamonds.
    pub fn start(&mut self, seed: u64) -> Result<(), GameError> {
        if self.state != RoomState::Waiting {
            return Err(GameError::InvalidState(self.state));
        }
        while !self.is_full() {
            self.add_bot()?;
        }

        self.state = RoomState::Dealing;
        for (player, hand) in self.players.iter_mut().zip(deal(seed)) {
            player.set_cards(hand);
            player.has_passed = false;
            player.is_current_turn = false;
        }
        self.clear_trick();
        self.played_hands_history.clear();
        self.winner_id = None;
        self.cards_played = 0;
        self.opening_played = false;

        let starter = self
            .players
            .iter()
            .position(|player| player.holds(&THREE_OF_DIAMONDS))
            .unwrap_or(0);
        self.current_turn_index = starter;
        self.round_starter_index = starter;
        self.players[starter].is_current_turn = true;
        self.turn_start_time = Some(now_millis());
        self.state = RoomState::Playing;
        Ok(())
    }

    fn acting_index(&self, player_id: &str) -> Result<usize, GameError> {
        if self.state != RoomState::Playing {
            return Err(GameError::InvalidState(self.state));
        }
        let idx = self
            .player_index(player_id)
            .ok_or(GameError::PlayerNotSeated)?;
        if idx != self.current_turn_index {
            return Err(GameError::NotYourTurn);
        }
        Ok(idx)
    }

    fn opening_lead_pending(&self, idx: usize) -> bool {
        !self.opening_played && self.players[idx].holds(&THREE_OF_DIAMONDS)
    }

    pub fn play_cards(&mut self, player_id: &str, cards: &[Card]) -> Result<TurnReport, GameError> {
        let idx = self.acting_index(player_id)?;
        let hand_type = self.validate_play(idx, cards)?;
        Ok(self.apply_play(idx, cards, hand_type, false))
    }

    fn validate_play(&self, idx: usize, cards: &[Card]) -> Result<HandType, GameError> {
        let hand = &self.players[idx].cards;
        for (i, card) in cards.iter().enumerate() {
            if !hand.contains(card) || cards[..i].contains(card) {
                return Err(GameError::CardsNotOwned);
            }
        }
        let hand_type = classify(cards).ok_or(GameError::InvalidHandType)?;
        if self.opening_lead_pending(idx) && !cards.contains(&THREE_OF_DIAMONDS) {
            return Err(GameError::MustLeadWithConstraint);
        }
        if let (Some(last), Some(required)) = (&self.last_played_hand, self.current_hand_type) {
            if hand_type != required {
                return Err(GameError::MustFollowType(required));
            }
            if !beats(cards, &last.cards, required) {
                return Err(GameError::TooWeak);
            }
        }
        Ok(hand_type)
    }

    fn apply_play(
        &mut self,
        idx: usize,
        cards: &[Card],
        hand_type: HandType,
        forced: bool,
    ) -> TurnReport {
        let player = &mut self.players[idx];
        let remaining: Vec<Card> = player
            .cards
            .iter()
            .filter(|card| !cards.contains(card))
            .copied()
            .collect();
        player.set_cards(remaining);
        player.is_current_turn = false;
        let player_id = player.id.clone();
        let emptied = player.cards.is_empty();

        let played = PlayedHand {
            player_id: player_id.clone(),
            cards: cards.to_vec(),
            hand_type,
            timestamp: now_millis(),
        };
        self.last_played_hand = Some(played.clone());
        self.played_hands_history.push(played.clone());
        self.current_hand_type = Some(hand_type);
        self.cards_played += cards.len();
        self.opening_played = true;
        self.clear_passes();

        let action = if forced {
            TurnAction::ForcedPlay(played)
        } else {
            TurnAction::Played(played)
        };

        if emptied {
            self.finish(player_id.clone());
            return TurnReport {
                player_id: player_id.clone(),
                action,
                round_reset: false,
                winner_id: Some(player_id),
                highest_rule_target: None,
                next_player_id: None,
            };
        }

        self.advance_turn();
        TurnReport {
            player_id,
            action,
            round_reset: false,
            winner_id: None,
            highest_rule_target: self.highest_rule_target_id.clone(),
            next_player_id: self.current_player().map(|player| player.id.clone()),
        }
    }

    fn finish(&mut self, winner_id: PlayerId) {
        for player in self.players.iter_mut() {
            player.is_current_turn = false;
        }
        self.is_highest_rule_active = false;
        self.highest_rule_target_id = None;
        self.winner_id = Some(winner_id);
        self.state = RoomState::Finished;
    }

    /// Passes the turn. The highest-rule target cannot pass while their top
    /// card is playable; the pass turns into that play instead. When the top
    /// card cannot follow the trick (a pair on the table, or a single it does
    /// not beat) the pass is an ordinary pass, so the room never stalls.
    pub fn pass_turn(&mut self, player_id: &str) -> Result<TurnReport, GameError> {
        let idx = self.acting_index(player_id)?;
        if self.opening_lead_pending(idx) {
            return Err(GameError::CannotPass);
        }

        if self.is_highest_rule_active
            && self.highest_rule_target_id.as_deref() == Some(player_id)
        {
            if let Some(highest) = self.forced_card(idx) {
                return Ok(self.apply_play(idx, &[highest], HandType::Single, true));
            }
        }

        let player = &mut self.players[idx];
        player.has_passed = true;
        player.is_current_turn = false;
        let player_id = player.id.clone();
        self.passed_players.push(player_id.clone());

        let active: Vec<usize> = self
            .players
            .iter()
            .enumerate()
            .filter(|(_, player)| !self.passed_players.contains(&player.id))
            .map(|(i, _)| i)
            .collect();
        if let [leader] = active[..] {
            self.reset_round(leader);
            return Ok(TurnReport {
                player_id,
                action: TurnAction::Passed,
                round_reset: true,
                winner_id: None,
                highest_rule_target: None,
                next_player_id: Some(self.players[leader].id.clone()),
            });
        }

        self.advance_turn();
        Ok(TurnReport {
            player_id,
            action: TurnAction::Passed,
            round_reset: false,
            winner_id: None,
            highest_rule_target: self.highest_rule_target_id.clone(),
            next_player_id: self.current_player().map(|player| player.id.clone()),
        })
    }

    /// The card a highest-rule target is forced to play, when playing it is
    /// legal right now.
    pub fn forced_card(&self, idx: usize) -> Option<Card> {
        let highest = highest_card(&self.players.get(idx)?.cards)?;
        match (&self.last_played_hand, self.current_hand_type) {
            (Some(last), Some(required)) => {
                let legal = required == HandType::Single
                    && beats(&[highest], &last.cards, HandType::Single);
                legal.then_some(highest)
            }
            _ => Some(highest),
        }
    }

    fn reset_round(&mut self, leader: usize) {
        self.state = RoomState::RoundReset;
        self.clear_trick();
        self.played_hands_history.clear();
        for player in self.players.iter_mut() {
            player.is_current_turn = false;
        }
        self.current_turn_index = leader;
        self.round_starter_index = leader;
        self.players[leader].is_current_turn = true;
        self.turn_start_time = Some(now_millis());
        self.state = RoomState::Playing;
    }

    fn clear_trick(&mut self) {
        self.current_hand_type = None;
        self.last_played_hand = None;
        self.clear_passes();
        self.is_highest_rule_active = false;
        self.highest_rule_target_id = None;
    }

    fn clear_passes(&mut self) {
        self.passed_players.clear();
        for player in self.players.iter_mut() {
            player.has_passed = false;
        }
    }

    fn advance_turn(&mut self) {
        let count = self.players.len();
        let mut next = (self.current_turn_index + 1) % count;
        let mut attempts = 0;
        while self.passed_players.contains(&self.players[next].id) && attempts < count {
            next = (next + 1) % count;
            attempts += 1;
        }
        self.current_turn_index = next;
        for (i, player) in self.players.iter_mut().enumerate() {
            player.is_current_turn = i == next;
        }
        self.turn_start_time = Some(now_millis());

        let previous = (next + count - 1) % count;
        if self.players[previous].cards.len() == 1 {
            self.is_highest_rule_active = true;
            self.highest_rule_target_id = Some(self.players[next].id.clone());
        } else {
            self.is_highest_rule_active = false;
            self.highest_rule_target_id = None;
        }
    }

    /// The room as `viewer` may see it: other hands are emptied (their
    /// `card_count` stays) and the history keeps the last `history_cap` plays.
    pub fn redacted_for(&self, viewer: &str, history_cap: usize) -> GameRoom {
        let mut view = self.clone();
        for player in view.players.iter_mut().filter(|player| player.id != viewer) {
            player.cards.clear();
        }
        let skip = view.played_hands_history.len().saturating_sub(history_cap);
        view.played_hands_history.drain(..skip);
        view
    }

    /// Finishing order of a completed game: the winner first, then by fewest
    /// cards left, ties broken by seat.
    pub fn results(&self) -> Vec<GameResult> {
        let Some(winner_id) = self.winner_id.as_ref() else {
            return Vec::new();
        };
        if self.state != RoomState::Finished {
            return Vec::new();
        }
        let mut order: Vec<&Player> = self.players.iter().collect();
        order.sort_by_key(|player| (&player.id != winner_id, player.cards.len(), player.seat));
        order
            .into_iter()
            .enumerate()
            .map(|(i, player)| {
                let is_win = &player.id == winner_id;
                GameResult {
                    player_id: player.id.clone(),
                    position: i + 1,
                    is_win,
                    xp_earned: if is_win { WIN_XP } else { PARTICIPATION_XP },
                    game_mode: self.game_mode,
                    bot_difficulty: self.bot_difficulty,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{standard_deck, DECK_SIZE};

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes
            .iter()
            .map(|code| Card::from_code(code).unwrap())
            .collect()
    }

    fn new_room() -> GameRoom {
        GameRoom::new(
            "room-1".to_string(),
            "ABC234".to_string(),
            "host".to_string(),
            "Host".to_string(),
            GameMode::Online,
            BotDifficulty::Medium,
        )
    }

    fn started_room(seed: u64) -> GameRoom {
        let mut room = new_room();
        room.start(seed).unwrap();
        room
    }

    /// Replaces the dealt hands and hands the turn to `turn`. Unlisted cards
    /// count as already played.
    fn rig(room: &mut GameRoom, hands: &[&[&str]], turn: usize) {
        for (player, codes) in room.players.iter_mut().zip(hands) {
            let mut hand = cards(codes);
            hand.sort();
            player.set_cards(hand);
            player.is_current_turn = false;
        }
        room.cards_played = DECK_SIZE - room.cards_in_hands();
        room.current_turn_index = turn;
        room.players[turn].is_current_turn = true;
    }

    fn id(room: &GameRoom, idx: usize) -> String {
        room.players[idx].id.clone()
    }

    fn assert_consistent(room: &GameRoom) {
        assert_eq!(room.cards_in_hands() + room.cards_played, DECK_SIZE);
        if room.state == RoomState::Playing {
            assert_eq!(
                room.players.iter().filter(|p| p.is_current_turn).count(),
                1
            );
        }
        for passed in room.passed_players.iter() {
            assert!(room.player(passed).unwrap().has_passed);
        }
        assert_eq!(
            room.current_hand_type.is_some(),
            room.last_played_hand.is_some()
        );
        for player in room.players.iter() {
            assert_eq!(player.card_count, player.cards.len());
        }
    }

    #[test]
    fn new_room_seats_host_first() {
        let room = new_room();
        assert_eq!(room.state, RoomState::Waiting);
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.players[0].seat, Seat::Bottom);
        assert!(room.players[0].is_ready);
        assert_eq!(room.host_id, "host");
    }

    #[test]
    fn join_is_idempotent_and_bounded() {
        let mut room = new_room();
        room.join("p2".into(), "Two".into()).unwrap();
        room.join("p2".into(), "Two".into()).unwrap();
        assert_eq!(room.players.len(), 2);
        room.join("p3".into(), "Three".into()).unwrap();
        room.join("p4".into(), "Four".into()).unwrap();
        assert_eq!(
            room.join("p5".into(), "Five".into()),
            Err(GameError::RoomFull)
        );
        let seats: Vec<Seat> = room.players.iter().map(|p| p.seat).collect();
        assert_eq!(seats, Seat::ALL.to_vec());
    }

    #[test]
    fn join_takes_first_free_seat() {
        let mut room = new_room();
        room.join("p2".into(), "Two".into()).unwrap();
        room.join("p3".into(), "Three".into()).unwrap();
        room.remove_player("p2");
        room.join("p4".into(), "Four".into()).unwrap();
        assert_eq!(room.player("p4").unwrap().seat, Seat::Left);
        assert_eq!(room.players[1].id, "p4");
    }

    #[test]
    fn join_rejected_once_started() {
        let mut room = started_room(1);
        assert_eq!(room.can_accept("late"), Err(GameError::RoomNotJoinable));
        assert_eq!(
            room.join("late".into(), "Late".into()),
            Err(GameError::RoomNotJoinable)
        );
        assert_eq!(room.can_accept("host"), Ok(()));
    }

    #[test]
    fn can_accept_leaves_the_room_untouched() {
        let mut room = new_room();
        for _ in 0..3 {
            room.add_bot().unwrap();
        }
        let before = room.clone();
        assert_eq!(room.can_accept("p5"), Err(GameError::RoomFull));
        assert_eq!(room, before);
        room.remove_player("bot-2");
        assert_eq!(room.can_accept("p5"), Ok(()));
        assert_eq!(room.players.len(), 3);
    }

    #[test]
    fn bots_get_placeholder_names_and_fresh_ids() {
        let mut room = new_room();
        let first = room.add_bot().unwrap();
        let second = room.add_bot().unwrap();
        assert_ne!(first, second);
        assert_eq!(room.player(&first).unwrap().name, "Alice Bot");
        assert_eq!(room.player(&second).unwrap().name, "Bob Bot");
        room.remove_player(&second);
        let third = room.add_bot().unwrap();
        assert_ne!(third, second);
        assert_eq!(
            room.player(&third).unwrap().bot_difficulty,
            Some(BotDifficulty::Medium)
        );
    }

    #[test]
    fn add_bot_rejected_when_full_or_started() {
        let mut room = new_room();
        for _ in 0..3 {
            room.add_bot().unwrap();
        }
        assert_eq!(room.add_bot(), Err(GameError::RoomFull));
        room.remove_player("bot-1");
        room.start(3).unwrap();
        assert_eq!(
            room.add_bot(),
            Err(GameError::InvalidState(RoomState::Playing))
        );
    }

    #[test]
    fn host_role_moves_to_next_seat() {
        let mut room = new_room();
        room.join("p2".into(), "Two".into()).unwrap();
        room.join("p3".into(), "Three".into()).unwrap();
        room.remove_player("host");
        assert_eq!(room.host_id, "p2");
    }

    #[test]
    fn host_role_skips_bots() {
        let mut room = new_room();
        room.add_bot().unwrap();
        room.join("p3".into(), "Three".into()).unwrap();
        assert_eq!(room.players[1].id, "bot-1");
        room.remove_player("host");
        assert_eq!(room.host_id, "p3");
    }

    #[test]
    fn start_fills_table_and_deals() {
        let room = started_room(7);
        assert_eq!(room.state, RoomState::Playing);
        assert_eq!(room.players.len(), 4);
        assert_eq!(room.players.iter().filter(|p| p.is_bot).count(), 3);
        for player in room.players.iter() {
            assert_eq!(player.cards.len(), 13);
        }
        let leader = &room.players[room.current_turn_index];
        assert!(leader.holds(&THREE_OF_DIAMONDS));
        assert!(leader.is_current_turn);
        assert_eq!(room.round_starter_index, room.current_turn_index);
        assert!(room.turn_start_time.is_some());
        assert_consistent(&room);
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut room = started_room(7);
        assert_eq!(
            room.start(8),
            Err(GameError::InvalidState(RoomState::Playing))
        );
    }

    #[test]
    fn dealt_hands_partition_the_deck() {
        let room = started_room(99);
        let mut all: Vec<Card> = room
            .players
            .iter()
            .flat_map(|p| p.cards.iter().copied())
            .collect();
        all.sort();
        let mut deck = standard_deck();
        deck.sort();
        assert_eq!(all, deck);
    }

    #[test]
    fn opening_lead_must_include_three_of_diamonds() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D", "4C", "9H"], &["5D"], &["6D"], &["7D"]],
            0,
        );
        let host = id(&room, 0);
        assert_eq!(
            room.play_cards(&host, &cards(&["4C"])),
            Err(GameError::MustLeadWithConstraint)
        );
        assert_eq!(room.pass_turn(&host), Err(GameError::CannotPass));
        let report = room.play_cards(&host, &cards(&["3D"])).unwrap();
        assert!(matches!(report.action, TurnAction::Played(_)));
        assert_eq!(room.current_hand_type, Some(HandType::Single));
        assert_consistent(&room);
    }

    #[test]
    fn rejects_unowned_and_duplicate_cards() {
        let mut room = started_room(5);
        rig(&mut room, &[&["3D", "4C"], &["5D"], &["6D"], &["7D"]], 0);
        let host = id(&room, 0);
        assert_eq!(
            room.play_cards(&host, &cards(&["2S"])),
            Err(GameError::CardsNotOwned)
        );
        assert_eq!(
            room.play_cards(&host, &cards(&["3D", "3D"])),
            Err(GameError::CardsNotOwned)
        );
        assert_eq!(room.players[0].cards.len(), 2);
    }

    #[test]
    fn rejects_unclassifiable_and_out_of_turn() {
        let mut room = started_room(5);
        rig(&mut room, &[&["3D", "4C"], &["5D", "5C"], &["6D"], &["7D"]], 0);
        let host = id(&room, 0);
        let other = id(&room, 1);
        assert_eq!(
            room.play_cards(&host, &cards(&["3D", "4C"])),
            Err(GameError::InvalidHandType)
        );
        assert_eq!(
            room.play_cards(&other, &cards(&["5D"])),
            Err(GameError::NotYourTurn)
        );
        assert_eq!(room.pass_turn(&other), Err(GameError::NotYourTurn));
        assert_eq!(
            room.play_cards("ghost", &cards(&["5D"])),
            Err(GameError::PlayerNotSeated)
        );
    }

    #[test]
    fn following_play_must_match_type_and_beat() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D", "4C"], &["5D", "5C", "3S"], &["6D", "6C"], &["7D"]],
            0,
        );
        let host = id(&room, 0);
        let next = id(&room, 1);
        room.play_cards(&host, &cards(&["3D"])).unwrap();
        let before = room.clone();
        assert_eq!(
            room.play_cards(&next, &cards(&["5D", "5C"])),
            Err(GameError::MustFollowType(HandType::Single))
        );
        assert_eq!(room, before);
        room.play_cards(&next, &cards(&["3S"])).unwrap();
        let third = id(&room, 2);
        assert_eq!(room.current_turn_index, 2);
        assert!(room.play_cards(&third, &cards(&["6D"])).is_ok());
        assert_consistent(&room);
    }

    #[test]
    fn too_weak_play_leaves_room_unchanged() {
        let mut room = started_room(5);
        rig(&mut room, &[&["3D", "KS"], &["5D", "2C"], &["6D"], &["7D"]], 0);
        let host = id(&room, 0);
        room.play_cards(&host, &cards(&["3D"])).unwrap();
        let next = id(&room, 1);
        room.play_cards(&next, &cards(&["2C"])).unwrap();
        let third = id(&room, 2);
        let before = room.clone();
        assert_eq!(
            room.play_cards(&third, &cards(&["6D"])),
            Err(GameError::TooWeak)
        );
        assert_eq!(room, before);
    }

    #[test]
    fn pass_skips_seat_and_grows_passed_set() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D", "4C", "9H"], &["5D", "5C"], &["6D", "6C"], &["7D", "7C"]],
            0,
        );
        room.play_cards(&id(&room, 0), &cards(&["3D"])).unwrap();
        let report = room.pass_turn(&id(&room, 1)).unwrap();
        assert_eq!(report.action, TurnAction::Passed);
        assert!(!report.round_reset);
        assert_eq!(room.passed_players, vec![id(&room, 1)]);
        assert_eq!(room.current_hand_type, Some(HandType::Single));
        assert_eq!(room.current_turn_index, 2);

        room.play_cards(&id(&room, 2), &cards(&["6D"])).unwrap();
        assert!(room.passed_players.is_empty());
        assert!(!room.players[1].has_passed);
        assert_consistent(&room);
    }

    #[test]
    fn everyone_passing_resets_the_trick() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D", "4C", "9H"], &["5D", "5C"], &["6D", "6C"], &["7D", "7C"]],
            0,
        );
        let leader = id(&room, 0);
        room.play_cards(&leader, &cards(&["3D"])).unwrap();
        room.pass_turn(&id(&room, 1)).unwrap();
        room.pass_turn(&id(&room, 2)).unwrap();
        let report = room.pass_turn(&id(&room, 3)).unwrap();
        assert!(report.round_reset);
        assert_eq!(report.next_player_id.as_deref(), Some(leader.as_str()));
        assert_eq!(room.state, RoomState::Playing);
        assert_eq!(room.current_hand_type, None);
        assert_eq!(room.last_played_hand, None);
        assert!(room.played_hands_history.is_empty());
        assert!(room.passed_players.is_empty());
        assert!(room.players.iter().all(|p| !p.has_passed));
        assert_eq!(room.current_turn_index, 0);
        assert_eq!(room.round_starter_index, 0);

        assert_consistent(&room);
        room.play_cards(&leader, &cards(&["4C"])).unwrap();
        assert_eq!(room.current_hand_type, Some(HandType::Single));
    }

    #[test]
    fn trick_reset_for_every_table_size() {
        for size in 2..=TABLE_SIZE {
            let mut room = started_room(11);
            room.players.truncate(size);
            let hands: Vec<&[&str]> = vec![
                &["4D", "9S", "10S"],
                &["5D", "5C"],
                &["6D", "6C"],
                &["7D", "7C"],
            ];
            rig(&mut room, &hands[..size], 0);
            let leader = id(&room, 0);
            room.play_cards(&leader, &cards(&["4D"])).unwrap();
            let mut last = None;
            for seat in 1..size {
                last = Some(room.pass_turn(&id(&room, seat)).unwrap());
            }
            let last = last.unwrap();
            assert!(last.round_reset, "table of {size}");
            assert_eq!(room.current_hand_type, None);
            assert_eq!(room.last_played_hand, None);
            assert_eq!(room.current_turn_index, 0);
            assert!(room.passed_players.is_empty());
        }
    }

    #[test]
    fn emptying_a_hand_finishes_the_game() {
        let mut room = started_room(5);
        rig(&mut room, &[&["3D"], &["5D", "5C"], &["6D"], &["7D"]], 0);
        let host = id(&room, 0);
        let report = room.play_cards(&host, &cards(&["3D"])).unwrap();
        assert_eq!(report.winner_id.as_deref(), Some(host.as_str()));
        assert_eq!(room.state, RoomState::Finished);
        assert_eq!(room.winner_id.as_deref(), Some(host.as_str()));
        assert!(room.players.iter().all(|p| !p.is_current_turn));
        assert!(room.bot_to_act().is_none());
        assert_eq!(
            room.pass_turn(&id(&room, 1)),
            Err(GameError::InvalidState(RoomState::Finished))
        );
    }

    #[test]
    fn one_card_left_activates_highest_rule() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D", "4C"], &["5D", "9C", "KH"], &["6D", "6C"], &["7D", "7C"]],
            0,
        );
        let report = room.play_cards(&id(&room, 0), &cards(&["3D"])).unwrap();
        let target = id(&room, 1);
        assert!(room.is_highest_rule_active);
        assert_eq!(room.highest_rule_target_id.as_deref(), Some(target.as_str()));
        assert_eq!(report.highest_rule_target.as_deref(), Some(target.as_str()));

        let report = room.pass_turn(&target).unwrap();
        match report.action {
            TurnAction::ForcedPlay(played) => assert_eq!(played.cards, cards(&["KH"])),
            other => panic!("expected forced play, got {other:?}"),
        }
        assert!(room.passed_players.is_empty());
        assert_eq!(room.players[1].cards, cards(&["5D", "9C"]));
        assert_eq!(room.current_turn_index, 2);
        assert!(!room.is_highest_rule_active);
        assert_consistent(&room);
    }

    #[test]
    fn highest_rule_allows_pass_when_top_card_cannot_follow() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D", "3C", "4C"], &["5D", "9C"], &["6D", "6C"], &["7D", "7C"]],
            0,
        );
        room.play_cards(&id(&room, 0), &cards(&["3D", "3C"])).unwrap();
        let target = id(&room, 1);
        assert!(room.is_highest_rule_active);
        let report = room.pass_turn(&target).unwrap();
        assert_eq!(report.action, TurnAction::Passed);
        assert_eq!(room.passed_players, vec![target]);
    }

    #[test]
    fn set_difficulty_only_while_waiting() {
        let mut room = new_room();
        room.add_bot().unwrap();
        room.set_difficulty(BotDifficulty::Hard).unwrap();
        assert_eq!(room.players[1].bot_difficulty, Some(BotDifficulty::Hard));
        room.start(1).unwrap();
        assert_eq!(
            room.set_difficulty(BotDifficulty::Easy),
            Err(GameError::InvalidState(RoomState::Playing))
        );
        room.set_table_theme(TableTheme::Gold);
        assert_eq!(room.table_theme, TableTheme::Gold);
    }

    #[test]
    fn leaving_mid_game_returns_room_to_waiting() {
        let mut room = new_room();
        room.join("p2".into(), "Two".into()).unwrap();
        room.start(21).unwrap();
        room.remove_player("p2").unwrap();
        assert_eq!(room.state, RoomState::Waiting);
        assert_eq!(room.players.len(), 3);
        assert!(room.players.iter().all(|p| p.cards.is_empty()));
        assert_eq!(room.cards_played, 0);
        assert!(room.current_player().is_none());
    }

    #[test]
    fn redaction_hides_other_hands() {
        let mut room = started_room(3);
        for i in 0..7 {
            room.played_hands_history.push(PlayedHand {
                player_id: "host".into(),
                cards: cards(&["3D"]),
                hand_type: HandType::Single,
                timestamp: i,
            });
        }
        let view = room.redacted_for("host", 5);
        for player in view.players.iter() {
            assert_eq!(player.card_count, 13);
            if player.id == "host" {
                assert_eq!(player.cards.len(), 13);
            } else {
                assert!(player.cards.is_empty());
            }
        }
        assert_eq!(view.played_hands_history.len(), 5);
        assert_eq!(view.played_hands_history[0].timestamp, 2);
        assert_eq!(room.played_hands_history.len(), 7);
    }

    #[test]
    fn results_rank_winner_then_fewest_cards() {
        let mut room = started_room(5);
        rig(
            &mut room,
            &[&["3D"], &["5D", "5C", "8H"], &["6D"], &["7D", "7C"]],
            0,
        );
        assert!(room.results().is_empty());
        room.play_cards(&id(&room, 0), &cards(&["3D"])).unwrap();
        let results = room.results();
        let order: Vec<&str> = results.iter().map(|r| r.player_id.as_str()).collect();
        assert_eq!(order, vec!["host", "bot-2", "bot-3", "bot-1"]);
        assert!(results[0].is_win);
        assert_eq!(results[0].xp_earned, WIN_XP);
        assert_eq!(results[3].xp_earned, PARTICIPATION_XP);
        assert_eq!(results[3].position, 4);
    }
}
