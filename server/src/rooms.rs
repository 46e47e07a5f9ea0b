use crate::config::{BotDelays, Config};
use crate::protocol::{RoomSummary, ServerMessage};
use bigtwo_core::{
    decide, BotDecision, BotDifficulty, Card, GameError, GameMode, GameRoom, PlayerId, RoomState,
    TableTheme, TurnAction, TurnReport,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Room codes avoid glyphs that read alike (0/O, 1/I).
pub const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const CODE_LEN: usize = 6;

#[derive(Clone, Debug)]
pub struct PlayerConn {
    pub id: PlayerId,
    pub tx: Option<UnboundedSender<ServerMessage>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoomSettings {
    pub turn_timer_secs: u32,
    pub history_cap: usize,
    pub bot_delays: BotDelays,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Config::default().room_settings()
    }
}

/// A bot move the async layer should run after `delay`. Only the newest
/// ticket of a room is honoured.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BotTurn {
    pub code: String,
    pub bot_id: PlayerId,
    pub ticket: u64,
    pub delay: Duration,
}

/// Everything a successful mutation asks the transport to do. Subscribers get
/// `before`, then their own game_state, then `after`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RoomUpdate {
    pub code: String,
    pub before: Vec<ServerMessage>,
    pub after: Vec<ServerMessage>,
    pub bot_turn: Option<BotTurn>,
    pub closed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    #[error("room not found")]
    NotFound,
    #[error("only the host can do that")]
    NotHost,
    #[error("you are not in this room")]
    NotInRoom,
    #[error("already seated in another room")]
    AlreadyInRoom,
    #[error("unknown card {0:?}")]
    InvalidCard(String),
    #[error(transparent)]
    Game(#[from] GameError),
}

#[derive(Debug)]
struct Room {
    game: GameRoom,
    connections: Vec<PlayerConn>,
    bot_ticket: u64,
}

#[derive(Debug)]
pub struct RoomManager {
    rooms: HashMap<String, Room>,
    player_rooms: HashMap<PlayerId, String>,
    rng: StdRng,
    settings: RoomSettings,
}

impl Default for RoomManager {
    fn default() -> Self {
        Self::new()
    }
}

impl RoomManager {
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rooms: HashMap::new(),
            player_rooms: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
            settings: RoomSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RoomSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn room(&self, code: &str) -> Option<&GameRoom> {
        self.rooms.get(code).map(|room| &room.game)
    }

    /// Code of the room a connected player is seated in.
    pub fn room_of(&self, player_id: &str) -> Option<&str> {
        self.player_rooms.get(player_id).map(String::as_str)
    }

    pub fn create_room(
        &mut self,
        host: PlayerConn,
        host_name: String,
        game_mode: GameMode,
        bot_difficulty: BotDifficulty,
    ) -> Result<RoomUpdate, RoomError> {
        if self.player_rooms.contains_key(&host.id) {
            return Err(RoomError::AlreadyInRoom);
        }
        let code = self.new_room_code();
        let id = uuid::Builder::from_random_bytes(self.rng.gen())
            .into_uuid()
            .to_string();
        let game = GameRoom::new(
            id,
            code.clone(),
            host.id.clone(),
            host_name,
            game_mode,
            bot_difficulty,
        )
        .with_turn_timer(self.settings.turn_timer_secs);

        self.player_rooms.insert(host.id.clone(), code.clone());
        self.rooms.insert(
            code.clone(),
            Room {
                game,
                connections: vec![host],
                bot_ticket: 0,
            },
        );
        info!(room = %code, ?game_mode, ?bot_difficulty, "room created");
        Ok(self.seal(&code, Vec::new(), Vec::new()))
    }

    pub fn join_room(
        &mut self,
        code: &str,
        player: PlayerConn,
        name: String,
    ) -> Result<RoomUpdate, RoomError> {
        let code = normalize_code(code);
        if let Some(current) = self.player_rooms.get(&player.id) {
            if *current != code {
                return Err(RoomError::AlreadyInRoom);
            }
        }
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;
        room.game.join(player.id.clone(), name.clone())?;

        let player_id = player.id.clone();
        room.connections.retain(|conn| conn.id != player_id);
        room.connections.push(player);
        self.player_rooms.insert(player_id.clone(), code.clone());
        info!(room = %code, player = %player_id, "player joined");

        let joined = ServerMessage::PlayerJoined { player_id, name };
        Ok(self.seal(&code, vec![joined], Vec::new()))
    }

    /// Validates a join into `code` without touching any room, so a caller
    /// can release the player's current seat only once the join will succeed.
    pub fn check_join(&self, code: &str, player_id: &str) -> Result<(), RoomError> {
        let room = self
            .rooms
            .get(&normalize_code(code))
            .ok_or(RoomError::NotFound)?;
        room.game.can_accept(player_id)?;
        Ok(())
    }

    /// Unseats a player. A room left without humans is destroyed and the
    /// returned update is marked `closed`.
    pub fn leave_room(&mut self, player_id: &str) -> Result<RoomUpdate, RoomError> {
        let code = self
            .player_rooms
            .remove(player_id)
            .ok_or(RoomError::NotInRoom)?;
        let room = self.rooms.get_mut(&code).ok_or(RoomError::NotFound)?;
        room.connections.retain(|conn| conn.id != player_id);
        let interrupted = room.game.state == RoomState::Playing;
        room.game.remove_player(player_id);

        if !room.game.has_humans() {
            self.rooms.remove(&code);
            info!(room = %code, "room closed");
            return Ok(RoomUpdate {
                code,
                closed: true,
                ..RoomUpdate::default()
            });
        }
        if interrupted {
            info!(room = %code, player = %player_id, "game interrupted by leaver");
        } else {
            info!(room = %code, player = %player_id, "player left");
        }
        let left = ServerMessage::PlayerLeft {
            player_id: player_id.to_string(),
        };
        Ok(self.seal(&code, vec![left], Vec::new()))
    }

    pub fn add_bot(&mut self, code: &str, requester: &str) -> Result<RoomUpdate, RoomError> {
        let room = self.member_room_mut(code, requester)?;
        let bot_id = room.game.add_bot()?;
        let name = room
            .game
            .player(&bot_id)
            .map(|bot| bot.name.clone())
            .unwrap_or_default();
        debug!(room = %code, bot = %bot_id, "bot seated");
        let joined = ServerMessage::PlayerJoined {
            player_id: bot_id,
            name,
        };
        Ok(self.seal(code, vec![joined], Vec::new()))
    }

    /// Host only. Empty seats are filled with bots before the deal.
    pub fn start_game(&mut self, code: &str, requester: &str) -> Result<RoomUpdate, RoomError> {
        let seed = self.rng.gen::<u64>();
        let room = self.member_room_mut(code, requester)?;
        if room.game.host_id != requester {
            return Err(RoomError::NotHost);
        }
        room.game.start(seed)?;

        let mut before = Vec::new();
        if let Some(leader) = room.game.current_player() {
            info!(room = %code, leader = %leader.id, "game started");
            before.push(ServerMessage::GameStarted {
                leader_id: leader.id.clone(),
            });
        }
        Ok(self.seal(code, before, Vec::new()))
    }

    pub fn play_cards(
        &mut self,
        code: &str,
        player_id: &str,
        codes: &[String],
    ) -> Result<RoomUpdate, RoomError> {
        let cards = parse_cards(codes)?;
        self.take_turn(code, player_id, |game| game.play_cards(player_id, &cards))
    }

    pub fn pass_turn(&mut self, code: &str, player_id: &str) -> Result<RoomUpdate, RoomError> {
        self.take_turn(code, player_id, |game| game.pass_turn(player_id))
    }

    pub fn set_difficulty(
        &mut self,
        code: &str,
        requester: &str,
        difficulty: BotDifficulty,
    ) -> Result<RoomUpdate, RoomError> {
        let room = self.member_room_mut(code, requester)?;
        room.game.set_difficulty(difficulty)?;
        Ok(self.seal(code, Vec::new(), Vec::new()))
    }

    pub fn set_table_theme(
        &mut self,
        code: &str,
        requester: &str,
        theme: TableTheme,
    ) -> Result<RoomUpdate, RoomError> {
        let room = self.member_room_mut(code, requester)?;
        room.game.set_table_theme(theme);
        Ok(self.seal(code, Vec::new(), Vec::new()))
    }

    /// Runs a scheduled bot move. Timers that lost a race (the room closed,
    /// something else happened first, the turn moved on) are a no-op.
    pub fn run_bot_turn(&mut self, turn: &BotTurn) -> Result<Option<RoomUpdate>, RoomError> {
        let Some(room) = self.rooms.get_mut(&turn.code) else {
            debug!(room = %turn.code, "bot timer fired for a closed room");
            return Ok(None);
        };
        if room.bot_ticket != turn.ticket {
            debug!(room = %turn.code, ticket = turn.ticket, "stale bot timer");
            return Ok(None);
        }
        let difficulty = match room.game.bot_to_act() {
            Some(bot) if bot.id == turn.bot_id => {
                bot.bot_difficulty.unwrap_or(room.game.bot_difficulty)
            }
            _ => {
                debug!(room = %turn.code, bot = %turn.bot_id, "bot no longer to act");
                return Ok(None);
            }
        };

        let decision = decide(&room.game, &turn.bot_id, difficulty, &mut self.rng);
        debug!(room = %turn.code, bot = %turn.bot_id, ?decision, "bot decided");
        let report = match decision {
            BotDecision::Play(cards) => match room.game.play_cards(&turn.bot_id, &cards) {
                Ok(report) => report,
                Err(err) => {
                    warn!(room = %turn.code, bot = %turn.bot_id, %err, "bot play rejected, passing");
                    room.game.pass_turn(&turn.bot_id)?
                }
            },
            BotDecision::Pass => room.game.pass_turn(&turn.bot_id)?,
        };
        Ok(Some(self.record_turn(&turn.code, report)))
    }

    /// Sends an update to every connection subscribed to its room.
    pub fn publish(&self, update: &RoomUpdate) {
        let Some(room) = self.rooms.get(&update.code) else {
            return;
        };
        for conn in room.connections.iter() {
            let Some(tx) = conn.tx.as_ref() else {
                continue;
            };
            for msg in update.before.iter() {
                let _ = tx.send(msg.clone());
            }
            let view = room.game.redacted_for(&conn.id, self.settings.history_cap);
            let _ = tx.send(ServerMessage::GameState(view));
            for msg in update.after.iter() {
                let _ = tx.send(msg.clone());
            }
        }
    }

    pub fn snapshot_for(&self, code: &str, viewer: &str) -> Option<GameRoom> {
        self.rooms
            .get(code)
            .map(|room| room.game.redacted_for(viewer, self.settings.history_cap))
    }

    pub fn room_summaries(&self) -> Vec<RoomSummary> {
        let mut rooms = self
            .rooms
            .iter()
            .map(|(code, room)| RoomSummary {
                code: code.clone(),
                player_count: room.game.players.len(),
                state: room.game.state,
                can_join: room.game.state == RoomState::Waiting && !room.game.is_full(),
            })
            .collect::<Vec<_>>();
        rooms.sort_by(|a, b| a.code.cmp(&b.code));
        rooms
    }

    fn member_room_mut(&mut self, code: &str, player_id: &str) -> Result<&mut Room, RoomError> {
        let room = self.rooms.get_mut(code).ok_or(RoomError::NotFound)?;
        if self.player_rooms.get(player_id).map(String::as_str) != Some(code) {
            return Err(RoomError::NotInRoom);
        }
        Ok(room)
    }

    fn take_turn<F>(&mut self, code: &str, player_id: &str, action: F) -> Result<RoomUpdate, RoomError>
    where
        F: FnOnce(&mut GameRoom) -> Result<TurnReport, GameError>,
    {
        let room = self.member_room_mut(code, player_id)?;
        let report = action(&mut room.game).map_err(|err| {
            debug!(room = %code, player = %player_id, %err, "action rejected");
            err
        })?;
        Ok(self.record_turn(code, report))
    }

    fn record_turn(&mut self, code: &str, report: TurnReport) -> RoomUpdate {
        let (before, after) = match self.rooms.get(code) {
            Some(room) => turn_events(&report, &room.game),
            None => (Vec::new(), Vec::new()),
        };
        if report.round_reset {
            info!(room = %code, leader = ?report.next_player_id, "round reset");
        }
        if let Some(winner) = report.winner_id.as_ref() {
            info!(room = %code, winner = %winner, "game finished");
        }
        self.seal(code, before, after)
    }

    /// Closes out a mutation: invalidates any pending bot timer for the room
    /// and schedules the next one if a bot is now to act.
    fn seal(
        &mut self,
        code: &str,
        before: Vec<ServerMessage>,
        after: Vec<ServerMessage>,
    ) -> RoomUpdate {
        let delays = &self.settings.bot_delays;
        let bot_turn = self.rooms.get_mut(code).and_then(|room| {
            room.bot_ticket += 1;
            let bot = room.game.bot_to_act()?;
            let difficulty = bot.bot_difficulty.unwrap_or(room.game.bot_difficulty);
            Some(BotTurn {
                code: code.to_string(),
                bot_id: bot.id.clone(),
                ticket: room.bot_ticket,
                delay: delays.for_difficulty(difficulty),
            })
        });
        RoomUpdate {
            code: code.to_string(),
            before,
            after,
            bot_turn,
            closed: false,
        }
    }

    fn new_room_code(&mut self) -> String {
        loop {
            let code = (0..CODE_LEN)
                .map(|_| CODE_ALPHABET[self.rng.gen_range(0..CODE_ALPHABET.len())] as char)
                .collect::<String>();
            if !self.rooms.contains_key(&code) {
                return code;
            }
        }
    }
}

fn turn_events(report: &TurnReport, game: &GameRoom) -> (Vec<ServerMessage>, Vec<ServerMessage>) {
    let player_id = report.player_id.clone();
    let mut before = vec![match &report.action {
        TurnAction::Played(hand) => ServerMessage::CardsPlayed {
            player_id,
            hand: hand.clone(),
            forced: false,
        },
        TurnAction::ForcedPlay(hand) => ServerMessage::CardsPlayed {
            player_id,
            hand: hand.clone(),
            forced: true,
        },
        TurnAction::Passed => ServerMessage::TurnPassed { player_id },
    }];
    if report.round_reset {
        if let Some(leader_id) = report.next_player_id.clone() {
            before.push(ServerMessage::RoundReset { leader_id });
        }
    }

    let mut after = Vec::new();
    if let Some(winner_id) = report.winner_id.clone() {
        after.push(ServerMessage::GameEnded {
            winner_id,
            results: game.results(),
        });
    }
    if let Some(target_id) = report.highest_rule_target.clone() {
        after.push(ServerMessage::HighestRule { target_id });
    }
    (before, after)
}

fn parse_cards(codes: &[String]) -> Result<Vec<Card>, RoomError> {
    codes
        .iter()
        .map(|code| Card::from_code(code.trim()).ok_or_else(|| RoomError::InvalidCard(code.clone())))
        .collect()
}

pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Friendly default name for a connection that did not pick one.
pub fn default_player_name(seed: u64) -> String {
    const ADJECTIVES: &[&str] = &[
        "Brave", "Calm", "Swift", "Lucky", "Clever", "Quiet", "Bold", "Sunny", "Witty", "Nimble",
        "Jolly", "Cosmic", "Silver", "Golden", "Rapid", "Steady",
    ];
    const NOUNS: &[&str] = &[
        "Panda", "Tiger", "Falcon", "Otter", "Fox", "Heron", "Badger", "Lynx", "Raven", "Koala",
        "Gecko", "Marten", "Puffin", "Walrus", "Bison", "Crane",
    ];

    let adjective = ADJECTIVES[(seed as usize) % ADJECTIVES.len()];
    let noun = NOUNS[(seed.rotate_left(29) as usize) % NOUNS.len()];
    format!("{adjective} {noun}")
}
