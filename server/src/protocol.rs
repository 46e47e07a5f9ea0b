use bigtwo_core::{
    BotDifficulty, GameMode, GameResult, GameRoom, PlayedHand, PlayerId, RoomState, TableTheme,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        game_mode: GameMode,
        #[serde(default)]
        bot_difficulty: BotDifficulty,
    },
    JoinRoom {
        code: String,
        #[serde(default)]
        name: Option<String>,
    },
    LeaveRoom,
    ListRooms,
    AddBot,
    StartGame,
    PlayCards {
        cards: Vec<String>,
    },
    PassTurn,
    SetDifficulty {
        difficulty: BotDifficulty,
    },
    SetTableTheme {
        theme: TableTheme,
    },
    Ping,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected {
        player_id: PlayerId,
        name: String,
    },
    RoomCreated {
        code: String,
    },
    /// The room as the receiving player may see it.
    GameState(GameRoom),
    RoomsList {
        rooms: Vec<RoomSummary>,
    },
    PlayerJoined {
        player_id: PlayerId,
        name: String,
    },
    PlayerLeft {
        player_id: PlayerId,
    },
    GameStarted {
        leader_id: PlayerId,
    },
    CardsPlayed {
        player_id: PlayerId,
        hand: PlayedHand,
        forced: bool,
    },
    TurnPassed {
        player_id: PlayerId,
    },
    RoundReset {
        leader_id: PlayerId,
    },
    GameEnded {
        winner_id: PlayerId,
        results: Vec<GameResult>,
    },
    HighestRule {
        target_id: PlayerId,
    },
    Error {
        message: String,
    },
    Pong,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub code: String,
    pub player_count: usize,
    pub state: RoomState,
    pub can_join: bool,
}
