//! Shared server state and the path every inbound message takes: a client
//! message (or a bot timer) locks the registry, mutates one room, publishes
//! the result to that room's subscribers and reschedules the room's bot timer,
//! all under the same lock so room events go out in the order they happened.

use crate::protocol::{ClientMessage, ServerMessage};
use crate::rooms::{
    default_player_name, normalize_code, BotTurn, PlayerConn, RoomError, RoomManager, RoomUpdate,
};
use bigtwo_core::PlayerId;
use futures_util::future::BoxFuture;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// One connected client.
#[derive(Clone, Debug)]
pub struct Session {
    pub player_id: PlayerId,
    pub name: String,
    pub tx: mpsc::UnboundedSender<ServerMessage>,
}

impl Session {
    pub fn new(seed: u64, tx: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Session {
            player_id: format!("player-{seed:016x}"),
            name: default_player_name(seed),
            tx,
        }
    }

    fn conn(&self) -> PlayerConn {
        PlayerConn {
            id: self.player_id.clone(),
            tx: Some(self.tx.clone()),
        }
    }

    fn send(&self, msg: ServerMessage) {
        let _ = self.tx.send(msg);
    }
}

#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<Mutex<RoomManager>>,
    bot_timers: Arc<Mutex<HashMap<String, (u64, JoinHandle<()>)>>>,
}

impl AppState {
    pub fn new(manager: RoomManager) -> Self {
        AppState {
            rooms: Arc::new(Mutex::new(manager)),
            bot_timers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub async fn pending_bot_timers(&self) -> usize {
        self.bot_timers.lock().await.len()
    }

    pub async fn handle_client_message(
        &self,
        session: &Session,
        msg: ClientMessage,
    ) -> Result<(), RoomError> {
        match msg {
            ClientMessage::Ping => session.send(ServerMessage::Pong),
            ClientMessage::ListRooms => {
                let rooms = self.rooms.lock().await.room_summaries();
                session.send(ServerMessage::RoomsList { rooms });
            }
            ClientMessage::CreateRoom {
                name,
                game_mode,
                bot_difficulty,
            } => {
                let mut rooms = self.rooms.lock().await;
                self.leave_locked(&mut rooms, &session.player_id).await;
                let name = name.unwrap_or_else(|| session.name.clone());
                let update = rooms.create_room(session.conn(), name, game_mode, bot_difficulty)?;
                session.send(ServerMessage::RoomCreated {
                    code: update.code.clone(),
                });
                self.commit(&rooms, update).await;
            }
            ClientMessage::JoinRoom { code, name } => {
                let code = normalize_code(&code);
                let mut rooms = self.rooms.lock().await;
                rooms.check_join(&code, &session.player_id)?;
                if rooms.room_of(&session.player_id).is_some_and(|current| current != code) {
                    self.leave_locked(&mut rooms, &session.player_id).await;
                }
                let name = name.unwrap_or_else(|| session.name.clone());
                let update = rooms.join_room(&code, session.conn(), name)?;
                self.commit(&rooms, update).await;
            }
            ClientMessage::LeaveRoom => {
                let mut rooms = self.rooms.lock().await;
                if rooms.room_of(&session.player_id).is_none() {
                    return Err(RoomError::NotInRoom);
                }
                self.leave_locked(&mut rooms, &session.player_id).await;
            }
            ClientMessage::AddBot => {
                self.in_own_room(session, |rooms, code| rooms.add_bot(code, &session.player_id))
                    .await?
            }
            ClientMessage::StartGame => {
                self.in_own_room(session, |rooms, code| {
                    rooms.start_game(code, &session.player_id)
                })
                .await?
            }
            ClientMessage::PlayCards { cards } => {
                self.in_own_room(session, |rooms, code| {
                    rooms.play_cards(code, &session.player_id, &cards)
                })
                .await?
            }
            ClientMessage::PassTurn => {
                self.in_own_room(session, |rooms, code| {
                    rooms.pass_turn(code, &session.player_id)
                })
                .await?
            }
            ClientMessage::SetDifficulty { difficulty } => {
                self.in_own_room(session, |rooms, code| {
                    rooms.set_difficulty(code, &session.player_id, difficulty)
                })
                .await?
            }
            ClientMessage::SetTableTheme { theme } => {
                self.in_own_room(session, |rooms, code| {
                    rooms.set_table_theme(code, &session.player_id, theme)
                })
                .await?
            }
        }
        Ok(())
    }

    /// Called when the socket closes.
    pub async fn disconnect(&self, player_id: &str) {
        let mut rooms = self.rooms.lock().await;
        self.leave_locked(&mut rooms, player_id).await;
    }

    async fn in_own_room<F>(&self, session: &Session, action: F) -> Result<(), RoomError>
    where
        F: FnOnce(&mut RoomManager, &str) -> Result<RoomUpdate, RoomError>,
    {
        let mut rooms = self.rooms.lock().await;
        let code = rooms
            .room_of(&session.player_id)
            .map(str::to_string)
            .ok_or(RoomError::NotInRoom)?;
        let update = action(&mut rooms, &code)?;
        self.commit(&rooms, update).await;
        Ok(())
    }

    async fn leave_locked(&self, rooms: &mut MutexGuard<'_, RoomManager>, player_id: &str) {
        match rooms.leave_room(player_id) {
            Ok(update) => self.commit(rooms, update).await,
            Err(RoomError::NotInRoom) => {}
            Err(err) => warn!(player = %player_id, %err, "leave failed"),
        }
    }

    async fn commit(&self, rooms: &RoomManager, update: RoomUpdate) {
        rooms.publish(&update);
        self.reschedule(&update).await;
    }

    /// Replaces the room's pending bot timer, if any, with the one the update
    /// asks for.
    async fn reschedule(&self, update: &RoomUpdate) {
        let mut timers = self.bot_timers.lock().await;
        if let Some((ticket, handle)) = timers.remove(&update.code) {
            debug!(room = %update.code, ticket, "cancelling bot timer");
            handle.abort();
        }
        if let Some(turn) = update.bot_turn.clone() {
            let handle = tokio::spawn(bot_timer(self.clone(), turn.clone()));
            timers.insert(update.code.clone(), (turn.ticket, handle));
        }
    }
}

fn bot_timer(state: AppState, turn: BotTurn) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        tokio::time::sleep(turn.delay).await;
        {
            let mut timers = state.bot_timers.lock().await;
            if timers
                .get(&turn.code)
                .is_some_and(|(ticket, _)| *ticket == turn.ticket)
            {
                // Detach our own handle so rescheduling below cannot abort us.
                timers.remove(&turn.code);
            }
        }

        let mut rooms = state.rooms.lock().await;
        match rooms.run_bot_turn(&turn) {
            Ok(Some(update)) => state.commit(&rooms, update).await,
            Ok(None) => {}
            Err(err) => warn!(room = %turn.code, bot = %turn.bot_id, %err, "bot turn failed"),
        }
    })
}
