use crate::{
    bot,
    db::Database,
    error::EuchreError,
    game::Phase,
    protocol::{Action, RoomList, RoomListing, RoomSnapshot, ServerMessage},
    room::{Room, MAX_PLAYER_NAME, MAX_ROOM_NAME},
    types::{now_millis, Difficulty, PlayerId, RoomStatus, SessionId},
};
use log::{info, warn};
use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
    time::Duration,
};
use tokio::{
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        Mutex,
    },
    task, time,
};

/// Safety cap on scheduler actions per pass; a capped pass with automated
/// work left re-arms itself.
const MAX_AUTO_STEPS: usize = 64;
/// Leaves the client room to animate the captured trick before the next
/// card flies out.
const POST_TRICK_PAUSE: Duration = Duration::from_millis(2300);
const HAND_OVER_PAUSE: Duration = Duration::from_millis(3600);
const DISCONNECTED_DELAY: Duration = Duration::from_millis(900);
const REAP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Copy, Clone, Eq, PartialEq)]
enum Pacing {
    Normal,
    /// No delays, no background passes; tests drive the scheduler by hand.
    Fast,
}

struct Session {
    player_id: PlayerId,
    tx: UnboundedSender<ServerMessage>,
}

pub struct RoomEntry {
    room: Room,
    sessions: HashMap<SessionId, Session>,
    advancing: bool,
}

impl RoomEntry {
    fn new(room: Room) -> Self {
        Self {
            room,
            sessions: HashMap::new(),
            advancing: false,
        }
    }
}

/// Everything a live socket needs after admission.
pub struct Connection {
    pub session_id: SessionId,
    pub room_name: String,
    pub player_id: PlayerId,
    pub tx: UnboundedSender<ServerMessage>,
    pub rx: UnboundedReceiver<ServerMessage>,
}

#[derive(Debug, Clone)]
pub struct ConnectRequest {
    pub room: String,
    pub name: String,
    pub password: Option<String>,
    pub create: bool,
    pub creator_token: Option<String>,
    pub bot_difficulty: Option<Difficulty>,
}

impl ConnectRequest {
    pub fn validate(mut self) -> Result<Self, EuchreError> {
        self.room = self.room.trim().chars().take(MAX_ROOM_NAME).collect();
        self.name = self.name.trim().chars().take(MAX_PLAYER_NAME).collect();
        if self.room.is_empty() {
            return Err(EuchreError::MissingRoomName);
        }
        if self.name.is_empty() {
            return Err(EuchreError::MissingPlayerName);
        }
        Ok(self)
    }

    fn token_matches(&self, room: &Room) -> bool {
        self.creator_token.as_deref() == Some(room.creator_token.as_str())
    }
}

/// The room registry. Each room is a single-writer actor behind its own
/// mutex: client commands, scheduler steps, persistence and broadcasts all
/// run under it, and different rooms never contend.
#[derive(Clone)]
pub struct Rooms {
    db: Database,
    pacing: Pacing,
    inner: Arc<Mutex<HashMap<String, Arc<Mutex<RoomEntry>>>>>,
}

impl Rooms {
    pub fn new(db: Database) -> Result<Self, EuchreError> {
        Self::with_pacing(db, Pacing::Normal)
    }

    #[cfg(test)]
    pub fn with_fast_bots(db: Database) -> Result<Self, EuchreError> {
        Self::with_pacing(db, Pacing::Fast)
    }

    fn with_pacing(db: Database, pacing: Pacing) -> Result<Self, EuchreError> {
        let mut map = HashMap::new();
        for mut room in db.load_rooms()? {
            // Nobody is on the other end of a socket after a cold start.
            for player in &mut room.players {
                if !player.is_bot {
                    player.connected = false;
                }
            }
            map.insert(room.name.clone(), Arc::new(Mutex::new(RoomEntry::new(room))));
        }
        if !map.is_empty() {
            info!("restored {} rooms", map.len());
        }
        Ok(Self {
            db,
            pacing,
            inner: Arc::new(Mutex::new(map)),
        })
    }

    /// Fetch a live room, reaping it first if its hour is up.
    async fn fetch(&self, name: &str) -> Result<Arc<Mutex<RoomEntry>>, EuchreError> {
        let mut inner = self.inner.lock().await;
        let arc = inner
            .get(name)
            .cloned()
            .ok_or_else(|| EuchreError::UnknownRoom(name.to_string()))?;
        let expired = arc.lock().await.room.expired(now_millis());
        if expired {
            inner.remove(name);
            drop(inner);
            self.evict(&arc, name).await?;
            return Err(EuchreError::UnknownRoom(name.to_string()));
        }
        Ok(arc)
    }

    /// Drop every session (their close frames go out as the channels die)
    /// and forget the room on disk.
    async fn evict(&self, arc: &Arc<Mutex<RoomEntry>>, name: &str) -> Result<(), EuchreError> {
        let mut entry = arc.lock().await;
        for session in entry.sessions.values() {
            let _ = session.tx.send(ServerMessage::Goodbye);
        }
        entry.sessions.clear();
        self.db.delete_room(name)?;
        info!("reaped room {}", name);
        Ok(())
    }

    pub async fn check_connect(&self, req: &ConnectRequest) -> Result<(), EuchreError> {
        match self.fetch(&req.room).await {
            Ok(arc) => {
                let entry = arc.lock().await;
                let room = &entry.room;
                let token_matches = req.token_matches(room);
                if req.create && !token_matches {
                    return Err(EuchreError::RoomExists(req.room.clone()));
                }
                if !token_matches && room.password != req.password {
                    return Err(EuchreError::WrongPassword);
                }
                match room.player_by_name(&req.name) {
                    Some(player) if player.is_bot || player.connected => {
                        Err(EuchreError::NameTaken(req.name.clone()))
                    }
                    Some(_) => Ok(()),
                    None if room.players.len() >= room.max_players => {
                        Err(EuchreError::RoomFull(req.room.clone()))
                    }
                    None => Ok(()),
                }
            }
            Err(EuchreError::UnknownRoom(_)) if req.create => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub async fn connect(&self, req: ConnectRequest) -> Result<Connection, EuchreError> {
        self.check_connect(&req).await?;
        let arc = self.lookup_or_create(&req).await?;
        let mut entry = arc.lock().await;
        let room = &mut entry.room;
        let token_matches = req.token_matches(room);
        if !token_matches && room.password != req.password {
            return Err(EuchreError::WrongPassword);
        }
        let player_id = room.join(&req.name)?;
        // Creator powers follow the token, not the socket.
        if token_matches {
            room.creator_player_id = Some(player_id);
        } else if req.create && room.creator_player_id.is_none() {
            room.creator_player_id = Some(player_id);
        }
        room.updated_at = now_millis();
        info!("{} joined room {} as {}", req.name, room.name, player_id);
        let session_id = SessionId::new();
        let (tx, rx) = unbounded_channel();
        let room_name = room.name.clone();
        entry.sessions.insert(
            session_id,
            Session {
                player_id,
                tx: tx.clone(),
            },
        );
        self.persist(&entry.room)?;
        self.send_info(&entry, &format!("{} connected", req.name));
        self.broadcast(&mut entry);
        // A restored room may have a bot or absent seat already on turn.
        self.schedule_advance(&room_name);
        Ok(Connection {
            session_id,
            room_name,
            player_id,
            tx,
            rx,
        })
    }

    async fn lookup_or_create(
        &self,
        req: &ConnectRequest,
    ) -> Result<Arc<Mutex<RoomEntry>>, EuchreError> {
        match self.fetch(&req.room).await {
            Ok(arc) => {
                if req.create {
                    let entry = arc.lock().await;
                    if !req.token_matches(&entry.room) {
                        return Err(EuchreError::RoomExists(req.room.clone()));
                    }
                }
                Ok(arc)
            }
            Err(EuchreError::UnknownRoom(_)) if req.create => {
                let mut inner = self.inner.lock().await;
                let arc = match inner.entry(req.room.clone()) {
                    Entry::Occupied(entry) => entry.get().clone(),
                    Entry::Vacant(entry) => {
                        let room = Room::new(
                            req.room.clone(),
                            req.password.clone(),
                            req.bot_difficulty.unwrap_or(Difficulty::Medium),
                        );
                        info!("created room {}", room.name);
                        entry
                            .insert(Arc::new(Mutex::new(RoomEntry::new(room))))
                            .clone()
                    }
                };
                Ok(arc)
            }
            Err(e) => Err(e),
        }
    }

    /// A socket went away: keep the seat, drop the session, and let the
    /// scheduler take over the player's turns.
    pub async fn disconnect(&self, name: &str, session_id: SessionId) {
        let arc = match self.fetch(name).await {
            Ok(arc) => arc,
            Err(_) => return,
        };
        let mut entry = arc.lock().await;
        let session = match entry.sessions.remove(&session_id) {
            Some(session) => session,
            None => return,
        };
        let rebound = entry
            .sessions
            .values()
            .any(|s| s.player_id == session.player_id);
        if !rebound {
            if let Some(player) = entry.room.player_mut(session.player_id) {
                player.connected = false;
                let player_name = player.name.clone();
                info!("{} disconnected from room {}", player_name, name);
                entry.room.updated_at = now_millis();
                if self.persist(&entry.room).is_err() {
                    warn!("failed to persist room {} on disconnect", name);
                }
                self.send_info(&entry, &format!("{} disconnected", player_name));
                self.broadcast(&mut entry);
            }
        }
        drop(entry);
        self.schedule_advance(name);
    }

    /// Route one action from a session. Game errors go back to the offender
    /// as error frames; an Err return means the session or room is gone and
    /// the socket should close.
    pub async fn apply(
        &self,
        name: &str,
        session_id: SessionId,
        action: Action,
    ) -> Result<(), EuchreError> {
        let arc = self.fetch(name).await?;
        let mut entry = arc.lock().await;
        let player_id = entry
            .sessions
            .get(&session_id)
            .ok_or(EuchreError::UnknownPlayer)?
            .player_id;
        match entry
            .room
            .apply_action(player_id, &action, &mut rand::thread_rng())
        {
            Ok(infos) => {
                self.persist(&entry.room)?;
                self.send_infos(&entry, &infos);
                self.broadcast(&mut entry);
                drop(entry);
                self.schedule_advance(name);
                Ok(())
            }
            Err(e) => {
                info!("room {}: {} refused: {}", name, player_id, e);
                if let Some(session) = entry.sessions.get(&session_id) {
                    let _ = session.tx.send(ServerMessage::error(e.to_string()));
                }
                Ok(())
            }
        }
    }

    pub async fn list(&self) -> Result<RoomList, EuchreError> {
        self.reap_expired().await;
        let inner = self.inner.lock().await;
        let mut rooms = Vec::with_capacity(inner.len());
        for arc in inner.values() {
            rooms.push(RoomListing::of(&arc.lock().await.room));
        }
        rooms.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RoomList { rooms })
    }

    pub async fn delete(&self, name: &str, creator_token: &str) -> Result<(), EuchreError> {
        let arc = {
            let mut inner = self.inner.lock().await;
            let arc = inner
                .get(name)
                .cloned()
                .ok_or_else(|| EuchreError::UnknownRoom(name.to_string()))?;
            if arc.lock().await.room.creator_token != creator_token {
                return Err(EuchreError::CreatorTokenMismatch);
            }
            inner.remove(name);
            arc
        };
        let mut entry = arc.lock().await;
        for session in entry.sessions.values() {
            let _ = session.tx.send(ServerMessage::Goodbye);
        }
        entry.sessions.clear();
        self.db.delete_room(name)?;
        info!("deleted room {}", name);
        Ok(())
    }

    pub async fn reap_expired(&self) {
        let now = now_millis();
        let mut inner = self.inner.lock().await;
        let mut expired = Vec::new();
        for (name, arc) in inner.iter() {
            if arc.lock().await.room.expired(now) {
                expired.push((name.clone(), arc.clone()));
            }
        }
        for (name, arc) in expired {
            inner.remove(&name);
            if let Err(e) = self.evict(&arc, &name).await {
                warn!("failed to reap room {}: {}", name, e);
            }
        }
    }

    pub fn start_background_reaper(self) {
        task::spawn(async move {
            let mut ticks = time::interval(REAP_INTERVAL);
            loop {
                ticks.tick().await;
                self.reap_expired().await;
            }
        });
    }

    fn persist(&self, room: &Room) -> Result<(), EuchreError> {
        self.db.save_room(room)
    }

    fn send_info(&self, entry: &RoomEntry, message: &str) {
        for session in entry.sessions.values() {
            let _ = session.tx.send(ServerMessage::info(message));
        }
    }

    fn send_infos(&self, entry: &RoomEntry, infos: &[String]) {
        for info in infos {
            self.send_info(entry, info);
        }
    }

    /// Push every session its personalized snapshot, dropping sessions whose
    /// channel has died.
    fn broadcast(&self, entry: &mut RoomEntry) {
        let room = &entry.room;
        entry.sessions.retain(|_, session| {
            let snapshot = RoomSnapshot::of(room, Some(session.player_id));
            session
                .tx
                .send(ServerMessage::State {
                    state: Box::new(snapshot),
                })
                .is_ok()
        });
    }

    /// Kick off a scheduler pass for the room unless one is already in
    /// flight. In fast (test) mode passes are driven explicitly instead.
    pub fn schedule_advance(&self, name: &str) {
        if self.pacing == Pacing::Fast {
            return;
        }
        let rooms = self.clone();
        let name = name.to_string();
        task::spawn(async move {
            rooms.advance_pass(&name).await;
        });
    }

    /// What the scheduler owes the room next, and how long to wait first.
    fn plan(&self, room: &Room) -> Option<Duration> {
        if room.status != RoomStatus::Playing {
            return None;
        }
        let game = room.game.as_ref()?;
        match game.phase {
            Phase::GameOver => None,
            Phase::HandOver => {
                if room.players.iter().any(|p| p.is_bot) {
                    Some(HAND_OVER_PAUSE)
                } else {
                    None
                }
            }
            _ => {
                let player = room.player_at(game.turn_seat)?;
                let delay = if player.is_bot {
                    room.bot_difficulty.think_delay()
                } else if !player.connected {
                    DISCONNECTED_DELAY
                } else {
                    return None;
                };
                let trick_just_resolved = game.phase == Phase::Playing
                    && game.current_trick.is_empty()
                    && !game.completed_tricks.is_empty();
                if trick_just_resolved {
                    Some(delay.max(POST_TRICK_PAUSE))
                } else {
                    Some(delay)
                }
            }
        }
    }

    /// Execute one automated action: the bot engine for bots, deterministic
    /// fallbacks for disconnected humans, the next hand after a pause.
    fn step(&self, entry: &mut RoomEntry) -> Result<(), EuchreError> {
        let (player_id, action) = {
            let room = &entry.room;
            let game = room.game.as_ref().ok_or(EuchreError::RoomNotStarted)?;
            if game.phase == Phase::HandOver {
                let bot = room
                    .players
                    .iter()
                    .find(|p| p.is_bot)
                    .ok_or(EuchreError::UnknownPlayer)?;
                (bot.id, Action::StartNextHand)
            } else {
                let player = room
                    .player_at(game.turn_seat)
                    .ok_or(EuchreError::UnknownPlayer)?;
                let action = if player.is_bot {
                    bot::decide(room, player.seat_index, &mut rand::thread_rng())
                } else {
                    bot::fallback(room, player.seat_index)
                };
                (player.id, action.ok_or(EuchreError::NotYourTurn)?)
            }
        };
        let infos = entry
            .room
            .apply_action(player_id, &action, &mut rand::thread_rng())?;
        self.persist(&entry.room)?;
        self.send_infos(entry, &infos);
        self.broadcast(entry);
        Ok(())
    }

    #[cfg(test)]
    pub async fn room_for_test(&self, name: &str) -> Option<Room> {
        let arc = self.inner.lock().await.get(name).cloned()?;
        let entry = arc.lock().await;
        Some(entry.room.clone())
    }

    #[cfg(test)]
    pub async fn edit_room_for_test<F: FnOnce(&mut Room)>(&self, name: &str, f: F) {
        let arc = self.inner.lock().await.get(name).cloned();
        if let Some(arc) = arc {
            f(&mut arc.lock().await.room);
        }
    }

    /// One coalesced scheduler pass: delay, act, persist, broadcast, until a
    /// connected human is up, the hand ends, or the step cap trips. Returns
    /// the number of actions taken; invoking it again without intervening
    /// mutations takes none.
    pub async fn advance_pass(&self, name: &str) -> usize {
        let arc = match self.fetch(name).await {
            Ok(arc) => arc,
            Err(_) => return 0,
        };
        {
            let mut entry = arc.lock().await;
            if entry.advancing {
                return 0;
            }
            entry.advancing = true;
        }
        let mut steps = 0;
        let mut failed = false;
        while steps < MAX_AUTO_STEPS {
            let delay = {
                let entry = arc.lock().await;
                match self.plan(&entry.room) {
                    Some(delay) => delay,
                    None => break,
                }
            };
            if self.pacing == Pacing::Normal {
                time::sleep(delay).await;
            }
            let mut entry = arc.lock().await;
            // The world may have moved while we slept.
            if self.plan(&entry.room).is_none() {
                break;
            }
            match self.step(&mut entry) {
                Ok(()) => steps += 1,
                Err(e) => {
                    warn!("scheduler stalled in room {}: {}", name, e);
                    failed = true;
                    break;
                }
            }
        }
        let rearm = {
            let mut entry = arc.lock().await;
            entry.advancing = false;
            !failed && self.pacing == Pacing::Normal && self.plan(&entry.room).is_some()
        };
        if rearm {
            self.schedule_advance(name);
        }
        steps
    }
}
