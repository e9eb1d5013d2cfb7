use crate::{
    card::Card,
    error::EuchreError,
    game::GameState,
    types::{bot_name, now_millis, Difficulty, PlayerId, RoomStatus},
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MAX_PLAYERS: usize = 4;
pub const ROOM_TTL_MILLIS: i64 = 60 * 60 * 1000;
pub const MAX_ROOM_NAME: usize = 24;
pub const MAX_PLAYER_NAME: usize = 40;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub seat_index: usize,
    pub connected: bool,
    pub is_bot: bool,
    pub hand: Vec<Card>,
}

#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Score {
    pub team0: i32,
    pub team1: i32,
}

impl Score {
    pub fn get(&self, team: usize) -> i32 {
        if team == 0 {
            self.team0
        } else {
            self.team1
        }
    }

    pub fn add(&mut self, team: usize, points: i32) {
        if team == 0 {
            self.team0 += points;
        } else {
            self.team1 += points;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub name: String,
    pub password: Option<String>,
    pub creator_token: String,
    pub creator_player_id: Option<PlayerId>,
    pub created_at: i64,
    pub updated_at: i64,
    pub max_players: usize,
    pub status: RoomStatus,
    pub bot_difficulty: Difficulty,
    pub score: Score,
    pub players: Vec<Player>,
    pub game: Option<GameState>,
    pub seed: String,
    pub deals_dealt: u64,
}

impl Room {
    pub fn new(name: String, password: Option<String>, bot_difficulty: Difficulty) -> Self {
        let now = now_millis();
        Self {
            name,
            password,
            creator_token: Uuid::new_v4().to_string(),
            creator_player_id: None,
            created_at: now,
            updated_at: now,
            max_players: MAX_PLAYERS,
            status: RoomStatus::Waiting,
            bot_difficulty,
            score: Score::default(),
            players: Vec::new(),
            game: None,
            seed: Uuid::new_v4().to_string(),
            deals_dealt: 0,
        }
    }

    pub fn expired(&self, now: i64) -> bool {
        now - self.created_at > ROOM_TTL_MILLIS
    }

    pub fn bot_count(&self) -> usize {
        self.players.iter().filter(|p| p.is_bot).count()
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub fn player_at(&self, seat: usize) -> Option<&Player> {
        self.players.iter().find(|p| p.seat_index == seat)
    }

    pub fn player_by_name(&self, name: &str) -> Option<&Player> {
        self.players
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn is_creator(&self, id: PlayerId) -> bool {
        self.creator_player_id == Some(id)
    }

    fn free_seat(&self) -> Option<usize> {
        (0..self.max_players).find(|&seat| self.player_at(seat).is_none())
    }

    /// Bind a connecting player: reconnect a disconnected human of the same
    /// name (case-insensitive) or seat a fresh one. Bot names are reserved
    /// for good.
    pub fn join(&mut self, name: &str) -> Result<PlayerId, EuchreError> {
        if let Some(player) = self.player_by_name(name) {
            if player.is_bot || player.connected {
                return Err(EuchreError::NameTaken(name.to_string()));
            }
            let id = player.id;
            self.player_mut(id).unwrap().connected = true;
            return Ok(id);
        }
        let seat = match self.free_seat() {
            Some(seat) if self.players.len() < self.max_players => seat,
            _ => return Err(EuchreError::RoomFull(self.name.clone())),
        };
        let player = Player {
            id: PlayerId::new(),
            name: name.to_string(),
            seat_index: seat,
            connected: true,
            is_bot: false,
            hand: Vec::new(),
        };
        let id = player.id;
        self.players.push(player);
        Ok(id)
    }

    pub fn add_bot<R: Rng>(&mut self, rng: &mut R) -> Result<&Player, EuchreError> {
        let seat = match self.free_seat() {
            Some(seat) if self.players.len() < self.max_players => seat,
            _ => return Err(EuchreError::RoomFull(self.name.clone())),
        };
        let mut name = bot_name(rng);
        while self.player_by_name(&name).is_some() {
            name = bot_name(rng);
        }
        self.players.push(Player {
            id: PlayerId::new(),
            name,
            seat_index: seat,
            connected: true,
            is_bot: true,
            hand: Vec::new(),
        });
        Ok(self.players.last().unwrap())
    }

    pub fn remove_last_bot(&mut self) -> Result<Player, EuchreError> {
        match self.players.iter().rposition(|p| p.is_bot) {
            Some(idx) => Ok(self.players.remove(idx)),
            None => Err(EuchreError::UnknownPlayer),
        }
    }

    pub fn move_seat(&mut self, target: PlayerId, seat: usize) -> Result<(), EuchreError> {
        if seat >= self.max_players {
            return Err(EuchreError::InvalidSeat(seat));
        }
        let from = self
            .player(target)
            .ok_or(EuchreError::UnknownPlayer)?
            .seat_index;
        if let Some(occupant) = self.player_at(seat).map(|p| p.id) {
            self.player_mut(occupant).unwrap().seat_index = from;
        }
        self.player_mut(target).unwrap().seat_index = seat;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn room() -> Room {
        Room::new("r1".to_string(), None, Difficulty::Medium)
    }

    #[test]
    fn test_join_assigns_lowest_free_seat() {
        let mut room = room();
        room.join("alice").unwrap();
        room.join("bob").unwrap();
        assert_eq!(room.player_by_name("alice").unwrap().seat_index, 0);
        assert_eq!(room.player_by_name("bob").unwrap().seat_index, 1);
        room.move_seat(room.player_by_name("alice").unwrap().id, 3)
            .unwrap();
        room.join("carol").unwrap();
        assert_eq!(room.player_by_name("carol").unwrap().seat_index, 0);
    }

    #[test]
    fn test_join_reconnects_by_case_insensitive_name() {
        let mut room = room();
        let id = room.join("Alice").unwrap();
        assert!(matches!(
            room.join("alice"),
            Err(EuchreError::NameTaken(_))
        ));
        room.player_mut(id).unwrap().connected = false;
        assert_eq!(room.join("ALICE").unwrap(), id);
        assert!(room.player(id).unwrap().connected);
    }

    #[test]
    fn test_bot_names_are_reserved() {
        let mut room = room();
        let mut rng = rand::thread_rng();
        let name = room.add_bot(&mut rng).unwrap().name.clone();
        assert!(matches!(room.join(&name), Err(EuchreError::NameTaken(_))));
    }

    #[test]
    fn test_room_fills_at_four() {
        let mut room = room();
        for name in ["a", "b", "c", "d"] {
            room.join(name).unwrap();
        }
        assert!(matches!(room.join("e"), Err(EuchreError::RoomFull(_))));
        let mut rng = rand::thread_rng();
        assert!(matches!(
            room.add_bot(&mut rng),
            Err(EuchreError::RoomFull(_))
        ));
    }

    #[test]
    fn test_move_seat_swaps_occupant() {
        let mut room = room();
        let a = room.join("a").unwrap();
        let b = room.join("b").unwrap();
        room.move_seat(a, 1).unwrap();
        assert_eq!(room.player(a).unwrap().seat_index, 1);
        assert_eq!(room.player(b).unwrap().seat_index, 0);
        assert!(matches!(
            room.move_seat(a, 4),
            Err(EuchreError::InvalidSeat(4))
        ));
    }

    #[test]
    fn test_ttl() {
        let room = room();
        assert!(!room.expired(room.created_at + ROOM_TTL_MILLIS));
        assert!(room.expired(room.created_at + ROOM_TTL_MILLIS + 1));
    }
}
