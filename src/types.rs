use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    fmt::Display,
    str::FromStr,
    time::{Duration, SystemTime},
};
use uuid::Uuid;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PlayerId(Uuid);

impl PlayerId {
    pub fn new() -> PlayerId {
        PlayerId(Uuid::new_v4())
    }
}

impl Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for PlayerId {
    type Err = <Uuid as FromStr>::Err;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(PlayerId(s.parse()?))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> SessionId {
        SessionId(Uuid::new_v4())
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        Display::fmt(&self.0, f)
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    Waiting,
    Playing,
}

/// Bot strength and pacing. The numbers are deliberate product constants,
/// not tunables.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Determinizations sampled per decision.
    pub fn sample_count(self) -> usize {
        match self {
            Difficulty::Easy => 4,
            Difficulty::Medium => 8,
            Difficulty::Hard => 16,
        }
    }

    /// Alpha-beta depth in plies.
    pub fn search_depth(self) -> u32 {
        match self {
            Difficulty::Easy => 2,
            Difficulty::Medium => 4,
            Difficulty::Hard => 8,
        }
    }

    /// Chance of discarding the search result for a uniform legal move.
    pub fn random_move_rate(self) -> f64 {
        match self {
            Difficulty::Easy => 0.35,
            Difficulty::Medium => 0.12,
            Difficulty::Hard => 0.0,
        }
    }

    /// Minimum mean search score to accept a bid.
    pub fn bid_threshold(self) -> f32 {
        match self {
            Difficulty::Easy => 45.0,
            Difficulty::Medium => 20.0,
            Difficulty::Hard => -5.0,
        }
    }

    pub fn think_delay(self) -> Duration {
        Duration::from_millis(match self {
            Difficulty::Easy => 1600,
            Difficulty::Medium => 1300,
            Difficulty::Hard => 1050,
        })
    }
}

impl Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Difficulty::Easy => f.write_str("easy"),
            Difficulty::Medium => f.write_str("medium"),
            Difficulty::Hard => f.write_str("hard"),
        }
    }
}

impl FromStr for Difficulty {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(s.to_string()),
        }
    }
}

pub fn team_of(seat: usize) -> usize {
    seat % 2
}

pub fn partner_of(seat: usize) -> usize {
    (seat + 2) % 4
}

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
}

static BOT_NAMES: &[&str] = &[
    "ada", "blaise", "carl", "emmy", "evariste", "kurt", "leonhard", "muriel", "pafnuty",
    "sofia", "srinivasa", "terence",
];

pub fn bot_name<R: Rng>(rng: &mut R) -> String {
    let mut name = BOT_NAMES[rng.gen_range(0..BOT_NAMES.len())].to_string();
    name.push_str(" (bot)");
    name
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_difficulty_table() {
        assert_eq!(Difficulty::Easy.sample_count(), 4);
        assert_eq!(Difficulty::Easy.search_depth(), 2);
        assert_eq!(Difficulty::Easy.random_move_rate(), 0.35);
        assert_eq!(Difficulty::Easy.bid_threshold(), 45.0);
        assert_eq!(Difficulty::Medium.sample_count(), 8);
        assert_eq!(Difficulty::Medium.search_depth(), 4);
        assert_eq!(Difficulty::Medium.random_move_rate(), 0.12);
        assert_eq!(Difficulty::Medium.bid_threshold(), 20.0);
        assert_eq!(Difficulty::Hard.sample_count(), 16);
        assert_eq!(Difficulty::Hard.search_depth(), 8);
        assert_eq!(Difficulty::Hard.random_move_rate(), 0.0);
        assert_eq!(Difficulty::Hard.bid_threshold(), -5.0);
    }

    #[test]
    fn test_teams() {
        assert_eq!(team_of(0), 0);
        assert_eq!(team_of(2), 0);
        assert_eq!(team_of(1), 1);
        assert_eq!(team_of(3), 1);
        assert_eq!(partner_of(0), 2);
        assert_eq!(partner_of(3), 1);
    }
}
