use crate::error::EuchreError;
use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeStruct,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{
    fmt,
    fmt::{Debug, Display},
    mem,
    str::FromStr,
};

const RANKS: [&str; 6] = ["9", "10", "J", "Q", "K", "A"];

#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Rank {
    pub const VALUES: [Rank; 6] = [
        Rank::Nine,
        Rank::Ten,
        Rank::Jack,
        Rank::Queen,
        Rank::King,
        Rank::Ace,
    ];

    pub fn str(self) -> &'static str {
        RANKS[self as usize]
    }
}

impl From<u8> for Rank {
    fn from(n: u8) -> Self {
        assert!(n < 6, "n={}", n);
        unsafe { mem::transmute(n) }
    }
}

impl FromStr for Rank {
    type Err = EuchreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RANKS
            .iter()
            .position(|&r| r == s)
            .map(|n| Self::from(n as u8))
            .ok_or_else(|| EuchreError::InvalidCard(s.to_string()))
    }
}

impl Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.str())
    }
}

impl Debug for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

const SUITS: [&str; 4] = ["clubs", "diamonds", "hearts", "spades"];

#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Clubs,
    Diamonds,
    Hearts,
    Spades,
}

impl Suit {
    pub const VALUES: [Suit; 4] = [Suit::Clubs, Suit::Diamonds, Suit::Hearts, Suit::Spades];

    pub fn str(self) -> &'static str {
        SUITS[self as usize]
    }

    /// The other suit of the same color; its jack is the left bower.
    pub fn same_color(self) -> Suit {
        match self {
            Suit::Clubs => Suit::Spades,
            Suit::Spades => Suit::Clubs,
            Suit::Diamonds => Suit::Hearts,
            Suit::Hearts => Suit::Diamonds,
        }
    }
}

impl From<u8> for Suit {
    fn from(n: u8) -> Self {
        assert!(n < 4, "n={}", n);
        unsafe { mem::transmute(n) }
    }
}

impl FromStr for Suit {
    type Err = EuchreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SUITS
            .iter()
            .position(|&v| v == s)
            .map(|n| Self::from(n as u8))
            .ok_or_else(|| EuchreError::InvalidSuit(s.to_string()))
    }
}

impl Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.str())
    }
}

impl Debug for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

/// One of the 24 euchre cards. The id `"{suit}-{rank}"` doubles as the wire
/// identifier; a single deal never contains two cards of the same suit and
/// rank, so ids are unique within a room.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub fn new(suit: Suit, rank: Rank) -> Self {
        Self { suit, rank }
    }

    pub fn id(self) -> String {
        self.to_string()
    }
}

impl Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}-{}", self.suit, self.rank)
    }
}

impl Debug for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

impl FromStr for Card {
    type Err = EuchreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (suit, rank) = s
            .split_once('-')
            .ok_or_else(|| EuchreError::InvalidCard(s.to_string()))?;
        Ok(Card::new(suit.parse()?, rank.parse()?))
    }
}

impl Serialize for Card {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("Card", 3)?;
        state.serialize_field("id", &self.to_string())?;
        state.serialize_field("suit", &self.suit)?;
        state.serialize_field("rank", &self.rank)?;
        state.end()
    }
}

// Commands carry bare ids while persisted rooms carry the full object, so
// deserialization accepts both shapes.
impl<'de> Deserialize<'de> for Card {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(CardVisitor)
    }
}

struct CardVisitor;

impl<'de> Visitor<'de> for CardVisitor {
    type Value = Card;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a card id or a card object")
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: serde::de::Error,
    {
        v.parse().map_err(|_| E::custom(format!("bad card id {}", v)))
    }

    fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut id: Option<String> = None;
        let mut suit: Option<Suit> = None;
        let mut rank: Option<Rank> = None;
        while let Some(key) = map.next_key::<String>()? {
            match key.as_str() {
                "id" => id = Some(map.next_value()?),
                "suit" => suit = Some(map.next_value()?),
                "rank" => rank = Some(map.next_value()?),
                _ => {
                    map.next_value::<serde::de::IgnoredAny>()?;
                }
            }
        }
        if let (Some(suit), Some(rank)) = (suit, rank) {
            return Ok(Card::new(suit, rank));
        }
        match id {
            Some(id) => id
                .parse()
                .map_err(|_| serde::de::Error::custom(format!("bad card id {}", id))),
            None => Err(serde::de::Error::missing_field("id")),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_card_id_round_trip() {
        for suit in Suit::VALUES {
            for rank in Rank::VALUES {
                let card = Card::new(suit, rank);
                assert_eq!(card.id().parse::<Card>().unwrap(), card);
            }
        }
        assert_eq!(
            "hearts-9".parse::<Card>().unwrap(),
            Card::new(Suit::Hearts, Rank::Nine)
        );
        assert_eq!(
            "diamonds-J".parse::<Card>().unwrap(),
            Card::new(Suit::Diamonds, Rank::Jack)
        );
        assert!("hearts".parse::<Card>().is_err());
        assert!("hearts-2".parse::<Card>().is_err());
        assert!("stars-9".parse::<Card>().is_err());
    }

    #[test]
    fn test_card_serde() {
        let card = Card::new(Suit::Spades, Rank::Ten);
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": "spades-10", "suit": "spades", "rank": "10"})
        );
        assert_eq!(serde_json::from_value::<Card>(json).unwrap(), card);
        assert_eq!(
            serde_json::from_str::<Card>("\"spades-10\"").unwrap(),
            card
        );
    }

    #[test]
    fn test_same_color() {
        assert_eq!(Suit::Clubs.same_color(), Suit::Spades);
        assert_eq!(Suit::Spades.same_color(), Suit::Clubs);
        assert_eq!(Suit::Hearts.same_color(), Suit::Diamonds);
        assert_eq!(Suit::Diamonds.same_color(), Suit::Hearts);
    }
}
