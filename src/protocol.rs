use crate::{
    card::{Card, Suit},
    game::{CompletedTrick, GameState, HandSummary, Phase, TrickPlay, TARGET_SCORE},
    room::{Room, Score},
    rules,
    types::{Difficulty, PlayerId, RoomStatus},
};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ping,
    Action(Action),
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    Pass,
    OrderUp {
        #[serde(default)]
        alone: bool,
    },
    ChooseTrump {
        suit: Suit,
        #[serde(default)]
        alone: bool,
    },
    #[serde(rename_all = "camelCase")]
    Discard { card_id: String },
    #[serde(rename_all = "camelCase")]
    PlayCard { card_id: String },
    StartNextHand,
    RestartMatch,
    AddBot,
    RemoveBot,
    #[serde(rename_all = "camelCase")]
    SetSeat {
        target_player_id: PlayerId,
        seat_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    SetBotDifficulty { bot_difficulty: Difficulty },
    StartRoom,
    Chat { message: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Pong,
    Info { message: String },
    Error { message: String },
    State { state: Box<RoomSnapshot> },
    /// Never hits the wire as JSON: tells the socket task to close with
    /// "going away" because the room was deleted or reaped.
    #[serde(skip)]
    Goodbye,
}

impl ServerMessage {
    pub fn info(message: impl Into<String>) -> Self {
        ServerMessage::Info {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }
}

/// One player as everyone sees them: the hand is reduced to a count.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub seat_index: usize,
    pub connected: bool,
    pub is_bot: bool,
    pub hand_count: usize,
}

/// The recipient's private slice of the room.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YouView {
    pub player_id: PlayerId,
    pub seat_index: usize,
    pub hand: Vec<Card>,
}

/// The public game record. The kitty stays server-side.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameView {
    pub phase: Phase,
    pub dealer_seat: usize,
    pub turn_seat: usize,
    pub upcard: Option<Card>,
    pub blocked_suit: Option<Suit>,
    pub trump: Option<Suit>,
    pub maker_team: Option<usize>,
    pub called_by_player_id: Option<PlayerId>,
    pub going_alone_player_id: Option<PlayerId>,
    pub sitting_out_seat: Option<usize>,
    pub current_trick: Vec<TrickPlay>,
    pub completed_tricks: Vec<CompletedTrick>,
    pub trick_index: usize,
    pub hand_summary: Option<HandSummary>,
    pub hand_number: u32,
}

impl GameView {
    fn of(game: &GameState) -> Self {
        Self {
            phase: game.phase,
            dealer_seat: game.dealer_seat,
            turn_seat: game.turn_seat,
            upcard: game.upcard,
            blocked_suit: game.blocked_suit,
            trump: game.trump,
            maker_team: game.maker_team,
            called_by_player_id: game.called_by_player_id,
            going_alone_player_id: game.going_alone_player_id,
            sitting_out_seat: game.sitting_out_seat,
            current_trick: game.current_trick.clone(),
            completed_tricks: game.completed_tricks.clone(),
            trick_index: game.trick_index,
            hand_summary: game.hand_summary,
            hand_number: game.hand_number,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_name: String,
    pub max_players: usize,
    pub status: RoomStatus,
    pub bot_difficulty: Difficulty,
    pub bot_count: usize,
    pub score: Score,
    pub target_score: i32,
    pub players: Vec<PlayerView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub you: Option<YouView>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game: Option<GameView>,
    pub legal_plays: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator_token: Option<String>,
}

impl RoomSnapshot {
    /// The personalized view sent to `recipient` after every mutation. Only
    /// the recipient's own hand and legal plays are included; the creator
    /// also gets the creator token so a reopened browser keeps its powers.
    pub fn of(room: &Room, recipient: Option<PlayerId>) -> Self {
        let players = room
            .players
            .iter()
            .map(|p| PlayerView {
                id: p.id,
                name: p.name.clone(),
                seat_index: p.seat_index,
                connected: p.connected,
                is_bot: p.is_bot,
                hand_count: p.hand.len(),
            })
            .collect();
        let you = recipient
            .and_then(|id| room.player(id))
            .map(|p| YouView {
                player_id: p.id,
                seat_index: p.seat_index,
                hand: p.hand.clone(),
            });
        let legal_plays = match (&you, &room.game) {
            (Some(you), Some(game))
                if game.phase == Phase::Playing && game.turn_seat == you.seat_index =>
            {
                rules::legal_plays(
                    &you.hand,
                    game.lead_card(),
                    game.trump.expect("trump is set while playing"),
                )
                .into_iter()
                .map(|card| card.id())
                .collect()
            }
            _ => Vec::new(),
        };
        let creator_token = recipient
            .filter(|&id| room.is_creator(id))
            .map(|_| room.creator_token.clone());
        Self {
            room_name: room.name.clone(),
            max_players: room.max_players,
            status: room.status,
            bot_difficulty: room.bot_difficulty,
            bot_count: room.bot_count(),
            score: room.score,
            target_score: TARGET_SCORE,
            players,
            you,
            game: room.game.as_ref().map(GameView::of),
            legal_plays,
            creator_token,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomListing {
    pub name: String,
    pub players: usize,
    pub max_players: usize,
    pub bot_count: usize,
    pub bot_difficulty: Difficulty,
    pub has_password: bool,
    pub status: RoomStatus,
    pub created_at: i64,
}

impl RoomListing {
    pub fn of(room: &Room) -> Self {
        Self {
            name: room.name.clone(),
            players: room.players.len(),
            max_players: room.max_players,
            bot_count: room.bot_count(),
            bot_difficulty: room.bot_difficulty,
            has_password: room.password.is_some(),
            status: room.status,
            created_at: room.created_at,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoomList {
    pub rooms: Vec<RoomListing>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let msg: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"action","action":"pass"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Action(Action::Pass)));
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"action","action":"order-up","alone":true}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Action(Action::OrderUp { alone: true })
        ));
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"action","action":"order-up"}"#).unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Action(Action::OrderUp { alone: false })
        ));
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"action","action":"choose-trump","suit":"spades","alone":true}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Action(Action::ChooseTrump {
                suit: Suit::Spades,
                alone: true
            })
        ));
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"action","action":"play-card","cardId":"hearts-9"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Action(Action::PlayCard { card_id }) => {
                assert_eq!(card_id, "hearts-9")
            }
            other => panic!("unexpected {:?}", other),
        }
        let msg: ClientMessage = serde_json::from_str(
            r#"{"type":"action","action":"set-bot-difficulty","botDifficulty":"hard"}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            ClientMessage::Action(Action::SetBotDifficulty {
                bot_difficulty: Difficulty::Hard
            })
        ));
    }

    #[test]
    fn test_server_message_shape() {
        let json = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong"}));
        let json = serde_json::to_value(ServerMessage::error("nope")).unwrap();
        assert_eq!(json, serde_json::json!({"type": "error", "message": "nope"}));
    }
}
