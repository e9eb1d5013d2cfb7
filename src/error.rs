use crate::card::Suit;
use rusqlite::ErrorCode;
use serde::Serialize;
use std::convert::Infallible;
use thiserror::Error;
use warp::{http::StatusCode, reject::Reject, Rejection, Reply};

#[derive(Debug, Error)]
pub enum EuchreError {
    #[error("cannot call {0}, it was turned down")]
    BlockedSuit(Suit),
    #[error("creator token does not match")]
    CreatorTokenMismatch,
    #[error("only the room creator can do that")]
    CreatorOnly,
    #[error("{0} is not a valid card")]
    InvalidCard(String),
    #[error("{0} is not a valid difficulty")]
    InvalidDifficulty(String),
    #[error("{0} is not a valid seat")]
    InvalidSeat(usize),
    #[error("{0} is not a valid suit")]
    InvalidSuit(String),
    #[error("that move is not legal in the {0} phase")]
    IllegalPhase(&'static str),
    #[error("room name is required")]
    MissingRoomName,
    #[error("player name is required")]
    MissingPlayerName,
    #[error("you must follow suit")]
    MustFollowSuit,
    #[error("the name {0} is taken")]
    NameTaken(String),
    #[error("the room needs four seated players to start")]
    NotEnoughPlayers,
    #[error("you do not hold {0}")]
    NotYourCard(String),
    #[error("it is not your turn")]
    NotYourTurn,
    #[error("room {0} already exists")]
    RoomExists(String),
    #[error("room {0} is full")]
    RoomFull(String),
    #[error("the game has not started")]
    RoomNotStarted,
    #[error("the game has already started")]
    RoomStarted,
    #[error("unexpected serde error")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error("unexpected sqlite error")]
    Sqlite {
        #[from]
        source: rusqlite::Error,
    },
    #[error("unknown player")]
    UnknownPlayer,
    #[error("unknown room {0}")]
    UnknownRoom(String),
    #[error("wrong password")]
    WrongPassword,
}

impl EuchreError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, EuchreError::Sqlite {
                source: rusqlite::Error::SqliteFailure(e, _),
            } if e.code == ErrorCode::DatabaseBusy || e.code == ErrorCode::DatabaseLocked)
    }

    fn status_code(&self) -> StatusCode {
        match self {
            EuchreError::Serde { .. } | EuchreError::Sqlite { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            EuchreError::UnknownRoom { .. } => StatusCode::NOT_FOUND,
            EuchreError::WrongPassword
            | EuchreError::CreatorTokenMismatch
            | EuchreError::CreatorOnly => StatusCode::FORBIDDEN,
            EuchreError::RoomExists { .. }
            | EuchreError::RoomFull { .. }
            | EuchreError::NameTaken { .. } => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl Reject for EuchreError {}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let code;
    let message;

    if err.is_not_found() {
        code = StatusCode::NOT_FOUND;
        message = "not found".to_string();
    } else if let Some(error) = err.find::<EuchreError>() {
        code = error.status_code();
        message = error.to_string();
    } else {
        code = StatusCode::INTERNAL_SERVER_ERROR;
        message = "unknown error".to_string();
    }

    let json = warp::reply::json(&ErrorMessage {
        code: code.as_u16(),
        message,
    });

    Ok(warp::reply::with_status(json, code))
}
