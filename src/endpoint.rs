use crate::{
    protocol::{ClientMessage, ServerMessage},
    server::{ConnectRequest, Rooms},
    types::Difficulty,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use warp::{
    ws,
    ws::{Message, WebSocket},
    Filter, Rejection, Reply,
};

pub fn router(rooms: infallible!(Rooms)) -> reply!() {
    list_rooms(rooms.clone())
        .or(delete_room(rooms.clone()))
        .or(websocket(rooms))
        .boxed()
}

fn list_rooms(rooms: infallible!(Rooms)) -> reply!() {
    async fn handle(rooms: Rooms) -> Result<impl Reply, Rejection> {
        let list = rooms.list().await?;
        Ok(warp::reply::json(&list))
    }

    warp::path!("rooms")
        .and(warp::get())
        .and(rooms)
        .and_then(handle)
}

fn delete_room(rooms: infallible!(Rooms)) -> reply!() {
    #[derive(Debug, Deserialize)]
    struct Query {
        #[serde(rename = "creatorToken")]
        creator_token: Option<String>,
    }

    async fn handle(name: String, rooms: Rooms, query: Query) -> Result<impl Reply, Rejection> {
        rooms
            .delete(&name, query.creator_token.as_deref().unwrap_or_default())
            .await?;
        Ok(warp::reply::json(&serde_json::json!({ "ok": true })))
    }

    warp::path!("rooms" / String)
        .and(warp::delete())
        .and(rooms)
        .and(warp::query())
        .and_then(handle)
}

fn websocket(rooms: infallible!(Rooms)) -> reply!() {
    #[derive(Debug, Deserialize)]
    struct Query {
        room: Option<String>,
        name: Option<String>,
        password: Option<String>,
        create: Option<u8>,
        #[serde(rename = "creatorToken")]
        creator_token: Option<String>,
        #[serde(rename = "botDifficulty")]
        bot_difficulty: Option<Difficulty>,
    }

    async fn handle(query: Query, ws: ws::Ws, rooms: Rooms) -> Result<impl Reply, Rejection> {
        let req = ConnectRequest {
            room: query.room.unwrap_or_default(),
            name: query.name.unwrap_or_default(),
            password: query.password,
            create: query.create == Some(1),
            creator_token: query.creator_token,
            bot_difficulty: query.bot_difficulty,
        }
        .validate()?;
        // Refuse with a proper status before upgrading.
        rooms.check_connect(&req).await?;
        Ok(ws.on_upgrade(move |socket| client_session(socket, rooms, req)))
    }

    warp::path!("websocket")
        .and(warp::query())
        .and(warp::ws())
        .and(rooms)
        .and_then(handle)
}

async fn client_session(socket: WebSocket, rooms: Rooms, req: ConnectRequest) {
    let (mut sink, mut stream) = socket.split();
    let conn = match rooms.connect(req).await {
        Ok(conn) => conn,
        Err(e) => {
            // Lost the admission race after the pre-upgrade check.
            if let Ok(text) = serde_json::to_string(&ServerMessage::error(e.to_string())) {
                let _ = sink.send(Message::text(text)).await;
            }
            let _ = sink.send(Message::close_with(1008u16, "refused")).await;
            return;
        }
    };
    let mut rx = conn.rx;
    tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            // The room evicted this session (delete or reap).
            if matches!(message, ServerMessage::Goodbye) {
                break;
            }
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(_) => continue,
            };
            if sink.send(Message::text(text)).await.is_err() {
                return;
            }
        }
        let _ = sink.send(Message::close_with(1001u16, "room closed")).await;
        let _ = sink.close().await;
    });
    while let Some(Ok(message)) = stream.next().await {
        if message.is_close() {
            break;
        }
        let text = match message.to_str() {
            Ok(text) => text,
            Err(_) => continue,
        };
        match serde_json::from_str::<ClientMessage>(text) {
            // Keepalives are answered without waking the room actor.
            Ok(ClientMessage::Ping) => {
                let _ = conn.tx.send(ServerMessage::Pong);
            }
            Ok(ClientMessage::Action(action)) => {
                if rooms
                    .apply(&conn.room_name, conn.session_id, action)
                    .await
                    .is_err()
                {
                    break;
                }
            }
            Err(_) => {
                let _ = conn.tx.send(ServerMessage::error("malformed message"));
            }
        }
    }
    rooms.disconnect(&conn.room_name, conn.session_id).await;
}
