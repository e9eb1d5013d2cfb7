use crate::{config::CONFIG, db::Database, error::EuchreError, server::Rooms};
use r2d2_sqlite::SqliteConnectionManager;
use warp::Filter;

#[macro_use]
mod macros;

mod bot;
mod card;
mod config;
mod db;
mod endpoint;
mod error;
mod game;
mod protocol;
mod room;
mod rules;
mod server;
mod types;

#[tokio::main]
async fn main() -> Result<(), EuchreError> {
    env_logger::init();
    let db = Database::new(SqliteConnectionManager::file(&CONFIG.db_path))?;
    let rooms = Rooms::new(db)?;
    rooms.clone().start_background_reaper();

    let rooms = warp::any().map(move || rooms.clone());
    let app = endpoint::router(rooms)
        .recover(error::handle_rejection)
        .with(warp::log("request"));
    warp::serve(app).run(([0, 0, 0, 0], CONFIG.port)).await;
    Ok(())
}
