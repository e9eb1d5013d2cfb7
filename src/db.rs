use crate::{error::EuchreError, room::Room};
use r2d2::{CustomizeConnection, Pool};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Connection, Transaction, TransactionBehavior};
use std::time::Duration;
use tokio::task;

/// Durable store for rooms: one row per room, the whole room as JSON,
/// overwritten atomically on every commit.
#[derive(Clone)]
pub struct Database {
    pool: Pool<SqliteConnectionManager>,
}

impl Database {
    pub fn new(manager: SqliteConnectionManager) -> Result<Self, EuchreError> {
        let pool = Pool::builder()
            .connection_customizer(Box::new(Customizer))
            .build(manager)
            .expect("sqlite pool");
        Database::seed(&pool.get().expect("sqlite connection"))?;
        Ok(Self { pool })
    }

    fn seed(conn: &Connection) -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
            BEGIN;
            CREATE TABLE IF NOT EXISTS room (
                name       TEXT PRIMARY KEY,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                data       TEXT NOT NULL
            );
            END;",
        )
    }

    pub fn save_room(&self, room: &Room) -> Result<(), EuchreError> {
        let data = serde_json::to_string(room)?;
        self.run_with_retry(|tx| {
            tx.execute(
                "INSERT INTO room (name, created_at, updated_at, data) VALUES (?1, ?2, ?3, ?4)
                    ON CONFLICT (name) DO UPDATE SET updated_at = ?3, data = ?4",
                params![room.name, room.created_at, room.updated_at, data],
            )?;
            Ok(())
        })
    }

    pub fn delete_room(&self, name: &str) -> Result<(), EuchreError> {
        self.run_with_retry(|tx| {
            tx.execute("DELETE FROM room WHERE name = ?", [name])?;
            Ok(())
        })
    }

    pub fn load_rooms(&self) -> Result<Vec<Room>, EuchreError> {
        self.run_read_only(|tx| {
            let mut stmt = tx.prepare("SELECT data FROM room")?;
            let mut rows = stmt.query([])?;
            let mut rooms = Vec::new();
            while let Some(row) = rows.next()? {
                rooms.push(serde_json::from_str(&row.get::<_, String>(0)?)?);
            }
            Ok(rooms)
        })
    }

    pub fn run_read_only<F, T>(&self, f: F) -> Result<T, EuchreError>
    where
        F: FnMut(&Transaction) -> Result<T, EuchreError>,
    {
        self.run_sql(TransactionBehavior::Deferred, f)
    }

    pub fn run_with_retry<F, T>(&self, f: F) -> Result<T, EuchreError>
    where
        F: FnMut(&Transaction) -> Result<T, EuchreError>,
    {
        self.run_sql(TransactionBehavior::Immediate, f)
    }

    fn run_sql<F, T>(&self, behavior: TransactionBehavior, mut f: F) -> Result<T, EuchreError>
    where
        F: FnMut(&Transaction) -> Result<T, EuchreError>,
    {
        task::block_in_place(|| {
            let mut conn = self.pool.get().expect("sqlite connection");
            for i in 0.. {
                let result = conn
                    .transaction_with_behavior(behavior)
                    .map_err(EuchreError::from)
                    .and_then(|tx| {
                        let value = f(&tx)?;
                        tx.commit()?;
                        Ok(value)
                    });
                match result {
                    Err(e) if i < 5 && e.is_retriable() => continue,
                    v => return v,
                }
            }
            unreachable!()
        })
    }
}

#[derive(Debug)]
struct Customizer;

impl CustomizeConnection<Connection, rusqlite::Error> for Customizer {
    fn on_acquire(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(())
    }

    fn on_release(&self, _: Connection) {}
}
