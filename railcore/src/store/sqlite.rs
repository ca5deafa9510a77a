use anyhow::Context;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{GameError, GameResult};
use crate::protocol::Action;
use crate::store::{ActionLog, ActionRecord, GameRecord, PlayerRecord};

/// `rusqlite`-backed action log. A single connection behind a mutex is
/// enough: every write here is already serialized by the per-game lock one
/// layer up, and sqlite itself serializes writers.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(uri: &str) -> GameResult<SqliteStore> {
        let conn = Connection::open(uri).context("opening sqlite database")?;
        conn.execute_batch(SCHEMA).context("applying sqlite schema")?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }

    pub fn in_memory() -> GameResult<SqliteStore> {
        let conn = Connection::open_in_memory().context("opening in-memory sqlite database")?;
        conn.execute_batch(SCHEMA).context("applying sqlite schema")?;
        Ok(SqliteStore { conn: Mutex::new(conn) })
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    map_name TEXT NOT NULL,
    num_players INTEGER NOT NULL,
    data TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);

CREATE TABLE IF NOT EXISTS actions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    game_id INTEGER NOT NULL REFERENCES games(id),
    code INTEGER NOT NULL,
    message TEXT NOT NULL,
    player_id TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);
CREATE INDEX IF NOT EXISTS idx_actions_game_order ON actions(game_id, created_at, id);

CREATE TABLE IF NOT EXISTS players (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    password TEXT,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);
"#;

impl ActionLog for SqliteStore {
    fn create_game(&self, name: &str, map_name: &str, num_players: u32) -> GameResult<i64> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO games (name, map_name, num_players) VALUES (?1, ?2, ?3)",
            params![name, map_name, num_players],
        )
        .context("inserting game row")?;
        Ok(conn.last_insert_rowid())
    }

    fn list_games(&self) -> GameResult<Vec<GameRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, name, map_name, num_players, data, created_at FROM games ORDER BY id")
            .context("preparing games query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("executing games query")?;
        let mut out = Vec::new();
        for row in rows {
            let (id, name, map_name, num_players, data, created_at) = row.context("reading game row")?;
            let data = data.map(|d| serde_json::from_str(&d)).transpose().context("decoding stored game data")?;
            out.push(GameRecord { id, name, map_name, num_players, created_at, data });
        }
        Ok(out)
    }

    fn get_game(&self, game_idx: i64) -> GameResult<Option<GameRecord>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT id, name, map_name, num_players, data, created_at FROM games WHERE id = ?1",
                params![game_idx],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, u32>(3)?,
                        row.get::<_, Option<String>>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()
            .context("querying game by id")?;
        let Some((id, name, map_name, num_players, data, created_at)) = row else {
            return Ok(None);
        };
        let data = data.map(|d| serde_json::from_str(&d)).transpose().context("decoding stored game data")?;
        Ok(Some(GameRecord { id, name, map_name, num_players, created_at, data }))
    }

    fn finish_game(&self, game_idx: i64, data: Value) -> GameResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE games SET data = ?1 WHERE id = ?2",
            params![data.to_string(), game_idx],
        )
        .context("writing game finish summary")?;
        Ok(())
    }

    fn append(&self, game_idx: i64, action: Action, message: Value, player_idx: Option<&str>) -> GameResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO actions (game_id, code, message, player_id) VALUES (?1, ?2, ?3, ?4)",
            params![game_idx, action as u32, message.to_string(), player_idx],
        )
        .context("inserting action row")?;
        Ok(())
    }

    fn actions_for(&self, game_idx: i64) -> GameResult<Vec<ActionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare("SELECT id, code, message, player_id, created_at FROM actions WHERE game_id = ?1 ORDER BY created_at, id")
            .context("preparing actions query")?;
        let rows = stmt
            .query_map(params![game_idx], |row| {
                let code: u32 = row.get(1)?;
                let message: String = row.get(2)?;
                Ok((row.get::<_, i64>(0)?, code, message, row.get::<_, Option<String>>(3)?, row.get::<_, String>(4)?))
            })
            .context("executing actions query")?;

        let mut out = Vec::new();
        for row in rows {
            let (id, code, message, player_idx, created_at) = row.context("reading action row")?;
            let action = Action::from_u32(code)?;
            let message: Value = serde_json::from_str(&message).context("decoding stored action payload")?;
            out.push(ActionRecord { id, game_id: game_idx, action, message, player_idx, created_at });
        }
        Ok(out)
    }

    fn get_player_by_name(&self, name: &str) -> GameResult<Option<PlayerRecord>> {
        let conn = self.conn.lock();
        conn.query_row("SELECT id, name, password FROM players WHERE name = ?1", params![name], |row| {
            Ok(PlayerRecord { idx: row.get(0)?, name: row.get(1)?, password: row.get(2)? })
        })
        .optional()
        .context("querying player by name")
        .map_err(GameError::from)
    }

    fn create_player(&self, idx: &str, name: &str, password: Option<&str>) -> GameResult<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO players (id, name, password) VALUES (?1, ?2, ?3)",
            params![idx, name, password],
        )
        .context("inserting player row")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_actions_in_created_order() {
        let store = SqliteStore::in_memory().unwrap();
        let game_idx = store.create_game("alpha", "starter", 2).unwrap();

        store.append(game_idx, Action::Login, serde_json::json!({"name": "p1"}), Some("p1")).unwrap();
        store.append(game_idx, Action::Move, serde_json::json!({"train_idx": 1}), Some("p1")).unwrap();

        let actions = store.actions_for(game_idx).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[0].action, Action::Login);
        assert_eq!(actions[1].action, Action::Move);
    }

    #[test]
    fn creates_and_finds_players() {
        let store = SqliteStore::in_memory().unwrap();
        store.create_player("uuid-1", "alice", Some("secret")).unwrap();
        let found = store.get_player_by_name("alice").unwrap().unwrap();
        assert_eq!(found.idx, "uuid-1");
        assert_eq!(found.password.as_deref(), Some("secret"));
        assert!(store.get_player_by_name("nobody").unwrap().is_none());
    }
}
