//! Persistence: two tables suffice for the core — `games` and
//! `actions` — plus a `players` table for login-by-name/password.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde_json::Value;

use crate::error::GameResult;
use crate::protocol::Action;

#[derive(Clone, Debug)]
pub struct GameRecord {
    pub id: i64,
    pub name: String,
    pub map_name: String,
    pub num_players: u32,
    pub created_at: String,
    /// Per-player summary written once the game transitions to FINISHED;
    /// `None` while the game is still INIT/RUN.
    pub data: Option<Value>,
}

#[derive(Clone, Debug)]
pub struct ActionRecord {
    pub id: i64,
    pub game_id: i64,
    pub action: Action,
    pub message: Value,
    pub player_idx: Option<String>,
    pub created_at: String,
}

#[derive(Clone, Debug)]
pub struct PlayerRecord {
    pub idx: String,
    pub name: String,
    pub password: Option<String>,
}

/// Append-only action log plus the handful of lookups the server needs
/// around it ("Action Log").
pub trait ActionLog: Send + Sync {
    fn create_game(&self, name: &str, map_name: &str, num_players: u32) -> GameResult<i64>;
    fn list_games(&self) -> GameResult<Vec<GameRecord>>;
    fn get_game(&self, game_idx: i64) -> GameResult<Option<GameRecord>>;
    /// Writes the per-player summary for a game that just finished.
    fn finish_game(&self, game_idx: i64, data: Value) -> GameResult<()>;

    fn append(&self, game_idx: i64, action: Action, message: Value, player_idx: Option<&str>) -> GameResult<()>;
    /// Returns every action for a game, ordered by `(created_at, id)`.
    fn actions_for(&self, game_idx: i64) -> GameResult<Vec<ActionRecord>>;

    fn get_player_by_name(&self, name: &str) -> GameResult<Option<PlayerRecord>>;
    fn create_player(&self, idx: &str, name: &str, password: Option<&str>) -> GameResult<()>;
}
