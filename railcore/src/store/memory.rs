use parking_lot::Mutex;
use serde_json::Value;

use crate::error::GameResult;
use crate::protocol::Action;
use crate::store::{ActionLog, ActionRecord, GameRecord, PlayerRecord};

#[derive(Default)]
struct State {
    games: Vec<GameRecord>,
    actions: Vec<ActionRecord>,
    players: Vec<PlayerRecord>,
    next_action_id: i64,
}

/// Non-persistent [`ActionLog`] for tests (test tooling): same
/// ordering contract as [`crate::store::SqliteStore`], no `created_at`
/// resolution limit.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }
}

impl ActionLog for MemoryStore {
    fn create_game(&self, name: &str, map_name: &str, num_players: u32) -> GameResult<i64> {
        let mut state = self.state.lock();
        let id = state.games.len() as i64 + 1;
        state.games.push(GameRecord {
            id,
            name: name.to_string(),
            map_name: map_name.to_string(),
            num_players,
            created_at: format!("seq-{id}"),
            data: None,
        });
        Ok(id)
    }

    fn list_games(&self) -> GameResult<Vec<GameRecord>> {
        Ok(self.state.lock().games.clone())
    }

    fn get_game(&self, game_idx: i64) -> GameResult<Option<GameRecord>> {
        Ok(self.state.lock().games.iter().find(|g| g.id == game_idx).cloned())
    }

    fn finish_game(&self, game_idx: i64, data: Value) -> GameResult<()> {
        let mut state = self.state.lock();
        if let Some(game) = state.games.iter_mut().find(|g| g.id == game_idx) {
            game.data = Some(data);
        }
        Ok(())
    }

    fn append(&self, game_idx: i64, action: Action, message: Value, player_idx: Option<&str>) -> GameResult<()> {
        let mut state = self.state.lock();
        state.next_action_id += 1;
        let id = state.next_action_id;
        state.actions.push(ActionRecord {
            id,
            game_id: game_idx,
            action,
            message,
            player_idx: player_idx.map(str::to_string),
            created_at: format!("seq-{id:010}"),
        });
        Ok(())
    }

    fn actions_for(&self, game_idx: i64) -> GameResult<Vec<ActionRecord>> {
        let state = self.state.lock();
        let mut actions: Vec<_> = state.actions.iter().filter(|a| a.game_id == game_idx).cloned().collect();
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(actions)
    }

    fn get_player_by_name(&self, name: &str) -> GameResult<Option<PlayerRecord>> {
        Ok(self.state.lock().players.iter().find(|p| p.name == name).cloned())
    }

    fn create_player(&self, idx: &str, name: &str, password: Option<&str>) -> GameResult<()> {
        self.state.lock().players.push(PlayerRecord {
            idx: idx.to_string(),
            name: name.to_string(),
            password: password.map(str::to_string),
        });
        Ok(())
    }
}
