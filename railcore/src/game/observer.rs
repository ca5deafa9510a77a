//! Replay viewer for finished/in-progress games (OBSERVER/GAME/TURN).
//!
//! An [`Observer`] owns its own scratch [`Game`], rebuilt from scratch and
//! walked forward through the logged action list whenever the client asks
//! to seek to a different turn. Stored HIJACKERS_ASSAULT / PARASITES_ASSAULT
//! / REFUGEES_ARRIVAL rows are re-applied with their logged outcome rather
//! than rerolled, so a seek is exactly reproducible.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{GameError, GameResult};
use crate::game::{events, tick, Game};
use crate::mapfile::MapStore;
use crate::protocol::Action;
use crate::store::{ActionLog, ActionRecord, MemoryStore};

pub struct Observer {
    config: Arc<Config>,
    /// Satisfies [`Game::create`]'s store parameter for the scratch replay
    /// game; never actually read back, since that game is always `observed`.
    scratch_store: MemoryStore,

    game_name: String,
    map_name: String,
    num_players: u32,

    actions: Vec<ActionRecord>,
    max_turn: u32,
    current_turn: u32,
    current_action: usize,

    game: Option<Game>,
}

impl Observer {
    pub fn new(config: Arc<Config>) -> Observer {
        Observer {
            config,
            scratch_store: MemoryStore::new(),
            game_name: String::new(),
            map_name: String::new(),
            num_players: 0,
            actions: Vec::new(),
            max_turn: 0,
            current_turn: 0,
            current_action: 0,
            game: None,
        }
    }

    /// The list of replayable games, for the OBSERVER action.
    pub fn list_games(store: &dyn ActionLog) -> GameResult<Value> {
        let mut games = Vec::new();
        for record in store.list_games()? {
            let length = store
                .actions_for(record.id)?
                .iter()
                .filter(|a| a.action == Action::Turn)
                .count();
            games.push(json!({
                "idx": record.id,
                "name": record.name,
                "created_at": record.created_at,
                "map_name": record.map_name,
                "num_players": record.num_players,
                "length": length,
                "ratings": record.data.clone().unwrap_or(Value::Null),
            }));
        }
        Ok(json!({ "games": games }))
    }

    /// Chooses a game to observe and rewinds to turn 0, for the GAME action.
    pub fn select_game(&mut self, store: &dyn ActionLog, map_store: &dyn MapStore, game_idx: i64) -> GameResult<()> {
        let record = store
            .get_game(game_idx)?
            .ok_or_else(|| GameError::resource_not_found(format!("Game index not found, index: {game_idx}")))?;

        self.actions = store.actions_for(game_idx)?;
        self.max_turn = self.actions.iter().filter(|a| a.action == Action::Turn).count() as u32;
        self.game_name = record.name;
        self.map_name = record.map_name;
        self.num_players = record.num_players;
        self.reset_game(map_store)
    }

    fn reset_game(&mut self, map_store: &dyn MapStore) -> GameResult<()> {
        self.game = Some(Game::create(
            self.config.clone(),
            &self.scratch_store,
            map_store,
            self.game_name.clone(),
            self.num_players,
            None,
            Some(&self.map_name),
            true,
        )?);
        self.current_turn = 0;
        self.current_action = 0;
        Ok(())
    }

    /// Seeks to `turn` for the TURN action, replaying forward or rebuilding
    /// and replaying from scratch as needed.
    pub fn seek(&mut self, map_store: &dyn MapStore, turn: u32) -> GameResult<()> {
        if self.game.is_none() {
            return Err(GameError::bad_command("A game is not chosen"));
        }
        let target = turn.min(self.max_turn);
        if target == self.current_turn {
            return Ok(());
        }

        if target > self.current_turn {
            self.play_turns(target - self.current_turn);
        } else {
            self.reset_game(map_store)?;
            if target > 0 {
                self.play_turns(target);
            }
        }
        self.current_turn = target;
        Ok(())
    }

    fn play_turns(&mut self, turns: u32) {
        let game = self.game.as_ref().expect("seek checked game is chosen");
        let mut played = 0u32;

        while self.current_action < self.actions.len() {
            let action = self.actions[self.current_action].clone();
            self.current_action += 1;
            apply_logged_action(game, &self.scratch_store, &action);

            if action.action == Action::Turn {
                played += 1;
                if played >= turns {
                    break;
                }
            }
        }
    }

    /// The `MAP{layer}` view as seen by the observer (no player events to
    /// clean, since an observer never owns any).
    pub fn get_map_layer(&self, layer: u32) -> GameResult<Value> {
        let game = self.game.as_ref().ok_or_else(|| GameError::bad_command("A game is not chosen"))?;
        game.get_map_layer("", layer)
    }
}

fn apply_logged_action(game: &Game, scratch_store: &dyn ActionLog, action: &ActionRecord) {
    match action.action {
        Action::Login => {
            let Some(player_idx) = &action.player_idx else { return };
            let Some(name) = action.message.get("name").and_then(Value::as_str) else { return };
            let _ = game.add_player(scratch_store, player_idx, name);
        }
        Action::Logout => {
            if let Some(player_idx) = &action.player_idx {
                game.remove_player(scratch_store, player_idx);
            }
        }
        Action::Move => {
            let (Some(player_idx), Some(train_idx), Some(speed), Some(line_idx)) = (
                action.player_idx.as_deref(),
                action.message.get("train_idx").and_then(Value::as_u64),
                action.message.get("speed").and_then(Value::as_i64),
                action.message.get("line_idx").and_then(Value::as_u64),
            ) else {
                return;
            };
            let _ = game.move_train(player_idx, train_idx as u32, speed as i32, line_idx as u32);
        }
        Action::Upgrade => {
            let Some(player_idx) = action.player_idx.as_deref() else { return };
            let posts: Vec<u32> = action
                .message
                .get("posts")
                .and_then(Value::as_array)
                .map(|v| v.iter().filter_map(Value::as_u64).map(|n| n as u32).collect())
                .unwrap_or_default();
            let trains: Vec<u32> = action
                .message
                .get("trains")
                .and_then(Value::as_array)
                .map(|v| v.iter().filter_map(Value::as_u64).map(|n| n as u32).collect())
                .unwrap_or_default();
            let _ = game.make_upgrade(player_idx, &posts, &trains);
        }
        Action::Turn => {
            let mut inner = game.lock();
            tick::run_tick_replay(game, &mut inner);
        }
        Action::Event => {
            let mut inner = game.lock();
            match action.message.get("type").and_then(Value::as_str) {
                Some("HIJACKERS_ASSAULT") => {
                    if let Some(power) = action.message.get("hijackers_power").and_then(Value::as_u64) {
                        events::make_hijackers_assault(game, &mut inner, scratch_store, power as u32);
                    }
                }
                Some("PARASITES_ASSAULT") => {
                    if let Some(power) = action.message.get("parasites_power").and_then(Value::as_u64) {
                        events::make_parasites_assault(game, &mut inner, scratch_store, power as u32);
                    }
                }
                Some("REFUGEES_ARRIVAL") => {
                    if let Some(number) = action.message.get("refugees_number").and_then(Value::as_u64) {
                        events::make_refugees_arrival(game, &mut inner, scratch_store, number as u32);
                    }
                }
                _ => tracing::warn!(message = %action.message, "unknown logged event type during replay"),
            }
        }
        Action::Player | Action::Games | Action::Map | Action::Observer | Action::Game => {}
    }
}
