//! The game runtime: one instance per room, owning its map
//! snapshot, players, trains, and the per-tick simulation.

mod collision;
mod events;
pub mod observer;
mod tick;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex, MutexGuard};
use serde::Serialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{GameError, GameResult};
use crate::mapfile::MapStore;
use crate::map::Map;
use crate::model::{Event, LineId, Player, PlayerView, Post, PostKind, PostType, Train, TrainId};
use crate::protocol::Action;
use crate::store::ActionLog;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GameState {
    Init,
    Run,
    Finished,
}

/// A train move that couldn't be applied immediately because the train was
/// in motion on a different line (`move_train` step, case C).
#[derive(Clone, Copy, Debug)]
pub struct PendingMove {
    pub line_idx: LineId,
    pub speed: i32,
}

/// Everything guarded by the per-game lock: players, trains, the
/// map's dynamic tables, pending moves, event cooldowns, and the tick
/// counter. `tick()` and every handler operation run inside this lock.
pub struct GameInner {
    pub state: GameState,
    pub map: Map,
    pub players: HashMap<String, Player>,
    pub next_train_moves: HashMap<TrainId, PendingMove>,
    pub event_cooldowns: HashMap<crate::model::EventKind, u32>,
    pub current_tick: u64,
    next_train_id: TrainId,
}

/// A live game instance. Shared across the handler threads of every
/// connected player plus the background tick driver via `Arc`.
pub struct Game {
    pub name: String,
    pub game_idx: i64,
    pub num_players: u32,
    pub observed: bool,
    pub num_turns: Option<u32>,
    inner: Mutex<GameInner>,
    tick_done: Condvar,
    start_tick: Arc<(Mutex<bool>, Condvar)>,
    stop_flag: AtomicBool,
    driver_started: AtomicBool,
    config: Arc<Config>,
}

impl Game {
    pub fn create(
        config: Arc<Config>,
        store: &dyn ActionLog,
        map_store: &dyn MapStore,
        name: String,
        num_players: u32,
        num_turns: Option<u32>,
        map_name: Option<&str>,
        observed: bool,
    ) -> GameResult<Game> {
        let record = match map_name {
            Some(name) => map_store.by_name(name)?,
            None => map_store.active()?,
        };
        let town_count = record.town_count();
        if num_players as usize > town_count {
            return Err(GameError::bad_command(format!(
                "Unable to create game with {num_players} players, maximum players count is {town_count}"
            )));
        }

        let game_idx = if observed { 0 } else { store.create_game(&name, &record.name, num_players)? };
        let map = record.build(game_idx as u32)?;

        Ok(Game {
            name,
            game_idx,
            num_players,
            observed,
            num_turns,
            inner: Mutex::new(GameInner {
                state: GameState::Init,
                map,
                players: HashMap::new(),
                next_train_moves: HashMap::new(),
                event_cooldowns: config.event_cooldowns_on_start(),
                current_tick: 0,
                next_train_id: 1,
            }),
            tick_done: Condvar::new(),
            start_tick: Arc::new((Mutex::new(false), Condvar::new())),
            stop_flag: AtomicBool::new(false),
            driver_started: AtomicBool::new(false),
            config,
        })
    }

    /// Claims the right to spawn this game's tick-driver thread; returns
    /// `true` exactly once, so a `get_or_create` race never starts it twice.
    pub fn mark_driver_started(&self) -> bool {
        self.driver_started.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst).is_ok()
    }

    pub fn lock(&self) -> MutexGuard<'_, GameInner> {
        self.inner.lock()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> GameState {
        self.inner.lock().state
    }

    pub fn stop(&self, store: &dyn ActionLog) {
        let mut inner = self.inner.lock();
        let just_finished = inner.state != GameState::Finished;
        if just_finished {
            tracing::info!(game = %self.name, "game stopped");
            inner.state = GameState::Finished;
        }
        self.stop_flag.store(true, Ordering::SeqCst);
        let (lock, cvar) = &*self.start_tick;
        *lock.lock() = true;
        cvar.notify_all();
        self.tick_done.notify_all();

        if just_finished {
            let summary = finish_summary(&inner);
            drop(inner);
            if let Err(err) = store.finish_game(self.game_idx, summary) {
                tracing::warn!(game = %self.name, error = %err, "failed to write game finish summary");
            }
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::SeqCst)
    }

    /// `add_player`: admits a new player or re-attaches a returning
    /// one. Returns the player view to echo back on LOGIN.
    pub fn add_player(&self, store: &dyn ActionLog, player_idx: &str, name: &str) -> GameResult<Value> {
        let mut inner = self.inner.lock();
        if inner.state == GameState::Finished {
            return Err(GameError::access_denied("The game is finished"));
        }

        if let Some(player) = inner.players.get_mut(player_idx) {
            player.in_game = true;
            let view = player_view(player, &inner.map);
            return serde_json::to_value(view).map_err(|e| GameError::Internal(e.into()));
        }

        if inner.players.len() as u32 == self.num_players {
            return Err(GameError::access_denied("The maximum number of players reached"));
        }

        let town_idx = inner
            .map
            .unowned_town()
            .ok_or_else(|| GameError::bad_command("No free town available"))?;
        let home_point_idx = inner.map.posts[&town_idx].point_idx;

        let mut player = Player::new(player_idx.to_string(), name.to_string(), None, home_point_idx, town_idx);
        player.rating = 0;

        let trains_count = self.config.trains_count;
        let GameInner { map, next_train_id, .. } = &mut *inner;
        let train_ids = map.spawn_trains(&self.config, &player, trains_count, next_train_id);
        for train_id in &train_ids {
            if let Some(train) = map.trains.get_mut(train_id) {
                train.cooldown = 0;
            }
        }

        if let PostKind::Town(town) = &mut inner.posts_mut(town_idx).kind {
            town.player_idx = Some(player_idx.to_string());
        }

        inner.map.ratings.insert(player_idx.to_string(), 0);
        inner.players.insert(player_idx.to_string(), player);

        tracing::info!(game = %self.name, player = %player_idx, "player added to game");

        let full = inner.players.len() as u32 == self.num_players;
        let view = player_view(&inner.players[player_idx], &inner.map);
        let value = serde_json::to_value(view).map_err(|e| GameError::Internal(e.into()))?;

        if full && inner.state == GameState::Init {
            inner.state = GameState::Run;
            tracing::info!(game = %self.name, "game started");
            let _ = store;
        }

        Ok(value)
    }

    pub fn remove_player(&self, store: &dyn ActionLog, player_idx: &str) {
        let mut inner = self.inner.lock();
        if let Some(player) = inner.players.get_mut(player_idx) {
            player.in_game = false;
        }
        if inner.players.values().all(|p| !p.in_game) {
            drop(inner);
            self.stop(store);
        }
    }

    /// TURN handler: marks the player's turn done, wakes the
    /// driver if everyone is ready, then blocks for up to TURN_TIMEOUT.
    pub fn turn(&self, player_idx: &str) -> GameResult<()> {
        {
            let mut inner = self.inner.lock();
            if inner.state != GameState::Run {
                return Err(GameError::inappropriate_state(format!("Game state is not 'RUN', state: {:?}", inner.state)));
            }
            if let Some(player) = inner.players.get_mut(player_idx) {
                player.turn_called = true;
            }
            let all_ready = inner.players.values().filter(|p| p.in_game).all(|p| p.turn_called);
            if all_ready {
                let (lock, cvar) = &*self.start_tick;
                *lock.lock() = true;
                cvar.notify_all();
            }
        }

        let mut guard = self.inner.lock();
        let tick_before = guard.current_tick;
        let result = self.tick_done.wait_while_for(
            &mut guard,
            |inner| inner.current_tick == tick_before && inner.state == GameState::Run,
            self.config.turn_timeout(),
        );
        if result.timed_out() && guard.current_tick == tick_before {
            return Err(GameError::timeout("Game tick did not happen"));
        }
        Ok(())
    }

    /// The tick driver loop, run on a dedicated background
    /// thread for the lifetime of the game.
    pub fn run_tick_driver(self: &Arc<Game>, store: &dyn ActionLog) {
        loop {
            {
                let (lock, cvar) = &*self.start_tick;
                let mut started = lock.lock();
                let _ = cvar.wait_for(&mut started, self.config.tick_time);
                *started = false;
            }

            if self.is_stopped() {
                return;
            }

            let mut inner = self.inner.lock();
            if inner.state != GameState::Run {
                drop(inner);
                return;
            }

            if let Err(err) = tick::run_tick(self, &mut inner, store) {
                tracing::error!(game = %self.name, error = %err, "unhandled error during tick");
            }

            let turns_exhausted = self.num_turns.is_some_and(|n| inner.current_tick >= n as u64);

            for player in inner.players.values_mut() {
                player.turn_called = false;
            }
            drop(inner);
            self.tick_done.notify_all();

            if turns_exhausted {
                self.stop(store);
                return;
            }
        }
    }

    pub fn move_train(&self, player_idx: &str, train_idx: TrainId, speed: i32, line_idx: LineId) -> GameResult<()> {
        let mut inner = self.inner.lock();
        tick::move_train(&mut inner, player_idx, train_idx, speed, line_idx)
    }

    pub fn make_upgrade(&self, player_idx: &str, posts_idx: &[u32], trains_idx: &[TrainId]) -> GameResult<()> {
        let mut inner = self.inner.lock();
        tick::make_upgrade(&self.config, &mut inner, player_idx, posts_idx, trains_idx)
    }

    /// Produces the JSON view for `MAP{layer}`, clearing the calling
    /// player's event queues as a side effect of reading layer 1.
    pub fn get_map_layer(&self, player_idx: &str, layer: u32) -> GameResult<Value> {
        if self.config.hidden_map_layers.contains(&layer) && !self.observed {
            return Err(GameError::resource_not_found(format!("Map layer not found, layer: {layer}")));
        }
        let mut inner = self.inner.lock();
        let value = match layer {
            0 => serde_json::to_value(inner.map.layer0()),
            1 => serde_json::to_value(inner.map.layer1()),
            10 => serde_json::to_value(inner.map.layer10()),
            other => return Err(GameError::resource_not_found(format!("Map layer not found, layer: {other}"))),
        }
        .map_err(|e| GameError::Internal(e.into()))?;

        if layer == 1 && !self.observed {
            clean_user_events(&mut inner, player_idx);
        }
        Ok(value)
    }

    pub fn player_view(&self, player_idx: &str) -> GameResult<Value> {
        let inner = self.inner.lock();
        let player = inner
            .players
            .get(player_idx)
            .ok_or_else(|| GameError::resource_not_found("Player not found in this game"))?;
        serde_json::to_value(player_view(player, &inner.map)).map_err(|e| GameError::Internal(e.into()))
    }
}

impl GameInner {
    fn posts_mut(&mut self, idx: crate::model::PostId) -> &mut Post {
        self.map.posts.get_mut(&idx).expect("post id came from this map")
    }
}

fn clean_user_events(inner: &mut GameInner, player_idx: &str) {
    let Some(player) = inner.players.get(player_idx) else { return };
    let town_idx = player.town_idx;
    for train in inner.map.trains.values_mut() {
        if train.player_idx == *player_idx {
            train.events.clear();
        }
    }
    if let Some(town) = inner.map.posts.get_mut(&town_idx) {
        town.events.clear();
    }
}

/// Per-player summary written to `games.data` once a game finishes.
fn finish_summary(inner: &GameInner) -> Value {
    let players: serde_json::Map<String, Value> = inner
        .players
        .values()
        .map(|player| (player.idx.clone(), json!({ "name": player.name, "rating": player.rating })))
        .collect();
    Value::Object(players)
}

fn player_view<'a>(player: &'a Player, map: &Map) -> PlayerView<'a> {
    let trains: Vec<TrainId> = map
        .trains
        .values()
        .filter(|t| t.player_idx == player.idx)
        .map(|t| t.idx)
        .collect();
    player.view(trains)
}

pub fn new_player_id() -> String {
    Uuid::new_v4().to_string()
}

pub type TickDuration = Duration;
