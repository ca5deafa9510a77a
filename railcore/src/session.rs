//! Per-connection session state machine (`GameServerRequestHandler`).
//!
//! A [`Session`] owns nothing socket-level; it takes a decoded [`Request`]
//! and returns a result code plus an encoded payload. The caller (in
//! `railserver`) owns the actual [`FrameReader`](crate::net::FrameReader)
//! and socket.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::config::Config;
use crate::error::{GameError, GameResult, ResultCode};
use crate::game::observer::Observer;
use crate::game::{new_player_id, Game, GameState};
use crate::mapfile::MapStore;
use crate::protocol::{Action, Request};
use crate::registry::GameRegistry;
use crate::store::ActionLog;

/// Collaborators every session dispatches through; one instance is shared
/// (via `Arc`) across every connection handler thread.
pub struct SessionContext {
    pub config: Arc<Config>,
    pub store: Arc<dyn ActionLog>,
    pub map_store: Arc<dyn MapStore>,
    pub games: Arc<GameRegistry>,
}

enum Mode {
    Fresh,
    LoggedIn { game: Arc<Game>, player_idx: String },
    Observing(Box<Observer>),
}

/// A connection moves Fresh → {LoggedIn, Observing} → Closed and never back.
pub struct Session {
    ctx: Arc<SessionContext>,
    mode: Mode,
    pub closed: bool,
}

impl Session {
    pub fn new(ctx: Arc<SessionContext>) -> Session {
        Session { ctx, mode: Mode::Fresh, closed: false }
    }

    /// Validates state, invokes the matching operation, and produces
    /// exactly one response frame's `(result, payload)`. The caller has
    /// already parsed one frame into `request`.
    pub fn dispatch(&mut self, request: Request) -> (ResultCode, String) {
        match self.route(request) {
            Ok(value) => (ResultCode::Okey, value.map(|v| v.to_string()).unwrap_or_default()),
            Err(err) => (err.result_code(), json!({ "error": err.message() }).to_string()),
        }
    }

    /// Runs on disconnect regardless of how the socket died.
    pub fn on_disconnect(&mut self) {
        if let Mode::LoggedIn { game, player_idx } = &self.mode {
            game.remove_player(self.ctx.store.as_ref(), player_idx);
            let _ = self.ctx.store.append(game.game_idx, Action::Logout, json!({}), Some(player_idx.as_str()));
        }
    }

    fn route(&mut self, request: Request) -> GameResult<Option<Value>> {
        if matches!(self.mode, Mode::Observing(_)) {
            return self.route_observing(request);
        }
        match request.action {
            Action::Login => self.on_login(request).map(Some),
            Action::Observer => self.on_observer(),
            Action::Games => self.on_games(),
            Action::Logout => self.on_logout().map(|_| None),
            Action::Map => self.on_map(request).map(Some),
            Action::Move => self.on_move(request).map(|_| None),
            Action::Turn => self.on_turn().map(|_| None),
            Action::Upgrade => self.on_upgrade(request).map(|_| None),
            Action::Player => self.on_player().map(Some),
            Action::Game | Action::Event => Err(GameError::bad_command(format!("No such action in this state: {:?}", request.action))),
        }
    }

    fn route_observing(&mut self, request: Request) -> GameResult<Option<Value>> {
        let Mode::Observing(observer) = &mut self.mode else { unreachable!() };
        match request.action {
            Action::Map => {
                request.require_all(&["layer"])?;
                let layer = request.payload["layer"].as_u64().ok_or_else(|| GameError::bad_command("Layer must be an integer"))? as u32;
                observer.get_map_layer(layer).map(Some)
            }
            Action::Turn => {
                request.require_all(&["idx"])?;
                let idx = request.payload["idx"].as_u64().ok_or_else(|| GameError::bad_command("Idx must be an integer"))? as u32;
                observer.seek(self.ctx.map_store.as_ref(), idx).map(|_| None)
            }
            Action::Game => {
                request.require_all(&["idx"])?;
                let idx = request.payload["idx"].as_i64().ok_or_else(|| GameError::bad_command("Idx must be an integer"))?;
                observer.select_game(self.ctx.store.as_ref(), self.ctx.map_store.as_ref(), idx).map(|_| None)
            }
            Action::Observer => Ok(Some(Observer::list_games(self.ctx.store.as_ref())?)),
            other => Err(GameError::bad_command(format!("No such action in this state: {other:?}"))),
        }
    }

    fn on_login(&mut self, request: Request) -> GameResult<Value> {
        if !matches!(self.mode, Mode::Fresh) {
            return Err(GameError::bad_command("You are already logged in"));
        }
        request.require_all(&["name"])?;
        let name = request.payload["name"].as_str().ok_or_else(|| GameError::bad_command("Name must be a string"))?;
        let password = request.payload.get("password").and_then(Value::as_str);

        let player_idx = self.resolve_player(name, password)?;

        let game_name = request.payload.get("game").and_then(Value::as_str).map(str::to_string).unwrap_or_else(|| format!("Game of {name}"));
        let num_players = request.payload.get("num_players").and_then(Value::as_u64).map(|n| n as u32).unwrap_or(self.ctx.config.default_num_players);
        let num_turns = request.payload.get("num_turns").and_then(Value::as_u64).map(|n| n as u32).or(self.ctx.config.default_num_turns);

        let config = self.ctx.config.clone();
        let store = self.ctx.store.clone();
        let map_store = self.ctx.map_store.clone();
        let map_name = request.payload.get("map").and_then(Value::as_str).map(str::to_string);
        let game_name_for_create = game_name.clone();
        let game = self.ctx.games.get_or_create(&game_name, move || {
            let game = Arc::new(Game::create(
                config,
                store.as_ref(),
                map_store.as_ref(),
                game_name_for_create,
                num_players,
                num_turns,
                map_name.as_deref(),
                false,
            )?);
            Ok(game)
        })?;

        if game.num_players != num_players {
            return Err(GameError::bad_command(format!(
                "Game '{game_name}' already exists with {} players, requested {num_players}",
                game.num_players
            )));
        }
        if !matches!(game.state(), GameState::Init | GameState::Run) {
            return Err(GameError::inappropriate_state(format!("Game state is not 'INIT' or 'RUN', state: {:?}", game.state())));
        }

        let view = game.add_player(self.ctx.store.as_ref(), &player_idx, name)?;
        let _ = self.ctx.store.append(game.game_idx, Action::Login, request.payload.clone(), Some(player_idx.as_str()));

        if !matches!(game.state(), GameState::Finished) {
            self.spawn_tick_driver_if_new(&game);
        }

        self.mode = Mode::LoggedIn { game, player_idx };
        Ok(view)
    }

    /// Launches the game's tick-driver thread the first time it's seen in
    /// RUN state; a `get_or_create` race would otherwise start it twice.
    fn spawn_tick_driver_if_new(&self, game: &Arc<Game>) {
        if game.state() != GameState::Run || !game.mark_driver_started() {
            return;
        }
        let game = game.clone();
        let store = self.ctx.store.clone();
        let games = self.ctx.games.clone();
        let name = game.name.clone();
        std::thread::spawn(move || {
            game.run_tick_driver(store.as_ref());
            games.remove(&name);
        });
    }

    fn resolve_player(&self, name: &str, password: Option<&str>) -> GameResult<String> {
        match self.ctx.store.get_player_by_name(name)? {
            Some(record) => {
                if record.password.as_deref() != password {
                    return Err(GameError::access_denied("Password mismatch"));
                }
                Ok(record.idx)
            }
            None => {
                let idx = new_player_id();
                self.ctx.store.create_player(&idx, name, password)?;
                Ok(idx)
            }
        }
    }

    fn on_logout(&mut self) -> GameResult<()> {
        let Mode::LoggedIn { game, player_idx } = &self.mode else {
            return Err(GameError::access_denied("Login required"));
        };
        game.remove_player(self.ctx.store.as_ref(), player_idx);
        let _ = self.ctx.store.append(game.game_idx, Action::Logout, json!({}), Some(player_idx.as_str()));
        self.closed = true;
        Ok(())
    }

    fn on_map(&self, request: Request) -> GameResult<Value> {
        let Mode::LoggedIn { game, player_idx } = &self.mode else {
            return Err(GameError::access_denied("Login required"));
        };
        request.require_all(&["layer"])?;
        let layer = request.payload["layer"].as_u64().ok_or_else(|| GameError::bad_command("Layer must be an integer"))? as u32;
        game.get_map_layer(player_idx, layer)
    }

    fn on_move(&self, request: Request) -> GameResult<()> {
        let Mode::LoggedIn { game, player_idx } = &self.mode else {
            return Err(GameError::access_denied("Login required"));
        };
        request.require_all(&["train_idx", "speed", "line_idx"])?;
        self.require_running(game)?;
        let train_idx = request.payload["train_idx"].as_u64().ok_or_else(|| GameError::bad_command("Train_idx must be an integer"))? as u32;
        let speed = request.payload["speed"].as_i64().ok_or_else(|| GameError::bad_command("Speed must be an integer"))? as i32;
        let line_idx = request.payload["line_idx"].as_u64().ok_or_else(|| GameError::bad_command("Line_idx must be an integer"))? as u32;
        game.move_train(player_idx, train_idx, speed, line_idx)?;
        let _ = self.ctx.store.append(game.game_idx, Action::Move, request.payload.clone(), Some(player_idx.as_str()));
        Ok(())
    }

    fn on_turn(&self) -> GameResult<()> {
        let Mode::LoggedIn { game, player_idx } = &self.mode else {
            return Err(GameError::access_denied("Login required"));
        };
        self.require_running(game)?;
        game.turn(player_idx)
    }

    fn on_upgrade(&self, request: Request) -> GameResult<()> {
        let Mode::LoggedIn { game, player_idx } = &self.mode else {
            return Err(GameError::access_denied("Login required"));
        };
        request.require_any(&["trains", "posts"])?;
        self.require_running(game)?;
        let posts: Vec<u32> = request.payload.get("posts").and_then(Value::as_array).map(|v| v.iter().filter_map(Value::as_u64).map(|n| n as u32).collect()).unwrap_or_default();
        let trains: Vec<u32> = request.payload.get("trains").and_then(Value::as_array).map(|v| v.iter().filter_map(Value::as_u64).map(|n| n as u32).collect()).unwrap_or_default();
        game.make_upgrade(player_idx, &posts, &trains)?;
        let _ = self.ctx.store.append(game.game_idx, Action::Upgrade, request.payload.clone(), Some(player_idx.as_str()));
        Ok(())
    }

    fn on_player(&self) -> GameResult<Value> {
        let Mode::LoggedIn { game, player_idx } = &self.mode else {
            return Err(GameError::access_denied("Login required"));
        };
        game.player_view(player_idx)
    }

    fn on_games(&self) -> GameResult<Option<Value>> {
        Ok(Some(json!({ "games": self.ctx.games.list_active() })))
    }

    fn on_observer(&mut self) -> GameResult<Option<Value>> {
        if !matches!(self.mode, Mode::Fresh) {
            return Err(GameError::bad_command("Impossible to connect as observer"));
        }
        let games = Observer::list_games(self.ctx.store.as_ref())?;
        self.mode = Mode::Observing(Box::new(Observer::new(self.ctx.config.clone())));
        Ok(Some(games))
    }

    fn require_running(&self, game: &Game) -> GameResult<()> {
        if game.state() != GameState::Run {
            return Err(GameError::inappropriate_state(format!("Game state is not 'RUN', state: {:?}", game.state())));
        }
        Ok(())
    }
}
