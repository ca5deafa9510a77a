//! Process-wide registries: games-by-name, and live connection
//! handlers kept only so the server can force them closed at shutdown.
//!
//! Grounded on the original's `Game.GAMES` class-level dict and
//! `GameServerRequestHandler.HANDLERS` dict keyed by `id(self)`.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{json, Value};

use crate::error::GameResult;
use crate::game::{Game, GameState};
use crate::store::ActionLog;

/// name → live game, guarded by a short mutex; mutated only on game
/// creation and on game finish.
#[derive(Default)]
pub struct GameRegistry {
    games: Mutex<HashMap<String, Arc<Game>>>,
}

impl GameRegistry {
    pub fn new() -> GameRegistry {
        GameRegistry::default()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Game>> {
        self.games.lock().get(name).cloned()
    }

    /// Returns the game already registered under `name`, or registers the
    /// one `make` builds. `make` runs outside the registry lock so a slow
    /// map load or store round-trip never blocks unrelated lookups.
    pub fn get_or_create(
        &self,
        name: &str,
        make: impl FnOnce() -> GameResult<Arc<Game>>,
    ) -> GameResult<Arc<Game>> {
        if let Some(game) = self.get(name) {
            return Ok(game);
        }
        let game = make()?;
        let mut games = self.games.lock();
        Ok(games.entry(name.to_string()).or_insert(game).clone())
    }

    /// Drops a finished game. A later LOGIN with the same name starts a
    /// brand new game rather than reopening this one.
    pub fn remove(&self, name: &str) {
        self.games.lock().remove(name);
    }

    /// The currently registered, not yet finished games, for clients
    /// picking a room to join.
    pub fn list_active(&self) -> Vec<Value> {
        self.games
            .lock()
            .values()
            .filter(|g| g.state() != GameState::Finished)
            .map(|g| {
                json!({
                    "name": g.name,
                    "num_players": g.num_players,
                    "state": match g.state() {
                        GameState::Init => "INIT",
                        GameState::Run => "RUN",
                        GameState::Finished => "FINISHED",
                    },
                })
            })
            .collect()
    }

    pub fn stop_all(&self, store: &dyn ActionLog) {
        for game in self.games.lock().values() {
            game.stop(store);
        }
    }
}

/// Live connection sockets, kept only long enough to force-shutdown every
/// one of them on server exit. Keying off a monotonic counter rather than the stream itself
/// mirrors the original's `id(self)`-keyed dict.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: Mutex<HashMap<u64, TcpStream>>,
    next_id: AtomicU64,
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    pub fn register(&self, stream: &TcpStream) -> std::io::Result<u64> {
        let clone = stream.try_clone()?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.handlers.lock().insert(id, clone);
        Ok(id)
    }

    pub fn deregister(&self, id: u64) {
        self.handlers.lock().remove(&id);
    }

    /// Unblocks every handler thread's blocking socket read, for server
    /// shutdown.
    pub fn shutdown_all(&self) {
        for stream in self.handlers.lock().values() {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::mapfile::{MapStore, MapRecord};
    use crate::store::MemoryStore;

    struct OneMap;
    impl MapStore for OneMap {
        fn by_name(&self, _name: &str) -> GameResult<MapRecord> {
            self.active()
        }
        fn active(&self) -> GameResult<MapRecord> {
            MapRecord::parse(
                "name: starter\nsize: [10, 10]\npoints: [[0,0],[5,0]]\nposts: [{point: 1, name: a, type: 1}]\nlines: []\n",
            )
        }
    }

    #[test]
    fn get_or_create_registers_once() {
        let registry = GameRegistry::new();
        let store = MemoryStore::new();
        let map_store = OneMap;
        let config = Arc::new(Config::default());

        let mut created = 0;
        for _ in 0..3 {
            registry
                .get_or_create("room", || {
                    created += 1;
                    Ok(Arc::new(Game::create(config.clone(), &store, &map_store, "room".to_string(), 1, None, None, false)?))
                })
                .unwrap();
        }
        assert_eq!(created, 1);
        assert_eq!(registry.list_active().len(), 1);
    }

    #[test]
    fn remove_drops_the_game() {
        let registry = GameRegistry::new();
        let store = MemoryStore::new();
        let map_store = OneMap;
        let config = Arc::new(Config::default());
        registry
            .get_or_create("room", || Ok(Arc::new(Game::create(config, &store, &map_store, "room".to_string(), 1, None, None, false)?)))
            .unwrap();
        registry.remove("room");
        assert!(registry.get("room").is_none());
    }
}
