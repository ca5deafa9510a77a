//! Typed server configuration.
//!
//! Every field here is fixed at process start: [`Config::for_profile`] builds
//! the base table a profile name selects (mirroring the Python source's
//! `SERVER_CONFIGS` dict of `TestingConfig` / `TestingConfigWithEvents` /
//! `ProductionConfig`), then [`Config::apply_env`] lets environment variables
//! override the handful of fields that commonly vary per-deployment.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::model::event::EventKind;

#[derive(Clone, Debug)]
pub struct LevelStats {
    pub population_capacity: u32,
    pub product_capacity: u32,
    pub armor_capacity: u32,
    pub train_cooldown: u32,
    pub next_level_price: Option<u32>,
}

#[derive(Clone, Debug)]
pub struct TrainLevelStats {
    pub goods_capacity: u32,
    pub fuel_capacity: u32,
    pub fuel_consumption: u32,
    pub next_level_price: Option<u32>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Profile {
    Testing,
    TestingWithEvents,
    Production,
}

impl Profile {
    pub fn parse(name: &str) -> Profile {
        match name {
            "testing" => Profile::Testing,
            "testing_with_events" => Profile::TestingWithEvents,
            _ => Profile::Production,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub server_addr: String,
    pub server_port: u16,

    pub tick_time: Duration,
    pub max_tick_calculation_time: Duration,

    pub trains_count: u32,
    pub fuel_enabled: bool,
    pub train_always_devastated: bool,
    pub collisions_enabled: bool,

    pub hijackers_probability: u32,
    pub hijackers_power_range: (u32, u32),
    pub hijackers_cooldown_coefficient: u32,

    pub parasites_probability: u32,
    pub parasites_power_range: (u32, u32),
    pub parasites_cooldown_coefficient: u32,

    pub refugees_probability: u32,
    pub refugees_number_range: (u32, u32),
    pub refugees_cooldown_coefficient: u32,

    pub max_event_messages: usize,
    pub receive_chunk_size: usize,
    pub action_header: usize,
    pub msglen_header: usize,
    pub result_header: usize,

    pub map_name: Option<String>,
    pub maps_discovery: String,
    pub db_uri: String,

    pub hidden_map_layers: Vec<u32>,
    pub hidden_commands: Vec<u32>,
    pub post_hidden_fields: Vec<&'static str>,

    pub default_num_players: u32,
    pub default_num_turns: Option<u32>,

    pub time_format: &'static str,
    pub max_line_length: u32,

    pub town_levels: HashMap<u32, LevelStats>,
    pub train_levels: HashMap<u32, TrainLevelStats>,
}

impl Config {
    pub fn turn_timeout(&self) -> Duration {
        self.tick_time + self.max_tick_calculation_time
    }

    pub fn event_cooldowns_on_start(&self) -> HashMap<EventKind, u32> {
        let mut cooldowns = HashMap::new();
        cooldowns.insert(
            EventKind::HijackersAssault,
            self.hijackers_power_range.1 * self.hijackers_cooldown_coefficient,
        );
        cooldowns.insert(
            EventKind::ParasitesAssault,
            self.parasites_power_range.1 * self.parasites_cooldown_coefficient,
        );
        cooldowns.insert(
            EventKind::RefugeesArrival,
            self.refugees_number_range.1 * self.refugees_cooldown_coefficient,
        );
        cooldowns
    }

    fn town_levels_default() -> HashMap<u32, LevelStats> {
        let mut levels = HashMap::new();
        levels.insert(
            1,
            LevelStats {
                population_capacity: 10,
                product_capacity: 200,
                armor_capacity: 200,
                train_cooldown: 2,
                next_level_price: Some(100),
            },
        );
        levels.insert(
            2,
            LevelStats {
                population_capacity: 20,
                product_capacity: 500,
                armor_capacity: 500,
                train_cooldown: 1,
                next_level_price: Some(200),
            },
        );
        levels.insert(
            3,
            LevelStats {
                population_capacity: 40,
                product_capacity: 10000,
                armor_capacity: 10000,
                train_cooldown: 0,
                next_level_price: None,
            },
        );
        levels
    }

    fn train_levels_default() -> HashMap<u32, TrainLevelStats> {
        let mut levels = HashMap::new();
        levels.insert(
            1,
            TrainLevelStats {
                goods_capacity: 40,
                fuel_capacity: 400,
                fuel_consumption: 1,
                next_level_price: Some(40),
            },
        );
        levels.insert(
            2,
            TrainLevelStats {
                goods_capacity: 80,
                fuel_capacity: 800,
                fuel_consumption: 1,
                next_level_price: Some(80),
            },
        );
        levels.insert(
            3,
            TrainLevelStats {
                goods_capacity: 160,
                fuel_capacity: 1600,
                fuel_consumption: 1,
                next_level_price: None,
            },
        );
        levels
    }

    fn base() -> Config {
        Config {
            server_addr: "127.0.0.1".to_string(),
            server_port: 2000,

            tick_time: Duration::from_secs(10),
            max_tick_calculation_time: Duration::from_secs(3),

            trains_count: 8,
            fuel_enabled: false,
            train_always_devastated: true,
            collisions_enabled: true,

            hijackers_probability: 20,
            hijackers_power_range: (1, 3),
            hijackers_cooldown_coefficient: 5,

            parasites_probability: 20,
            parasites_power_range: (1, 3),
            parasites_cooldown_coefficient: 5,

            refugees_probability: 10,
            refugees_number_range: (1, 3),
            refugees_cooldown_coefficient: 5,

            max_event_messages: 5,
            receive_chunk_size: 1024,
            action_header: 4,
            msglen_header: 4,
            result_header: 4,

            map_name: None,
            maps_discovery: "maps/*.yaml".to_string(),
            db_uri: "railforge.sqlite3".to_string(),

            hidden_map_layers: Vec::new(),
            hidden_commands: Vec::new(),
            post_hidden_fields: Vec::new(),

            default_num_players: 1,
            default_num_turns: None,

            time_format: "%b %d %Y %I:%M:%S%.f",
            max_line_length: 100,

            town_levels: Self::town_levels_default(),
            train_levels: Self::train_levels_default(),
        }
    }

    /// Builds the configuration for a named profile, mirroring the Python
    /// source's `SERVER_CONFIGS` table.
    pub fn for_profile(profile: Profile) -> Config {
        let mut config = Self::base();
        match profile {
            Profile::Testing => {
                config.hijackers_probability = 0;
                config.parasites_probability = 0;
                config.refugees_probability = 0;
            }
            Profile::TestingWithEvents => {
                config.hijackers_probability = 100;
                config.hijackers_power_range = (1, 1);
                config.parasites_probability = 100;
                config.parasites_power_range = (1, 1);
                config.refugees_probability = 100;
                config.refugees_number_range = (1, 1);
            }
            Profile::Production => {}
        }
        config
    }

    /// Applies the handful of environment variable overrides named in pub fn apply_env(mut self) -> Config {
        if let Ok(addr) = env::var("SERVER_ADDR") {
            self.server_addr = addr;
        }
        if let Ok(port) = env::var("SERVER_PORT") {
            if let Ok(port) = port.parse() {
                self.server_port = port;
            }
        }
        if let Ok(uri) = env::var("DB_URI") {
            self.db_uri = uri;
        }
        if let Ok(glob) = env::var("MAPS_DISCOVERY") {
            self.maps_discovery = glob;
        }
        self
    }
}

impl Default for Config {
    fn default() -> Config {
        Config::for_profile(Profile::Production)
    }
}
