//! Mobile map object ("Train").

use serde::Serialize;

use crate::config::Config;
use crate::model::event::Event;
use crate::model::post::PostType;
use crate::model::{LineId, PlayerId, TrainId};

/// A train always sits on a line: position `0` is `line.points.0`, position
/// `line.length` is `line.points.1`. Speed's sign gives direction; `0` means
/// parked (at whichever endpoint `position` currently sits on).
#[derive(Clone, Debug, Serialize)]
pub struct Train {
    pub idx: TrainId,
    pub player_idx: PlayerId,
    pub line_idx: LineId,
    pub position: u32,
    pub speed: i32,
    pub level: u32,
    pub goods: u32,
    pub goods_capacity: u32,
    pub goods_type: Option<PostType>,
    pub fuel: u32,
    pub fuel_capacity: u32,
    pub fuel_consumption: u32,
    pub next_level_price: Option<u32>,
    pub events: Vec<Event>,
    pub cooldown: u32,
}

impl Train {
    pub fn new(config: &Config, idx: TrainId, player_idx: PlayerId, line_idx: LineId, position: u32) -> Train {
        let stats = &config.train_levels[&1];
        Train {
            idx,
            player_idx,
            line_idx,
            position,
            speed: 0,
            level: 1,
            goods: 0,
            goods_capacity: stats.goods_capacity,
            goods_type: None,
            fuel: stats.fuel_capacity,
            fuel_capacity: stats.fuel_capacity,
            fuel_consumption: stats.fuel_consumption,
            next_level_price: stats.next_level_price,
            events: Vec::new(),
            cooldown: 0,
        }
    }

    pub fn apply_level(&mut self, config: &Config, level: u32) {
        let stats = &config.train_levels[&level];
        self.level = level;
        self.goods_capacity = stats.goods_capacity;
        self.fuel_capacity = stats.fuel_capacity;
        self.fuel_consumption = stats.fuel_consumption;
        self.next_level_price = stats.next_level_price;
    }

    pub fn is_parked(&self) -> bool {
        self.speed == 0
    }

    /// `true` when the train sits exactly on one of its current line's
    /// endpoints (a candidate for post interaction / a pending move).
    pub fn at_endpoint(&self, line_length: u32) -> bool {
        self.position == 0 || self.position == line_length
    }
}
