//! Dynamic map objects ("Post"): Town, Market, Storage.

use serde::Serialize;

use crate::config::Config;
use crate::model::event::Event;
use crate::model::{PlayerId, PointId, PostId};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PostType {
    Town = 1,
    Market = 2,
    Storage = 3,
}

#[derive(Clone, Debug)]
pub struct TownData {
    pub player_idx: Option<PlayerId>,
    pub level: u32,
    pub population: u32,
    pub product: u32,
    pub armor: u32,
    pub population_capacity: u32,
    pub product_capacity: u32,
    pub armor_capacity: u32,
    pub train_cooldown: u32,
    pub next_level_price: Option<u32>,
}

impl TownData {
    pub fn new(config: &Config, player_idx: Option<PlayerId>, population: u32, product: u32, armor: u32) -> TownData {
        let mut data = TownData {
            player_idx,
            level: 1,
            population,
            product,
            armor,
            population_capacity: 0,
            product_capacity: 0,
            armor_capacity: 0,
            train_cooldown: 0,
            next_level_price: None,
        };
        data.apply_level(config, 1);
        data
    }

    pub fn apply_level(&mut self, config: &Config, level: u32) {
        let stats = &config.town_levels[&level];
        self.level = level;
        self.population_capacity = stats.population_capacity;
        self.product_capacity = stats.product_capacity;
        self.armor_capacity = stats.armor_capacity;
        self.train_cooldown = stats.train_cooldown;
        self.next_level_price = stats.next_level_price;
    }
}

#[derive(Clone, Debug)]
pub struct MarketData {
    pub product: u32,
    pub product_capacity: u32,
    pub replenishment: u32,
}

#[derive(Clone, Debug)]
pub struct StorageData {
    pub armor: u32,
    pub armor_capacity: u32,
    pub replenishment: u32,
}

#[derive(Clone, Debug)]
pub enum PostKind {
    Town(TownData),
    Market(MarketData),
    Storage(StorageData),
}

impl PostKind {
    pub fn post_type(&self) -> PostType {
        match self {
            PostKind::Town(_) => PostType::Town,
            PostKind::Market(_) => PostType::Market,
            PostKind::Storage(_) => PostType::Storage,
        }
    }
}

/// A Post, the dynamic object living at a [`crate::model::Point`].
#[derive(Clone, Debug)]
pub struct Post {
    pub idx: PostId,
    pub name: String,
    pub point_idx: PointId,
    pub events: Vec<Event>,
    pub kind: PostKind,
}

impl Post {
    pub fn town(&self) -> Option<&TownData> {
        match &self.kind {
            PostKind::Town(t) => Some(t),
            _ => None,
        }
    }

    pub fn town_mut(&mut self) -> Option<&mut TownData> {
        match &mut self.kind {
            PostKind::Town(t) => Some(t),
            _ => None,
        }
    }

    pub fn set_town_level(&mut self, config: &Config, level: u32) {
        if let PostKind::Town(t) = &mut self.kind {
            t.apply_level(config, level);
        }
    }
}

/// Wire projection: `{idx, name, type, point_idx, events, <kind fields>}`.
impl Serialize for Post {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("idx", &self.idx)?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry("point_idx", &self.point_idx)?;
        map.serialize_entry("events", &self.events)?;
        match &self.kind {
            PostKind::Town(t) => {
                map.serialize_entry("type", &(PostType::Town as u32))?;
                map.serialize_entry("player_idx", &t.player_idx)?;
                map.serialize_entry("level", &t.level)?;
                map.serialize_entry("population", &t.population)?;
                map.serialize_entry("product", &t.product)?;
                map.serialize_entry("armor", &t.armor)?;
                map.serialize_entry("population_capacity", &t.population_capacity)?;
                map.serialize_entry("product_capacity", &t.product_capacity)?;
                map.serialize_entry("armor_capacity", &t.armor_capacity)?;
                map.serialize_entry("train_cooldown", &t.train_cooldown)?;
                map.serialize_entry("next_level_price", &t.next_level_price)?;
            }
            PostKind::Market(m) => {
                map.serialize_entry("type", &(PostType::Market as u32))?;
                map.serialize_entry("product", &m.product)?;
                map.serialize_entry("product_capacity", &m.product_capacity)?;
                map.serialize_entry("replenishment", &m.replenishment)?;
            }
            PostKind::Storage(s) => {
                map.serialize_entry("type", &(PostType::Storage as u32))?;
                map.serialize_entry("armor", &s.armor)?;
                map.serialize_entry("armor_capacity", &s.armor_capacity)?;
                map.serialize_entry("replenishment", &s.replenishment)?;
            }
        }
        map.end()
    }
}
