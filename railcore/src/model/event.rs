//! Event value records ("Event").

use serde::Serialize;

use crate::model::TrainId;

/// Cooldown-bearing random event kinds (the only ones with a cooldown table
/// entry in [`crate::config::Config::event_cooldowns_on_start`]).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    HijackersAssault,
    ParasitesAssault,
    RefugeesArrival,
}

/// A single resource reading, used by RESOURCE_OVERFLOW / RESOURCE_LACK
/// events which report whichever resource tripped the threshold.
#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ResourceField {
    Product { product: u32 },
    Armor { armor: u32 },
    Population { population: u32 },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    #[serde(rename = "TRAIN_COLLISION")]
    TrainCollision { tick: u64, train: TrainId },
    #[serde(rename = "HIJACKERS_ASSAULT")]
    HijackersAssault { tick: u64, hijackers_power: u32 },
    #[serde(rename = "PARASITES_ASSAULT")]
    ParasitesAssault { tick: u64, parasites_power: u32 },
    #[serde(rename = "REFUGEES_ARRIVAL")]
    RefugeesArrival { tick: u64, refugees_number: u32 },
    #[serde(rename = "RESOURCE_OVERFLOW")]
    ResourceOverflow {
        tick: u64,
        #[serde(flatten)]
        resource: ResourceField,
    },
    #[serde(rename = "RESOURCE_LACK")]
    ResourceLack {
        tick: u64,
        #[serde(flatten)]
        resource: ResourceField,
    },
    #[serde(rename = "GAME_OVER")]
    GameOver { tick: u64, population: u32 },
}

impl Event {
    pub fn tick(&self) -> u64 {
        match self {
            Event::TrainCollision { tick, .. }
            | Event::HijackersAssault { tick, .. }
            | Event::ParasitesAssault { tick, .. }
            | Event::RefugeesArrival { tick, .. }
            | Event::ResourceOverflow { tick, .. }
            | Event::ResourceLack { tick, .. }
            | Event::GameOver { tick, .. } => *tick,
        }
    }
}
