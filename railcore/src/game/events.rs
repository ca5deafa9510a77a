//! Random event triggers.

use rand::Rng;
use serde_json::json;

use crate::game::{Game, GameInner};
use crate::model::{Event, EventKind, PostKind, ResourceField};
use crate::protocol::Action;
use crate::store::ActionLog;

pub fn hijackers_assault(game: &Game, inner: &mut GameInner, rng: &mut impl Rng, store: &dyn ActionLog) {
    if game.observed || inner.event_cooldowns.get(&EventKind::HijackersAssault).copied().unwrap_or(0) > 0 {
        return;
    }
    if rng.gen_range(1..=100) > game.config().hijackers_probability {
        return;
    }
    let (low, high) = game.config().hijackers_power_range;
    let power = rng.gen_range(low..=high);
    make_hijackers_assault(game, inner, store, power);
}

pub(crate) fn make_hijackers_assault(game: &Game, inner: &mut GameInner, store: &dyn ActionLog, power: u32) {
    tracing::info!(game = %game.name, power, "hijackers assault");
    let tick = inner.current_tick;
    let town_ids: Vec<_> = inner.players.values().map(|p| p.town_idx).collect();
    for town_idx in town_ids {
        if let PostKind::Town(town) = &mut inner.map.posts.get_mut(&town_idx).unwrap().kind {
            town.population = town.population.saturating_sub(power.saturating_sub(town.armor));
            town.armor = town.armor.saturating_sub(power);
        }
        inner.map.posts.get_mut(&town_idx).unwrap().events.push(Event::HijackersAssault { tick, hijackers_power: power });
    }
    inner
        .event_cooldowns
        .insert(EventKind::HijackersAssault, power * game.config().hijackers_cooldown_coefficient);
    if !game.observed {
        let _ = store.append(game.game_idx, Action::Event, json!({"type": "HIJACKERS_ASSAULT", "tick": tick, "hijackers_power": power}), None);
    }
}

pub fn parasites_assault(game: &Game, inner: &mut GameInner, rng: &mut impl Rng, store: &dyn ActionLog) {
    if game.observed || inner.event_cooldowns.get(&EventKind::ParasitesAssault).copied().unwrap_or(0) > 0 {
        return;
    }
    if rng.gen_range(1..=100) > game.config().parasites_probability {
        return;
    }
    let (low, high) = game.config().parasites_power_range;
    let power = rng.gen_range(low..=high);
    make_parasites_assault(game, inner, store, power);
}

pub(crate) fn make_parasites_assault(game: &Game, inner: &mut GameInner, store: &dyn ActionLog, power: u32) {
    tracing::info!(game = %game.name, power, "parasites assault");
    let tick = inner.current_tick;
    let town_ids: Vec<_> = inner.players.values().map(|p| p.town_idx).collect();
    for town_idx in town_ids {
        if let PostKind::Town(town) = &mut inner.map.posts.get_mut(&town_idx).unwrap().kind {
            town.product = town.product.saturating_sub(power);
        }
        inner.map.posts.get_mut(&town_idx).unwrap().events.push(Event::ParasitesAssault { tick, parasites_power: power });
    }
    inner
        .event_cooldowns
        .insert(EventKind::ParasitesAssault, power * game.config().parasites_cooldown_coefficient);
    if !game.observed {
        let _ = store.append(game.game_idx, Action::Event, json!({"type": "PARASITES_ASSAULT", "tick": tick, "parasites_power": power}), None);
    }
}

pub fn refugees_arrival(game: &Game, inner: &mut GameInner, rng: &mut impl Rng, store: &dyn ActionLog) {
    if game.observed || inner.event_cooldowns.get(&EventKind::RefugeesArrival).copied().unwrap_or(0) > 0 {
        return;
    }
    if rng.gen_range(1..=100) > game.config().refugees_probability {
        return;
    }
    let (low, high) = game.config().refugees_number_range;
    let number = rng.gen_range(low..=high);
    make_refugees_arrival(game, inner, store, number);
}

pub(crate) fn make_refugees_arrival(game: &Game, inner: &mut GameInner, store: &dyn ActionLog, number: u32) {
    tracing::info!(game = %game.name, number, "refugees arrival");
    let tick = inner.current_tick;
    let town_ids: Vec<_> = inner.players.values().map(|p| p.town_idx).collect();
    for town_idx in town_ids {
        let mut overflowed_at = None;
        if let PostKind::Town(town) = &mut inner.map.posts.get_mut(&town_idx).unwrap().kind {
            let admitted = number.min(town.population_capacity.saturating_sub(town.population));
            town.population += admitted;
            if town.population == town.population_capacity {
                overflowed_at = Some(town.population);
            }
        }
        let post = inner.map.posts.get_mut(&town_idx).unwrap();
        post.events.push(Event::RefugeesArrival { tick, refugees_number: number });
        if let Some(population) = overflowed_at {
            post.events.push(Event::ResourceOverflow { tick, resource: ResourceField::Population { population } });
        }
    }
    inner
        .event_cooldowns
        .insert(EventKind::RefugeesArrival, number * game.config().refugees_cooldown_coefficient);
    if !game.observed {
        let _ = store.append(game.game_idx, Action::Event, json!({"type": "REFUGEES_ARRIVAL", "tick": tick, "refugees_number": number}), None);
    }
}
