//! The per-tick simulation pipeline (steps 1-11) plus the
//! `move_train` / `make_upgrade` handler operations that share its
//! invariants.

use serde_json::json;

use crate::error::{GameError, GameResult};
use crate::game::{events, Game, GameInner, PendingMove};
use crate::config::Config;
use crate::model::{Event, LineId, PlayerId, PointId, PostId, PostKind, PostType, ResourceField, Train, TrainId};
use crate::protocol::Action;
use crate::store::ActionLog;

pub fn run_tick(game: &Game, inner: &mut GameInner, store: &dyn ActionLog) -> GameResult<()> {
    inner.current_tick += 1;
    tracing::info!(game = %game.name, tick = inner.current_tick, "game tick");

    simulate_tick_core(game, inner);

    let mut rng = rand::thread_rng();
    events::refugees_arrival(game, inner, &mut rng, store);
    events::hijackers_assault(game, inner, &mut rng, store);
    events::parasites_assault(game, inner, &mut rng, store);

    recalculate_ratings(game.config(), inner);
    retire_events(game.config(), inner);

    if !game.observed {
        store.append(game.game_idx, Action::Turn, json!({}), None)?;
    }

    Ok(())
}

/// Replays one tick of a finished game without rolling new random events:
/// the observer applies whichever HIJACKERS_ASSAULT / PARASITES_ASSAULT /
/// REFUGEES_ARRIVAL rows the original run logged, in their logged order,
/// instead of resampling them.
pub fn run_tick_replay(game: &Game, inner: &mut GameInner) {
    inner.current_tick += 1;
    simulate_tick_core(game, inner);
    recalculate_ratings(game.config(), inner);
    retire_events(game.config(), inner);
}

fn simulate_tick_core(game: &Game, inner: &mut GameInner) {
    update_cooldowns(inner);
    update_posts(inner);
    update_trains_positions(game, inner);
    super::collision::handle_collisions(game, inner);
    process_trains_points(game, inner);
    update_towns(inner);
}

fn update_cooldowns(inner: &mut GameInner) {
    for cooldown in inner.event_cooldowns.values_mut() {
        *cooldown = cooldown.saturating_sub(1);
    }
    for train in inner.map.trains.values_mut() {
        train.cooldown = train.cooldown.saturating_sub(1);
    }
}

fn update_posts(inner: &mut GameInner) {
    let market_idx: Vec<PostId> = inner.map.markets.clone();
    let storage_idx: Vec<PostId> = inner.map.storages.clone();
    for idx in market_idx {
        if let PostKind::Market(market) = &mut inner.map.posts.get_mut(&idx).unwrap().kind {
            if market.product < market.product_capacity {
                market.product = (market.product + market.replenishment).min(market.product_capacity);
            }
        }
    }
    for idx in storage_idx {
        if let PostKind::Storage(storage) = &mut inner.map.posts.get_mut(&idx).unwrap().kind {
            if storage.armor < storage.armor_capacity {
                storage.armor = (storage.armor + storage.replenishment).min(storage.armor_capacity);
            }
        }
    }
}

fn update_trains_positions(game: &Game, inner: &mut GameInner) {
    let train_ids: Vec<TrainId> = inner.map.trains.keys().copied().collect();
    for idx in train_ids {
        let fuel_enabled = game.config().fuel_enabled;
        let (line_idx, speed, fuel_consumption) = {
            let train = &inner.map.trains[&idx];
            (train.line_idx, train.speed, train.fuel_consumption)
        };

        if fuel_enabled && speed != 0 {
            let out_of_fuel = {
                let train = inner.map.trains.get_mut(&idx).unwrap();
                if train.fuel >= fuel_consumption {
                    train.fuel -= fuel_consumption;
                    false
                } else {
                    train.fuel = 0;
                    true
                }
            };
            if out_of_fuel {
                put_train_into_town(inner, idx, true, true);
                continue;
            }
        }

        let length = inner.map.lines[&line_idx].length;
        let train = inner.map.trains.get_mut(&idx).unwrap();
        if train.speed > 0 && train.position < length {
            train.position += 1;
        } else if train.speed < 0 && train.position > 0 {
            train.position -= 1;
        }
    }
}

fn process_trains_points(game: &Game, inner: &mut GameInner) {
    let train_ids: Vec<TrainId> = inner.map.trains.keys().copied().collect();
    for idx in train_ids {
        let (line_idx, position) = {
            let train = &inner.map.trains[&idx];
            (train.line_idx, train.position)
        };
        let length = inner.map.lines[&line_idx].length;
        if position == 0 || position == length {
            let point_idx = inner.map.lines[&line_idx].endpoint(sign(position, length));
            train_in_point(game, inner, idx, point_idx);
        }
    }
}

/// `sign` of which endpoint a parked position (`0` or `length`) refers to.
fn sign(position: u32, length: u32) -> i32 {
    if position == 0 {
        -1
    } else {
        debug_assert_eq!(position, length);
        1
    }
}

fn train_in_point(game: &Game, inner: &mut GameInner, train_idx: TrainId, point_idx: PointId) {
    let post_idx = inner.map.points[&point_idx].post_idx;
    if let Some(post_idx) = post_idx {
        train_in_post(game, inner, train_idx, post_idx);
    }
    apply_next_train_move(inner, train_idx);
}

/// `apply_next_train_move`: applies a move deferred by
/// `move_train` case C, or stops the train if none is pending.
fn apply_next_train_move(inner: &mut GameInner, train_idx: TrainId) {
    let pending = inner.next_train_moves.remove(&train_idx);
    let train = inner.map.trains.get_mut(&train_idx).unwrap();
    match pending {
        Some(PendingMove { line_idx, speed }) if line_idx == train.line_idx => {
            let length = inner.map.lines[&line_idx].length;
            if train.speed > 0 && train.position == length {
                train.speed = 0;
            } else if train.speed < 0 && train.position == 0 {
                train.speed = 0;
            }
            let _ = speed;
        }
        Some(PendingMove { line_idx, speed }) => {
            train.speed = speed;
            train.line_idx = line_idx;
            let length = inner.map.lines[&line_idx].length;
            train.position = if speed > 0 { 0 } else { length };
        }
        None => train.speed = 0,
    }
}

fn train_in_post(game: &Game, inner: &mut GameInner, train_idx: TrainId, post_idx: PostId) {
    let tick = inner.current_tick;
    let (train_player, train_goods, train_goods_type) = {
        let train = &inner.map.trains[&train_idx];
        (train.player_idx.clone(), train.goods, train.goods_type)
    };

    let post_type = inner.map.posts[&post_idx].kind.post_type();
    match post_type {
        PostType::Town => {
            let post_owner = inner.map.posts[&post_idx].town().and_then(|t| t.player_idx.clone());
            if post_owner.as_deref() != Some(train_player.as_str()) {
                return;
            }
            let mut unloaded = 0u32;
            let mut overflow = None;
            if let PostKind::Town(town) = &mut inner.map.posts.get_mut(&post_idx).unwrap().kind {
                match train_goods_type {
                    Some(PostType::Market) => {
                        unloaded = train_goods.min(town.product_capacity.saturating_sub(town.product));
                        town.product += unloaded;
                        if town.product >= town.product_capacity {
                            overflow = Some(ResourceField::Product { product: town.product });
                        }
                    }
                    Some(PostType::Storage) => {
                        unloaded = train_goods.min(town.armor_capacity.saturating_sub(town.armor));
                        town.armor += unloaded;
                        if town.armor >= town.armor_capacity {
                            overflow = Some(ResourceField::Armor { armor: town.armor });
                        }
                    }
                    _ => {}
                }
            }
            if let Some(resource) = overflow {
                inner.map.posts.get_mut(&post_idx).unwrap().events.push(Event::ResourceOverflow { tick, resource });
            }

            let train = inner.map.trains.get_mut(&train_idx).unwrap();
            if game.config().train_always_devastated {
                train.goods = 0;
            } else {
                train.goods -= unloaded;
            }
            if train.goods == 0 {
                train.goods_type = None;
            }
            train.fuel = train.fuel_capacity;
        }
        PostType::Market => {
            if train_goods_type.is_none() || train_goods_type == Some(PostType::Market) {
                let goods_capacity = {
                    let train = &inner.map.trains[&train_idx];
                    train.goods_capacity.saturating_sub(train.goods)
                };
                if let PostKind::Market(market) = &mut inner.map.posts.get_mut(&post_idx).unwrap().kind {
                    let product = market.product.min(goods_capacity);
                    market.product -= product;
                    let train = inner.map.trains.get_mut(&train_idx).unwrap();
                    train.goods += product;
                    train.goods_type = Some(PostType::Market);
                }
            }
        }
        PostType::Storage => {
            if train_goods_type.is_none() || train_goods_type == Some(PostType::Storage) {
                let goods_capacity = {
                    let train = &inner.map.trains[&train_idx];
                    train.goods_capacity.saturating_sub(train.goods)
                };
                if let PostKind::Storage(storage) = &mut inner.map.posts.get_mut(&post_idx).unwrap().kind {
                    let armor = storage.armor.min(goods_capacity);
                    storage.armor -= armor;
                    let train = inner.map.trains.get_mut(&train_idx).unwrap();
                    train.goods += armor;
                    train.goods_type = Some(PostType::Storage);
                }
            }
        }
    }
}

/// `put_train_into_town`: re-homes a train at its owner's town,
/// stopped, optionally unloaded and cooled down. Used on fuel exhaustion,
/// collision, and initial placement.
pub fn put_train_into_town(inner: &mut GameInner, train_idx: TrainId, with_unload: bool, with_cooldown: bool) {
    let player_idx = inner.map.trains[&train_idx].player_idx.clone();
    let Some(player) = inner.players.get(&player_idx) else { return };
    let home_point = player.home_point_idx;
    let town_idx = player.town_idx;

    let line = inner.map.lines_at(home_point).next().expect("home point has an incident line");
    let (line_idx, position) = (line.idx, line.endpoint_position(home_point));

    let train_cooldown = inner.map.posts[&town_idx].town().map(|t| t.train_cooldown).unwrap_or(0);

    let train = inner.map.trains.get_mut(&train_idx).unwrap();
    train.line_idx = line_idx;
    train.position = position;
    train.speed = 0;
    if with_unload {
        train.goods = 0;
        train.goods_type = None;
    }
    if with_cooldown {
        train.cooldown = train_cooldown;
    }
}

fn update_towns(inner: &mut GameInner) {
    let tick = inner.current_tick;
    let town_ids: Vec<PostId> = inner.players.values().map(|p| p.town_idx).collect();
    for town_idx in town_ids {
        let post = inner.map.posts.get_mut(&town_idx).unwrap();
        let PostKind::Town(town) = &mut post.kind else { continue };
        if town.product < town.population {
            town.population = town.population.saturating_sub(1);
        }
        town.product = town.product.saturating_sub(town.population);

        if town.population == 0 {
            post.events.push(Event::GameOver { tick, population: 0 });
        }
        if town.product == 0 {
            post.events.push(Event::ResourceLack { tick, resource: ResourceField::Product { product: 0 } });
        }
        if town.armor == 0 {
            post.events.push(Event::ResourceLack { tick, resource: ResourceField::Armor { armor: 0 } });
        }
    }
}

/// `recalculate_rating`: recomputed fresh every tick from current
/// town stock plus the price already paid to reach each entity's current
/// level, not accumulated across ticks.
fn recalculate_ratings(config: &Config, inner: &mut GameInner) {
    let player_ids: Vec<PlayerId> = inner.players.keys().cloned().collect();
    for player_idx in player_ids {
        let town_idx = inner.players[&player_idx].town_idx;
        let Some(town) = inner.map.posts[&town_idx].town() else { continue };
        let (population, product, armor, town_level) = (town.population, town.product, town.armor, town.level);

        let mut upgrade_price: u32 = (1..town_level)
            .map(|level| config.town_levels.get(&level).and_then(|s| s.next_level_price).unwrap_or(0))
            .sum();
        for train in inner.map.trains.values().filter(|t| t.player_idx == player_idx) {
            upgrade_price += (1..train.level)
                .map(|level| config.train_levels.get(&level).and_then(|s| s.next_level_price).unwrap_or(0))
                .sum::<u32>();
        }

        let rating = population * 1000 + product + armor + 2 * upgrade_price;
        inner.map.ratings.insert(player_idx.clone(), rating);
        if let Some(player) = inner.players.get_mut(&player_idx) {
            player.rating = rating;
        }
    }
}

/// `retire_events`: trims every post's and train's event queue
/// down to the configured maximum, oldest first.
fn retire_events(config: &Config, inner: &mut GameInner) {
    let max = config.max_event_messages;
    for post in inner.map.posts.values_mut() {
        if post.events.len() > max {
            let excess = post.events.len() - max;
            post.events.drain(0..excess);
        }
    }
    for train in inner.map.trains.values_mut() {
        if train.events.len() > max {
            let excess = train.events.len() - max;
            train.events.drain(0..excess);
        }
    }
}

/// `move_train`: the command with the most edge cases.
pub fn move_train(inner: &mut GameInner, player_idx: &str, train_idx: TrainId, speed: i32, line_idx: LineId) -> GameResult<()> {
    if !inner.map.trains.contains_key(&train_idx) {
        return Err(GameError::resource_not_found(format!("Train index not found, index: {train_idx}")));
    }
    if !inner.map.lines.contains_key(&line_idx) {
        return Err(GameError::resource_not_found(format!("Line index not found, index: {line_idx}")));
    }

    let (owner, current_line, current_speed, position, cooldown) = {
        let train = &inner.map.trains[&train_idx];
        (train.player_idx.clone(), train.line_idx, train.speed, train.position, train.cooldown)
    };
    if owner != player_idx {
        return Err(GameError::access_denied("Train's owner mismatch"));
    }
    inner.next_train_moves.remove(&train_idx);
    if cooldown > 0 {
        return Err(GameError::bad_command(format!("The train is under cooldown, cooldown: {cooldown}")));
    }

    if speed == 0 || current_line == line_idx {
        inner.map.trains.get_mut(&train_idx).unwrap().speed = speed;
        return Ok(());
    }

    if current_speed == 0 {
        let line_from = inner.map.lines[&current_line];
        let line_to = inner.map.lines[&line_idx];

        if position == line_from.length {
            if line_to.has_point(line_from.points.1) {
                let train = inner.map.trains.get_mut(&train_idx).unwrap();
                train.line_idx = line_idx;
                train.speed = speed;
                train.position = if line_from.points.1 == line_to.points.0 { 0 } else { line_to.length };
                Ok(())
            } else {
                Err(GameError::bad_command("The end of the train's line is not connected to the next line"))
            }
        } else if position == 0 {
            if line_to.has_point(line_from.points.0) {
                let train = inner.map.trains.get_mut(&train_idx).unwrap();
                train.line_idx = line_idx;
                train.speed = speed;
                train.position = if line_from.points.0 == line_to.points.0 { 0 } else { line_to.length };
                Ok(())
            } else {
                Err(GameError::bad_command("The beginning of the train's line is not connected to the next line"))
            }
        } else {
            Err(GameError::bad_command(
                "The train is standing on the line (between line's points), player have to continue run the train",
            ))
        }
    } else {
        let line_from = inner.map.lines[&current_line];
        let line_to = inner.map.lines[&line_idx];
        let switch_possible = match (current_speed.signum(), speed.signum()) {
            (1, 1) => line_from.points.1 == line_to.points.0,
            (1, -1) => line_from.points.1 == line_to.points.1,
            (-1, 1) => line_from.points.0 == line_to.points.0,
            (-1, -1) => line_from.points.0 == line_to.points.1,
            _ => false,
        };
        if switch_possible {
            inner.next_train_moves.insert(train_idx, PendingMove { line_idx, speed });
            Ok(())
        } else {
            Err(GameError::bad_command(
                "The train is not able to switch the current line to the next line, or new speed is incorrect",
            ))
        }
    }
}

fn is_train_at_post(inner: &GameInner, train: &Train, post_idx: PostId) -> bool {
    let line = &inner.map.lines[&train.line_idx];
    if train.position != 0 && train.position != line.length {
        return false;
    }
    let point_idx = line.endpoint(sign(train.position, line.length));
    inner.map.points[&point_idx].post_idx == Some(post_idx)
}

pub fn make_upgrade(
    config: &Config,
    inner: &mut GameInner,
    player_idx: &str,
    posts_idx: &[PostId],
    trains_idx: &[TrainId],
) -> GameResult<()> {
    let town_idx = inner
        .players
        .get(player_idx)
        .ok_or_else(|| GameError::resource_not_found("Player not found in this game"))?
        .town_idx;

    for &post_idx in posts_idx {
        let post = inner.map.posts.get(&post_idx).ok_or_else(|| GameError::resource_not_found(format!("Post index not found, index: {post_idx}")))?;
        let Some(town) = post.town() else {
            return Err(GameError::bad_command(format!("The post is not a town, post: {post_idx}")));
        };
        if town.player_idx.as_deref() != Some(player_idx) {
            return Err(GameError::access_denied("Town's owner mismatch"));
        }
    }
    for &train_idx in trains_idx {
        let train = inner.map.trains.get(&train_idx).ok_or_else(|| GameError::resource_not_found(format!("Train index not found, index: {train_idx}")))?;
        if train.player_idx != player_idx {
            return Err(GameError::access_denied("Train's owner mismatch"));
        }
    }

    let posts_have_next: bool = posts_idx.iter().all(|idx| config.town_levels.contains_key(&(inner.map.posts[idx].town().unwrap().level + 1)));
    let trains_have_next: bool = trains_idx.iter().all(|idx| config.train_levels.contains_key(&(inner.map.trains[idx].level + 1)));
    if !posts_have_next || !trains_have_next {
        return Err(GameError::bad_command("Not all entities requested for upgrade have next levels"));
    }

    let posts_price: u32 = posts_idx.iter().map(|idx| inner.map.posts[idx].town().unwrap().next_level_price.unwrap_or(0)).sum();
    let trains_price: u32 = trains_idx.iter().map(|idx| inner.map.trains[idx].next_level_price.unwrap_or(0)).sum();
    let total_price = posts_price + trains_price;

    let town_armor = inner.map.posts[&town_idx].town().unwrap().armor;
    if town_armor < total_price {
        return Err(GameError::bad_command(format!(
            "Not enough armor resource for upgrade, player's armor: {town_armor}, armor needed to upgrade: {total_price}"
        )));
    }

    for &train_idx in trains_idx {
        let train = inner.map.trains[&train_idx].clone();
        if !is_train_at_post(inner, &train, town_idx) {
            return Err(GameError::bad_command(format!("The train is not in town now, train: {train_idx}")));
        }
    }

    for &post_idx in posts_idx {
        let price = inner.map.posts[&post_idx].town().unwrap().next_level_price.unwrap_or(0);
        let next_level = inner.map.posts[&post_idx].town().unwrap().level + 1;
        if let PostKind::Town(town) = &mut inner.map.posts.get_mut(&town_idx).unwrap().kind {
            town.armor -= price;
        }
        inner.map.posts.get_mut(&post_idx).unwrap().set_town_level(config, next_level);
    }
    for &train_idx in trains_idx {
        let price = inner.map.trains[&train_idx].next_level_price.unwrap_or(0);
        let next_level = inner.map.trains[&train_idx].level + 1;
        if let PostKind::Town(town) = &mut inner.map.posts.get_mut(&town_idx).unwrap().kind {
            town.armor -= price;
        }
        inner.map.trains.get_mut(&train_idx).unwrap().apply_level(config, next_level);
    }

    Ok(())
}
