//! Pairwise train collision detection (`handle_trains_collisions_on_tick`).

use crate::game::{Game, GameInner};
use crate::model::{Event, LineId, PointId, PostType, TrainId};

pub fn handle_collisions(game: &Game, inner: &mut GameInner) {
    if !game.config().collisions_enabled {
        return;
    }

    let train_ids: Vec<TrainId> = inner.map.trains.keys().copied().collect();
    let mut pairs: Vec<(TrainId, TrainId)> = Vec::new();

    for (i, &train_1) in train_ids.iter().enumerate() {
        let (line_1, point_1, position_1, speed_1) = train_point_info(inner, train_1);
        for &train_2 in &train_ids[i + 1..] {
            let (line_2, point_2, position_2, speed_2) = train_point_info(inner, train_2);

            if let (Some(p1), Some(p2)) = (point_1, point_2) {
                if p1 == p2 {
                    let at_town = inner.map.points[&p1]
                        .post_idx
                        .map(|post_idx| inner.map.posts[&post_idx].kind.post_type() == PostType::Town)
                        .unwrap_or(false);
                    if !at_town {
                        pairs.push((train_1, train_2));
                    }
                    continue;
                }
            }

            if line_1 != line_2 {
                continue;
            }
            if position_1 == position_2 {
                pairs.push((train_1, train_2));
                continue;
            }
            if speed_1 == 0 || speed_2 == 0 {
                continue;
            }

            let step_1 = speed_1.signum() as i64;
            let step_2 = speed_2.signum() as i64;
            let dist_before = (position_1 as i64 - position_2 as i64).abs();
            let dist_after = (position_1 as i64 + step_1 - position_2 as i64 + step_2).abs();
            if dist_before == 1 && dist_after == 1 && step_1 + step_2 == 0 {
                pairs.push((train_1, train_2));
            }
        }
    }

    for (train_1, train_2) in pairs {
        make_collision(inner, train_1, train_2);
    }
}

fn train_point_info(inner: &GameInner, train_idx: TrainId) -> (LineId, Option<PointId>, u32, i32) {
    let train = &inner.map.trains[&train_idx];
    let line = &inner.map.lines[&train.line_idx];
    let point = if train.position == 0 {
        Some(line.points.0)
    } else if train.position == line.length {
        Some(line.points.1)
    } else {
        None
    };
    (train.line_idx, point, train.position, train.speed)
}

fn make_collision(inner: &mut GameInner, train_1: TrainId, train_2: TrainId) {
    tracing::info!(train_1, train_2, "trains collision");
    super::tick::put_train_into_town(inner, train_1, true, true);
    super::tick::put_train_into_town(inner, train_2, true, true);
    let tick = inner.current_tick;
    inner.map.trains.get_mut(&train_1).unwrap().events.push(Event::TrainCollision { tick, train: train_2 });
    inner.map.trains.get_mut(&train_2).unwrap().events.push(Event::TrainCollision { tick, train: train_1 });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_direction_adjacent_trains_are_flagged_to_cross() {
        // Two trains one unit apart moving toward each other swap positions
        // next tick without ever sharing a position; the crossing check
        // catches this even though dist_before == dist_after == 1.
        let step_1: i64 = 1;
        let step_2: i64 = -1;
        let dist_before = (5i64 - 6i64).abs();
        let dist_after = (5i64 + step_1 - 6i64 + step_2).abs();
        assert_eq!(dist_before, 1);
        assert_eq!(dist_after, 1);
        assert_eq!(step_1 + step_2, 0);
    }
}
