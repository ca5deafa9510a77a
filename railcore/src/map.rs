//! Map graph and dynamic object tables backing a game's live snapshot.
//!
//! A [`Map`] is built once at game creation from a [`MapRecord`] (see
//! [`crate::mapfile`]) and then mutated in place by [`crate::game::Game`] as
//! trains move and posts change hands — it never touches the map store again.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::config::Config;
use crate::model::{Line, LineId, Player, PlayerId, Point, PointId, Post, PostId, PostKind, PostType, Train, TrainId};

#[derive(Clone, Copy, Debug, Serialize)]
pub struct Coordinate {
    pub idx: PointId,
    pub x: i32,
    pub y: i32,
}

/// Static graph plus the dynamic posts/trains/ratings tables that ride along
/// with it for the lifetime of a game. Towns/markets/storages are derived
/// index lists into `posts`, rebuilt once at construction.
#[derive(Clone, Debug)]
pub struct Map {
    pub idx: u32,
    pub name: String,
    pub size: (i32, i32),

    pub lines: IndexMap<LineId, Line>,
    pub points: IndexMap<PointId, Point>,
    pub coordinates: IndexMap<PointId, Coordinate>,
    pub posts: IndexMap<PostId, Post>,
    pub trains: IndexMap<TrainId, Train>,
    pub ratings: HashMap<PlayerId, u32>,

    pub towns: Vec<PostId>,
    pub markets: Vec<PostId>,
    pub storages: Vec<PostId>,
}

impl Map {
    pub fn new(
        idx: u32,
        name: String,
        size: (i32, i32),
        lines: IndexMap<LineId, Line>,
        points: IndexMap<PointId, Point>,
        coordinates: IndexMap<PointId, Coordinate>,
        posts: IndexMap<PostId, Post>,
    ) -> Map {
        let mut towns = Vec::new();
        let mut markets = Vec::new();
        let mut storages = Vec::new();
        for post in posts.values() {
            match post.kind.post_type() {
                PostType::Town => towns.push(post.idx),
                PostType::Market => markets.push(post.idx),
                PostType::Storage => storages.push(post.idx),
            }
        }
        Map {
            idx,
            name,
            size,
            lines,
            points,
            coordinates,
            posts,
            trains: IndexMap::new(),
            ratings: HashMap::new(),
            towns,
            markets,
            storages,
        }
    }

    pub fn add_train(&mut self, train: Train) {
        self.trains.insert(train.idx, train);
    }

    /// Lines incident to `point`, in ascending id order.
    pub fn lines_at(&self, point: PointId) -> impl Iterator<Item = &Line> {
        self.lines.values().filter(move |line| line.has_point(point))
    }

    pub fn unowned_town(&self) -> Option<PostId> {
        self.towns
            .iter()
            .copied()
            .find(|idx| self.posts[idx].town().and_then(|t| t.player_idx.as_ref()).is_none())
    }

    /// Allocates `count` fresh trains for `player`, parked at `home_point` on
    /// whichever line is incident to it, registers them in `self.trains`, and
    /// returns their ids.
    pub fn spawn_trains(&mut self, config: &Config, player: &Player, count: u32, next_id: &mut TrainId) -> Vec<TrainId> {
        let home_line = self
            .lines_at(player.home_point_idx)
            .next()
            .map(|line| (line.idx, line.endpoint_position(player.home_point_idx)))
            .expect("home point must have at least one incident line");

        let mut ids = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let idx = *next_id;
            *next_id += 1;
            let train = Train::new(config, idx, player.idx.clone(), home_line.0, home_line.1);
            self.add_train(train);
            ids.push(idx);
        }
        ids
    }

    pub fn layer0(&self) -> MapLayer0<'_> {
        MapLayer0 {
            idx: self.idx,
            name: &self.name,
            points: self.points.values().collect(),
            lines: self.lines.values().collect(),
        }
    }

    pub fn layer1(&self) -> MapLayer1<'_> {
        MapLayer1 {
            idx: self.idx,
            posts: self.posts.values().collect(),
            trains: self.trains.values().collect(),
            ratings: &self.ratings,
        }
    }

    pub fn layer10(&self) -> MapLayer10<'_> {
        MapLayer10 {
            idx: self.idx,
            size: self.size,
            coordinates: self.coordinates.values().collect(),
        }
    }
}

#[derive(Serialize)]
pub struct MapLayer0<'a> {
    pub idx: u32,
    pub name: &'a str,
    pub points: Vec<&'a Point>,
    pub lines: Vec<&'a Line>,
}

#[derive(Serialize)]
pub struct MapLayer1<'a> {
    pub idx: u32,
    pub posts: Vec<&'a Post>,
    pub trains: Vec<&'a Train>,
    pub ratings: &'a HashMap<PlayerId, u32>,
}

#[derive(Serialize)]
pub struct MapLayer10<'a> {
    pub idx: u32,
    pub size: (i32, i32),
    pub coordinates: Vec<&'a Coordinate>,
}
