//! Map file discovery and parsing. Map authoring itself lives outside this
//! crate; only the [`MapStore`] interface it's consumed through does.
//!
//! YAML schema: `{name, size: [x, y], points: [[x, y], ...], posts:
//! [{point, name, type, population?, armor?, product?, replenishment?}],
//! lines: [[length, p0, p1], ...]}`, with `point`/`p0`/`p1` 1-based indices
//! into `points`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{GameError, GameResult};
use crate::map::{Coordinate, Map};
use crate::model::{Line, Point, Post, PostKind};

#[derive(Clone, Debug, Deserialize)]
struct PostRecord {
    point: usize,
    name: String,
    #[serde(rename = "type")]
    kind: u32,
    #[serde(default)]
    population: u32,
    #[serde(default)]
    armor: u32,
    #[serde(default)]
    product: u32,
    #[serde(default = "default_replenishment")]
    replenishment: u32,
}

fn default_replenishment() -> u32 {
    1
}

#[derive(Clone, Debug, Deserialize)]
pub struct MapRecord {
    pub name: String,
    pub size: (i32, i32),
    pub points: Vec<(i32, i32)>,
    posts: Vec<PostRecord>,
    /// `(length, p0, p1)`, 1-based point indices.
    lines: Vec<(u32, usize, usize)>,
}

impl MapRecord {
    pub fn parse(contents: &str) -> GameResult<MapRecord> {
        serde_yaml::from_str(contents)
            .map_err(|e| GameError::bad_command(format!("Invalid map file: {e}")))
    }

    /// Builds a fresh [`Map`] instance (`idx` is assigned by the caller, since
    /// the record itself carries only a name).
    pub fn build(&self, idx: u32) -> GameResult<Map> {
        let mut points = IndexMap::new();
        let mut coordinates = IndexMap::new();
        for (i, (x, y)) in self.points.iter().enumerate() {
            let point_idx = (i + 1) as u32;
            points.insert(point_idx, Point::new(point_idx, None));
            coordinates.insert(point_idx, Coordinate { idx: point_idx, x: *x, y: *y });
        }

        let mut posts = IndexMap::new();
        for (i, record) in self.posts.iter().enumerate() {
            let post_idx = (i + 1) as u32;
            let point_idx = record.point as u32;
            let point = points.get_mut(&point_idx).ok_or_else(|| {
                GameError::bad_command(format!("Map {}: post '{}' references unknown point {}", self.name, record.name, point_idx))
            })?;
            point.post_idx = Some(post_idx);

            let kind = match record.kind {
                1 => PostKind::Town(crate::model::TownData {
                    player_idx: None,
                    level: 1,
                    population: record.population,
                    product: record.product,
                    armor: record.armor,
                    population_capacity: 0,
                    product_capacity: 0,
                    armor_capacity: 0,
                    train_cooldown: 0,
                    next_level_price: None,
                }),
                2 => PostKind::Market(crate::model::MarketData {
                    product: record.product,
                    product_capacity: record.product,
                    replenishment: record.replenishment,
                }),
                3 => PostKind::Storage(crate::model::StorageData {
                    armor: record.armor,
                    armor_capacity: record.armor,
                    replenishment: record.replenishment,
                }),
                other => {
                    return Err(GameError::bad_command(format!("Map {}: unknown post type {}", self.name, other)));
                }
            };

            posts.insert(
                post_idx,
                Post {
                    idx: post_idx,
                    name: record.name.clone(),
                    point_idx,
                    events: Vec::new(),
                    kind,
                },
            );
        }

        let mut lines = IndexMap::new();
        for (i, (length, p0, p1)) in self.lines.iter().enumerate() {
            let line_idx = (i + 1) as u32;
            lines.insert(line_idx, Line::new(line_idx, *length, *p0 as u32, *p1 as u32));
        }

        Ok(Map::new(idx, self.name.clone(), self.size, lines, points, coordinates, posts))
    }

    pub fn town_count(&self) -> usize {
        self.posts.iter().filter(|p| p.kind == 1).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
name: starter
size: [10, 10]
points:
  - [0, 0]
  - [5, 0]
  - [10, 0]
posts:
  - point: 1
    name: alpha
    type: 1
    population: 5
    product: 50
    armor: 50
  - point: 3
    name: beta
    type: 1
    population: 5
    product: 50
    armor: 50
  - point: 2
    name: central market
    type: 2
    product: 100
lines:
  - [5, 1, 2]
  - [5, 2, 3]
"#;

    #[test]
    fn parses_minimal_map() {
        let record = MapRecord::parse(SAMPLE).unwrap();
        assert_eq!(record.name, "starter");
        assert_eq!(record.town_count(), 2);

        let map = record.build(1).unwrap();
        assert_eq!(map.towns.len(), 2);
        assert_eq!(map.markets.len(), 1);
        assert_eq!(map.lines.len(), 2);
        assert_eq!(map.points[&2].post_idx, Some(3));
    }

    #[test]
    fn rejects_post_on_unknown_point() {
        let bad = SAMPLE.replace("point: 1", "point: 99");
        let record = MapRecord::parse(&bad).unwrap();
        assert!(record.build(1).is_err());
    }
}

/// Read-only lookup of named maps, keyed by name, plus one "active" map.
pub trait MapStore: Send + Sync {
    fn by_name(&self, name: &str) -> GameResult<MapRecord>;
    fn active(&self) -> GameResult<MapRecord>;
}

/// Discovers `*.yaml` map files via a glob pattern, the first file found
/// naming the active map.
pub struct FsMapStore {
    discovery_glob: String,
}

impl FsMapStore {
    pub fn new(discovery_glob: impl Into<String>) -> FsMapStore {
        FsMapStore { discovery_glob: discovery_glob.into() }
    }

    fn load(path: &Path) -> GameResult<MapRecord> {
        let contents = fs::read_to_string(path)
            .map_err(|e| GameError::resource_not_found(format!("Cannot read map file {}: {e}", path.display())))?;
        MapRecord::parse(&contents)
    }
}

impl MapStore for FsMapStore {
    fn by_name(&self, name: &str) -> GameResult<MapRecord> {
        for entry in glob::glob(&self.discovery_glob).map_err(|e| GameError::bad_command(e.to_string()))? {
            let path = entry.map_err(|e| GameError::bad_command(e.to_string()))?;
            let record = Self::load(&path)?;
            if record.name == name {
                return Ok(record);
            }
        }
        Err(GameError::resource_not_found(format!("Map '{name}' not found")))
    }

    fn active(&self) -> GameResult<MapRecord> {
        let mut paths: Vec<_> = glob::glob(&self.discovery_glob)
            .map_err(|e| GameError::bad_command(e.to_string()))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| GameError::bad_command(e.to_string()))?;
        paths.sort();
        let path = paths.first().ok_or_else(|| GameError::resource_not_found("No map files discovered"))?;
        Self::load(path)
    }
}

