//! Account within a single game ("Player").

use serde::Serialize;

use crate::model::{PlayerId, PointId, PostId};

#[derive(Clone, Debug)]
pub struct Player {
    pub idx: PlayerId,
    pub name: String,
    pub password: Option<String>,
    pub home_point_idx: PointId,
    pub town_idx: PostId,
    pub in_game: bool,
    pub turn_called: bool,
    pub rating: u32,
}

impl Player {
    pub fn new(idx: PlayerId, name: String, password: Option<String>, home_point_idx: PointId, town_idx: PostId) -> Player {
        Player {
            idx,
            name,
            password,
            home_point_idx,
            town_idx,
            in_game: true,
            turn_called: false,
            rating: 0,
        }
    }

    pub fn check_password(&self, password: Option<&str>) -> bool {
        self.password.as_deref() == password
    }
}

/// Wire projection: password is a protected field and never serialized.
#[derive(Serialize)]
pub struct PlayerView<'a> {
    pub idx: &'a PlayerId,
    pub name: &'a str,
    pub rating: u32,
    pub home: PointId,
    pub town: PostId,
    pub trains: Vec<crate::model::TrainId>,
}

impl Player {
    pub fn view(&self, trains: Vec<crate::model::TrainId>) -> PlayerView<'_> {
        PlayerView {
            idx: &self.idx,
            name: &self.name,
            rating: self.rating,
            home: self.home_point_idx,
            town: self.town_idx,
            trains,
        }
    }
}
