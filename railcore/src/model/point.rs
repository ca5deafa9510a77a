//! Graph vertex ("Point").

use serde::Serialize;

use crate::model::{PointId, PostId};

/// Vertex of the map graph. `post_idx` is set when a [`crate::model::Post`]
/// resides at this vertex.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Point {
    pub idx: PointId,
    pub post_idx: Option<PostId>,
}

impl Point {
    pub fn new(idx: PointId, post_idx: Option<PostId>) -> Point {
        Point { idx, post_idx }
    }
}
