//! Graph edge ("Line").

use serde::Serialize;

use crate::model::{LineId, PointId};

/// Undirected edge between two points. A train's position along a line is an
/// integer in `[0, length]`; position `0` corresponds to `points.0`,
/// `length` to `points.1`.
#[derive(Clone, Copy, Debug, Serialize)]
pub struct Line {
    pub idx: LineId,
    pub length: u32,
    pub points: (PointId, PointId),
}

impl Line {
    pub fn new(idx: LineId, length: u32, p0: PointId, p1: PointId) -> Line {
        Line {
            idx,
            length,
            points: (p0, p1),
        }
    }

    /// The endpoint reached when moving in `sign` direction (`+1` or `-1`).
    pub fn endpoint(&self, sign: i32) -> PointId {
        if sign < 0 {
            self.points.0
        } else {
            self.points.1
        }
    }

    pub fn has_point(&self, point: PointId) -> bool {
        self.points.0 == point || self.points.1 == point
    }

    /// The position (`0` or `length`) corresponding to `point`, for a line
    /// known to be incident to it.
    pub fn endpoint_position(&self, point: PointId) -> u32 {
        if self.points.0 == point {
            0
        } else {
            self.length
        }
    }
}
