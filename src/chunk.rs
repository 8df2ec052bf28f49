use crate::block_position::BlockPosition;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 16x16 column of the world that can be independently loaded or unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkLocation {
    pub x: i32,
    pub z: i32,
}

impl ChunkLocation {
    pub fn new(x: i32, z: i32) -> Self {
        ChunkLocation { x, z }
    }

    /// The chunk containing a block position. Arithmetic shift keeps
    /// negative coordinates on the floor-division grid.
    pub fn of(pos: BlockPosition) -> Self {
        ChunkLocation {
            x: pos.x >> 4,
            z: pos.z >> 4,
        }
    }
}

impl fmt::Display for ChunkLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.x, self.z)
    }
}
