//! The substrate boundary.
//!
//! Everything the simulation knows about the physical world goes through the
//! [`World`] trait: block lookup and mutation, redstone power, marker text
//! and chunk load state. A host embeds the crate by implementing `World`
//! over its own storage. [`MemoryWorld`] is a self-contained implementation
//! used by the test suites and by headless embedding.

use crate::block_position::BlockPosition;
use crate::block_state::BlockState;
use crate::chunk::ChunkLocation;
use rustc_hash::{FxHashMap, FxHashSet};

/// Host-side access to the mutable block world.
///
/// All methods are synchronous. `None` from [`World::block_at`] means the
/// position holds nothing (air or never written).
pub trait World {
    fn block_at(&self, pos: BlockPosition) -> Option<&BlockState>;
    fn set_block(&mut self, pos: BlockPosition, block: BlockState);

    /// Redstone power level at a position, 0 when unpowered.
    fn power_level(&self, pos: BlockPosition) -> u8;
    /// Drive a position fully on or fully off.
    fn assert_power(&mut self, pos: BlockPosition, on: bool);

    /// Text lines of the marker at a position, if the position holds one.
    fn marker_text(&self, pos: BlockPosition) -> Option<&[String]>;
    fn set_marker_line(&mut self, pos: BlockPosition, line: usize, text: &str);

    fn is_chunk_loaded(&self, chunk: ChunkLocation) -> bool;
    fn force_chunk(&mut self, chunk: ChunkLocation);
    fn release_chunk(&mut self, chunk: ChunkLocation);
}

/// In-memory world backed by position-keyed maps.
///
/// Tracks write counters so tests can observe how often the simulation
/// touched the substrate, not just the final state.
#[derive(Debug, Default)]
pub struct MemoryWorld {
    blocks: FxHashMap<BlockPosition, BlockState>,
    power: FxHashMap<BlockPosition, u8>,
    markers: FxHashMap<BlockPosition, Vec<String>>,
    unloaded: FxHashSet<ChunkLocation>,
    forced: FxHashSet<ChunkLocation>,
    power_writes: usize,
    block_writes: usize,
}

impl MemoryWorld {
    pub fn new() -> Self {
        MemoryWorld::default()
    }

    /// Place a block by material name.
    pub fn place(&mut self, pos: BlockPosition, name: &str) {
        self.blocks.insert(pos, BlockState::new(name));
    }

    /// Place a marker block together with its text lines.
    pub fn place_marker(&mut self, pos: BlockPosition, name: &str, lines: &[&str]) {
        self.blocks.insert(pos, BlockState::new(name));
        self.markers
            .insert(pos, lines.iter().map(|l| l.to_string()).collect());
    }

    pub fn remove_block(&mut self, pos: BlockPosition) {
        self.blocks.remove(&pos);
        self.markers.remove(&pos);
        self.power.remove(&pos);
    }

    /// Host-side power source, e.g. a lever or a powered wire.
    pub fn set_power_level(&mut self, pos: BlockPosition, level: u8) {
        self.power.insert(pos, level);
    }

    pub fn unload_chunk(&mut self, chunk: ChunkLocation) {
        self.unloaded.insert(chunk);
    }

    pub fn load_chunk(&mut self, chunk: ChunkLocation) {
        self.unloaded.remove(&chunk);
    }

    /// Number of power assertions made through [`World::assert_power`].
    pub fn power_writes(&self) -> usize {
        self.power_writes
    }

    /// Number of block mutations made through [`World::set_block`].
    pub fn block_writes(&self) -> usize {
        self.block_writes
    }

    /// Chunks currently force-loaded and not yet released.
    pub fn forced_chunk_count(&self) -> usize {
        self.forced.len()
    }
}

impl World for MemoryWorld {
    fn block_at(&self, pos: BlockPosition) -> Option<&BlockState> {
        self.blocks.get(&pos)
    }

    fn set_block(&mut self, pos: BlockPosition, block: BlockState) {
        self.block_writes += 1;
        self.blocks.insert(pos, block);
    }

    fn power_level(&self, pos: BlockPosition) -> u8 {
        self.power.get(&pos).copied().unwrap_or(0)
    }

    fn assert_power(&mut self, pos: BlockPosition, on: bool) {
        self.power_writes += 1;
        self.power.insert(pos, if on { 15 } else { 0 });
    }

    fn marker_text(&self, pos: BlockPosition) -> Option<&[String]> {
        self.markers.get(&pos).map(|lines| lines.as_slice())
    }

    fn set_marker_line(&mut self, pos: BlockPosition, line: usize, text: &str) {
        let lines = self.markers.entry(pos).or_default();
        if lines.len() <= line {
            lines.resize(line + 1, String::new());
        }
        lines[line] = text.to_string();
    }

    fn is_chunk_loaded(&self, chunk: ChunkLocation) -> bool {
        !self.unloaded.contains(&chunk) || self.forced.contains(&chunk)
    }

    fn force_chunk(&mut self, chunk: ChunkLocation) {
        self.forced.insert(chunk);
    }

    fn release_chunk(&mut self, chunk: ChunkLocation) {
        self.forced.remove(&chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_and_lookup() {
        let mut world = MemoryWorld::new();
        let pos = BlockPosition::new(1, 64, 2);
        world.place(pos, "minecraft:sandstone");

        assert!(world.block_at(pos).unwrap().is("minecraft:sandstone"));
        assert!(world.block_at(pos.offset(0, 1, 0)).is_none());
    }

    #[test]
    fn test_power_defaults_to_zero() {
        let mut world = MemoryWorld::new();
        let pos = BlockPosition::new(0, 0, 0);
        assert_eq!(world.power_level(pos), 0);

        world.assert_power(pos, true);
        assert_eq!(world.power_level(pos), 15);
        assert_eq!(world.power_writes(), 1);

        world.assert_power(pos, false);
        assert_eq!(world.power_level(pos), 0);
        assert_eq!(world.power_writes(), 2);
    }

    #[test]
    fn test_forced_chunk_counts_as_loaded() {
        let mut world = MemoryWorld::new();
        let chunk = ChunkLocation::new(3, -2);
        assert!(world.is_chunk_loaded(chunk));

        world.unload_chunk(chunk);
        assert!(!world.is_chunk_loaded(chunk));

        world.force_chunk(chunk);
        assert!(world.is_chunk_loaded(chunk));
        assert_eq!(world.forced_chunk_count(), 1);

        world.release_chunk(chunk);
        assert!(!world.is_chunk_loaded(chunk));
        assert_eq!(world.forced_chunk_count(), 0);
    }

    #[test]
    fn test_marker_line_updates() {
        let mut world = MemoryWorld::new();
        let pos = BlockPosition::new(5, 70, 5);
        world.place_marker(pos, "minecraft:oak_wall_sign", &["and", "a b"]);

        world.set_marker_line(pos, 0, "[and]");
        let lines = world.marker_text(pos).unwrap();
        assert_eq!(lines[0], "[and]");
        assert_eq!(lines[1], "a b");
    }
}
