//! Event-driven redstone chip detection and simulation.
//!
//! A chip is a straight run of body blocks behind an activation marker,
//! with input and output markers on its sides. This crate turns such
//! layouts into live logic instances: it detects them, simulates them as
//! debounced event-driven circuits bound to the world's redstone state,
//! traces them for observers, verifies they still physically exist, and
//! persists the whole population across restarts.
//!
//! The host supplies the world through the [`World`] trait and feeds
//! events into a [`ChipRegistry`]:
//!
//! ```
//! use redchips::{BlockPosition, ChipRegistry, MemoryWorld, Preferences};
//!
//! let mut world = MemoryWorld::new();
//! let activation = BlockPosition::new(0, 64, 0);
//! world.place_marker(activation, "minecraft:oak_wall_sign", &["and"]);
//! for x in 1..=3 {
//!     world.place(BlockPosition::new(x, 64, 0), "minecraft:sandstone");
//! }
//! world.place(BlockPosition::new(1, 64, -1), "minecraft:iron_block");
//! world.place(BlockPosition::new(3, 64, 1), "minecraft:gold_block");
//! world.place(BlockPosition::new(3, 64, 2), "minecraft:redstone_wire");
//!
//! let mut registry = ChipRegistry::new(Preferences::default());
//! let id = registry.activate(&mut world, activation).unwrap();
//!
//! let sensed = BlockPosition::new(1, 64, -2);
//! world.set_power_level(sensed, 15);
//! registry.dispatch_redstone_change(&mut world, sensed, 0, 15);
//! assert!(registry.chip(id).unwrap().core.output_bits().get(0));
//! ```

pub mod block_position;
pub mod block_state;
pub mod chip;
pub mod chunk;
pub mod debug;
pub mod integrity;
pub mod persist;
pub mod prefs;
pub mod registry;
pub mod scanner;
pub mod signal;
pub mod world;

pub use block_position::{BlockPosition, Direction};
pub use block_state::BlockState;
pub use chip::logic::{ChipLogic, LogicRegistry};
pub use chip::{Chip, ChipIo, ChipState, InitError};
pub use chunk::ChunkLocation;
pub use debug::{DebugHub, DebugSink};
pub use integrity::IntegrityFault;
pub use persist::{ChipStore, PersistenceError};
pub use prefs::Preferences;
pub use registry::{ActivationError, ChipInfo, ChipRegistry};
pub use scanner::{ChipTopology, DetectionError, InputPin, OutputPin};
pub use signal::{Bits, SignalError};
pub use world::{MemoryWorld, World};
