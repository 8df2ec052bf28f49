//! Read-only verification that a chip's recorded structure still exists
//! physically. Checking never mutates the world or the chip; whoever
//! detects a fault decides what happens next.

use crate::block_position::BlockPosition;
use crate::chip::ChipCore;
use crate::prefs::Preferences;
use crate::world::World;
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrityFault {
    /// The activation marker no longer holds the expected marker material.
    MissingActivation(BlockPosition),
    /// A non-activation structure location is now empty.
    MissingStructure(BlockPosition),
}

/// Inspect every structure location of a chip. An empty result means the
/// chip is physically intact.
pub fn inspect(world: &dyn World, core: &ChipCore, prefs: &Preferences) -> Vec<IntegrityFault> {
    let mut faults = Vec::new();

    let activation_ok = world
        .block_at(core.activation)
        .is_some_and(|b| b.is(&prefs.activation_block));
    if !activation_ok {
        warn!(
            "chip {}: activation marker is missing at {}",
            core.id, core.activation
        );
        faults.push(IntegrityFault::MissingActivation(core.activation));
    }

    for &pos in &core.structure {
        if pos == core.activation {
            continue;
        }
        let empty = world.block_at(pos).map_or(true, |b| b.is_air());
        if empty {
            warn!("chip {}: structure block is missing at {}", core.id, pos);
            faults.push(IntegrityFault::MissingStructure(pos));
        }
    }

    faults
}
