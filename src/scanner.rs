//! Structure detection.
//!
//! A chip is a straight run of body blocks in front of an activation marker.
//! The scanner walks the run one block at a time, probing the two lateral
//! neighbors of every body block for pin markers, and either produces a
//! validated [`ChipTopology`] or reports why the layout is not a chip.
//!
//! Input pins sense the block one step beyond their marker; output pins
//! drive the block one step beyond theirs, and that driven block becomes
//! part of the chip structure so breaking the wire destroys the chip.

use crate::block_position::{BlockPosition, Direction};
use crate::prefs::Preferences;
use crate::world::World;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DetectionError {
    #[error("no chip body found in front of the activation marker")]
    NoBodyBlocks,
    #[error("output pin drives {0} which is not a transmission block")]
    OutputNotWired(BlockPosition),
    #[error("chip has no input or output pins")]
    NoPins,
    #[error("unknown chip kind: {0}")]
    UnknownKind(String),
}

/// An input terminal: the marker block and the locations it senses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputPin {
    pub marker: BlockPosition,
    pub sources: Vec<BlockPosition>,
}

/// An output terminal: the marker block and the location it drives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPin {
    pub marker: BlockPosition,
    pub target: BlockPosition,
}

/// A validated physical layout, ready to be bound to a logic kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipTopology {
    pub activation: BlockPosition,
    pub direction: Direction,
    pub inputs: Vec<InputPin>,
    pub outputs: Vec<OutputPin>,
    pub interface_blocks: Vec<BlockPosition>,
    /// Every location whose disappearance destroys the chip. Always
    /// contains the activation marker.
    pub structure: Vec<BlockPosition>,
    /// The first non-body block that ended the walk.
    pub terminus: BlockPosition,
}

fn block_is(world: &dyn World, pos: BlockPosition, material: &str) -> bool {
    world.block_at(pos).is_some_and(|b| b.is(material))
}

/// Walk the substrate from `activation` along `direction` and detect a chip.
///
/// Pin ordering is the walk order: one step at a time away from the
/// activation marker, probing the positive lateral before the negative one
/// at each step. Scanning the same layout from the opposite end yields the
/// same pin count and classification with the left/right sense swapped.
pub fn scan(
    world: &dyn World,
    activation: BlockPosition,
    direction: Direction,
    prefs: &Preferences,
) -> Result<ChipTopology, DetectionError> {
    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    let mut interface_blocks = Vec::new();
    let mut structure = vec![activation];

    let mut cursor = activation.shifted(direction);
    if !block_is(world, cursor, &prefs.chip_block) {
        return Err(DetectionError::NoBodyBlocks);
    }

    let (plus, minus) = direction.laterals();
    while block_is(world, cursor, &prefs.chip_block) {
        structure.push(cursor);
        for lateral in [plus, minus] {
            let marker = cursor.shifted(lateral);
            let beyond = marker.shifted(lateral);
            if block_is(world, marker, &prefs.input_block) {
                structure.push(marker);
                inputs.push(InputPin {
                    marker,
                    sources: vec![beyond],
                });
            } else if block_is(world, marker, &prefs.output_block) {
                structure.push(marker);
                structure.push(beyond);
                outputs.push(OutputPin {
                    marker,
                    target: beyond,
                });
            } else if block_is(world, marker, &prefs.interface_block) {
                structure.push(marker);
                interface_blocks.push(marker);
            }
        }
        cursor = cursor.shifted(direction);
    }
    let terminus = cursor;

    for output in &outputs {
        if !block_is(world, output.target, &prefs.transmission_block) {
            return Err(DetectionError::OutputNotWired(output.target));
        }
    }

    if inputs.is_empty() && outputs.is_empty() {
        return Err(DetectionError::NoPins);
    }

    Ok(ChipTopology {
        activation,
        direction,
        inputs,
        outputs,
        interface_blocks,
        structure,
        terminus,
    })
}
