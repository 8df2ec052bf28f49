use redchips::scanner;
use redchips::World;
use redchips::{BlockPosition, ChipRegistry, ChipState, Direction, MemoryWorld, Preferences};
use redchips::{ActivationError, DetectionError};

/// Body blocks run east from x=1 at the given z row. Input markers sit on
/// the north side with their sensed block one step further north; output
/// markers mirror that on the south side.
struct ChipLayout {
    activation: BlockPosition,
    sources: Vec<BlockPosition>,
    targets: Vec<BlockPosition>,
}

fn build_chip(
    world: &mut MemoryWorld,
    z: i32,
    label: &[&str],
    inputs: usize,
    outputs: usize,
) -> ChipLayout {
    let activation = BlockPosition::new(0, 64, z);
    world.place_marker(activation, "minecraft:oak_wall_sign", label);

    let body_len = inputs.max(outputs).max(1) as i32;
    for x in 1..=body_len {
        world.place(BlockPosition::new(x, 64, z), "minecraft:sandstone");
    }

    let mut sources = Vec::new();
    for i in 0..inputs as i32 {
        world.place(BlockPosition::new(1 + i, 64, z - 1), "minecraft:iron_block");
        sources.push(BlockPosition::new(1 + i, 64, z - 2));
    }

    let mut targets = Vec::new();
    for i in 0..outputs as i32 {
        world.place(BlockPosition::new(1 + i, 64, z + 1), "minecraft:gold_block");
        world.place(BlockPosition::new(1 + i, 64, z + 2), "minecraft:redstone_wire");
        targets.push(BlockPosition::new(1 + i, 64, z + 2));
    }

    ChipLayout {
        activation,
        sources,
        targets,
    }
}

#[test]
fn test_and_chip_activation() {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut world = MemoryWorld::new();

    // 5-block line: activation marker, 3 body blocks, completion block
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);
    world.set_power_level(layout.sources[0], 15);

    let mut registry = ChipRegistry::new(Preferences::default());
    let id = registry.activate(&mut world, layout.activation).unwrap();

    let chip = registry.chip(id).unwrap();
    assert_eq!(chip.core.inputs.len(), 1);
    assert_eq!(chip.core.outputs.len(), 1);
    assert_eq!(chip.core.state(), ChipState::Active);

    // initial output reflects the initial input reading
    assert!(chip.core.output_bits().get(0));
    assert_eq!(world.power_level(layout.targets[0]), 15);
}

#[test]
fn test_and_chip_starts_low_with_unpowered_input() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    let id = registry.activate(&mut world, layout.activation).unwrap();

    assert!(!registry.chip(id).unwrap().core.output_bits().get(0));
    assert_eq!(world.power_level(layout.targets[0]), 0);
}

#[test]
fn test_scan_symmetry_from_opposite_ends() {
    let mut world = MemoryWorld::new();
    for x in 1..=3 {
        world.place(BlockPosition::new(x, 64, 0), "minecraft:sandstone");
    }
    world.place(BlockPosition::new(1, 64, -1), "minecraft:iron_block");
    world.place(BlockPosition::new(2, 64, -1), "minecraft:iron_block");
    world.place(BlockPosition::new(3, 64, 1), "minecraft:gold_block");
    world.place(BlockPosition::new(3, 64, 2), "minecraft:redstone_wire");

    let east_end = BlockPosition::new(0, 64, 0);
    let west_end = BlockPosition::new(4, 64, 0);
    world.place_marker(east_end, "minecraft:oak_wall_sign", &["and"]);
    world.place_marker(west_end, "minecraft:oak_wall_sign", &["and"]);

    let prefs = Preferences::default();
    let forward = scanner::scan(&world, east_end, Direction::East, &prefs).unwrap();
    let backward = scanner::scan(&world, west_end, Direction::West, &prefs).unwrap();

    assert_eq!(forward.inputs.len(), backward.inputs.len());
    assert_eq!(forward.outputs.len(), backward.outputs.len());

    // same pins, discovered in reverse walk order
    let forward_markers: Vec<_> = forward.inputs.iter().map(|p| p.marker).collect();
    let mut backward_markers: Vec<_> = backward.inputs.iter().map(|p| p.marker).collect();
    backward_markers.reverse();
    assert_eq!(forward_markers, backward_markers);
    assert_eq!(forward.outputs[0].marker, backward.outputs[0].marker);
}

#[test]
fn test_duplicate_activation_rejected() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    registry.activate(&mut world, layout.activation).unwrap();

    match registry.activate(&mut world, layout.activation) {
        Err(ActivationError::AlreadyActive(pos)) => assert_eq!(pos, layout.activation),
        other => panic!("expected AlreadyActive, got {:?}", other.map(|_| ())),
    }
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_unknown_kind_is_a_detection_failure() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["frobnicator"], 1, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    match registry.activate(&mut world, layout.activation) {
        Err(ActivationError::Detection(DetectionError::UnknownKind(name))) => {
            assert_eq!(name, "frobnicator");
        }
        other => panic!("expected UnknownKind, got {:?}", other.map(|_| ())),
    }
    assert!(registry.is_empty());
}

#[test]
fn test_rejected_args_discard_the_instance() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["counter", "sideways"], 1, 2);

    let mut registry = ChipRegistry::new(Preferences::default());
    assert!(matches!(
        registry.activate(&mut world, layout.activation),
        Err(ActivationError::Init(_))
    ));
    assert!(registry.is_empty());
    // the marker stays claimable
    world.set_marker_line(layout.activation, 0, "counter");
    world.set_marker_line(layout.activation, 1, "up");
    assert!(registry.activate(&mut world, layout.activation).is_ok());
}

#[test]
fn test_integrity_tracks_missing_structure() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    let id = registry.activate(&mut world, layout.activation).unwrap();
    assert_eq!(registry.check_integrity(&world, id), Some(true));

    // a body block disappears
    let body = BlockPosition::new(2, 64, 0);
    world.remove_block(body);
    assert_eq!(registry.check_integrity(&world, id), Some(false));

    // checking never destroys
    assert_eq!(registry.len(), 1);

    world.place(body, "minecraft:sandstone");
    assert_eq!(registry.check_integrity(&world, id), Some(true));

    // the activation marker turning into something else also fails
    world.place(layout.activation, "minecraft:stone");
    assert_eq!(registry.check_integrity(&world, id), Some(false));
}

#[test]
fn test_block_break_destroys_chip_and_forces_outputs_low() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);
    world.set_power_level(layout.sources[0], 15);

    let mut registry = ChipRegistry::new(Preferences::default());
    let id = registry.activate(&mut world, layout.activation).unwrap();
    assert_eq!(world.power_level(layout.targets[0]), 15);

    let broken = BlockPosition::new(2, 64, 0);
    world.remove_block(broken);
    assert_eq!(registry.check_integrity(&world, id), Some(false));

    assert_eq!(registry.handle_block_break(&mut world, broken), Some(id));
    assert_eq!(world.power_level(layout.targets[0]), 0);
    assert!(registry.is_empty());
    assert_eq!(registry.chip_id_at(layout.activation), None);

    // breaking unrelated blocks is a no-op
    assert_eq!(
        registry.handle_block_break(&mut world, BlockPosition::new(50, 64, 50)),
        None
    );
}

#[test]
fn test_fix_io_blocks_is_idempotent_and_releases_chunks() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    let id = registry.activate(&mut world, layout.activation).unwrap();

    // markers and sensed blocks at z<0 live in the northern chunk
    world.unload_chunk(redchips::ChunkLocation::new(0, -1));

    let input_marker = BlockPosition::new(1, 64, -1);
    world.place(input_marker, "minecraft:stone");

    assert_eq!(registry.fix_io_blocks(&mut world, id), Some(1));
    assert!(world
        .block_at(input_marker)
        .unwrap()
        .is("minecraft:iron_block"));
    assert_eq!(world.forced_chunk_count(), 0);

    assert_eq!(registry.fix_io_blocks(&mut world, id), Some(0));
    assert_eq!(world.forced_chunk_count(), 0);
}

#[test]
fn test_marker_text_updates_on_next_tick() {
    let mut world = MemoryWorld::new();
    let layout = build_chip(&mut world, 0, &["and"], 1, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    let id = registry.activate(&mut world, layout.activation).unwrap();

    // nothing happens until the tick runs
    assert_eq!(world.marker_text(layout.activation).unwrap()[0], "and");
    registry.run_deferred(&mut world);
    assert_eq!(world.marker_text(layout.activation).unwrap()[0], "[and]");

    registry.set_chip_disabled(id, true);
    registry.run_deferred(&mut world);
    assert_eq!(world.marker_text(layout.activation).unwrap()[0], "(and)");
}

#[test]
fn test_list_chips() {
    let mut world = MemoryWorld::new();
    let first = build_chip(&mut world, 0, &["and"], 1, 1);
    let second = build_chip(&mut world, 10, &["or"], 2, 1);

    let mut registry = ChipRegistry::new(Preferences::default());
    let first_id = registry.activate(&mut world, first.activation).unwrap();
    let second_id = registry.activate(&mut world, second.activation).unwrap();
    registry.set_chip_name(second_id, Some("gatekeeper".to_string()));

    let infos = registry.list_chips();
    assert_eq!(infos.len(), 2);
    assert_eq!(infos[0].id, first_id);
    assert_eq!(infos[0].kind, "and");
    assert_eq!(infos[0].activation, first.activation);
    assert_eq!(infos[1].id, second_id);
    assert_eq!(infos[1].name.as_deref(), Some("gatekeeper"));
}
