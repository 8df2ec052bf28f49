//! Ownership of the live chip population.
//!
//! The registry holds every active chip plus the derived lookup indices
//! the event handlers need: activation marker to chip, sensed location to
//! input pin, structure block to chip, and chunk to interested chips. The
//! indices are rebuilt incrementally on registration and removal, never
//! scanned for.
//!
//! All mutating operations take `&mut self` and the world; the host's
//! event dispatch is expected to serialize calls. A host that dispatches
//! from several threads must wrap the registry in its own lock.

use crate::block_position::{BlockPosition, Direction};
use crate::chip::logic::LogicRegistry;
use crate::chip::{Chip, ChipServices, ChipState, InitError};
use crate::chunk::ChunkLocation;
use crate::debug::DebugSink;
use crate::persist::{ChipRecord, ChipStore};
use crate::prefs::Preferences;
use crate::scanner::{self, DetectionError};
use crate::world::World;
use log::{error, info, warn};
use rustc_hash::{FxHashMap, FxHashSet};
use smol_str::SmolStr;

#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("no activation marker at {0}")]
    NotActivationMarker(BlockPosition),
    #[error("activation marker at {0} has no chip label")]
    MissingLabel(BlockPosition),
    #[error("chip is already activated at {0}")]
    AlreadyActive(BlockPosition),
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error("chip init failed: {0}")]
    Init(#[from] InitError),
}

/// One row of the chip listing.
#[derive(Debug, Clone)]
pub struct ChipInfo {
    pub id: u32,
    pub kind: SmolStr,
    pub name: Option<String>,
    pub activation: BlockPosition,
    pub state: ChipState,
}

pub struct ChipRegistry {
    chips: FxHashMap<u32, Chip>,
    next_id: u32,
    by_activation: FxHashMap<BlockPosition, u32>,
    input_index: FxHashMap<BlockPosition, Vec<(u32, usize)>>,
    structure_index: FxHashMap<BlockPosition, u32>,
    chunk_index: FxHashMap<ChunkLocation, FxHashSet<u32>>,
    logic: LogicRegistry,
    prefs: Preferences,
    services: ChipServices,
    store: Option<ChipStore>,
}

impl ChipRegistry {
    pub fn new(prefs: Preferences) -> Self {
        ChipRegistry {
            chips: FxHashMap::default(),
            next_id: 0,
            by_activation: FxHashMap::default(),
            input_index: FxHashMap::default(),
            structure_index: FxHashMap::default(),
            chunk_index: FxHashMap::default(),
            logic: LogicRegistry::with_builtins(),
            prefs,
            services: ChipServices::default(),
            store: None,
        }
    }

    /// A registry that persists its population to the given store on every
    /// structural change.
    pub fn with_store(prefs: Preferences, store: ChipStore) -> Self {
        let mut registry = ChipRegistry::new(prefs);
        registry.store = Some(store);
        registry
    }

    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    /// Register custom logic kinds before activating or loading chips.
    pub fn logic_registry_mut(&mut self) -> &mut LogicRegistry {
        &mut self.logic
    }

    pub fn len(&self) -> usize {
        self.chips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chips.is_empty()
    }

    pub fn chip(&self, id: u32) -> Option<&Chip> {
        self.chips.get(&id)
    }

    /// The chip whose activation marker sits at a position.
    pub fn chip_id_at(&self, pos: BlockPosition) -> Option<u32> {
        self.by_activation.get(&pos).copied()
    }

    pub fn list_chips(&self) -> Vec<ChipInfo> {
        let mut infos: Vec<ChipInfo> = self
            .chips
            .values()
            .map(|chip| ChipInfo {
                id: chip.core.id,
                kind: chip.core.kind.clone(),
                name: chip.core.name.clone(),
                activation: chip.core.activation,
                state: chip.core.state(),
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    // ─── Activation ─────────────────────────────────────────────────────

    /// Try to activate a chip from the marker at `pos`, scanning in every
    /// direction until a layout is found. At most one chip may claim a
    /// given activation marker.
    pub fn activate(
        &mut self,
        world: &mut dyn World,
        pos: BlockPosition,
    ) -> Result<u32, ActivationError> {
        let marker_ok = world
            .block_at(pos)
            .is_some_and(|b| b.is(&self.prefs.activation_block));
        if !marker_ok {
            return Err(ActivationError::NotActivationMarker(pos));
        }
        if self.by_activation.contains_key(&pos) {
            return Err(ActivationError::AlreadyActive(pos));
        }

        let tokens: Vec<String> = world
            .marker_text(pos)
            .unwrap_or(&[])
            .iter()
            .flat_map(|line| line.split_whitespace())
            .map(|token| token.to_string())
            .collect();
        let Some((kind, args)) = tokens.split_first() else {
            return Err(ActivationError::MissingLabel(pos));
        };

        let Some(logic) = self.logic.create(kind) else {
            let err = DetectionError::UnknownKind(kind.clone());
            warn!("activation failed at {}: {}", pos, err);
            return Err(err.into());
        };

        let mut detection_err = DetectionError::NoBodyBlocks;
        let mut topology = None;
        for direction in Direction::ALL {
            match scanner::scan(world, pos, direction, &self.prefs) {
                Ok(found) => {
                    topology = Some(found);
                    break;
                }
                Err(DetectionError::NoBodyBlocks) => {}
                Err(e) => detection_err = e,
            }
        }
        let Some(topology) = topology else {
            warn!("activation failed at {}: {}", pos, detection_err);
            return Err(detection_err.into());
        };

        let id = self.next_id;
        let mut chip = Chip::new(id, kind.as_str(), args.to_vec(), topology, logic);
        if let Err(e) = chip.init_circuit(world, &mut self.services) {
            self.services.wireless.drop_chip(id);
            warn!("chip init failed at {}: {}", pos, e);
            return Err(e.into());
        }

        self.next_id += 1;
        self.index_chip(&chip);
        let label = chip.core.label();
        let inputs = chip.core.inputs.len();
        let outputs = chip.core.outputs.len();
        self.chips.insert(id, chip);
        info!(
            "activated {} with {} inputs and {} outputs",
            label, inputs, outputs
        );
        self.save();
        Ok(id)
    }

    // ─── Event handling ─────────────────────────────────────────────────

    /// A redstone level changed somewhere. Fans out to every chip with an
    /// input pin sensing that location; each chip's debounce decides
    /// whether its logic runs.
    pub fn dispatch_redstone_change(
        &mut self,
        world: &mut dyn World,
        pos: BlockPosition,
        old_level: u8,
        new_level: u8,
    ) {
        let new_value = new_level > 0;
        if (old_level > 0) == new_value {
            return;
        }
        let Some(hits) = self.input_index.get(&pos).cloned() else {
            return;
        };
        for (id, pin) in hits {
            if let Some(chip) = self.chips.get_mut(&id) {
                chip.state_change(world, &mut self.services, pin, new_value);
            }
        }
        self.pump_wireless(world);
    }

    fn pump_wireless(&mut self, world: &mut dyn World) {
        while self.services.wireless.has_pending() {
            for (channel, bits) in self.services.wireless.drain() {
                for id in self.services.wireless.tuned(&channel) {
                    if let Some(chip) = self.chips.get_mut(&id) {
                        chip.receive_broadcast(world, &mut self.services, &bits);
                    }
                }
            }
        }
    }

    /// A block was physically destroyed. If it belonged to a chip's
    /// structure, the chip is destroyed and removed. Returns the destroyed
    /// chip's id.
    pub fn handle_block_break(&mut self, world: &mut dyn World, pos: BlockPosition) -> Option<u32> {
        let id = *self.structure_index.get(&pos)?;
        self.destroy(world, id);
        Some(id)
    }

    /// Destroy a chip: shutdown, outputs forced low, removed from every
    /// index, population saved.
    pub fn destroy(&mut self, world: &mut dyn World, id: u32) -> bool {
        let Some(mut chip) = self.chips.remove(&id) else {
            return false;
        };
        chip.destroy(world, &mut self.services);
        self.unindex_chip(&chip);
        self.services.wireless.drop_chip(id);
        info!("destroyed {}", chip.core.label());
        self.save();
        true
    }

    /// A chunk became loaded. Every interested chip re-reads its inputs
    /// and re-asserts its outputs.
    pub fn chunk_loaded(&mut self, world: &mut dyn World, chunk: ChunkLocation) {
        let Some(ids) = self.chunk_index.get(&chunk) else {
            return;
        };
        let mut ids: Vec<u32> = ids.iter().copied().collect();
        ids.sort_unstable();
        for id in ids {
            if let Some(chip) = self.chips.get_mut(&id) {
                chip.circuit_chunk_loaded(world);
            }
        }
    }

    /// Apply queued marker text updates. The host calls this once per
    /// tick, after event dispatch has settled.
    pub fn run_deferred(&mut self, world: &mut dyn World) {
        for update in std::mem::take(&mut self.services.deferred) {
            if world.is_chunk_loaded(ChunkLocation::of(update.pos)) {
                world.set_marker_line(update.pos, update.line, &update.text);
            }
        }
    }

    // ─── Chip management ────────────────────────────────────────────────

    pub fn set_chip_disabled(&mut self, id: u32, disabled: bool) -> bool {
        match self.chips.get_mut(&id) {
            Some(chip) => {
                if disabled {
                    chip.disable(&mut self.services);
                } else {
                    chip.enable(&mut self.services);
                }
            }
            None => return false,
        }
        self.save();
        true
    }

    pub fn set_chip_name(&mut self, id: u32, name: Option<String>) -> bool {
        match self.chips.get_mut(&id) {
            Some(chip) => chip.core.name = name,
            None => return false,
        }
        self.save();
        true
    }

    pub fn check_integrity(&self, world: &dyn World, id: u32) -> Option<bool> {
        self.chips
            .get(&id)
            .map(|chip| chip.core.check_integrity(world, &self.prefs))
    }

    pub fn fix_io_blocks(&self, world: &mut dyn World, id: u32) -> Option<usize> {
        self.chips
            .get(&id)
            .map(|chip| chip.core.fix_io_blocks(world, &self.prefs))
    }

    // ─── Debug plumbing ─────────────────────────────────────────────────

    pub fn register_debug_sink(&mut self, id: impl Into<SmolStr>, sink: Box<dyn DebugSink>) {
        self.services.debug.register(id, sink);
    }

    pub fn unregister_debug_sink(&mut self, id: &str) -> bool {
        self.services.debug.unregister(id)
    }

    pub fn pause_debug_sink(&mut self, id: &str) {
        self.services.debug.pause(id);
    }

    pub fn resume_debug_sink(&mut self, id: &str) {
        self.services.debug.resume(id);
    }

    pub fn add_debugger(&mut self, chip_id: u32, sink_id: impl Into<SmolStr>) -> bool {
        match self.chips.get_mut(&chip_id) {
            Some(chip) => chip.core.channel.subscribe(sink_id),
            None => false,
        }
    }

    pub fn remove_debugger(&mut self, chip_id: u32, sink_id: &str) -> bool {
        match self.chips.get_mut(&chip_id) {
            Some(chip) => chip.core.channel.unsubscribe(sink_id),
            None => false,
        }
    }

    pub fn add_io_debugger(&mut self, chip_id: u32, sink_id: impl Into<SmolStr>) -> bool {
        match self.chips.get_mut(&chip_id) {
            Some(chip) => chip.core.channel.subscribe_io(sink_id),
            None => false,
        }
    }

    pub fn remove_io_debugger(&mut self, chip_id: u32, sink_id: &str) -> bool {
        match self.chips.get_mut(&chip_id) {
            Some(chip) => chip.core.channel.unsubscribe_io(sink_id),
            None => false,
        }
    }

    // ─── Persistence ────────────────────────────────────────────────────

    /// Rewrite the population file. Failures are logged; the in-memory
    /// population is unaffected either way.
    pub fn save(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let mut records: Vec<(u32, ChipRecord)> = self
            .chips
            .iter()
            .map(|(&id, chip)| (id, chip.to_record()))
            .collect();
        records.sort_by_key(|(id, _)| *id);
        if let Err(e) = store.save(records) {
            error!("failed to save chip population: {}", e);
        }
    }

    /// Rebuild the population from the store. Entries that fail to parse,
    /// name an unknown kind or collide with a live chip are skipped with a
    /// warning. Returns the number of chips brought up.
    pub fn load(&mut self, world: &mut dyn World) -> usize {
        let entries = match &self.store {
            None => return 0,
            Some(store) => match store.load() {
                Ok(entries) => entries,
                Err(e) => {
                    error!("failed to load chip population: {}", e);
                    return 0;
                }
            },
        };

        let mut count = 0;
        for (id, record) in entries {
            if self.chips.contains_key(&id) {
                warn!("skipping chip {}: duplicate id", id);
                continue;
            }
            if self.by_activation.contains_key(&record.activation) {
                warn!(
                    "skipping chip {}: activation marker at {} already claimed",
                    id, record.activation
                );
                continue;
            }
            let Some(logic) = self.logic.create(&record.kind) else {
                warn!("skipping chip {}: unknown kind {}", id, record.kind);
                continue;
            };
            let mut chip = Chip::from_record(id, &record, logic);
            if let Err(e) = chip.init_circuit(world, &mut self.services) {
                warn!("skipping chip {}: init failed: {}", id, e);
                self.services.wireless.drop_chip(id);
                continue;
            }
            chip.restore_internal_state(&record.internal);
            if world.is_chunk_loaded(ChunkLocation::of(record.activation)) {
                chip.circuit_chunk_loaded(world);
            }
            self.next_id = self.next_id.max(id + 1);
            self.index_chip(&chip);
            self.chips.insert(id, chip);
            count += 1;
        }
        info!("loaded {} chips", count);
        count
    }

    // ─── Index maintenance ──────────────────────────────────────────────

    fn index_chip(&mut self, chip: &Chip) {
        let id = chip.core.id;
        self.by_activation.insert(chip.core.activation, id);
        for &pos in &chip.core.structure {
            self.structure_index.insert(pos, id);
        }
        for (pin, input) in chip.core.inputs.iter().enumerate() {
            for &source in &input.sources {
                self.input_index.entry(source).or_default().push((id, pin));
            }
        }
        for &chunk in chip.core.chunks() {
            self.chunk_index.entry(chunk).or_default().insert(id);
        }
    }

    fn unindex_chip(&mut self, chip: &Chip) {
        let id = chip.core.id;
        self.by_activation.remove(&chip.core.activation);
        for pos in &chip.core.structure {
            if self.structure_index.get(pos) == Some(&id) {
                self.structure_index.remove(pos);
            }
        }
        for input in &chip.core.inputs {
            for source in &input.sources {
                if let Some(entries) = self.input_index.get_mut(source) {
                    entries.retain(|&(chip_id, _)| chip_id != id);
                    if entries.is_empty() {
                        self.input_index.remove(source);
                    }
                }
            }
        }
        for chunk in chip.core.chunks() {
            if let Some(ids) = self.chunk_index.get_mut(chunk) {
                ids.remove(&id);
                if ids.is_empty() {
                    self.chunk_index.remove(chunk);
                }
            }
        }
    }
}
