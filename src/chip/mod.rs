//! The per-chip lifecycle state machine.
//!
//! A [`Chip`] pairs the structural core (pins, bit state, lifecycle) with a
//! boxed [`ChipLogic`] implementing the kind's behavior. Event handling is
//! strictly single-threaded: the registry serializes every call and hands
//! the chip the world plus its shared services for the duration of the
//! call.
//!
//! Input and output paths are deliberately asymmetric. Input transitions
//! are debounced: a delivered value equal to the pin's current bit is
//! dropped before the logic ever sees it. Output writes are not: every
//! `send_output` re-asserts the physical state even when the value did not
//! change.

pub mod kinds;
pub mod logic;

use crate::block_position::{BlockPosition, Direction};
use crate::block_state::BlockState;
use crate::chip::kinds::wireless::WirelessBus;
use crate::chip::logic::ChipLogic;
use crate::chunk::ChunkLocation;
use crate::debug::{DebugChannel, DebugHub};
use crate::integrity;
use crate::persist::ChipRecord;
use crate::prefs::Preferences;
use crate::scanner::{ChipTopology, InputPin, OutputPin};
use crate::signal::Bits;
use crate::world::World;
use log::warn;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// A logic kind rejected its arguments or pin layout.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InitError(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChipState {
    Uninitialized,
    Active,
    Disabled,
    Destroyed,
}

/// A marker text rewrite waiting for the host's next tick.
#[derive(Debug, Clone)]
pub struct MarkerUpdate {
    pub pos: BlockPosition,
    pub line: usize,
    pub text: String,
}

/// Registry-owned services a chip reaches during event handling: the trace
/// hub, the wireless bus and the deferred marker-update queue.
#[derive(Default)]
pub struct ChipServices {
    pub debug: DebugHub,
    pub wireless: WirelessBus,
    pub(crate) deferred: Vec<MarkerUpdate>,
}

// ─── ChipCore ───────────────────────────────────────────────────────────────

/// The structural half of a chip: pins, bit state and lifecycle, everything
/// except the kind-specific behavior.
pub struct ChipCore {
    pub id: u32,
    pub kind: SmolStr,
    pub name: Option<String>,
    pub args: Vec<String>,
    pub inputs: Vec<InputPin>,
    pub outputs: Vec<OutputPin>,
    pub structure: Vec<BlockPosition>,
    pub interface_blocks: Vec<BlockPosition>,
    pub activation: BlockPosition,
    pub direction: Direction,
    input_bits: Bits,
    output_bits: Bits,
    state: ChipState,
    stateless: bool,
    chunks: Vec<ChunkLocation>,
    pub(crate) channel: DebugChannel,
}

fn compute_chunks(
    structure: &[BlockPosition],
    inputs: &[InputPin],
    outputs: &[OutputPin],
) -> Vec<ChunkLocation> {
    let mut set = FxHashSet::default();
    for &pos in structure {
        set.insert(ChunkLocation::of(pos));
    }
    for pin in inputs {
        for &source in &pin.sources {
            set.insert(ChunkLocation::of(source));
        }
    }
    for pin in outputs {
        set.insert(ChunkLocation::of(pin.target));
    }
    let mut chunks: Vec<ChunkLocation> = set.into_iter().collect();
    chunks.sort_by_key(|c| (c.x, c.z));
    chunks
}

impl ChipCore {
    fn from_topology(id: u32, kind: SmolStr, args: Vec<String>, topology: ChipTopology) -> Self {
        let chunks = compute_chunks(&topology.structure, &topology.inputs, &topology.outputs);
        let input_bits = Bits::new(topology.inputs.len());
        let output_bits = Bits::new(topology.outputs.len());
        ChipCore {
            id,
            kind,
            name: None,
            args,
            inputs: topology.inputs,
            outputs: topology.outputs,
            structure: topology.structure,
            interface_blocks: topology.interface_blocks,
            activation: topology.activation,
            direction: topology.direction,
            input_bits,
            output_bits,
            state: ChipState::Uninitialized,
            stateless: true,
            chunks,
            channel: DebugChannel::default(),
        }
    }

    pub(crate) fn from_record(id: u32, record: &ChipRecord) -> Self {
        let chunks = compute_chunks(&record.structure, &record.inputs, &record.outputs);
        let output_bits = if record.output_bits.len() == record.outputs.len() {
            record.output_bits.clone()
        } else {
            Bits::new(record.outputs.len())
        };
        ChipCore {
            id,
            kind: record.kind.clone(),
            name: record.name.clone(),
            args: record.args.clone(),
            inputs: record.inputs.clone(),
            outputs: record.outputs.clone(),
            structure: record.structure.clone(),
            interface_blocks: record.interface_blocks.clone(),
            activation: record.activation,
            direction: record.direction,
            input_bits: Bits::new(record.inputs.len()),
            output_bits,
            state: if record.disabled {
                ChipState::Disabled
            } else {
                ChipState::Uninitialized
            },
            stateless: true,
            chunks,
            channel: DebugChannel::default(),
        }
    }

    pub fn state(&self) -> ChipState {
        self.state
    }

    pub fn is_disabled(&self) -> bool {
        self.state == ChipState::Disabled
    }

    pub fn is_stateless(&self) -> bool {
        self.stateless
    }

    /// Snapshot of the current input bits.
    pub fn input_bits(&self) -> Bits {
        self.input_bits.clone()
    }

    /// Snapshot of the current output bits.
    pub fn output_bits(&self) -> Bits {
        self.output_bits.clone()
    }

    pub fn chunks(&self) -> &[ChunkLocation] {
        &self.chunks
    }

    /// The name shown in trace prefixes and listings.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{} ({})", self.kind, self.id),
        }
    }

    fn pin_value(world: &dyn World, pin: &InputPin) -> bool {
        pin.sources.iter().any(|&s| world.power_level(s) > 0)
    }

    /// Pull current physical values into the input bits without firing any
    /// change notifications.
    pub(crate) fn refresh_input_bits(&mut self, world: &dyn World) {
        for index in 0..self.inputs.len() {
            let value = Self::pin_value(world, &self.inputs[index]);
            self.input_bits.set(index, value);
        }
    }

    /// Write one output bit and re-assert the physical state. Asserts
    /// unconditionally: an unchanged value still reaches the substrate.
    pub(crate) fn send_output(
        &mut self,
        world: &mut dyn World,
        debug: &DebugHub,
        pin: usize,
        value: bool,
    ) {
        if pin >= self.outputs.len() {
            warn!("chip {}: no output pin {}", self.id, pin);
            return;
        }
        self.output_bits.set(pin, value);
        if self.channel.has_io_debuggers() {
            let word = self.output_bits.to_unsigned(0, self.outputs.len());
            let message = format!(
                "output {} is {}: {} (0x{:x})",
                pin,
                if value { "on" } else { "off" },
                self.output_bits.to_binary_string(),
                word
            );
            self.io_debug_to(debug, &message);
        }
        world.assert_power(self.outputs[pin].target, value);
    }

    pub(crate) fn send_bit_set(
        &mut self,
        world: &mut dyn World,
        debug: &DebugHub,
        start: usize,
        width: usize,
        bits: &Bits,
    ) {
        for i in 0..width {
            self.send_output(world, debug, start + i, bits.get(i));
        }
    }

    pub(crate) fn send_int(
        &mut self,
        world: &mut dyn World,
        debug: &DebugHub,
        start: usize,
        width: usize,
        value: u64,
    ) {
        match Bits::from_unsigned(value, width) {
            Ok(bits) => self.send_bit_set(world, debug, start, width, &bits),
            Err(e) => warn!("chip {}: {}", self.id, e),
        }
    }

    pub(crate) fn debug_to(&self, hub: &DebugHub, message: &str) {
        if !self.channel.has_debuggers() {
            return;
        }
        hub.deliver(
            self.channel.debuggers(),
            &format!("{}: {}", self.label(), message),
        );
    }

    pub(crate) fn io_debug_to(&self, hub: &DebugHub, message: &str) {
        if !self.channel.has_io_debuggers() {
            return;
        }
        hub.deliver(
            self.channel.io_debuggers(),
            &format!("{}: {}", self.label(), message),
        );
    }

    fn queue_marker_update(&self, services: &mut ChipServices) {
        let text = match self.state {
            ChipState::Destroyed => self.kind.to_string(),
            ChipState::Disabled => format!("({})", self.kind),
            _ => format!("[{}]", self.kind),
        };
        services.deferred.push(MarkerUpdate {
            pos: self.activation,
            line: 0,
            text,
        });
    }

    /// True when every recorded structure block is still physically in
    /// place. Read-only; the caller decides what a failure means.
    pub fn check_integrity(&self, world: &dyn World, prefs: &Preferences) -> bool {
        integrity::inspect(world, self, prefs).is_empty()
    }

    /// Restore every pin and interface marker to its canonical material.
    /// Returns the number of blocks rewritten; a second call with no
    /// exogenous change rewrites nothing. Chunks that are not loaded are
    /// force-loaded for the duration and always released again.
    pub fn fix_io_blocks(&self, world: &mut dyn World, prefs: &Preferences) -> usize {
        let mut lease = ChunkLease::new(world);
        for &chunk in &self.chunks {
            lease.acquire(chunk);
        }

        let mut changed = 0;
        for pin in &self.inputs {
            changed += reconcile_block(lease.world(), pin.marker, &prefs.input_block);
        }
        for pin in &self.outputs {
            changed += reconcile_block(lease.world(), pin.marker, &prefs.output_block);
        }
        for &pos in &self.interface_blocks {
            changed += reconcile_block(lease.world(), pos, &prefs.interface_block);
        }
        changed
    }
}

fn reconcile_block(world: &mut dyn World, pos: BlockPosition, material: &str) -> usize {
    if world.block_at(pos).is_some_and(|b| b.is(material)) {
        0
    } else {
        world.set_block(pos, BlockState::new(material));
        1
    }
}

/// Scoped forced-loading of chunks. Acquired chunks are released when the
/// lease drops, on every exit path.
pub struct ChunkLease<'w> {
    world: &'w mut dyn World,
    held: Vec<ChunkLocation>,
}

impl<'w> ChunkLease<'w> {
    pub fn new(world: &'w mut dyn World) -> Self {
        ChunkLease {
            world,
            held: Vec::new(),
        }
    }

    /// Force-load a chunk if it is not already loaded.
    pub fn acquire(&mut self, chunk: ChunkLocation) {
        if !self.world.is_chunk_loaded(chunk) {
            self.world.force_chunk(chunk);
            self.held.push(chunk);
        }
    }

    pub fn world(&mut self) -> &mut dyn World {
        &mut *self.world
    }
}

impl Drop for ChunkLease<'_> {
    fn drop(&mut self) {
        while let Some(chunk) = self.held.pop() {
            self.world.release_chunk(chunk);
        }
    }
}

// ─── ChipIo ─────────────────────────────────────────────────────────────────

/// The context a logic kind sees during a callback. Scopes the logic to its
/// own chip's pins, bits, trace channel and the shared wireless bus.
pub struct ChipIo<'a> {
    core: &'a mut ChipCore,
    world: &'a mut dyn World,
    services: &'a mut ChipServices,
}

impl ChipIo<'_> {
    pub fn id(&self) -> u32 {
        self.core.id
    }

    pub fn input_count(&self) -> usize {
        self.core.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.core.outputs.len()
    }

    /// Snapshot of the current input bits.
    pub fn input_bits(&self) -> Bits {
        self.core.input_bits()
    }

    /// Snapshot of the current output bits.
    pub fn output_bits(&self) -> Bits {
        self.core.output_bits()
    }

    pub fn send_output(&mut self, pin: usize, value: bool) {
        self.core
            .send_output(&mut *self.world, &self.services.debug, pin, value);
    }

    pub fn send_int(&mut self, start: usize, width: usize, value: u64) {
        self.core
            .send_int(&mut *self.world, &self.services.debug, start, width, value);
    }

    pub fn send_bit_set(&mut self, start: usize, width: usize, bits: &Bits) {
        self.core
            .send_bit_set(&mut *self.world, &self.services.debug, start, width, bits);
    }

    /// Ask for the chip to come up disabled. Only meaningful during init.
    pub fn request_disable(&mut self) {
        self.core.state = ChipState::Disabled;
    }

    pub fn has_debuggers(&self) -> bool {
        self.core.channel.has_debuggers()
    }

    /// Send a trace message to this chip's subscribed observers.
    pub fn debug(&mut self, message: &str) {
        self.core.debug_to(&self.services.debug, message);
    }

    /// Queue a broadcast on the wireless bus. Delivered after the current
    /// event finishes.
    pub fn transmit(&mut self, channel: &str, bits: Bits) {
        self.services.wireless.transmit(channel, bits);
    }

    /// Subscribe this chip's outputs to a wireless channel.
    pub fn tune_receiver(&mut self, channel: &str) {
        self.services.wireless.tune(channel, self.core.id);
    }
}

// ─── Chip ───────────────────────────────────────────────────────────────────

/// A live chip: structural core plus the logic kind driving it.
pub struct Chip {
    pub core: ChipCore,
    logic: Box<dyn ChipLogic>,
}

impl Chip {
    pub fn new(
        id: u32,
        kind: impl Into<SmolStr>,
        args: Vec<String>,
        topology: ChipTopology,
        logic: Box<dyn ChipLogic>,
    ) -> Self {
        Chip {
            core: ChipCore::from_topology(id, kind.into(), args, topology),
            logic,
        }
    }

    pub(crate) fn from_record(id: u32, record: &ChipRecord, logic: Box<dyn ChipLogic>) -> Self {
        Chip {
            core: ChipCore::from_record(id, record),
            logic,
        }
    }

    /// Bring the chip up: read current input values, run the logic kind's
    /// init, and for stateless kinds replay the initial reading so the
    /// outputs are consistent from the start.
    pub fn init_circuit(
        &mut self,
        world: &mut dyn World,
        services: &mut ChipServices,
    ) -> Result<(), InitError> {
        self.core.input_bits = Bits::new(self.core.inputs.len());
        if self.core.output_bits.len() != self.core.outputs.len() {
            self.core.output_bits = Bits::new(self.core.outputs.len());
        }
        self.core.refresh_input_bits(world);
        self.core.stateless = self.logic.is_stateless();

        let args = self.core.args.clone();
        {
            let mut io = ChipIo {
                core: &mut self.core,
                world: &mut *world,
                services: &mut *services,
            };
            self.logic.init(&mut io, &args)?;
        }

        if self.core.state != ChipState::Disabled {
            self.core.state = ChipState::Active;
            if self.core.stateless {
                self.replay_inputs(world, services);
            }
        }
        self.core.queue_marker_update(services);
        Ok(())
    }

    fn replay_inputs(&mut self, world: &mut dyn World, services: &mut ChipServices) {
        for pin in 0..self.core.inputs.len() {
            let value = self.core.input_bits.get(pin);
            let mut io = ChipIo {
                core: &mut self.core,
                world: &mut *world,
                services: &mut *services,
            };
            self.logic.input_change(&mut io, pin, value);
        }
    }

    /// Deliver a new value to an input pin. Ignored unless the chip is
    /// active; dropped when the value equals the pin's current bit.
    pub fn state_change(
        &mut self,
        world: &mut dyn World,
        services: &mut ChipServices,
        pin: usize,
        value: bool,
    ) {
        if self.core.state != ChipState::Active {
            return;
        }
        if pin >= self.core.inputs.len() {
            warn!("chip {}: no input pin {}", self.core.id, pin);
            return;
        }
        if self.core.input_bits.get(pin) == value {
            return;
        }
        self.core.input_bits.set(pin, value);

        if self.core.channel.has_io_debuggers() {
            let word = self.core.input_bits.to_unsigned(0, self.core.inputs.len());
            let message = format!(
                "input {} is {}: {} (0x{:x})",
                pin,
                if value { "on" } else { "off" },
                self.core.input_bits.to_binary_string(),
                word
            );
            self.core.io_debug_to(&services.debug, &message);
        }

        let mut io = ChipIo {
            core: &mut self.core,
            world,
            services,
        };
        self.logic.input_change(&mut io, pin, value);
    }

    /// Stop processing input changes. Bits freeze at their current values.
    pub fn disable(&mut self, services: &mut ChipServices) {
        if self.core.state == ChipState::Destroyed {
            return;
        }
        self.core.state = ChipState::Disabled;
        self.core.queue_marker_update(services);
        self.core.debug_to(&services.debug, "chip is disabled");
    }

    pub fn enable(&mut self, services: &mut ChipServices) {
        if self.core.state == ChipState::Destroyed {
            return;
        }
        self.core.state = ChipState::Active;
        self.core.queue_marker_update(services);
        self.core.debug_to(&services.debug, "chip is enabled");
    }

    /// Run the shutdown hook, force every output low, then run the
    /// destroyed hook. The caller removes the instance from the registry.
    pub fn destroy(&mut self, world: &mut dyn World, services: &mut ChipServices) {
        if self.core.state == ChipState::Destroyed {
            return;
        }
        {
            let mut io = ChipIo {
                core: &mut self.core,
                world: &mut *world,
                services: &mut *services,
            };
            self.logic.shutdown(&mut io);
        }
        for pin in 0..self.core.outputs.len() {
            self.core.send_output(world, &services.debug, pin, false);
        }
        self.core.state = ChipState::Destroyed;
        {
            let mut io = ChipIo {
                core: &mut self.core,
                world: &mut *world,
                services: &mut *services,
            };
            self.logic.destroyed(&mut io);
        }
        self.core.queue_marker_update(services);
    }

    /// One of the chip's chunks became loaded again: re-read every input
    /// and re-assert every output from the remembered bits.
    pub fn circuit_chunk_loaded(&mut self, world: &mut dyn World) {
        self.core.refresh_input_bits(world);
        for pin in 0..self.core.outputs.len() {
            let value = self.core.output_bits.get(pin);
            world.assert_power(self.core.outputs[pin].target, value);
        }
    }

    /// Present a wireless broadcast on this chip's outputs.
    pub(crate) fn receive_broadcast(
        &mut self,
        world: &mut dyn World,
        services: &mut ChipServices,
        bits: &Bits,
    ) {
        if self.core.state != ChipState::Active {
            return;
        }
        let width = self.core.outputs.len().min(bits.len());
        self.core
            .send_bit_set(world, &services.debug, 0, width, bits);
    }

    pub(crate) fn internal_state(&self) -> FxHashMap<String, String> {
        self.logic.internal_state()
    }

    pub(crate) fn restore_internal_state(&mut self, state: &FxHashMap<String, String>) {
        self.logic.restore_internal_state(state);
    }

    pub(crate) fn to_record(&self) -> ChipRecord {
        ChipRecord {
            kind: self.core.kind.clone(),
            name: self.core.name.clone(),
            activation: self.core.activation,
            direction: self.core.direction,
            args: self.core.args.clone(),
            inputs: self.core.inputs.clone(),
            outputs: self.core.outputs.clone(),
            interface_blocks: self.core.interface_blocks.clone(),
            structure: self.core.structure.clone(),
            disabled: self.core.state == ChipState::Disabled,
            output_bits: self.core.output_bits.clone(),
            internal: self.internal_state(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::MemoryWorld;

    #[test]
    fn test_chunk_lease_releases_on_drop() {
        let mut world = MemoryWorld::new();
        let near = ChunkLocation::new(0, 0);
        let far = ChunkLocation::new(8, 8);
        world.unload_chunk(far);

        {
            let mut lease = ChunkLease::new(&mut world);
            lease.acquire(near);
            lease.acquire(far);
            assert!(lease.world().is_chunk_loaded(far));
        }

        assert_eq!(world.forced_chunk_count(), 0);
        assert!(!world.is_chunk_loaded(far));
    }

    #[test]
    fn test_compute_chunks_covers_pins_and_structure() {
        let structure = vec![BlockPosition::new(0, 64, 0)];
        let inputs = vec![InputPin {
            marker: BlockPosition::new(1, 64, 0),
            sources: vec![BlockPosition::new(40, 64, 0)],
        }];
        let outputs = vec![OutputPin {
            marker: BlockPosition::new(2, 64, 0),
            target: BlockPosition::new(0, 64, 40),
        }];

        let chunks = compute_chunks(&structure, &inputs, &outputs);
        assert!(chunks.contains(&ChunkLocation::new(0, 0)));
        assert!(chunks.contains(&ChunkLocation::new(2, 0)));
        assert!(chunks.contains(&ChunkLocation::new(0, 2)));
        assert_eq!(chunks.len(), 3);
    }
}
