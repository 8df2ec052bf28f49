//! The capability surface a concrete logic kind implements, and the
//! name-to-factory table chips are built from.

use super::{ChipIo, InitError};
use crate::chip::kinds;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Behavior of one chip kind.
///
/// A logic kind never touches the world directly; everything flows through
/// the [`ChipIo`] context it is handed, which scopes it to its own chip's
/// pins, bits and trace channel.
pub trait ChipLogic {
    /// Called once after the chip's current input values have been read.
    /// Returning an error discards the instance. Calling
    /// [`ChipIo::request_disable`] here starts the chip disabled instead.
    fn init(&mut self, io: &mut ChipIo<'_>, args: &[String]) -> Result<(), InitError>;

    /// Called on every debounced input transition.
    fn input_change(&mut self, io: &mut ChipIo<'_>, pin: usize, state: bool);

    /// A stateless kind computes its outputs purely from current inputs.
    /// Stateless kinds get one synthetic `input_change` per pin right after
    /// init so their outputs reflect the initial input reading.
    fn is_stateless(&self) -> bool {
        true
    }

    /// State to carry across a restart. Keys and values are opaque to the
    /// rest of the system.
    fn internal_state(&self) -> FxHashMap<String, String> {
        FxHashMap::default()
    }

    fn restore_internal_state(&mut self, _state: &FxHashMap<String, String>) {}

    /// Called before outputs are forced low during destruction or shutdown.
    fn shutdown(&mut self, _io: &mut ChipIo<'_>) {}

    /// Called after outputs have been forced low, as the last step of
    /// destruction.
    fn destroyed(&mut self, _io: &mut ChipIo<'_>) {}
}

pub type LogicFactory = Box<dyn Fn() -> Box<dyn ChipLogic>>;

/// Maps logic kind names, as written on activation markers, to factories.
/// Built once at startup; an unregistered name is a detection failure, not
/// a crash.
#[derive(Default)]
pub struct LogicRegistry {
    factories: FxHashMap<SmolStr, LogicFactory>,
}

impl LogicRegistry {
    pub fn new() -> Self {
        LogicRegistry::default()
    }

    /// A registry preloaded with every builtin kind.
    pub fn with_builtins() -> Self {
        let mut registry = LogicRegistry::new();
        registry.register("and", || Box::new(kinds::gates::AndGate));
        registry.register("or", || Box::new(kinds::gates::OrGate));
        registry.register("xor", || Box::new(kinds::gates::XorGate));
        registry.register("not", || Box::new(kinds::gates::NotGate));
        registry.register("flipflop", || Box::new(kinds::flipflop::FlipFlop));
        registry.register("counter", || Box::new(kinds::counter::Counter::default()));
        registry.register("transmitter", || {
            Box::new(kinds::wireless::Transmitter::default())
        });
        registry.register("receiver", || Box::new(kinds::wireless::Receiver::default()));
        registry
    }

    pub fn register<F>(&mut self, name: impl Into<SmolStr>, factory: F)
    where
        F: Fn() -> Box<dyn ChipLogic> + 'static,
    {
        self.factories.insert(name.into(), Box::new(factory));
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn ChipLogic>> {
        self.factories.get(name).map(|factory| factory())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<SmolStr> {
        let mut names: Vec<SmolStr> = self.factories.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_are_registered() {
        let registry = LogicRegistry::with_builtins();
        for name in ["and", "or", "xor", "not", "flipflop", "counter"] {
            assert!(registry.contains(name), "missing builtin {}", name);
            assert!(registry.create(name).is_some());
        }
        assert!(!registry.contains("bogus"));
        assert!(registry.create("bogus").is_none());
    }
}
