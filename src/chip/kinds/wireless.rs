//! Wireless signal transport between chips.
//!
//! Transmitters broadcast their input bits on a named channel; receivers
//! tuned to that channel present the bits on their outputs. The
//! [`WirelessBus`] is owned by the registry and handed to chips through
//! their I/O context; transmissions queue during event handling and are
//! pumped to receivers after the transmitting chip returns, so no chip is
//! ever re-entered mid-event.

use crate::chip::logic::ChipLogic;
use crate::chip::{ChipIo, InitError};
use crate::signal::Bits;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

/// Channel subscriptions plus the queue of not-yet-delivered broadcasts.
#[derive(Default)]
pub struct WirelessBus {
    receivers: FxHashMap<SmolStr, Vec<u32>>,
    pending: Vec<(SmolStr, Bits)>,
}

impl WirelessBus {
    pub fn new() -> Self {
        WirelessBus::default()
    }

    /// Subscribe a chip to a channel. Subscribing twice is a no-op.
    pub fn tune(&mut self, channel: &str, chip_id: u32) {
        let entries = self.receivers.entry(SmolStr::new(channel)).or_default();
        if !entries.contains(&chip_id) {
            entries.push(chip_id);
        }
    }

    /// Remove a chip from every channel it is tuned to.
    pub fn drop_chip(&mut self, chip_id: u32) {
        for entries in self.receivers.values_mut() {
            entries.retain(|&id| id != chip_id);
        }
        self.receivers.retain(|_, entries| !entries.is_empty());
    }

    pub fn transmit(&mut self, channel: &str, bits: Bits) {
        self.pending.push((SmolStr::new(channel), bits));
    }

    pub fn tuned(&self, channel: &str) -> Vec<u32> {
        self.receivers.get(channel).cloned().unwrap_or_default()
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub(crate) fn drain(&mut self) -> Vec<(SmolStr, Bits)> {
        std::mem::take(&mut self.pending)
    }
}

fn channel_arg(args: &[String], kind: &str) -> Result<SmolStr, InitError> {
    match args.first() {
        Some(channel) if !channel.is_empty() => Ok(SmolStr::new(channel)),
        _ => Err(InitError(format!(
            "{} chip expects a channel name argument",
            kind
        ))),
    }
}

/// Broadcasts the chip's input bits on its channel whenever any input
/// changes.
#[derive(Default)]
pub struct Transmitter {
    channel: SmolStr,
}

impl ChipLogic for Transmitter {
    fn init(&mut self, io: &mut ChipIo<'_>, args: &[String]) -> Result<(), InitError> {
        if io.input_count() == 0 {
            return Err(InitError(
                "transmitter chip expects at least 1 input".to_string(),
            ));
        }
        self.channel = channel_arg(args, "transmitter")?;
        Ok(())
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, _pin: usize, _state: bool) {
        let bits = io.input_bits();
        if io.has_debuggers() {
            io.debug(&format!(
                "broadcasting {} on channel {}",
                bits.to_binary_string(),
                self.channel
            ));
        }
        io.transmit(&self.channel, bits);
    }

    fn is_stateless(&self) -> bool {
        false
    }
}

/// Presents broadcasts from its channel on its output pins. Delivery
/// happens through the bus pump, not through input transitions.
#[derive(Default)]
pub struct Receiver {
    channel: SmolStr,
}

impl ChipLogic for Receiver {
    fn init(&mut self, io: &mut ChipIo<'_>, args: &[String]) -> Result<(), InitError> {
        if io.output_count() == 0 {
            return Err(InitError(
                "receiver chip expects at least 1 output".to_string(),
            ));
        }
        self.channel = channel_arg(args, "receiver")?;
        io.tune_receiver(&self.channel);
        Ok(())
    }

    fn input_change(&mut self, _io: &mut ChipIo<'_>, _pin: usize, _state: bool) {}

    fn is_stateless(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tune_is_idempotent() {
        let mut bus = WirelessBus::new();
        bus.tune("alpha", 1);
        bus.tune("alpha", 1);
        bus.tune("alpha", 2);
        assert_eq!(bus.tuned("alpha"), vec![1, 2]);
        assert!(bus.tuned("beta").is_empty());
    }

    #[test]
    fn test_drop_chip_clears_subscriptions() {
        let mut bus = WirelessBus::new();
        bus.tune("alpha", 1);
        bus.tune("beta", 1);
        bus.tune("beta", 2);
        bus.drop_chip(1);
        assert!(bus.tuned("alpha").is_empty());
        assert_eq!(bus.tuned("beta"), vec![2]);
    }

    #[test]
    fn test_drain_empties_queue() {
        let mut bus = WirelessBus::new();
        bus.transmit("alpha", Bits::from_unsigned(5, 3).unwrap());
        assert!(bus.has_pending());
        let drained = bus.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].0, "alpha");
        assert!(!bus.has_pending());
    }
}
