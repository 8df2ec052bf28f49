use crate::chip::logic::ChipLogic;
use crate::chip::{ChipIo, InitError};

/// Toggle flip-flop bank. A rising edge on input pin N toggles output pin
/// N. The latched state lives in the output bits and survives restarts with
/// them.
pub struct FlipFlop;

impl ChipLogic for FlipFlop {
    fn init(&mut self, io: &mut ChipIo<'_>, _args: &[String]) -> Result<(), InitError> {
        if io.input_count() == 0 || io.input_count() != io.output_count() {
            return Err(InitError(
                "flipflop chip expects the same number of inputs and outputs".to_string(),
            ));
        }
        Ok(())
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, pin: usize, state: bool) {
        if !state {
            return;
        }
        let current = io.output_bits().get(pin);
        io.send_output(pin, !current);
    }

    fn is_stateless(&self) -> bool {
        false
    }
}
