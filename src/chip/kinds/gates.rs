//! Stateless combinational gates. Each recomputes its outputs from the
//! current input snapshot on every transition.

use crate::chip::logic::ChipLogic;
use crate::chip::{ChipIo, InitError};

fn require_single_output(io: &ChipIo<'_>, kind: &str) -> Result<(), InitError> {
    if io.output_count() != 1 {
        return Err(InitError(format!("{} chip expects exactly 1 output", kind)));
    }
    if io.input_count() == 0 {
        return Err(InitError(format!("{} chip expects at least 1 input", kind)));
    }
    Ok(())
}

pub struct AndGate;

impl ChipLogic for AndGate {
    fn init(&mut self, io: &mut ChipIo<'_>, _args: &[String]) -> Result<(), InitError> {
        require_single_output(io, "and")
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, _pin: usize, _state: bool) {
        let inputs = io.input_bits();
        let result = (0..inputs.len()).all(|i| inputs.get(i));
        io.send_output(0, result);
    }
}

pub struct OrGate;

impl ChipLogic for OrGate {
    fn init(&mut self, io: &mut ChipIo<'_>, _args: &[String]) -> Result<(), InitError> {
        require_single_output(io, "or")
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, _pin: usize, _state: bool) {
        let result = io.input_bits().any();
        io.send_output(0, result);
    }
}

pub struct XorGate;

impl ChipLogic for XorGate {
    fn init(&mut self, io: &mut ChipIo<'_>, _args: &[String]) -> Result<(), InitError> {
        require_single_output(io, "xor")
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, _pin: usize, _state: bool) {
        let inputs = io.input_bits();
        let ones = (0..inputs.len()).filter(|&i| inputs.get(i)).count();
        io.send_output(0, ones % 2 == 1);
    }
}

/// Per-pin inverter. Requires as many outputs as inputs.
pub struct NotGate;

impl ChipLogic for NotGate {
    fn init(&mut self, io: &mut ChipIo<'_>, _args: &[String]) -> Result<(), InitError> {
        if io.input_count() == 0 || io.input_count() != io.output_count() {
            return Err(InitError(
                "not chip expects the same number of inputs and outputs".to_string(),
            ));
        }
        Ok(())
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, pin: usize, state: bool) {
        io.send_output(pin, !state);
    }
}
