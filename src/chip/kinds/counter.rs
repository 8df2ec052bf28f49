use crate::chip::logic::ChipLogic;
use crate::chip::{ChipIo, InitError};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum CountDirection {
    #[default]
    Up,
    Down,
}

/// Counts rising edges on its single input pin and presents the count on
/// its output bus, wrapping at the bus width. An optional `up`/`down`
/// argument sets the direction. The count persists across restarts.
#[derive(Default)]
pub struct Counter {
    count: u64,
    direction: CountDirection,
}

impl ChipLogic for Counter {
    fn init(&mut self, io: &mut ChipIo<'_>, args: &[String]) -> Result<(), InitError> {
        if io.input_count() != 1 {
            return Err(InitError("counter chip expects exactly 1 input".to_string()));
        }
        if io.output_count() == 0 || io.output_count() > 64 {
            return Err(InitError(
                "counter chip expects between 1 and 64 outputs".to_string(),
            ));
        }
        self.direction = match args.first().map(String::as_str) {
            None | Some("up") => CountDirection::Up,
            Some("down") => CountDirection::Down,
            Some(other) => {
                return Err(InitError(format!(
                    "bad counter direction: {} (expected up or down)",
                    other
                )))
            }
        };
        Ok(())
    }

    fn input_change(&mut self, io: &mut ChipIo<'_>, _pin: usize, state: bool) {
        if !state {
            return;
        }
        let width = io.output_count();
        let max = if width >= 64 {
            u64::MAX
        } else {
            (1u64 << width) - 1
        };
        self.count = match self.direction {
            CountDirection::Up => {
                if self.count >= max {
                    0
                } else {
                    self.count + 1
                }
            }
            CountDirection::Down => {
                if self.count == 0 {
                    max
                } else {
                    self.count - 1
                }
            }
        };
        io.send_int(0, width, self.count);
        if io.has_debuggers() {
            io.debug(&format!("count is {}", self.count));
        }
    }

    fn is_stateless(&self) -> bool {
        false
    }

    fn internal_state(&self) -> FxHashMap<String, String> {
        let mut state = FxHashMap::default();
        state.insert("count".to_string(), self.count.to_string());
        state
    }

    fn restore_internal_state(&mut self, state: &FxHashMap<String, String>) {
        if let Some(count) = state.get("count").and_then(|v| v.parse().ok()) {
            self.count = count;
        }
    }
}
