//! Builtin logic kinds.

pub mod counter;
pub mod flipflop;
pub mod gates;
pub mod wireless;
