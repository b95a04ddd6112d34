//! Reusable fakes for unit tests.

mod memory;

pub use memory::*;
