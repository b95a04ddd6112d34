mod config;
mod coordination;
mod errors;
mod registry;
mod watch;
pub mod utils;

pub use crate::config::*;
pub use crate::coordination::*;
pub use crate::errors::*;
pub use crate::registry::*;
pub use crate::watch::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
