//! Defines the data structures used throughout the menu engine.
//!
//! Includes the menu-facing types (options, modes, state) and the execution
//! types exchanged with the external dispatcher and stored in history.

mod execution;
mod menu;

pub use execution::*;
pub use menu::*;
