//! Keyboard-driven interactive command menu for terminal tools.
//!
//! The engine lives in [`menu`]: a [`menu::Menu`] loads preferences and
//! history, captures raw key presses, renders one of five screens and hands
//! selected commands to a caller-supplied [`executor::CommandDispatcher`].

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod history;
pub mod input;
pub mod logging;
pub mod menu;
pub mod models;
pub mod state;
pub mod storage;
pub mod ui;
