//! Raw-mode keyboard capture and translation into menu input events.
//!
//! A dedicated thread blocks on crossterm's event reader and pushes decoded keys
//! and resize notifications onto a channel. The orchestrator hands each key to
//! [`InputHandler::handle_key`], which applies arrow navigation to the state
//! directly and resolves everything else through the [`KeyboardMapper`].

mod keymap;
mod keys;

pub use keymap::*;
pub use keys::*;

use crate::error::{MenuError, Result};
use crate::state::StateManager;
use crossterm::event::{self, Event as CrosstermEvent};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, trace};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What the reader thread delivers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Key(Key),
    Resize(u16, u16),
}

/// A key after translation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// An arrow key already applied to the state.
    Navigated { from: usize, to: usize },
    /// A bound key. `value` carries the digit for [`Action::SelectIndex`].
    Shortcut { action: Action, value: Option<usize> },
    /// Ctrl-C.
    Interrupt,
    /// A key with no binding; ignored by the menu.
    Char(String),
}

/// Owns the keyboard mapping and the raw-mode reader thread.
pub struct InputHandler {
    keymap: KeyboardMapper,
    shutdown: Arc<AtomicBool>,
    reader: Option<thread::JoinHandle<()>>,
    raw_mode: bool,
}

impl InputHandler {
    pub fn new(keymap: KeyboardMapper) -> Self {
        Self {
            keymap,
            shutdown: Arc::new(AtomicBool::new(false)),
            reader: None,
            raw_mode: false,
        }
    }

    /// True when both stdin and stdout are attached to a real terminal.
    pub fn is_interactive() -> bool {
        std::io::stdin().is_terminal() && std::io::stdout().is_terminal()
    }

    pub fn keymap(&self) -> &KeyboardMapper {
        &self.keymap
    }

    pub fn keymap_mut(&mut self) -> &mut KeyboardMapper {
        &mut self.keymap
    }

    pub fn is_running(&self) -> bool {
        self.reader.is_some()
    }

    /// Switches the terminal to raw mode and starts the reader thread.
    ///
    /// # Errors
    ///
    /// `MenuError::NotInteractive` outside a terminal, `MenuError::Terminal` if raw
    /// mode or the thread cannot be set up.
    pub fn start(&mut self, sender: UnboundedSender<TerminalEvent>) -> Result<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        if !Self::is_interactive() {
            return Err(MenuError::NotInteractive(
                "stdin/stdout is not a TTY".to_string(),
            ));
        }

        enable_raw_mode().map_err(|e| MenuError::Terminal(e.to_string()))?;
        self.raw_mode = true;
        self.shutdown.store(false, Ordering::Relaxed);

        let shutdown = Arc::clone(&self.shutdown);
        let reader = thread::Builder::new()
            .name("termenu-input".to_string())
            .spawn(move || read_loop(sender, shutdown))
            .map_err(|e| {
                let _ = disable_raw_mode();
                MenuError::Terminal(format!("failed to start input thread: {}", e))
            })?;
        self.reader = Some(reader);
        info!("Input capture started");
        Ok(())
    }

    /// Stops the reader thread and restores line-buffered mode. Safe to call twice.
    pub fn stop(&mut self) -> Result<()> {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(reader) = self.reader.take() {
            if reader.join().is_err() {
                error!("Input thread panicked");
            }
        }
        if self.raw_mode {
            self.raw_mode = false;
            disable_raw_mode().map_err(|e| MenuError::Terminal(e.to_string()))?;
            info!("Input capture stopped");
        }
        Ok(())
    }

    /// Translates one key.
    ///
    /// Arrow keys move the selection in `state` before returning, so a redraw
    /// triggered by the returned event always sees the new position.
    pub fn handle_key(&self, key: &Key, state: &mut StateManager) -> InputEvent {
        let event = match key {
            Key::Up | Key::Down => {
                let from = state.view().selected_index;
                if *key == Key::Up {
                    state.move_up();
                } else {
                    state.move_down();
                }
                InputEvent::Navigated {
                    from,
                    to: state.view().selected_index,
                }
            },
            Key::CtrlC => InputEvent::Interrupt,
            other => match self.keymap.get_action(&other.name()) {
                Some(action) => InputEvent::Shortcut {
                    action: action.clone(),
                    value: match other {
                        Key::Char(c) => c.to_digit(10).map(|d| d as usize),
                        _ => None,
                    },
                },
                None => InputEvent::Char(other.name()),
            },
        };
        trace!(%key, ?event, "Key handled");
        event
    }
}

impl Drop for InputHandler {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn read_loop(sender: UnboundedSender<TerminalEvent>, shutdown: Arc<AtomicBool>) {
    while !shutdown.load(Ordering::Relaxed) {
        let ready = event::poll(POLL_INTERVAL)
            .map_err(|e| error!(%e, "Event poll error"))
            .unwrap_or(false);
        if !ready {
            continue;
        }
        let forwarded = match event::read() {
            Ok(CrosstermEvent::Key(key)) => match Key::from_event(key) {
                Some(key) => sender.send(TerminalEvent::Key(key)),
                None => Ok(()),
            },
            Ok(CrosstermEvent::Resize(width, height)) => {
                sender.send(TerminalEvent::Resize(width, height))
            },
            Ok(_) => Ok(()),
            Err(e) => {
                error!(%e, "Event read error");
                Ok(())
            },
        };
        if forwarded.is_err() {
            debug!("Input receiver dropped, stopping reader");
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MenuOption;

    fn state(n: usize) -> StateManager {
        let options = (0..n)
            .map(|i| MenuOption::new(format!("c{}", i), format!("C{}", i)))
            .collect();
        StateManager::new(options).unwrap()
    }

    #[test]
    fn test_arrows_move_state_directly() {
        let input = InputHandler::new(KeyboardMapper::with_defaults());
        let mut state = state(3);

        assert_eq!(
            input.handle_key(&Key::Up, &mut state),
            InputEvent::Navigated { from: 0, to: 2 }
        );
        assert_eq!(state.view().selected_index, 2);
        assert_eq!(
            input.handle_key(&Key::Down, &mut state),
            InputEvent::Navigated { from: 2, to: 0 }
        );
    }

    #[test]
    fn test_bound_keys_become_shortcuts() {
        let input = InputHandler::new(KeyboardMapper::with_defaults());
        let mut state = state(3);

        assert_eq!(
            input.handle_key(&Key::Enter, &mut state),
            InputEvent::Shortcut {
                action: Action::Select,
                value: None
            }
        );
        assert_eq!(
            input.handle_key(&Key::Char('3'), &mut state),
            InputEvent::Shortcut {
                action: Action::SelectIndex,
                value: Some(3)
            }
        );
        assert_eq!(state.view().selected_index, 0);
    }

    #[test]
    fn test_ctrl_c_is_an_interrupt() {
        let input = InputHandler::new(KeyboardMapper::new());
        assert_eq!(
            input.handle_key(&Key::CtrlC, &mut state(1)),
            InputEvent::Interrupt
        );
    }

    #[test]
    fn test_unbound_keys_are_char_events() {
        let input = InputHandler::new(KeyboardMapper::with_defaults());
        let mut state = state(2);
        assert_eq!(
            input.handle_key(&Key::Char('z'), &mut state),
            InputEvent::Char("z".into())
        );
        assert_eq!(
            input.handle_key(&Key::Unrecognized("F(5)".into()), &mut state),
            InputEvent::Char("F(5)".into())
        );
    }

    #[test]
    fn test_stop_without_start_is_a_no_op() {
        let mut input = InputHandler::new(KeyboardMapper::new());
        assert!(!input.is_running());
        input.stop().unwrap();
        input.stop().unwrap();
    }
}
