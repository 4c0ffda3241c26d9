//! The only writer of [`MenuState`], with a synchronous observer fan-out.
//!
//! Every mutator notifies all subscribers right after committing. A panicking
//! observer is caught and logged so the remaining observers still run and the
//! state stays as committed.

use crate::error::{MenuError, Result};
use crate::models::{MenuOption, MenuState, Mode, Notice};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, error};

/// What changed, delivered to every observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    SelectionChanged { from: usize, to: usize },
    ModeChanged { from: Mode, to: Mode },
    ExecutionStarted { command: String },
    ExecutionFinished { command: String },
    OptionsReplaced { count: usize },
    NoticeChanged,
}

/// Handle returned by [`StateManager::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Observer = Box<dyn FnMut(&StateEvent) + Send>;

pub struct StateManager {
    state: MenuState,
    observers: Vec<(SubscriptionId, Observer)>,
    next_id: u64,
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("state", &self.state)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl StateManager {
    /// Creates the state with the first option selected in navigation mode.
    ///
    /// # Errors
    ///
    /// Returns `MenuError::NoOptions` for an empty list.
    pub fn new(options: Vec<MenuOption>) -> Result<Self> {
        if options.is_empty() {
            return Err(MenuError::NoOptions);
        }
        Ok(Self {
            state: MenuState::new(options),
            observers: Vec::new(),
            next_id: 0,
        })
    }

    /// A snapshot of the current state.
    pub fn state(&self) -> MenuState {
        self.state.clone()
    }

    /// Borrowed view, for callers that do not need to keep the snapshot.
    pub fn view(&self) -> &MenuState {
        &self.state
    }

    pub fn subscribe<F>(&mut self, observer: F) -> SubscriptionId
    where
        F: FnMut(&StateEvent) + Send + 'static,
    {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(sid, _)| *sid != id);
        self.observers.len() != before
    }

    /// Selects option `index`.
    ///
    /// # Errors
    ///
    /// `MenuError::IndexOutOfRange` when `index` is not a valid option index; the
    /// state is left untouched.
    pub fn set_selected_index(&mut self, index: isize) -> Result<()> {
        let len = self.state.options.len();
        let to = usize::try_from(index)
            .ok()
            .filter(|i| *i < len)
            .ok_or(MenuError::IndexOutOfRange { index, len })?;
        self.select(to);
        Ok(())
    }

    /// Moves the selection up one, wrapping from the first option to the last.
    pub fn move_up(&mut self) {
        let len = self.state.options.len();
        let to = (self.state.selected_index + len - 1) % len;
        self.select(to);
    }

    /// Moves the selection down one, wrapping from the last option to the first.
    pub fn move_down(&mut self) {
        let len = self.state.options.len();
        let to = (self.state.selected_index + 1) % len;
        self.select(to);
    }

    pub fn set_mode(&mut self, mode: Mode) {
        let from = self.state.mode;
        self.state.mode = mode;
        debug!(%from, to = %mode, "Mode changed");
        self.notify(StateEvent::ModeChanged { from, to: mode });
    }

    /// Switches to the mode called `name`.
    ///
    /// # Errors
    ///
    /// `MenuError::UnknownMode` for anything but the five screen names.
    pub fn set_mode_named(&mut self, name: &str) -> Result<()> {
        let mode: Mode = name.parse()?;
        self.set_mode(mode);
        Ok(())
    }

    pub fn set_executing(&mut self, command: &str) {
        self.state.executing = Some(command.to_string());
        self.notify(StateEvent::ExecutionStarted {
            command: command.to_string(),
        });
    }

    pub fn clear_executing(&mut self) {
        if let Some(command) = self.state.executing.take() {
            self.notify(StateEvent::ExecutionFinished { command });
        }
    }

    /// Replaces the option list, clamping the selection into range.
    ///
    /// # Errors
    ///
    /// `MenuError::NoOptions` for an empty list; the state is left untouched.
    pub fn set_options(&mut self, options: Vec<MenuOption>) -> Result<()> {
        if options.is_empty() {
            return Err(MenuError::NoOptions);
        }
        let count = options.len();
        self.state.options = options;
        if self.state.selected_index >= count {
            self.state.selected_index = count - 1;
        }
        self.notify(StateEvent::OptionsReplaced { count });
        Ok(())
    }

    pub fn set_notice(&mut self, notice: Option<Notice>) {
        if self.state.notice != notice {
            self.state.notice = notice;
            self.notify(StateEvent::NoticeChanged);
        }
    }

    fn select(&mut self, to: usize) {
        let from = self.state.selected_index;
        self.state.selected_index = to;
        self.notify(StateEvent::SelectionChanged { from, to });
    }

    fn notify(&mut self, event: StateEvent) {
        for (id, observer) in self.observers.iter_mut() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| observer(&event)));
            if outcome.is_err() {
                error!(subscription = id.0, ?event, "State observer panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn options(n: usize) -> Vec<MenuOption> {
        (0..n)
            .map(|i| MenuOption::new(format!("cmd{}", i), format!("Command {}", i)))
            .collect()
    }

    fn manager(n: usize) -> StateManager {
        StateManager::new(options(n)).unwrap()
    }

    #[test]
    fn test_empty_options_rejected() {
        assert!(matches!(StateManager::new(vec![]), Err(MenuError::NoOptions)));
    }

    #[test]
    fn test_three_downs_wrap_back_to_start() {
        let mut state = manager(3);
        state.move_down();
        state.move_down();
        state.move_down();
        assert_eq!(state.view().selected_index, 0);
    }

    #[test]
    fn test_up_from_first_wraps_to_last() {
        let mut state = manager(4);
        state.move_up();
        assert_eq!(state.view().selected_index, 3);
        state.move_down();
        assert_eq!(state.view().selected_index, 0);
    }

    #[test]
    fn test_n_moves_are_circular_from_any_start() {
        for n in 1..=7 {
            for start in 0..n {
                let mut state = manager(n);
                state.set_selected_index(start as isize).unwrap();
                for _ in 0..n {
                    state.move_down();
                }
                assert_eq!(state.view().selected_index, start);
                for _ in 0..n {
                    state.move_up();
                }
                assert_eq!(state.view().selected_index, start);
            }
        }
    }

    #[test]
    fn test_out_of_range_index_is_rejected_without_mutation() {
        let mut state = manager(3);
        state.set_selected_index(1).unwrap();
        for bad in [-1, 3, 100, isize::MIN] {
            let err = state.set_selected_index(bad).unwrap_err();
            assert!(matches!(err, MenuError::IndexOutOfRange { .. }));
            assert_eq!(state.view().selected_index, 1);
        }
    }

    #[test]
    fn test_unknown_mode_is_rejected_without_mutation() {
        let mut state = manager(2);
        state.set_mode(Mode::History);
        for bad in ["", "Navigation", "settings", "shutdown"] {
            assert!(state.set_mode_named(bad).is_err());
            assert_eq!(state.view().mode, Mode::History);
        }
        state.set_mode_named("help").unwrap();
        assert_eq!(state.view().mode, Mode::Help);
    }

    #[test]
    fn test_set_options_clamps_selection() {
        let mut state = manager(5);
        state.set_selected_index(4).unwrap();
        state.set_options(options(2)).unwrap();
        assert_eq!(state.view().selected_index, 1);
        assert!(state.set_options(vec![]).is_err());
        assert_eq!(state.view().options.len(), 2);
    }

    #[test]
    fn test_executing_flag() {
        let mut state = manager(2);
        state.set_executing("cmd1");
        assert!(state.view().is_executing());
        assert_eq!(state.view().executing.as_deref(), Some("cmd1"));
        state.clear_executing();
        assert!(!state.view().is_executing());
    }

    #[test]
    fn test_observers_receive_events_in_order() {
        let mut state = manager(3);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        state.subscribe(move |event| sink.lock().unwrap().push(event.clone()));

        state.move_down();
        state.set_mode(Mode::Preview);

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                StateEvent::SelectionChanged { from: 0, to: 1 },
                StateEvent::ModeChanged {
                    from: Mode::Navigation,
                    to: Mode::Preview
                },
            ]
        );
    }

    #[test]
    fn test_panicking_observer_does_not_block_others() {
        let mut state = manager(3);
        let count = Arc::new(Mutex::new(0));
        state.subscribe(|_| panic!("observer failure"));
        let counter = Arc::clone(&count);
        state.subscribe(move |_| *counter.lock().unwrap() += 1);

        state.move_down();
        state.move_down();

        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(state.view().selected_index, 2);
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let mut state = manager(2);
        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        let id = state.subscribe(move |_| *counter.lock().unwrap() += 1);
        state.move_down();
        assert!(state.unsubscribe(id));
        state.move_down();
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(!state.unsubscribe(id));
    }
}
