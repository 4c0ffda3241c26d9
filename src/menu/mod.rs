//! The interactive session: wires state, input, rendering, persistence and the
//! executor together and runs the mode state machine.
//!
//! Everything happens on one task. Key presses arrive over a channel from the
//! input thread, a running command is a spawned task whose handle is polled in
//! the same `select!`, and a redraw follows any state change.

mod intent;
mod signals;

pub use intent::*;
pub use signals::*;

use crate::config::{ConfigManager, PreferenceKey};
use crate::error::{ErrorHandler, MenuError, Result};
use crate::executor::{normalize, CommandDispatcher, CommandExecutor};
use crate::history::{CommandHistory, LoadOutcome};
use crate::input::{Action, InputEvent, InputHandler, Key, KeyboardMapper, TerminalEvent};
use crate::models::{
    CommandFailure, CommandRequest, ExecutionResult, MenuOption, Mode, Notice,
};
use crate::state::StateManager;
use crate::ui::{AnimationEngine, RenderContext, ThemeEngine, UiRenderer};
use chrono::Utc;
use crossterm::cursor::{Hide, Show};
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Whether the loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Startup parameters.
#[derive(Debug, Clone)]
pub struct MenuSettings {
    /// Holds `preferences.json` and `history.json`.
    pub config_dir: PathBuf,
    pub colors_enabled: bool,
    /// Adds raw error details to on-screen reports.
    pub debug: bool,
}

pub struct Menu<D: CommandDispatcher, W: Write = io::Stdout> {
    config: ConfigManager,
    history: CommandHistory,
    state: StateManager,
    input: InputHandler,
    theme: ThemeEngine,
    animation: AnimationEngine,
    executor: CommandExecutor<D>,
    errors: ErrorHandler,
    out: W,
    interactive: bool,
    dirty: Arc<AtomicBool>,
    pending: Option<JoinHandle<ExecutionResult>>,
    screen_active: bool,
    shut_down: bool,
}

impl<D: CommandDispatcher> Menu<D, io::Stdout> {
    /// A menu drawing to stdout, interactive if stdin and stdout are terminals.
    pub fn new(settings: MenuSettings, options: Vec<MenuOption>, dispatcher: D) -> Result<Self> {
        let interactive = InputHandler::is_interactive();
        Self::with_writer(settings, options, dispatcher, io::stdout(), interactive)
    }
}

impl<D: CommandDispatcher, W: Write> Menu<D, W> {
    /// Loads preferences and history, applies theme, animation and key
    /// bindings, and builds the initial state.
    ///
    /// # Errors
    ///
    /// `MenuError::NoOptions` for an empty option list, `MenuError::Io` when the
    /// config directory is unusable.
    pub fn with_writer(
        settings: MenuSettings,
        options: Vec<MenuOption>,
        dispatcher: D,
        out: W,
        interactive: bool,
    ) -> Result<Self> {
        info!(dir = %settings.config_dir.display(), interactive, "Initializing menu");
        let errors = ErrorHandler::new(settings.debug);

        let mut config = ConfigManager::new(&settings.config_dir);
        let prefs = config.load()?.clone();

        let mut history = CommandHistory::new(&settings.config_dir, prefs.history_size);
        let mut notice = match history.load()? {
            LoadOutcome::Recovered(backup) => Some(Notice::error(format!(
                "History file was unreadable; saved a copy to {}",
                backup.display()
            ))),
            LoadOutcome::Fresh | LoadOutcome::Loaded(_) => None,
        };

        let mut theme = ThemeEngine::new(settings.colors_enabled);
        theme.load_theme(prefs.theme);
        let animation =
            AnimationEngine::new(prefs.animations_enabled, prefs.animation_speed, interactive);

        let mut keymap = KeyboardMapper::with_defaults();
        if let Err(e) = keymap.apply_remapping(&prefs.shortcuts) {
            let report = errors.report(&e);
            notice = Some(Notice::error(format!("Custom shortcuts ignored: {}", report.message)));
        }
        for option in &options {
            let Some(key) = option.shortcut else { continue };
            if let Err(e) = keymap.register_shortcut(&key.to_string(), Action::Run(option.command.clone())) {
                warn!(command = %option.command, %e, "Option shortcut not registered");
            }
        }

        let mut state = StateManager::new(options)?;
        let dirty = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&dirty);
        state.subscribe(move |_| flag.store(true, Ordering::Relaxed));
        state.set_notice(notice);

        let mut menu = Self {
            config,
            history,
            state,
            input: InputHandler::new(keymap),
            theme,
            animation,
            executor: CommandExecutor::new(dispatcher),
            errors,
            out,
            interactive,
            dirty,
            pending: None,
            screen_active: false,
            shut_down: false,
        };
        menu.refresh_last_executions();
        info!("Menu initialized");
        Ok(menu)
    }

    pub fn state(&self) -> &StateManager {
        &self.state
    }

    pub fn history(&self) -> &CommandHistory {
        &self.history
    }

    pub fn config(&self) -> &ConfigManager {
        &self.config
    }

    pub fn is_executing(&self) -> bool {
        self.pending.is_some()
    }

    /// Runs the interactive session until the user quits or a signal arrives,
    /// then shuts down.
    ///
    /// # Errors
    ///
    /// `MenuError::NotInteractive` outside a terminal; terminal setup failures.
    pub async fn show(&mut self) -> Result<()> {
        if !self.interactive {
            return Err(MenuError::NotInteractive(
                "the interactive menu needs a terminal".to_string(),
            ));
        }
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let started = self
            .enter_screen()
            .and_then(|()| self.input.start(sender));
        if let Err(e) = started {
            self.shutdown();
            return Err(e);
        }

        self.run(&mut receiver).await;
        self.shutdown();
        Ok(())
    }

    async fn run(&mut self, events: &mut UnboundedReceiver<TerminalEvent>) {
        let mut ticker = spinner_ticker(self.animation.frame_interval());
        let signal = shutdown_signal();
        tokio::pin!(signal);
        let mut signalled = false;
        self.redraw();

        loop {
            let spinning = self.state.view().is_executing() && self.animation.is_enabled();
            let flow = tokio::select! {
                event = events.recv() => match event {
                    Some(TerminalEvent::Key(key)) => self.handle_key(&key),
                    Some(TerminalEvent::Resize(width, height)) => {
                        debug!(width, height, "Terminal resized");
                        self.dirty.store(true, Ordering::Relaxed);
                        Flow::Continue
                    },
                    None => {
                        warn!("Input channel closed");
                        Flow::Exit
                    },
                },
                joined = wait_pending(&mut self.pending) => {
                    self.pending = None;
                    self.complete_joined(joined);
                    Flow::Continue
                },
                _ = ticker.tick(), if spinning => {
                    self.animation.advance();
                    self.dirty.store(true, Ordering::Relaxed);
                    Flow::Continue
                },
                received = &mut signal => {
                    info!(signal = ?received, "Shutting down on signal");
                    signalled = true;
                    Flow::Exit
                },
            };

            if flow == Flow::Exit {
                break;
            }
            if ticker.period() != self.animation.frame_interval() {
                ticker = spinner_ticker(self.animation.frame_interval());
            }
            if self.dirty.swap(false, Ordering::Relaxed) {
                self.redraw();
            }
        }

        if self.pending.is_none() {
            return;
        }
        if signalled {
            self.abandon_pending();
            return;
        }

        // Quit while a command runs: let it finish unless interrupted again.
        let command = self.state.view().executing.clone().unwrap_or_default();
        self.state
            .set_notice(Some(Notice::info(format!("Waiting for {} to finish…", command))));
        self.redraw();
        loop {
            tokio::select! {
                joined = wait_pending(&mut self.pending) => {
                    self.pending = None;
                    self.complete_joined(joined);
                    break;
                },
                event = events.recv() => {
                    if matches!(event, None | Some(TerminalEvent::Key(Key::CtrlC))) {
                        self.abandon_pending();
                        break;
                    }
                },
                _ = &mut signal => {
                    self.abandon_pending();
                    break;
                },
            }
        }
    }

    /// Aborts the running command and records it as interrupted.
    fn abandon_pending(&mut self) {
        let Some(handle) = self.pending.take() else {
            return;
        };
        handle.abort();
        let command = self.state.view().executing.clone().unwrap_or_default();
        warn!(%command, "Abandoning running command");
        self.complete_execution(normalize(
            command,
            Utc::now(),
            Duration::ZERO,
            Err(CommandFailure::new("interrupted by shutdown").code("INTERRUPTED")),
        ));
    }

    /// Feeds one key through the input handler and the state machine.
    pub fn handle_key(&mut self, key: &Key) -> Flow {
        let event = self.input.handle_key(key, &mut self.state);
        self.handle_input(event)
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Flow {
        match event {
            InputEvent::Navigated { .. } => {
                self.clear_notice();
                Flow::Continue
            },
            InputEvent::Interrupt => Flow::Exit,
            InputEvent::Char(_) => Flow::Continue,
            InputEvent::Shortcut { action, value } => self.apply_action(action, value),
        }
    }

    fn apply_action(&mut self, action: Action, value: Option<usize>) -> Flow {
        let mode = self.state.view().mode;
        match (mode, action) {
            (_, Action::Quit) | (Mode::Navigation, Action::Back) => return Flow::Exit,
            (_, Action::Back) => self.state.set_mode(Mode::Navigation),
            (_, Action::Help) => self.state.set_mode(Mode::Help),
            (_, Action::History) => self.state.set_mode(Mode::History),
            (_, Action::Config) => self.state.set_mode(Mode::Config),
            (_, Action::NavigateUp) => {
                self.state.move_up();
                self.clear_notice();
            },
            (_, Action::NavigateDown) => {
                self.state.move_down();
                self.clear_notice();
            },
            (_, Action::Refresh) => {
                self.refresh_last_executions();
                self.dirty.store(true, Ordering::Relaxed);
            },
            (Mode::Navigation, Action::Select) => return self.select_current(),
            (Mode::Preview, Action::Select) => self.confirm_preview(),
            (Mode::Navigation, Action::Preview) => self.state.set_mode(Mode::Preview),
            (Mode::Preview, Action::Preview) => self.state.set_mode(Mode::Navigation),
            (Mode::Navigation, Action::SelectIndex) => {
                if let Some(n) = value {
                    match self.state.set_selected_index(n as isize - 1) {
                        Ok(()) => self.clear_notice(),
                        Err(e) => debug!(%e, "Direct selection out of range"),
                    }
                }
            },
            (Mode::Config, Action::SelectIndex) => {
                if let Some(n) = value {
                    self.cycle_preference(n);
                }
            },
            (Mode::History, Action::ClearHistory) => self.clear_history(),
            (Mode::Navigation, Action::Run(command)) => {
                let index = self
                    .state
                    .view()
                    .options
                    .iter()
                    .position(|option| option.command == command);
                if let Some(index) = index {
                    if self.state.set_selected_index(index as isize).is_ok() {
                        return self.select_current();
                    }
                }
            },
            (mode, action) => debug!(%mode, %action, "Action ignored in this mode"),
        }
        Flow::Continue
    }

    fn select_current(&mut self) -> Flow {
        let Some(option) = self.state.view().selected().cloned() else {
            return Flow::Continue;
        };
        match MenuIntent::resolve(&option) {
            MenuIntent::Builtin(builtin) => match builtin.mode() {
                Some(mode) => self.state.set_mode(mode),
                None => return Flow::Exit,
            },
            MenuIntent::External(request) => {
                if option.preview.is_some() && self.config.preferences().show_previews {
                    self.state.set_mode(Mode::Preview);
                } else {
                    self.start_execution(request);
                }
            },
        }
        Flow::Continue
    }

    fn confirm_preview(&mut self) {
        let Some(option) = self.state.view().selected().cloned() else {
            return;
        };
        match MenuIntent::resolve(&option) {
            MenuIntent::External(request) => {
                if self.start_execution(request) {
                    self.state.set_mode(Mode::Navigation);
                }
            },
            MenuIntent::Builtin(builtin) => {
                if let Some(mode) = builtin.mode() {
                    self.state.set_mode(mode);
                }
            },
        }
    }

    /// Spawns the command unless one is already running. Returns whether it started.
    fn start_execution(&mut self, request: CommandRequest) -> bool {
        if let Some(running) = &self.state.view().executing {
            debug!(%running, requested = %request.command, "Execution already in progress, ignoring");
            return false;
        }
        if let Err(e) = CommandExecutor::<D>::validate(&request) {
            let report = self.errors.report(&e);
            self.state.set_notice(Some(Notice::error(report.message)));
            return false;
        }

        self.state.set_notice(None);
        self.state.set_executing(&request.command);
        let executor = self.executor.clone();
        self.pending = Some(tokio::spawn(async move {
            let command = request.command.clone();
            match executor.execute(request).await {
                Ok(result) => result,
                Err(e) => normalize(
                    command,
                    Utc::now(),
                    Duration::ZERO,
                    Err(CommandFailure::new(e.to_string())),
                ),
            }
        }));
        true
    }

    /// Awaits the running command, if any, and records it. Returns whether
    /// there was one.
    pub async fn finish_pending(&mut self) -> bool {
        let Some(handle) = self.pending.take() else {
            return false;
        };
        let joined = handle.await;
        self.complete_joined(joined);
        true
    }

    fn complete_joined(&mut self, joined: std::result::Result<ExecutionResult, JoinError>) {
        let result = joined.unwrap_or_else(|e| {
            error!(%e, "Execution task failed");
            let command = self.state.view().executing.clone().unwrap_or_default();
            normalize(
                command,
                Utc::now(),
                Duration::ZERO,
                Err(CommandFailure::new(e.to_string())),
            )
        });
        self.complete_execution(result);
    }

    /// Records a finished command and returns to navigation.
    ///
    /// Every step runs whatever the outcome: the record is added and saved, the
    /// executing flag cleared and the last-run markers refreshed.
    pub fn complete_execution(&mut self, result: ExecutionResult) {
        let mut notice = if result.success {
            Notice::success(format!(
                "✔ {} finished in {} ms: {}",
                result.command, result.duration, result.message
            ))
        } else {
            let err = MenuError::CommandFailed {
                command: result.command.clone(),
                message: result.message.clone(),
            };
            Notice::error(format!("✖ {}", self.errors.report(&err).message))
        };

        let added = self.history.add(result.to_new_execution()).map(|_| ());
        let recorded = added.and_then(|()| self.history.save());
        self.state.clear_executing();
        self.refresh_last_executions();
        if let Err(e) = recorded {
            let report = self.errors.report(&e);
            notice = Notice::error(format!("{} (history not saved: {})", notice.text, report.message));
        }
        self.state.set_notice(Some(notice));
        self.state.set_mode(Mode::Navigation);
    }

    fn refresh_last_executions(&mut self) {
        let mut options = self.state.view().options.clone();
        for option in &mut options {
            option.last_execution = self.history.last_execution(&option.command).cloned();
        }
        if let Err(e) = self.state.set_options(options) {
            warn!(%e, "Could not refresh option status");
        }
    }

    fn cycle_preference(&mut self, n: usize) {
        let Some(key) = n
            .checked_sub(1)
            .and_then(|i| PreferenceKey::SCALARS.get(i).cloned())
        else {
            return;
        };
        let Some(value) = self.config.preferences().cycled(&key) else {
            return;
        };
        match self.config.set(&key, value) {
            Ok(()) => self.apply_preferences(),
            Err(e) => {
                let report = self.errors.report(&e);
                self.state.set_notice(Some(Notice::error(report.message)));
            },
        }
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Pushes the current preferences into theme, animation and history.
    fn apply_preferences(&mut self) {
        let prefs = self.config.preferences().clone();
        if self.theme.palette().name != prefs.theme {
            self.theme.load_theme(prefs.theme);
        }
        self.animation
            .configure(prefs.animations_enabled, prefs.animation_speed);
        if self.history.max_size() != prefs.history_size {
            self.history.set_max_size(prefs.history_size);
            if let Err(e) = self.history.save() {
                let report = self.errors.report(&e);
                self.state.set_notice(Some(Notice::error(report.message)));
            }
            self.refresh_last_executions();
        }
    }

    fn clear_history(&mut self) {
        self.history.clear();
        let notice = match self.history.save() {
            Ok(()) => Notice::info("History cleared"),
            Err(e) => Notice::error(self.errors.report(&e).message),
        };
        self.refresh_last_executions();
        self.state.set_notice(Some(notice));
    }

    fn clear_notice(&mut self) {
        if self.state.view().mode == Mode::Navigation {
            self.state.set_notice(None);
        }
    }

    fn redraw(&mut self) {
        let statistics = self.history.statistics();
        let ctx = RenderContext {
            theme: &self.theme,
            animation: &self.animation,
            keymap: self.input.keymap(),
            preferences: self.config.preferences(),
            history: self.history.all(),
            statistics: &statistics,
        };
        if let Err(e) = UiRenderer::render(&mut self.out, self.state.view(), &ctx) {
            warn!(%e, "Redraw failed");
        }
    }

    fn enter_screen(&mut self) -> Result<()> {
        execute!(self.out, EnterAlternateScreen, Hide)
            .map_err(|e| MenuError::Terminal(e.to_string()))?;
        self.screen_active = true;
        Ok(())
    }

    /// Stops input and animation, flushes history and preferences and restores
    /// the screen. Later calls do nothing.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        info!("Shutting down menu");

        if let Err(e) = self.input.stop() {
            warn!(%e, "Failed to restore terminal mode");
        }
        self.animation.stop();
        if let Err(e) = self.history.save() {
            error!(%e, "Failed to flush history");
        }
        if let Err(e) = self.config.flush() {
            error!(%e, "Failed to flush preferences");
        }
        if self.screen_active {
            self.screen_active = false;
            if let Err(e) = execute!(self.out, Clear(ClearType::All), Show, LeaveAlternateScreen) {
                warn!(%e, "Failed to restore screen");
            }
        }
    }
}

impl<D: CommandDispatcher, W: Write> Drop for Menu<D, W> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spinner_ticker(period: Duration) -> time::Interval {
    let mut ticker = time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn wait_pending<T>(
    pending: &mut Option<JoinHandle<T>>,
) -> std::result::Result<T, JoinError> {
    match pending {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}
