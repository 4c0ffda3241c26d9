//! Screen rendering.
//!
//! [`UiRenderer::compose`] turns the menu state plus the injected theme, animation
//! and key bindings into lines of ANSI text without touching any of them;
//! [`UiRenderer::render`] writes those lines to the terminal.

mod animation;
mod theme;

pub use animation::*;
pub use theme::*;

use crate::config::{PreferenceKey, UserPreferences};
use crate::error::Result;
use crate::history::HistoryStatistics;
use crate::input::{Action, KeyboardMapper};
use crate::models::{
    ExecutionRecord, ExecutionStatus, MenuOption, MenuState, Mode, NoticeLevel, OptionCategory,
};
use crossterm::cursor::MoveTo;
use crossterm::queue;
use crossterm::terminal::{Clear, ClearType};
use std::io::Write;

const TITLE: &str = "termenu";
const HISTORY_ROWS: usize = 15;

/// Everything besides the state that a frame depends on.
pub struct RenderContext<'a> {
    pub theme: &'a ThemeEngine,
    pub animation: &'a AnimationEngine,
    pub keymap: &'a KeyboardMapper,
    pub preferences: &'a UserPreferences,
    /// Most recent first.
    pub history: &'a [ExecutionRecord],
    pub statistics: &'a HistoryStatistics,
}

/// Stateless renderer; one entry point per output style.
pub struct UiRenderer;

impl UiRenderer {
    /// Clears the screen and draws the frame for `state`.
    pub fn render<W: Write>(out: &mut W, state: &MenuState, ctx: &RenderContext<'_>) -> Result<()> {
        queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
        for line in Self::compose(state, ctx) {
            // Raw mode: no implicit carriage return.
            write!(out, "{}\r\n", line)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Builds the frame for `state` as lines of text.
    pub fn compose(state: &MenuState, ctx: &RenderContext<'_>) -> Vec<String> {
        let mut lines = Self::header(state, ctx);
        let body = match state.mode {
            Mode::Navigation => Self::navigation(state, ctx),
            Mode::Preview => Self::preview(state, ctx),
            Mode::History => Self::history(ctx),
            Mode::Config => Self::config(ctx),
            Mode::Help => Self::help(ctx),
        };
        lines.extend(body);
        lines.push(String::new());
        lines.push(Self::footer(state, ctx));
        lines
    }

    fn header(state: &MenuState, ctx: &RenderContext<'_>) -> Vec<String> {
        let theme = ctx.theme;
        let mut title = format!(
            "{} {}",
            theme.colorize(TITLE, ColorRole::Primary),
            theme.colorize(&format!("· {}", state.mode), ColorRole::Muted)
        );
        if let Some(command) = &state.executing {
            title.push_str(&format!(
                "   {} {}",
                theme.colorize(ctx.animation.current_frame(), ColorRole::Info),
                theme.colorize(&format!("running {}", command), ColorRole::Info)
            ));
        }
        vec![title, theme.colorize(&"─".repeat(48), ColorRole::Muted)]
    }

    fn navigation(state: &MenuState, ctx: &RenderContext<'_>) -> Vec<String> {
        let theme = ctx.theme;
        let prefs = ctx.preferences;
        let mut lines = Vec::with_capacity(state.options.len() * 2 + 2);

        for (i, option) in state.options.iter().enumerate() {
            let selected = i == state.selected_index;
            let marker = if selected { "❯" } else { " " };
            let icon = if prefs.icons_enabled && !option.icon.is_empty() {
                format!("{} ", option.icon)
            } else {
                String::new()
            };
            let row = format!("{} {}. {}{}", marker, i + 1, icon, option.label);
            let row = if selected {
                theme.selected(&row)
            } else if option.category == OptionCategory::Destructive {
                theme.colorize(&row, ColorRole::Destructive)
            } else {
                row
            };
            let status = Self::status_glyph(option, theme);
            lines.push(if status.is_empty() {
                row
            } else {
                format!("{}  {}", row, status)
            });

            if prefs.show_descriptions && !option.description.is_empty() {
                lines.push(theme.colorize(&format!("      {}", option.description), ColorRole::Muted));
            }
        }

        if let Some(notice) = &state.notice {
            let role = match notice.level {
                NoticeLevel::Info => ColorRole::Info,
                NoticeLevel::Success => ColorRole::Success,
                NoticeLevel::Error => ColorRole::Error,
            };
            lines.push(String::new());
            lines.push(theme.colorize(&notice.text, role));
        }
        lines
    }

    fn status_glyph(option: &MenuOption, theme: &ThemeEngine) -> String {
        match &option.last_execution {
            Some(record) => {
                let when = record.timestamp.format("%Y-%m-%d %H:%M");
                match record.status {
                    ExecutionStatus::Success => {
                        theme.colorize(&format!("✔ {}", when), ColorRole::Success)
                    },
                    ExecutionStatus::Failure => {
                        theme.colorize(&format!("✖ {}", when), ColorRole::Error)
                    },
                }
            },
            None => String::new(),
        }
    }

    fn preview(state: &MenuState, ctx: &RenderContext<'_>) -> Vec<String> {
        let theme = ctx.theme;
        let Some(option) = state.selected() else {
            return vec![theme.colorize("Nothing selected.", ColorRole::Muted)];
        };
        let mut lines = vec![theme.colorize(&option.label, ColorRole::Highlight)];
        if !option.description.is_empty() {
            lines.push(option.description.clone());
        }
        lines.push(String::new());

        match &option.preview {
            Some(preview) => {
                lines.push(format!(
                    "{} {}",
                    theme.colorize("Command:", ColorRole::Muted),
                    preview.invocation
                ));
                if !preview.affected.is_empty() {
                    lines.push(theme.colorize("Affects:", ColorRole::Muted));
                    lines.extend(preview.affected.iter().map(|r| format!("  • {}", r)));
                }
                if let Some(estimate) = &preview.estimated_duration {
                    lines.push(format!(
                        "{} {}",
                        theme.colorize("Estimated duration:", ColorRole::Muted),
                        estimate
                    ));
                }
                if let Some(warning) = &preview.warning {
                    lines.push(String::new());
                    lines.push(theme.colorize(&format!("⚠ {}", warning), ColorRole::Destructive));
                }
            },
            None => lines.push(format!(
                "{} {}",
                theme.colorize("Command:", ColorRole::Muted),
                option.command
            )),
        }

        if let Some(record) = &option.last_execution {
            lines.push(String::new());
            lines.push(format!(
                "{} {}",
                theme.colorize("Last run:", ColorRole::Muted),
                Self::record_line(record, theme)
            ));
        }
        if let Some(command) = &state.executing {
            lines.push(String::new());
            lines.push(theme.colorize(
                &format!("'{}' is still running; wait for it before starting another.", command),
                ColorRole::Warning,
            ));
        }
        lines
    }

    fn history(ctx: &RenderContext<'_>) -> Vec<String> {
        let theme = ctx.theme;
        let stats = ctx.statistics;
        let mut lines = vec![format!(
            "{} runs · {} ok · {} failed · {:.1}% success · avg {} ms",
            stats.total, stats.successes, stats.failures, stats.success_rate, stats.average_duration_ms
        )];
        if !stats.most_used.is_empty() {
            let top: Vec<String> = stats
                .most_used
                .iter()
                .take(3)
                .map(|(name, count)| format!("{} ({})", name, count))
                .collect();
            lines.push(theme.colorize(&format!("Most used: {}", top.join(", ")), ColorRole::Muted));
        }
        lines.push(String::new());

        if ctx.history.is_empty() {
            lines.push(theme.colorize("No commands have been run yet.", ColorRole::Muted));
            return lines;
        }
        lines.extend(
            ctx.history
                .iter()
                .take(HISTORY_ROWS)
                .map(|record| Self::record_line(record, theme)),
        );
        if ctx.history.len() > HISTORY_ROWS {
            lines.push(theme.colorize(
                &format!("… and {} older", ctx.history.len() - HISTORY_ROWS),
                ColorRole::Muted,
            ));
        }
        lines
    }

    fn record_line(record: &ExecutionRecord, theme: &ThemeEngine) -> String {
        let (glyph, role) = match record.status {
            ExecutionStatus::Success => ("✔", ColorRole::Success),
            ExecutionStatus::Failure => ("✖", ColorRole::Error),
        };
        let mut line = format!(
            "{} {}  {:<16} {:>7} ms  exit {}",
            theme.colorize(glyph, role),
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.command,
            record.duration,
            record.exit_code
        );
        if let Some(error) = &record.error {
            line.push_str(&format!("  {}", theme.colorize(&error.message, ColorRole::Error)));
        }
        line
    }

    fn config(ctx: &RenderContext<'_>) -> Vec<String> {
        let theme = ctx.theme;
        let prefs = ctx.preferences;
        let mut lines: Vec<String> = PreferenceKey::SCALARS
            .iter()
            .enumerate()
            .map(|(i, key)| {
                let value = prefs
                    .get(key)
                    .map(|v| v.to_string())
                    .unwrap_or_default();
                format!(
                    "{}. {:<18} {}",
                    i + 1,
                    key.label(),
                    theme.colorize(&value, ColorRole::Highlight)
                )
            })
            .collect();

        if !prefs.shortcuts.is_empty() {
            lines.push(String::new());
            lines.push(theme.colorize("Custom shortcuts:", ColorRole::Muted));
            lines.extend(
                prefs
                    .shortcuts
                    .iter()
                    .map(|(key, action)| format!("  {:<10} {}", key, action)),
            );
        }
        let flagged = theme.low_contrast_roles();
        if !flagged.is_empty() {
            lines.push(String::new());
            let roles: Vec<String> = flagged.iter().map(|(role, _)| role.to_string()).collect();
            lines.push(theme.colorize(
                &format!("Low contrast in this theme: {}", roles.join(", ")),
                ColorRole::Warning,
            ));
        }
        lines
    }

    fn help(ctx: &RenderContext<'_>) -> Vec<String> {
        let theme = ctx.theme;
        let mut lines = vec![
            format!("{:<12} {}", "up / down", "Move selection (wraps around)"),
            format!("{:<12} {}", "ctrl+c", "Quit"),
        ];
        lines.extend(ctx.keymap.bindings().filter(|(key, action)| {
            // One line for all digits.
            !(**action == Action::SelectIndex && *key != "1")
        }).map(|(key, action)| {
            let key = if *action == Action::SelectIndex { "1-9" } else { key };
            format!("{:<12} {}", theme.colorize(key, ColorRole::Highlight), action.description())
        }));
        lines
    }

    fn footer(state: &MenuState, ctx: &RenderContext<'_>) -> String {
        let keys = ctx.keymap;
        let hint = |action: &Action, label: &str| {
            keys.key_for(action)
                .map(|key| format!("{} {}", key, label))
        };
        let hints: Vec<String> = match state.mode {
            Mode::Navigation => [
                Some("↑/↓ move".to_string()),
                hint(&Action::Select, "select"),
                hint(&Action::Preview, "preview"),
                hint(&Action::History, "history"),
                hint(&Action::Config, "config"),
                hint(&Action::Help, "help"),
                hint(&Action::Quit, "quit"),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Mode::Preview => [hint(&Action::Select, "run"), hint(&Action::Back, "back")]
                .into_iter()
                .flatten()
                .collect(),
            Mode::History => [hint(&Action::ClearHistory, "clear"), hint(&Action::Back, "back")]
                .into_iter()
                .flatten()
                .collect(),
            Mode::Config => [Some("1-7 change".to_string()), hint(&Action::Back, "back")]
                .into_iter()
                .flatten()
                .collect(),
            Mode::Help => [hint(&Action::Back, "back")].into_iter().flatten().collect(),
        };
        ctx.theme.colorize(&hints.join(" • "), ColorRole::Muted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnimationSpeed;
    use crate::models::{ErrorDetails, Notice, Preview};
    use chrono::{TimeZone, Utc};

    struct Fixture {
        theme: ThemeEngine,
        animation: AnimationEngine,
        keymap: KeyboardMapper,
        preferences: UserPreferences,
        history: Vec<ExecutionRecord>,
        statistics: HistoryStatistics,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                theme: ThemeEngine::new(false),
                animation: AnimationEngine::new(false, AnimationSpeed::Normal, false),
                keymap: KeyboardMapper::with_defaults(),
                preferences: UserPreferences::default(),
                history: Vec::new(),
                statistics: HistoryStatistics {
                    total: 0,
                    successes: 0,
                    failures: 0,
                    success_rate: 0.0,
                    average_duration_ms: 0,
                    most_used: Vec::new(),
                },
            }
        }

        fn ctx(&self) -> RenderContext<'_> {
            RenderContext {
                theme: &self.theme,
                animation: &self.animation,
                keymap: &self.keymap,
                preferences: &self.preferences,
                history: &self.history,
                statistics: &self.statistics,
            }
        }
    }

    fn record(command: &str, exit_code: i32) -> ExecutionRecord {
        ExecutionRecord {
            command: command.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap(),
            status: ExecutionStatus::from_exit_code(exit_code),
            duration: 250,
            exit_code,
            error: (exit_code != 0).then(|| ErrorDetails::new("boom")),
        }
    }

    fn state() -> MenuState {
        let mut upload = MenuOption::new("upload", "Upload documents")
            .description("Push local pages")
            .preview(Preview {
                invocation: "tool upload --space DOCS".into(),
                affected: vec!["DOCS space".into()],
                estimated_duration: Some("~1 min".into()),
                warning: Some("Overwrites remote pages".into()),
            });
        upload.last_execution = Some(record("upload", 1));
        MenuState::new(vec![
            MenuOption::new("download", "Download workflows"),
            upload,
        ])
    }

    fn text(lines: &[String]) -> String {
        lines.join("\n")
    }

    #[test]
    fn test_navigation_lists_options_with_status() {
        let fixture = Fixture::new();
        let out = text(&UiRenderer::compose(&state(), &fixture.ctx()));
        assert!(out.contains("1. Download workflows"));
        assert!(out.contains("2. Upload documents"));
        assert!(out.contains("Push local pages"));
        assert!(out.contains("✖ 2024-06-01 08:00"));
        assert!(out.contains("enter select"));
    }

    #[test]
    fn test_descriptions_follow_preference() {
        let mut fixture = Fixture::new();
        fixture.preferences.show_descriptions = false;
        let out = text(&UiRenderer::compose(&state(), &fixture.ctx()));
        assert!(!out.contains("Push local pages"));
    }

    #[test]
    fn test_notice_is_shown() {
        let fixture = Fixture::new();
        let mut state = state();
        state.notice = Some(Notice::error("upload failed: boom"));
        let out = text(&UiRenderer::compose(&state, &fixture.ctx()));
        assert!(out.contains("upload failed: boom"));
    }

    #[test]
    fn test_preview_shows_invocation_and_warning() {
        let fixture = Fixture::new();
        let mut state = state();
        state.selected_index = 1;
        state.mode = Mode::Preview;
        let out = text(&UiRenderer::compose(&state, &fixture.ctx()));
        assert!(out.contains("tool upload --space DOCS"));
        assert!(out.contains("DOCS space"));
        assert!(out.contains("~1 min"));
        assert!(out.contains("Overwrites remote pages"));
        assert!(out.contains("Last run:"));
    }

    #[test]
    fn test_history_shows_records_and_stats() {
        let mut fixture = Fixture::new();
        fixture.history = vec![record("upload", 1), record("download", 0)];
        fixture.statistics.total = 2;
        fixture.statistics.successes = 1;
        fixture.statistics.failures = 1;
        fixture.statistics.success_rate = 50.0;
        let mut state = state();
        state.mode = Mode::History;
        let out = text(&UiRenderer::compose(&state, &fixture.ctx()));
        assert!(out.contains("2 runs"));
        assert!(out.contains("50.0% success"));
        assert!(out.contains("download"));
        assert!(out.contains("boom"));
    }

    #[test]
    fn test_empty_history_message() {
        let fixture = Fixture::new();
        let mut state = state();
        state.mode = Mode::History;
        let out = text(&UiRenderer::compose(&state, &fixture.ctx()));
        assert!(out.contains("No commands have been run yet."));
    }

    #[test]
    fn test_config_lists_every_preference() {
        let fixture = Fixture::new();
        let mut state = state();
        state.mode = Mode::Config;
        let out = text(&UiRenderer::compose(&state, &fixture.ctx()));
        for key in PreferenceKey::SCALARS {
            assert!(out.contains(key.label()), "missing {}", key.label());
        }
        assert!(out.contains("7. History size"));
    }

    #[test]
    fn test_help_lists_bindings_once_for_digits() {
        let fixture = Fixture::new();
        let mut state = state();
        state.mode = Mode::Help;
        let out = text(&UiRenderer::compose(&state, &fixture.ctx()));
        assert!(out.contains("Show execution history"));
        assert_eq!(out.matches("Jump to option N").count(), 1);
    }

    #[test]
    fn test_executing_header_shows_command() {
        let fixture = Fixture::new();
        let mut state = state();
        state.executing = Some("download".into());
        let lines = UiRenderer::compose(&state, &fixture.ctx());
        assert!(lines[0].contains("running download"));
    }

    #[test]
    fn test_render_writes_crlf_lines() {
        let fixture = Fixture::new();
        let mut out = Vec::new();
        UiRenderer::render(&mut out, &state(), &fixture.ctx()).unwrap();
        let written = String::from_utf8(out).unwrap();
        assert!(written.contains("Download workflows"));
        assert!(written.contains("\r\n"));
    }
}
