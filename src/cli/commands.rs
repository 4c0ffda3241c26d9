use crate::cli::{demo_options, DemoDispatcher};
use crate::config::{ConfigManager, PreferenceKey};
use crate::error::{MenuError, Result};
use crate::executor::CommandExecutor;
use crate::history::{CommandHistory, HistoryStatistics};
use crate::menu::{Menu, MenuSettings};
use crate::models::{CommandRequest, ExecutionRecord, ExecutionStatus};
use crate::ui::AnimationEngine;
use clap::{Args, Parser, Subcommand};
use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use dialoguer::{theme::ColorfulTheme, Confirm};
use std::env;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable naming the storage directory.
pub const CONFIG_DIR_ENV: &str = "TERMENU_CONFIG_DIR";

/// Keyboard-driven command menu
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory holding preferences, history and logs
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// Verbose logging and raw error details
    #[arg(long, global = true)]
    pub debug: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open the interactive menu (default)
    Menu,

    /// Run one command without the menu
    Run(RunArgs),

    /// Show or clear the execution history
    History(HistoryArgs),

    /// Read or change preferences
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Command name, e.g. download
    pub command: String,

    /// Arguments passed to the command
    pub args: Vec<String>,

    /// Flag for the command, as NAME or NAME=VALUE (repeatable)
    #[arg(short, long = "flag", value_name = "NAME[=VALUE]")]
    pub flags: Vec<String>,
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    #[command(subcommand)]
    pub action: Option<HistoryCommand>,

    /// Number of records to show
    #[arg(short, long, default_value = "15")]
    pub limit: usize,

    /// Also print statistics
    #[arg(short, long)]
    pub stats: bool,
}

#[derive(Subcommand, Debug)]
pub enum HistoryCommand {
    /// Delete every record
    Clear {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Print one preference, e.g. `theme` or `shortcuts.d`
    Get { key: String },
    /// Change one preference
    Set { key: String, value: String },
    /// Print every preference
    List,
    /// Restore the defaults
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
}

impl Cli {
    /// `--config-dir`, then `$TERMENU_CONFIG_DIR`, then the platform config
    /// directory, then `./.termenu`.
    pub fn resolve_config_dir(&self) -> PathBuf {
        if let Some(dir) = &self.config_dir {
            return dir.clone();
        }
        if let Ok(dir) = env::var(CONFIG_DIR_ENV) {
            if !dir.trim().is_empty() {
                return PathBuf::from(dir);
            }
        }
        dirs::config_dir()
            .map(|dir| dir.join("termenu"))
            .unwrap_or_else(|| PathBuf::from(".termenu"))
    }
}

/// CLI application
pub struct App {
    config_dir: PathBuf,
    debug: bool,
    colors_enabled: bool,
}

impl App {
    pub fn new(cli: &Cli) -> Self {
        Self {
            config_dir: cli.resolve_config_dir(),
            debug: cli.debug,
            colors_enabled: !cli.no_color && crate::ui::ThemeEngine::detect_color_support(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Run the CLI application
    pub async fn run(&self, command: Commands) -> Result<()> {
        debug!(?command, dir = %self.config_dir.display(), "Dispatching CLI command");
        match command {
            Commands::Menu => self.open_menu().await,
            Commands::Run(args) => self.run_command(args).await,
            Commands::History(args) => match args.action {
                Some(HistoryCommand::Clear { yes }) => self.clear_history(yes),
                None => self.show_history(args.limit, args.stats),
            },
            Commands::Config { action } => self.configure(action),
        }
    }

    async fn open_menu(&self) -> Result<()> {
        let settings = MenuSettings {
            config_dir: self.config_dir.clone(),
            colors_enabled: self.colors_enabled,
            debug: self.debug,
        };
        let mut menu = Menu::new(settings, demo_options(), DemoDispatcher::new())?;
        menu.show().await
    }

    fn load_history(&self) -> Result<(ConfigManager, CommandHistory)> {
        let mut config = ConfigManager::new(&self.config_dir);
        let history_size = config.load()?.history_size;
        let mut history = CommandHistory::new(&self.config_dir, history_size);
        history.load()?;
        Ok((config, history))
    }

    /// Runs one command behind a spinner and records it.
    async fn run_command(&self, args: RunArgs) -> Result<()> {
        let (config, mut history) = self.load_history()?;
        let prefs = config.preferences();

        let mut request = CommandRequest::new(args.command);
        request.args = args.args;
        for flag in args.flags {
            let (name, value) = flag.split_once('=').unwrap_or((flag.as_str(), "true"));
            request.flags.insert(name.to_string(), value.to_string());
        }

        let animation = AnimationEngine::new(
            prefs.animations_enabled,
            prefs.animation_speed,
            std::io::stderr().is_terminal(),
        );
        let executor = CommandExecutor::new(DemoDispatcher::new());
        let label = format!("Running {}", request.command);
        let result = animation
            .with_spinner(&label, executor.execute(request))
            .await?;

        history.add(result.to_new_execution())?;
        history.save()?;
        info!(command = %result.command, success = result.success, "One-shot run recorded");

        if result.success {
            println!(
                "{} {} ({} ms)",
                "✔".green(),
                result.message,
                result.duration
            );
            if let Some(data) = &result.data {
                println!("{}", serde_json::to_string_pretty(data)?.dimmed());
            }
            Ok(())
        } else {
            Err(MenuError::CommandFailed {
                command: result.command,
                message: result.message,
            })
        }
    }

    fn show_history(&self, limit: usize, stats: bool) -> Result<()> {
        let (_, history) = self.load_history()?;
        if history.is_empty() {
            println!("{}", "No commands have been run yet.".dimmed());
            return Ok(());
        }
        println!("{}", history_table(history.recent(limit), self.colors_enabled));
        if stats {
            println!();
            println!("{}", statistics_table(&history.statistics()));
        }
        Ok(())
    }

    fn clear_history(&self, yes: bool) -> Result<()> {
        let (_, mut history) = self.load_history()?;
        if history.is_empty() {
            println!("History is already empty.");
            return Ok(());
        }
        if !yes && !confirm(&format!("Delete all {} history records?", history.len()))? {
            println!("{}", "Cancelled.".yellow());
            return Ok(());
        }
        history.clear();
        history.save()?;
        println!("{}", "History cleared.".green());
        Ok(())
    }

    fn configure(&self, action: ConfigCommand) -> Result<()> {
        let mut config = ConfigManager::new(&self.config_dir);
        config.load()?;
        match action {
            ConfigCommand::Get { key } => {
                println!("{}", config.get_path(&key)?);
            },
            ConfigCommand::Set { key, value } => {
                config.set_path(&key, &value)?;
                println!("{} {} = {}", "✔".green(), key, config.get_path(&key)?);
            },
            ConfigCommand::List => {
                let prefs = config.preferences();
                for key in PreferenceKey::SCALARS {
                    if let Some(value) = prefs.get(&key) {
                        println!("{:<18} {}", key.name(), value);
                    }
                }
                for (key, action) in &prefs.shortcuts {
                    println!("{:<18} {}", format!("shortcuts.{}", key), action);
                }
                println!("{}", format!("({})", config.path().display()).dimmed());
            },
            ConfigCommand::Reset { yes } => {
                if !yes && !confirm("Restore default preferences?")? {
                    println!("{}", "Cancelled.".yellow());
                    return Ok(());
                }
                config.reset()?;
                println!("{}", "Preferences reset to defaults.".green());
            },
        }
        Ok(())
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    if !std::io::stdin().is_terminal() {
        return Err(MenuError::Cli(
            "confirmation needs a terminal; pass --yes to skip it".to_string(),
        ));
    }
    let answer = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;
    Ok(answer)
}

/// Renders records as a table, most recent first.
pub fn history_table(records: &[ExecutionRecord], colors: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["When", "Command", "Status", "Exit", "Duration", "Error"]);
    if !colors {
        table.force_no_tty();
    }
    for record in records {
        let status = match record.status {
            ExecutionStatus::Success => Cell::new("success").fg(Color::Green),
            ExecutionStatus::Failure => Cell::new("failure").fg(Color::Red),
        };
        table.add_row(vec![
            Cell::new(record.timestamp.format("%Y-%m-%d %H:%M:%S")),
            Cell::new(&record.command),
            status,
            Cell::new(record.exit_code),
            Cell::new(format!("{} ms", record.duration)),
            Cell::new(
                record
                    .error
                    .as_ref()
                    .map(|e| e.message.as_str())
                    .unwrap_or(""),
            ),
        ]);
    }
    table
}

pub fn statistics_table(stats: &HistoryStatistics) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec!["Statistic", "Value"]);
    table.add_row(vec!["Total runs".to_string(), stats.total.to_string()]);
    table.add_row(vec!["Successes".to_string(), stats.successes.to_string()]);
    table.add_row(vec!["Failures".to_string(), stats.failures.to_string()]);
    table.add_row(vec![
        "Success rate".to_string(),
        format!("{:.1}%", stats.success_rate),
    ]);
    table.add_row(vec![
        "Average duration".to_string(),
        format!("{} ms", stats.average_duration_ms),
    ]);
    let top = stats
        .most_used
        .iter()
        .take(5)
        .map(|(command, count)| format!("{} ({})", command, count))
        .collect::<Vec<_>>()
        .join(", ");
    table.add_row(vec!["Most used".to_string(), top]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorDetails, NewExecution};
    use serial_test::serial;
    use tempfile::TempDir;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("termenu").chain(args.iter().copied())).unwrap()
    }

    fn app(dir: &TempDir) -> App {
        App {
            config_dir: dir.path().to_path_buf(),
            debug: false,
            colors_enabled: false,
        }
    }

    #[test]
    fn test_no_subcommand_means_menu() {
        assert!(cli(&[]).command.is_none());
    }

    #[test]
    fn test_run_args_and_flags() {
        let parsed = cli(&["run", "upload", "DOCS", "-f", "dry-run", "--flag", "mode=fast"]);
        let Some(Commands::Run(args)) = parsed.command else {
            panic!("expected run");
        };
        assert_eq!(args.command, "upload");
        assert_eq!(args.args, vec!["DOCS".to_string()]);
        assert_eq!(args.flags, vec!["dry-run".to_string(), "mode=fast".to_string()]);
    }

    #[test]
    fn test_history_clear_parses() {
        let parsed = cli(&["history", "clear", "--yes"]);
        assert!(matches!(
            parsed.command,
            Some(Commands::History(HistoryArgs {
                action: Some(HistoryCommand::Clear { yes: true }),
                ..
            }))
        ));
    }

    #[test]
    #[serial]
    fn test_config_dir_resolution_order() {
        env::set_var(CONFIG_DIR_ENV, "/tmp/from-env");
        assert_eq!(
            cli(&["--config-dir", "/tmp/from-flag"]).resolve_config_dir(),
            PathBuf::from("/tmp/from-flag")
        );
        assert_eq!(cli(&[]).resolve_config_dir(), PathBuf::from("/tmp/from-env"));
        env::remove_var(CONFIG_DIR_ENV);
        assert!(cli(&[]).resolve_config_dir().ends_with("termenu")
            || cli(&[]).resolve_config_dir() == PathBuf::from(".termenu"));
    }

    #[tokio::test]
    async fn test_config_set_and_get() {
        let dir = TempDir::new().unwrap();
        let app = app(&dir);
        app.run(Commands::Config {
            action: ConfigCommand::Set {
                key: "preferences.theme".into(),
                value: "dark".into(),
            },
        })
        .await
        .unwrap();

        let mut config = ConfigManager::new(dir.path());
        assert_eq!(config.load().unwrap().theme.as_str(), "dark");
    }

    #[tokio::test]
    async fn test_config_set_rejects_bad_value() {
        let dir = TempDir::new().unwrap();
        let err = app(&dir)
            .run(Commands::Config {
                action: ConfigCommand::Set {
                    key: "historySize".into(),
                    value: "5000".into(),
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MenuError::InvalidPreference { .. }));
    }

    #[tokio::test]
    async fn test_history_clear_with_yes() {
        let dir = TempDir::new().unwrap();
        let mut history = CommandHistory::new(dir.path(), 100);
        history.add(NewExecution::new("download", 0)).unwrap();
        history.save().unwrap();

        app(&dir)
            .run(Commands::History(HistoryArgs {
                action: Some(HistoryCommand::Clear { yes: true }),
                limit: 15,
                stats: false,
            }))
            .await
            .unwrap();

        let mut reloaded = CommandHistory::new(dir.path(), 100);
        reloaded.load().unwrap();
        assert!(reloaded.is_empty());
    }

    #[tokio::test]
    async fn test_reserved_run_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = app(&dir)
            .run(Commands::Run(RunArgs {
                command: "history".into(),
                args: vec![],
                flags: vec![],
            }))
            .await
            .unwrap_err();
        assert!(matches!(err, MenuError::ReservedCommand(_)));
    }

    #[test]
    fn test_history_table_lists_records() {
        let record = ExecutionRecord {
            command: "cleanup".into(),
            timestamp: chrono::Utc::now(),
            status: ExecutionStatus::Failure,
            duration: 12,
            exit_code: 2,
            error: Some(ErrorDetails::new("refusing to delete")),
        };
        let rendered = history_table(&[record], false).to_string();
        assert!(rendered.contains("cleanup"));
        assert!(rendered.contains("failure"));
        assert!(rendered.contains("refusing to delete"));
    }
}
