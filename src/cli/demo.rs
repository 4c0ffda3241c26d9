//! A stand-in for the documentation tool's real commands.
//!
//! Each command sleeps for a random, command-specific time and reports a
//! plausible result, so the menu can be driven end to end without side effects.

use crate::executor::CommandDispatcher;
use crate::models::{
    CommandFailure, CommandOutput, CommandRequest, MenuOption, OptionCategory, Preview,
};
use rand::{thread_rng, Rng};
use serde_json::json;
use std::ops::RangeInclusive;
use std::time::Duration;
use tracing::debug;

/// Simulated runtime range per command, in milliseconds.
fn profile(command: &str) -> Option<RangeInclusive<u64>> {
    let range = match command {
        "download" => 800..=2_000,
        "upload" => 1_000..=2_500,
        "migrate" => 1_500..=3_500,
        "report" => 300..=900,
        "validate" => 200..=700,
        "cleanup" => 400..=1_200,
        _ => return None,
    };
    Some(range)
}

fn unknown_command(command: &str) -> CommandFailure {
    CommandFailure::new(format!("unknown command '{}'", command))
        .code("UNKNOWN_COMMAND")
        .exit_code(127)
}

fn pick(range: RangeInclusive<u64>) -> u64 {
    thread_rng().gen_range(range)
}

/// Simulates the external commands of a documentation migration tool.
#[derive(Debug, Clone)]
pub struct DemoDispatcher {
    time_scale: f64,
}

impl Default for DemoDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DemoDispatcher {
    pub fn new() -> Self {
        Self { time_scale: 1.0 }
    }

    /// A dispatcher that answers without sleeping.
    pub fn instant() -> Self {
        Self { time_scale: 0.0 }
    }

    fn simulated_delay(&self, range: RangeInclusive<u64>) -> Duration {
        let millis = pick(range) as f64 * self.time_scale;
        Duration::from_millis(millis as u64)
    }
}

impl CommandDispatcher for DemoDispatcher {
    async fn dispatch(
        &self,
        request: CommandRequest,
    ) -> Result<CommandOutput, CommandFailure> {
        let range = profile(&request.command).ok_or_else(|| unknown_command(&request.command))?;
        let delay = self.simulated_delay(range);
        debug!(command = %request.command, delay_ms = delay.as_millis() as u64, "Simulating command");
        tokio::time::sleep(delay).await;

        let target = request.args.first().map(String::as_str).unwrap_or("DOCS");
        match request.command.as_str() {
            "download" => {
                let pages = pick(5..=40);
                Ok(CommandOutput::ok(format!("Downloaded {} pages from {}", pages, target))
                    .with_data(json!({ "space": target, "pages": pages })))
            },
            "upload" => {
                let pages = pick(1..=20);
                if request.flag_enabled("dry-run") {
                    return Ok(CommandOutput::ok(format!(
                        "Dry run: {} pages would be uploaded to {}",
                        pages, target
                    )));
                }
                Ok(CommandOutput::ok(format!("Uploaded {} pages to {}", pages, target))
                    .with_data(json!({ "space": target, "pages": pages })))
            },
            "migrate" => {
                let converted = pick(10..=60);
                Ok(CommandOutput::ok(format!("Converted {} pages to Markdown", converted))
                    .with_data(json!({ "converted": converted })))
            },
            "report" => Ok(CommandOutput::ok("Report written to report.html")),
            "validate" => {
                let issues = pick(0..=3);
                if issues == 0 {
                    Ok(CommandOutput::ok("All links and images resolve"))
                } else {
                    Ok(CommandOutput {
                        success: false,
                        message: format!("{} broken links found", issues),
                        data: Some(json!({ "issues": issues })),
                    })
                }
            },
            "cleanup" if !request.flag_enabled("force") => Err(CommandFailure::new(
                "refusing to delete local files without --force",
            )
            .code("FORCE_REQUIRED")
            .exit_code(2)),
            "cleanup" => Ok(CommandOutput::ok("Removed temporary files")),
            other => Err(unknown_command(other)),
        }
    }
}

/// The option list the binary shows.
pub fn demo_options() -> Vec<MenuOption> {
    vec![
        MenuOption::new("download", "Download pages")
            .description("Fetch the DOCS space into the local workspace")
            .icon("⬇")
            .shortcut('d')
            .args(["DOCS"]),
        MenuOption::new("upload", "Upload pages")
            .description("Publish local changes back to the DOCS space")
            .icon("⬆")
            .shortcut('u')
            .args(["DOCS"])
            .preview(Preview {
                invocation: "docs upload DOCS".to_string(),
                affected: vec!["Remote DOCS space".to_string()],
                estimated_duration: Some("1-3 s".to_string()),
                warning: Some("Overwrites remote pages that changed locally".to_string()),
            }),
        MenuOption::new("migrate", "Convert to Markdown")
            .description("Rewrite downloaded pages as Markdown files")
            .icon("⇄")
            .shortcut('m')
            .preview(Preview {
                invocation: "docs migrate".to_string(),
                affected: vec!["./workspace/*.md".to_string()],
                estimated_duration: Some("2-4 s".to_string()),
                warning: None,
            }),
        MenuOption::new("report", "Build report")
            .description("Summarize the workspace as HTML")
            .icon("▤")
            .category(OptionCategory::Info),
        MenuOption::new("validate", "Validate links")
            .description("Check that every link and image resolves")
            .icon("✓")
            .shortcut('v')
            .category(OptionCategory::Utility),
        MenuOption::new("cleanup", "Clean workspace")
            .description("Delete temporary files (needs --force)")
            .icon("✗")
            .category(OptionCategory::Destructive)
            .preview(Preview {
                invocation: "docs cleanup".to_string(),
                affected: vec!["./workspace/.tmp".to_string()],
                estimated_duration: None,
                warning: Some("Deleted files cannot be recovered".to_string()),
            }),
        MenuOption::new("history", "History")
            .description("Past runs and statistics")
            .icon("⌚")
            .category(OptionCategory::Info),
        MenuOption::new("config", "Preferences")
            .description("Theme, animations and display options")
            .icon("⚙")
            .category(OptionCategory::Utility),
        MenuOption::new("help", "Help")
            .description("Key bindings")
            .icon("?")
            .category(OptionCategory::Info),
        MenuOption::new("exit", "Exit").icon("⏻"),
    ]
}
