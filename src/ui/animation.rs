//! Spinner animation, both as a frame source for the full-screen menu and as an
//! `indicatif` spinner wrapped around one-shot operations.

use crate::config::AnimationSpeed;
use crate::error::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner state. Disabled when the terminal is not interactive or the user
/// turned animations off.
#[derive(Debug, Clone)]
pub struct AnimationEngine {
    interactive: bool,
    preference_enabled: bool,
    speed: AnimationSpeed,
    frame: usize,
    stopped: bool,
}

impl AnimationEngine {
    pub fn new(preference_enabled: bool, speed: AnimationSpeed, interactive: bool) -> Self {
        Self {
            interactive,
            preference_enabled,
            speed,
            frame: 0,
            stopped: false,
        }
    }

    /// Applies changed preferences.
    pub fn configure(&mut self, preference_enabled: bool, speed: AnimationSpeed) {
        self.preference_enabled = preference_enabled;
        self.speed = speed;
    }

    pub fn is_enabled(&self) -> bool {
        self.interactive && self.preference_enabled && !self.stopped
    }

    pub fn frame_interval(&self) -> Duration {
        self.speed.frame_interval()
    }

    /// The glyph to draw now; a static marker when animations are off.
    pub fn current_frame(&self) -> &'static str {
        if self.is_enabled() {
            SPINNER_FRAMES[self.frame % SPINNER_FRAMES.len()]
        } else {
            "…"
        }
    }

    pub fn advance(&mut self) {
        if self.is_enabled() {
            self.frame = (self.frame + 1) % SPINNER_FRAMES.len();
        }
    }

    /// Halts all animation for good, used during shutdown.
    pub fn stop(&mut self) {
        self.stopped = true;
        self.frame = 0;
    }

    /// Awaits `operation` behind a spinner labelled `label` and returns its output unchanged.
    ///
    /// The spinner ticks on its own thread, so it never delays the operation.
    pub async fn with_spinner<F, T>(&self, label: &str, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        if !self.is_enabled() {
            return operation.await;
        }

        let spinner = ProgressBar::new_spinner();
        let style = spinner_style().unwrap_or_else(|e| {
            warn!(%e, "Falling back to the default spinner style");
            ProgressStyle::default_spinner()
        });
        spinner.set_style(style);
        spinner.set_message(label.to_string());
        spinner.enable_steady_tick(self.frame_interval());
        debug!(label, "Spinner started");

        let output = operation.await;

        spinner.finish_and_clear();
        output
    }
}

fn spinner_style() -> Result<ProgressStyle> {
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg} {elapsed:.dim}")?
        .tick_strings(&SPINNER_FRAMES);
    Ok(style)
}
