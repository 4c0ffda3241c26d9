//! Named colour palettes, semantic colouring and contrast checks.

use crate::config::ThemeName;
use crate::error::{MenuError, Result};
use colored::Colorize;
use std::fmt;
use tracing::{info, warn};

/// WCAG AA threshold for normal text.
pub const MIN_CONTRAST_RATIO: f64 = 4.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// The semantic colour roles every palette defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorRole {
    Primary,
    Success,
    Error,
    Warning,
    Info,
    Highlight,
    Muted,
    Destructive,
}

impl ColorRole {
    pub const ALL: [ColorRole; 8] = [
        ColorRole::Primary,
        ColorRole::Success,
        ColorRole::Error,
        ColorRole::Warning,
        ColorRole::Info,
        ColorRole::Highlight,
        ColorRole::Muted,
        ColorRole::Destructive,
    ];
}

impl fmt::Display for ColorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    pub name: ThemeName,
    pub primary: Rgb,
    pub success: Rgb,
    pub error: Rgb,
    pub warning: Rgb,
    pub info: Rgb,
    pub highlight: Rgb,
    pub muted: Rgb,
    pub destructive: Rgb,
    /// Background of the selected row.
    pub selection: Rgb,
    /// Terminal background the palette is designed for; used for contrast checks.
    pub background: Rgb,
}

impl Palette {
    pub fn color(&self, role: ColorRole) -> Rgb {
        match role {
            ColorRole::Primary => self.primary,
            ColorRole::Success => self.success,
            ColorRole::Error => self.error,
            ColorRole::Warning => self.warning,
            ColorRole::Info => self.info,
            ColorRole::Highlight => self.highlight,
            ColorRole::Muted => self.muted,
            ColorRole::Destructive => self.destructive,
        }
    }

    pub fn for_theme(name: ThemeName) -> Self {
        match name {
            ThemeName::Default => Palette {
                name,
                primary: Rgb(0x5f, 0xaf, 0xff),
                success: Rgb(0x5f, 0xd7, 0x87),
                error: Rgb(0xff, 0x5f, 0x5f),
                warning: Rgb(0xff, 0xd7, 0x5f),
                info: Rgb(0x87, 0xd7, 0xff),
                highlight: Rgb(0xff, 0xff, 0xff),
                muted: Rgb(0x8a, 0x8a, 0x8a),
                destructive: Rgb(0xff, 0x87, 0x5f),
                selection: Rgb(0x26, 0x4f, 0x78),
                background: Rgb(0x1c, 0x1c, 0x1c),
            },
            ThemeName::Dark => Palette {
                name,
                primary: Rgb(0xbd, 0x93, 0xf9),
                success: Rgb(0x50, 0xfa, 0x7b),
                error: Rgb(0xff, 0x55, 0x55),
                warning: Rgb(0xf1, 0xfa, 0x8c),
                info: Rgb(0x8b, 0xe9, 0xfd),
                highlight: Rgb(0xf8, 0xf8, 0xf2),
                muted: Rgb(0x62, 0x72, 0xa4),
                destructive: Rgb(0xff, 0x79, 0xc6),
                selection: Rgb(0x44, 0x47, 0x5a),
                background: Rgb(0x28, 0x2a, 0x36),
            },
            ThemeName::Light => Palette {
                name,
                primary: Rgb(0x00, 0x5f, 0xaf),
                success: Rgb(0x00, 0x70, 0x3c),
                error: Rgb(0xc0, 0x1c, 0x28),
                warning: Rgb(0x8a, 0x5a, 0x00),
                info: Rgb(0x00, 0x5c, 0x73),
                highlight: Rgb(0x00, 0x00, 0x00),
                muted: Rgb(0x6a, 0x6a, 0x6a),
                destructive: Rgb(0xa3, 0x1a, 0x00),
                selection: Rgb(0xd0, 0xe4, 0xff),
                background: Rgb(0xff, 0xff, 0xff),
            },
            ThemeName::HighContrast => Palette {
                name,
                primary: Rgb(0x00, 0xff, 0xff),
                success: Rgb(0x00, 0xff, 0x00),
                error: Rgb(0xff, 0x40, 0x40),
                warning: Rgb(0xff, 0xff, 0x00),
                info: Rgb(0x00, 0xff, 0xff),
                highlight: Rgb(0xff, 0xff, 0xff),
                muted: Rgb(0xc0, 0xc0, 0xc0),
                destructive: Rgb(0xff, 0x80, 0x00),
                selection: Rgb(0x00, 0x00, 0xaf),
                background: Rgb(0x00, 0x00, 0x00),
            },
            ThemeName::Monochrome => Palette {
                name,
                primary: Rgb(0xff, 0xff, 0xff),
                success: Rgb(0xff, 0xff, 0xff),
                error: Rgb(0xff, 0xff, 0xff),
                warning: Rgb(0xff, 0xff, 0xff),
                info: Rgb(0xff, 0xff, 0xff),
                highlight: Rgb(0xff, 0xff, 0xff),
                muted: Rgb(0xc0, 0xc0, 0xc0),
                destructive: Rgb(0xff, 0xff, 0xff),
                selection: Rgb(0x40, 0x40, 0x40),
                background: Rgb(0x00, 0x00, 0x00),
            },
        }
    }
}

/// WCAG relative luminance of an sRGB colour.
fn relative_luminance(color: Rgb) -> f64 {
    let channel = |c: u8| {
        let c = c as f64 / 255.0;
        if c <= 0.03928 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        }
    };
    0.2126 * channel(color.0) + 0.7152 * channel(color.1) + 0.0722 * channel(color.2)
}

/// Active palette plus the switch for terminals without colour.
#[derive(Debug, Clone)]
pub struct ThemeEngine {
    palette: Palette,
    colors_enabled: bool,
    low_contrast: Vec<(ColorRole, f64)>,
}

impl ThemeEngine {
    /// Starts on the default palette, or the monochrome one when colours are off.
    pub fn new(colors_enabled: bool) -> Self {
        let mut engine = Self {
            palette: Palette::for_theme(ThemeName::Monochrome),
            colors_enabled,
            low_contrast: Vec::new(),
        };
        engine.load_theme(ThemeName::Default);
        engine
    }

    /// Whether the environment allows ANSI colours (`NO_COLOR`, `CLICOLOR`, `TERM=dumb`).
    pub fn detect_color_support() -> bool {
        let dumb = std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false);
        !dumb && colored::control::SHOULD_COLORIZE.should_colorize()
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn colors_enabled(&self) -> bool {
        self.colors_enabled
    }

    /// Roles of the active palette below [`MIN_CONTRAST_RATIO`] against its background.
    pub fn low_contrast_roles(&self) -> &[(ColorRole, f64)] {
        &self.low_contrast
    }

    /// Activates `name`, or the monochrome baseline if colours are unavailable.
    pub fn load_theme(&mut self, name: ThemeName) -> &Palette {
        let effective = if self.colors_enabled {
            name
        } else {
            ThemeName::Monochrome
        };
        self.palette = Palette::for_theme(effective);
        self.low_contrast = Self::audit(&self.palette);
        if !self.low_contrast.is_empty() {
            warn!(
                theme = effective.as_str(),
                roles = ?self.low_contrast,
                "Theme has colours below the {}:1 contrast threshold",
                MIN_CONTRAST_RATIO
            );
        }
        info!(requested = name.as_str(), active = effective.as_str(), "Theme loaded");
        &self.palette
    }

    /// Looks a theme up by name.
    ///
    /// # Errors
    ///
    /// `MenuError::Theme` for an unknown name.
    pub fn load_theme_named(&mut self, name: &str) -> Result<&Palette> {
        let theme: ThemeName = name
            .parse()
            .map_err(|_| MenuError::Theme(format!("unknown theme '{}'", name)))?;
        Ok(self.load_theme(theme))
    }

    /// Contrast ratio between two colours, from 1.0 to 21.0.
    pub fn validate_contrast(fg: Rgb, bg: Rgb) -> f64 {
        let a = relative_luminance(fg);
        let b = relative_luminance(bg);
        let (lighter, darker) = if a >= b { (a, b) } else { (b, a) };
        (lighter + 0.05) / (darker + 0.05)
    }

    /// Every role whose contrast against the palette background is too low.
    pub fn audit(palette: &Palette) -> Vec<(ColorRole, f64)> {
        let mut flagged: Vec<(ColorRole, f64)> = ColorRole::ALL
            .into_iter()
            .map(|role| {
                (
                    role,
                    Self::validate_contrast(palette.color(role), palette.background),
                )
            })
            .filter(|(_, ratio)| *ratio < MIN_CONTRAST_RATIO)
            .collect();
        let selection = Self::validate_contrast(palette.highlight, palette.selection);
        if selection < MIN_CONTRAST_RATIO {
            flagged.push((ColorRole::Highlight, selection));
        }
        flagged
    }

    /// Paints `text` in the colour of `role`.
    ///
    /// Without colours, roles fall back to text attributes.
    pub fn colorize(&self, text: &str, role: ColorRole) -> String {
        if !self.colors_enabled || self.palette.name == ThemeName::Monochrome {
            return match role {
                ColorRole::Error | ColorRole::Destructive | ColorRole::Primary => {
                    text.bold().to_string()
                },
                ColorRole::Muted => text.dimmed().to_string(),
                _ => text.to_string(),
            };
        }
        let Rgb(r, g, b) = self.palette.color(role);
        text.truecolor(r, g, b).to_string()
    }

    /// Paints the selected row: highlight colour on the selection background.
    pub fn selected(&self, text: &str) -> String {
        if !self.colors_enabled || self.palette.name == ThemeName::Monochrome {
            return text.reversed().to_string();
        }
        let Rgb(r, g, b) = self.palette.highlight;
        let Rgb(br, bg, bb) = self.palette.selection;
        text.truecolor(r, g, b)
            .on_truecolor(br, bg, bb)
            .bold()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_contrast_extremes() {
        let black = Rgb(0, 0, 0);
        let white = Rgb(255, 255, 255);
        assert!((ThemeEngine::validate_contrast(white, black) - 21.0).abs() < 1e-9);
        assert!((ThemeEngine::validate_contrast(black, white) - 21.0).abs() < 1e-9);
        assert!((ThemeEngine::validate_contrast(white, white) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_audit_flags_low_contrast() {
        let mut palette = Palette::for_theme(ThemeName::Dark);
        palette.muted = palette.background;
        let flagged = ThemeEngine::audit(&palette);
        assert!(flagged.iter().any(|(role, _)| *role == ColorRole::Muted));
    }

    #[test]
    fn test_high_contrast_palette_passes_audit() {
        let palette = Palette::for_theme(ThemeName::HighContrast);
        assert!(ThemeEngine::audit(&palette).is_empty());
    }

    #[test]
    fn test_no_color_support_uses_baseline_palette() {
        let mut theme = ThemeEngine::new(false);
        assert_eq!(theme.load_theme(ThemeName::Dark).name, ThemeName::Monochrome);
    }

    #[test]
    fn test_unknown_theme_name_fails() {
        let mut theme = ThemeEngine::new(true);
        assert!(matches!(
            theme.load_theme_named("neon"),
            Err(MenuError::Theme(_))
        ));
        assert_eq!(theme.palette().name, ThemeName::Default);
        assert_eq!(
            theme.load_theme_named("light").unwrap().name,
            ThemeName::Light
        );
    }

    #[test]
    #[serial]
    fn test_colorize_emits_ansi_sequence() {
        colored::control::set_override(true);
        let theme = ThemeEngine::new(true);
        let painted = theme.colorize("ok", ColorRole::Success);
        colored::control::unset_override();
        assert!(painted.starts_with("\x1b["));
        assert!(painted.contains("ok"));
    }

    #[test]
    #[serial]
    fn test_colorize_without_colors_keeps_text() {
        colored::control::set_override(false);
        let theme = ThemeEngine::new(false);
        let painted = theme.colorize("plain", ColorRole::Info);
        colored::control::unset_override();
        assert_eq!(painted, "plain");
    }
}
