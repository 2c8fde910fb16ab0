use crate::config::{ColorPair, PaletteConfig, Thresholds};
use crate::data::snapshot::Unit;
use ratatui::style::{Color, Modifier, Style};
use std::str::FromStr;
use tracing::warn;

/// Where a value sits relative to its panel's threshold bands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Band {
    Normal,
    Warn,
    Critical,
}

impl Band {
    pub fn classify(value: f64, unit: Unit, thresholds: Option<&Thresholds>) -> Self {
        match thresholds {
            Some(t) if t.applies_to(unit) && value >= t.critical => Band::Critical,
            Some(t) if t.applies_to(unit) && value >= t.warn => Band::Warn,
            _ => Band::Normal,
        }
    }
}

/// Styles resolved from the configured palette.
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Style,
    pub symbol: Style,
    pub chip: Style,
    pub title: Style,
    pub date: Style,
    pub quit_hint: Style,
    pub sensor: Style,
}

impl Theme {
    pub fn from_palette(palette: &PaletteConfig) -> Self {
        Self {
            background: style_for("background", &palette.background),
            symbol: style_for("symbol", &palette.symbol),
            chip: style_for("chip", &palette.chip),
            title: style_for("title", &palette.title).add_modifier(Modifier::BOLD),
            date: style_for("date", &palette.date),
            quit_hint: style_for("quit_hint", &palette.quit_hint),
            sensor: style_for("sensor", &palette.sensor),
        }
    }

    pub fn band_style(&self, band: Band) -> Style {
        match band {
            Band::Normal => self.sensor,
            Band::Warn => Style::default().fg(Color::Yellow),
            Band::Critical => Style::default()
                .fg(Color::LightRed)
                .add_modifier(Modifier::BOLD),
        }
    }

    pub fn focused_border(&self) -> Style {
        self.title
    }

    pub fn stale(&self) -> Style {
        Style::default()
            .fg(Color::LightRed)
            .add_modifier(Modifier::BOLD)
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::from_palette(&PaletteConfig::default())
    }
}

fn style_for(role: &str, pair: &ColorPair) -> Style {
    let mut style = Style::default();
    if let Some(fg) = resolve(role, &pair.fg) {
        style = style.fg(fg);
    }
    if let Some(bg) = resolve(role, &pair.bg) {
        style = style.bg(bg);
    }
    style
}

fn resolve(role: &str, name: &str) -> Option<Color> {
    let parsed = parse_color(name);
    if parsed.is_err() {
        warn!(role, color = name, "unknown palette color, using terminal default");
    }
    parsed.ok().flatten()
}

/// Parses a palette color. `default` means "leave the terminal's color",
/// returned as `None`. Besides ratatui's names and `#rrggbb`, the
/// `dark <color>` spelling maps to the normal-intensity ANSI color.
pub fn parse_color(name: &str) -> Result<Option<Color>, String> {
    let normalized = name.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized == "default" {
        return Ok(None);
    }

    let normalized = match normalized.strip_prefix("dark ") {
        Some(rest) if rest != "gray" && rest != "grey" => rest.to_string(),
        _ => normalized,
    };
    Color::from_str(&normalized)
        .map(Some)
        .map_err(|_| format!("unknown color `{}`", name))
}
