use std::fs;

use ratatui::style::Color;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub colors: ThemeColors,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeColors {
    pub bg: String,
    pub fg: String,
    pub text_correct: String,
    pub text_incorrect: String,
    pub text_pending: String,
    pub input_fg: String,
    pub input_wrong_bg: String,
    pub placeholder: String,
    pub accent: String,
    pub border: String,
    pub border_focused: String,
    pub header_bg: String,
    pub header_fg: String,
    pub wpm_zero: String,
    pub success: String,
    pub warning: String,
    pub error: String,
}

impl Theme {
    /// Look up `<config>/wordpace/themes/<name>.toml`. Unknown or broken
    /// themes fall back to the built-in palette.
    pub fn load(name: &str) -> Self {
        if name == "default" {
            return Self::default();
        }
        let Some(config_dir) = dirs::config_dir() else {
            return Self::default();
        };
        let path = config_dir
            .join("wordpace")
            .join("themes")
            .join(format!("{name}.toml"));
        match fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<Theme>(&content) {
                Ok(theme) => theme,
                Err(e) => {
                    warn!(theme = name, error = %e, "invalid theme file, using default");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(theme = name, path = %path.display(), error = %e, "theme not found, using default");
                Self::default()
            }
        }
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            colors: ThemeColors::default(),
        }
    }
}

impl Default for ThemeColors {
    fn default() -> Self {
        Self {
            bg: "#1e1e2e".to_string(),
            fg: "#cdd6f4".to_string(),
            text_correct: "#a6e3a1".to_string(),
            text_incorrect: "#f38ba8".to_string(),
            text_pending: "#7f849c".to_string(),
            input_fg: "#cdd6f4".to_string(),
            input_wrong_bg: "#45273a".to_string(),
            placeholder: "#585b70".to_string(),
            accent: "#89b4fa".to_string(),
            border: "#45475a".to_string(),
            border_focused: "#89b4fa".to_string(),
            header_bg: "#313244".to_string(),
            header_fg: "#cdd6f4".to_string(),
            wpm_zero: "#ffffff".to_string(),
            success: "#a6e3a1".to_string(),
            warning: "#f9e2af".to_string(),
            error: "#f38ba8".to_string(),
        }
    }
}

impl ThemeColors {
    pub fn parse_color(hex: &str) -> Color {
        let hex = hex.trim_start_matches('#');
        if hex.len() == 6 {
            if let (Ok(r), Ok(g), Ok(b)) = (
                u8::from_str_radix(&hex[0..2], 16),
                u8::from_str_radix(&hex[2..4], 16),
                u8::from_str_radix(&hex[4..6], 16),
            ) {
                return Color::Rgb(r, g, b);
            }
        }
        Color::White
    }

    pub fn bg(&self) -> Color { Self::parse_color(&self.bg) }
    pub fn fg(&self) -> Color { Self::parse_color(&self.fg) }
    pub fn text_correct(&self) -> Color { Self::parse_color(&self.text_correct) }
    pub fn text_incorrect(&self) -> Color { Self::parse_color(&self.text_incorrect) }
    pub fn text_pending(&self) -> Color { Self::parse_color(&self.text_pending) }
    pub fn input_fg(&self) -> Color { Self::parse_color(&self.input_fg) }
    pub fn input_wrong_bg(&self) -> Color { Self::parse_color(&self.input_wrong_bg) }
    pub fn placeholder(&self) -> Color { Self::parse_color(&self.placeholder) }
    pub fn accent(&self) -> Color { Self::parse_color(&self.accent) }
    pub fn border(&self) -> Color { Self::parse_color(&self.border) }
    pub fn border_focused(&self) -> Color { Self::parse_color(&self.border_focused) }
    pub fn header_bg(&self) -> Color { Self::parse_color(&self.header_bg) }
    pub fn header_fg(&self) -> Color { Self::parse_color(&self.header_fg) }
    pub fn wpm_zero(&self) -> Color { Self::parse_color(&self.wpm_zero) }
    pub fn success(&self) -> Color { Self::parse_color(&self.success) }
    pub fn warning(&self) -> Color { Self::parse_color(&self.warning) }
    pub fn error(&self) -> Color { Self::parse_color(&self.error) }

    /// Color for a word speed measured against its target: plain at zero,
    /// success once met, then warning fading to error over the 30 WPM below.
    pub fn wpm_color(&self, wpm: f64, target: f64) -> Color {
        if wpm <= 0.0 {
            return self.wpm_zero();
        }
        if wpm >= target {
            return self.success();
        }
        let t = ((target - wpm) / 30.0).clamp(0.0, 1.0);
        blend(self.warning(), self.error(), t)
    }
}

fn blend(from: Color, to: Color, t: f64) -> Color {
    match (from, to) {
        (Color::Rgb(r1, g1, b1), Color::Rgb(r2, g2, b2)) => {
            let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
            Color::Rgb(mix(r1, r2), mix(g1, g2), mix(b1, b2))
        }
        _ if t < 0.5 => from,
        _ => to,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_hex_and_falls_back_to_white() {
        assert_eq!(ThemeColors::parse_color("#102030"), Color::Rgb(16, 32, 48));
        assert_eq!(ThemeColors::parse_color("nope"), Color::White);
    }

    #[test]
    fn wpm_color_scale() {
        let colors = ThemeColors::default();
        assert_eq!(colors.wpm_color(0.0, 50.0), colors.wpm_zero());
        assert_eq!(colors.wpm_color(50.0, 50.0), colors.success());
        assert_eq!(colors.wpm_color(50.0 - 1e-9, 50.0), colors.warning());
        assert_eq!(colors.wpm_color(10.0, 50.0), colors.error());
    }

    #[test]
    fn partial_theme_file_uses_default_colors() {
        let theme: Theme = toml::from_str(
            r##"
name = "mine"
[colors]
accent = "#000000"
"##,
        )
        .unwrap();
        assert_eq!(theme.colors.accent(), Color::Rgb(0, 0, 0));
        assert_eq!(theme.colors.bg, ThemeColors::default().bg);
    }
}
