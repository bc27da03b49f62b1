//! Terminal styles derived from configuration.
//!
//! Config colors are ANSI codes kept for compatibility with classic
//! `30`..`37` / `90`..`97` foreground values; everything else is an
//! xterm-256 index.

use ratatui::style::{Color, Modifier, Style};

use crate::config::Config;

#[derive(Debug, Clone)]
pub struct Styles {
    pub header: Style,
    pub command: Style,
    pub desc: Style,
    pub path: Style,
    pub cursor: Style,
    pub dim: Style,
    pub divider: Style,
    pub preview_header: Style,
    selected_bg: Color,
}

impl Styles {
    pub fn from_config(config: &Config) -> Styles {
        let header = Style::default().fg(ansi_color(&config.color_header));
        Styles {
            header,
            command: Style::default().fg(ansi_color(&config.color_command)),
            desc: Style::default().fg(ansi_color(&config.color_desc)),
            path: Style::default().fg(ansi_color(&config.color_path)),
            cursor: Style::default().fg(ansi_color(&config.color_cursor)),
            dim: Style::default().fg(ansi_color(&config.color_dim)),
            divider: Style::default().fg(ansi_color(&config.color_border)),
            preview_header: header.add_modifier(Modifier::BOLD),
            selected_bg: ansi_color(&config.color_selected),
        }
    }

    /// A style with the selection background applied.
    pub fn selected(&self, style: Style) -> Style {
        style.bg(self.selected_bg)
    }
}

impl Default for Styles {
    fn default() -> Self {
        Styles::from_config(&Config::default())
    }
}

/// Map an ANSI color code to a terminal color. Classic SGR foreground
/// codes map onto the first 16 palette slots.
fn ansi_color(code: &str) -> Color {
    let mapped = match code {
        "30" => 0,
        "31" => 1,
        "32" => 2,
        "33" => 3,
        "34" => 4,
        "35" => 5,
        "36" => 6,
        "37" => 7,
        "90" => 8,
        "91" => 9,
        "92" => 10,
        "93" => 11,
        "94" => 12,
        "95" => 13,
        "96" => 14,
        "97" => 15,
        other => match other.parse::<u8>() {
            Ok(index) => index,
            Err(_) => return Color::Reset,
        },
    };
    Color::Indexed(mapped)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classic_codes_remap() {
        assert_eq!(ansi_color("36"), Color::Indexed(6));
        assert_eq!(ansi_color("90"), Color::Indexed(8));
    }

    #[test]
    fn test_extended_codes_pass_through() {
        assert_eq!(ansi_color("212"), Color::Indexed(212));
        assert_eq!(ansi_color("0"), Color::Indexed(0));
    }

    #[test]
    fn test_invalid_code_is_reset() {
        assert_eq!(ansi_color("magenta-ish"), Color::Reset);
        assert_eq!(ansi_color("999"), Color::Reset);
    }
}
