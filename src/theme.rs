//! Style configuration for the views. A `Theme` is built once at startup and
//! passed into the renderer, so the views stay pure functions of state.

use ratatui::style::{Color, Modifier, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub selected: Style,
    pub normal: Style,
    pub status: Style,
    pub help: Style,
    pub user_message: Style,
    pub ai_message: Style,
    pub page_header: Style,
    pub input_border: Style,
    pub spinner: Style,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header: Style::default()
                .fg(Color::Indexed(205))
                .add_modifier(Modifier::BOLD),
            selected: Style::default()
                .fg(Color::Indexed(205))
                .add_modifier(Modifier::BOLD),
            normal: Style::default(),
            status: Style::default().fg(Color::Indexed(82)),
            help: Style::default().fg(Color::Indexed(241)),
            user_message: Style::default()
                .fg(Color::Indexed(39))
                .add_modifier(Modifier::BOLD),
            ai_message: Style::default().fg(Color::Indexed(170)),
            page_header: Style::default()
                .fg(Color::Indexed(62))
                .add_modifier(Modifier::BOLD),
            input_border: Style::default().fg(Color::Indexed(205)),
            spinner: Style::default().fg(Color::Indexed(205)),
        }
    }
}

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Spinner glyph for an animation tick.
pub fn spinner_frame(tick: usize) -> &'static str {
    SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spinner_wraps_around() {
        assert_eq!(spinner_frame(0), spinner_frame(SPINNER_FRAMES.len()));
        assert_ne!(spinner_frame(0), spinner_frame(1));
    }
}
