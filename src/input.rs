//! Terminal event polling. Key presses are translated by the session state
//! itself; this module only pulls events off the wire without blocking the
//! event loop for long.

use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyEventKind};

use crate::app::{App, Intent};

/// Poll for one terminal event and feed it to the app. Returns the intents
/// the key produced, empty when nothing happened.
pub fn handle_events(app: &mut App) -> Result<Vec<Intent>> {
    if event::poll(Duration::from_millis(100))? {
        match event::read()? {
            // Only key presses, not releases; matters on Windows.
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                return Ok(app.handle_key(key));
            }
            // The next draw reflows to the new size.
            Event::Resize(_, _) => {}
            _ => {}
        }
    }
    Ok(Vec::new())
}
