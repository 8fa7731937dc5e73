//! Views. Rendering is a pure function of the session state and a theme;
//! nothing in here mutates the app.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Position, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Paragraph, Wrap};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, DraftInput, Mode, StoryListState};
use crate::theme::{Theme, spinner_frame};

pub fn draw(frame: &mut Frame, app: &App, theme: &Theme) {
    let [content, status, help] = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(frame.area());

    match app.mode {
        Mode::UserSelect => draw_user_select(frame, app, theme, content),
        Mode::StoryList => draw_story_list(frame, app, theme, content),
        Mode::StoryView => draw_story_view(frame, app, theme, content),
        Mode::Chat => draw_chat(frame, app, theme, content),
    }

    let status_text = app.status.as_deref().unwrap_or("");
    frame.render_widget(
        Paragraph::new(Span::styled(status_text, theme.status)),
        status,
    );

    frame.render_widget(
        Paragraph::new(Span::styled(help_text(app), theme.help)),
        help,
    );
}

fn help_text(app: &App) -> &'static str {
    match app.mode {
        Mode::UserSelect => "↑/↓: navigate • enter: select • q: quit",
        Mode::StoryList => "↑/↓: navigate • enter: select • n: new story • esc: back • q: quit",
        Mode::StoryView => "enter: start chat • esc: back",
        Mode::Chat => "enter: send • esc: back",
    }
}

fn draw_user_select(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let mut lines = vec![
        Line::styled("Illustrated Primer - Select User", theme.header),
        Line::default(),
    ];

    if app.users.is_empty() {
        lines.push(Line::styled(
            "No users found. Run with --seed to load sample data.",
            theme.normal,
        ));
    } else {
        for (i, user) in app.users.iter().enumerate() {
            let text = format!("{} <{}>", user.display_name(), user.display_email());
            lines.push(list_line(text, i == app.selected, theme));
        }
    }

    frame.render_widget(Paragraph::new(lines), area);
}

fn draw_story_list(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let user_name = app
        .current_user
        .as_ref()
        .map(|u| u.display_name())
        .unwrap_or("");

    let mut lines = vec![
        Line::styled(format!("Stories - {user_name}"), theme.header),
        Line::default(),
    ];

    let list_area = if let StoryListState::EnteringTitle(draft) = &app.story_list {
        let [header, entry, rest] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(4),
            Constraint::Min(1),
        ])
        .areas(area);

        frame.render_widget(Paragraph::new(std::mem::take(&mut lines)), header);

        let [label, input] =
            Layout::vertical([Constraint::Length(1), Constraint::Length(3)]).areas(entry);
        frame.render_widget(
            Paragraph::new(Span::styled("New Story Title:", theme.normal)),
            label,
        );
        draw_input_box(frame, theme, input, draft);

        rest
    } else {
        area
    };

    if app.stories.is_empty() {
        lines.push(Line::styled(
            "No stories yet. Press 'n' to create one.",
            theme.normal,
        ));
    } else {
        for (i, story) in app.stories.iter().enumerate() {
            let text = format!("{} - {}", story.title, story.page_count_display());
            lines.push(list_line(text, i == app.selected, theme));
        }
    }

    frame.render_widget(Paragraph::new(lines), list_area);
}

fn draw_story_view(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let title = app
        .current_story
        .as_ref()
        .map(|s| s.title.as_str())
        .unwrap_or("");

    let mut lines = vec![
        Line::styled(format!("Story: {title}"), theme.header),
        Line::default(),
    ];

    if app.pages.is_empty() {
        lines.push(Line::styled(
            "No pages yet. Press Enter to start the story.",
            theme.normal,
        ));
    } else {
        for page in &app.pages {
            lines.push(Line::styled(
                format!("--- Page {} ---", page.page_num),
                theme.page_header,
            ));
            lines.push(Line::default());
            lines.push(message_line("You: ", &page.prompt, theme.user_message));
            lines.push(Line::default());
            lines.push(message_line("AI: ", &page.completion, theme.ai_message));
            lines.push(Line::default());
        }
    }

    frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), area);
}

fn draw_chat(frame: &mut Frame, app: &App, theme: &Theme, area: Rect) {
    let [transcript_area, input_area] =
        Layout::vertical([Constraint::Min(1), Constraint::Length(3)]).areas(area);

    let title = app
        .current_story
        .as_ref()
        .map(|s| s.title.as_str())
        .unwrap_or("");

    let mut lines = vec![
        Line::styled(format!("Chat: {title}"), theme.header),
        Line::default(),
    ];

    for pair in app.transcript.chunks(2) {
        lines.push(message_line("You: ", &pair[0], theme.user_message));
        if let Some(completion) = pair.get(1) {
            lines.push(message_line("AI: ", completion, theme.ai_message));
        }
        lines.push(Line::default());
    }

    // The in-flight exchange, with whatever has streamed in so far.
    if app.is_busy
        && let Some(pending) = &app.pending_input
    {
        lines.push(message_line("You: ", pending, theme.user_message));
        lines.push(Line::from(vec![
            Span::styled("AI: ", theme.ai_message),
            Span::raw(app.streaming_preview.clone()),
            Span::styled(spinner_frame(app.tick), theme.spinner),
        ]));
        lines.push(Line::default());
    }

    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }),
        transcript_area,
    );

    if app.is_busy {
        frame.render_widget(
            Paragraph::new(Span::styled("Waiting for response...", theme.normal)),
            input_area,
        );
    } else {
        draw_input_box(frame, theme, input_area, &app.chat_input);
    }
}

/// Bordered single-line input with the terminal cursor at the edit point.
fn draw_input_box(frame: &mut Frame, theme: &Theme, area: Rect, draft: &DraftInput) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(theme.input_border);
    frame.render_widget(Paragraph::new(draft.text()).block(block), area);

    let prefix: String = draft.text().chars().take(draft.cursor()).collect();
    let x = area.x + 1 + prefix.width() as u16;
    let y = area.y + 1;
    frame.set_cursor_position(Position::new(x.min(area.right().saturating_sub(2)), y));
}

fn list_line(text: String, selected: bool, theme: &Theme) -> Line<'static> {
    if selected {
        Line::styled(format!("▸ {text}"), theme.selected)
    } else {
        Line::styled(format!("  {text}"), theme.normal)
    }
}

fn message_line(prefix: &'static str, body: &str, style: ratatui::style::Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(prefix, style),
        Span::raw(body.to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::AppEvent;
    use crate::models::{Page, Story, User};
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn render(app: &App) -> String {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();
        let theme = Theme::default();
        terminal.draw(|frame| draw(frame, app, &theme)).unwrap();

        let buffer = terminal.backend().buffer();
        let mut text = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                text.push_str(buffer[(x, y)].symbol());
            }
            text.push('\n');
        }
        text
    }

    fn key(app: &mut App, code: KeyCode) {
        app.handle_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn user(id: &str, name: &str) -> User {
        let mut user = User::new(name, format!("{name}@example.com"));
        user.id = id.to_string();
        user
    }

    /// App sitting in the story view of story `s1` with the given pages.
    fn app_in_story_view(pages: Vec<Page>) -> App {
        let mut app = App::new();
        app.handle_event(AppEvent::UsersLoaded(Ok(vec![user("u0", "Alice")])));
        key(&mut app, KeyCode::Enter);
        let mut story = Story::new("u0", "Adventure", "");
        story.id = "s1".to_string();
        app.handle_event(AppEvent::StoriesLoaded {
            user_id: "u0".to_string(),
            result: Ok(vec![story]),
        });
        key(&mut app, KeyCode::Enter);
        app.handle_event(AppEvent::PagesLoaded {
            story_id: "s1".to_string(),
            result: Ok(pages),
        });
        app
    }

    #[test]
    fn empty_user_list_shows_the_seed_hint() {
        let app = App::new();
        let text = render(&app);
        assert!(text.contains("Illustrated Primer - Select User"));
        assert!(text.contains("No users found. Run with --seed to load sample data."));
        assert!(text.contains("q: quit"));
    }

    #[test]
    fn selected_user_carries_the_marker() {
        let mut app = App::new();
        app.handle_event(AppEvent::UsersLoaded(Ok(vec![
            user("u0", "Alice"),
            user("u1", "Bob"),
        ])));
        key(&mut app, KeyCode::Down);

        let text = render(&app);
        assert!(text.contains("  Alice <Alice@example.com>"));
        assert!(text.contains("▸ Bob <Bob@example.com>"));
    }

    #[test]
    fn story_list_shows_titles_page_counts_and_status() {
        let mut app = App::new();
        app.handle_event(AppEvent::UsersLoaded(Ok(vec![user("u0", "Alice")])));
        key(&mut app, KeyCode::Enter);

        let mut story = Story::new("u0", "Adventure", "");
        story.current_page = 3;
        app.handle_event(AppEvent::StoriesLoaded {
            user_id: "u0".to_string(),
            result: Ok(vec![story]),
        });

        let text = render(&app);
        assert!(text.contains("Stories - Alice"));
        assert!(text.contains("▸ Adventure - 3 pages"));
        assert!(text.contains("Loaded 1 stories"));
    }

    #[test]
    fn title_entry_renders_label_and_typed_text() {
        let mut app = App::new();
        app.handle_event(AppEvent::UsersLoaded(Ok(vec![user("u0", "Alice")])));
        key(&mut app, KeyCode::Enter);
        key(&mut app, KeyCode::Char('n'));
        for c in "Dragons".chars() {
            key(&mut app, KeyCode::Char(c));
        }

        let text = render(&app);
        assert!(text.contains("New Story Title:"));
        assert!(text.contains("Dragons"));
        assert!(text.contains("Enter story title:"));
    }

    #[test]
    fn story_view_renders_page_headers_and_roles() {
        let app = app_in_story_view(vec![Page::new(
            "s1",
            1,
            "Tell me a story",
            "Once upon a time",
        )]);

        let text = render(&app);
        assert!(text.contains("Story: Adventure"));
        assert!(text.contains("--- Page 1 ---"));
        assert!(text.contains("You: Tell me a story"));
        assert!(text.contains("AI: Once upon a time"));
        assert!(text.contains("enter: start chat"));
    }

    #[test]
    fn empty_story_view_prompts_to_start() {
        let app = app_in_story_view(vec![]);
        let text = render(&app);
        assert!(text.contains("No pages yet. Press Enter to start the story."));
    }

    #[test]
    fn busy_chat_shows_the_pending_turn_and_waiting_notice() {
        let mut app = app_in_story_view(vec![]);
        key(&mut app, KeyCode::Enter);
        for c in "Hello".chars() {
            key(&mut app, KeyCode::Char(c));
        }
        key(&mut app, KeyCode::Enter);
        app.handle_event(AppEvent::AiChunk("Hi ".to_string()));

        let text = render(&app);
        assert!(text.contains("Chat: Adventure"));
        assert!(text.contains("You: Hello"));
        assert!(text.contains("AI: Hi "));
        assert!(text.contains("Waiting for response..."));
        assert!(text.contains("Thinking..."));
    }
}
