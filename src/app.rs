//! Session state and transition engine.
//!
//! `App` owns every piece of UI-visible state and no I/O. Key presses and
//! completed-operation events are folded in through `handle_key` and
//! `handle_event`; both return the list of intents the caller must hand to
//! the dispatcher. Keeping the transitions pure keeps them unit-testable
//! without a terminal, a database, or a network.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::ai::AiError;
use crate::db::DbError;
use crate::dispatch::SavePageError;
use crate::models::{Page, Story, User};

/// Current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    UserSelect,
    StoryList,
    StoryView,
    Chat,
}

/// Whether the story list is browsing or collecting a new story title.
#[derive(Debug)]
pub enum StoryListState {
    Browsing,
    EnteringTitle(DraftInput),
}

/// Asynchronous work requested by a transition. The dispatcher owns the
/// execution; the state machine only names what should happen.
#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    LoadUsers,
    LoadStories {
        user_id: String,
    },
    LoadPages {
        story_id: String,
    },
    SendMessage {
        message: String,
        history: Vec<String>,
    },
    CreateStory {
        user_id: String,
        title: String,
    },
    SavePage {
        story_id: String,
        prompt: String,
        completion: String,
    },
}

/// Result of a completed (or failed) asynchronous operation, applied to the
/// state in arrival order.
#[derive(Debug)]
pub enum AppEvent {
    UsersLoaded(Result<Vec<User>, DbError>),
    StoriesLoaded {
        user_id: String,
        result: Result<Vec<Story>, DbError>,
    },
    PagesLoaded {
        story_id: String,
        result: Result<Vec<Page>, DbError>,
    },
    AiChunk(String),
    AiDone(Result<String, AiError>),
    StoryCreated(Result<Story, DbError>),
    PageSaved(Result<(), SavePageError>),
}

/// Single-line text entry with a character-indexed cursor.
#[derive(Debug, Default)]
pub struct DraftInput {
    text: String,
    cursor: usize,
}

impl DraftInput {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn take_text(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.text)
    }

    fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    fn move_cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_cursor_right(&mut self) {
        self.cursor = self
            .cursor
            .saturating_add(1)
            .min(self.text.chars().count());
    }

    fn reset_cursor(&mut self) {
        self.cursor = 0;
    }

    fn move_cursor_end(&mut self) {
        self.cursor = self.text.chars().count();
    }

    fn enter_char(&mut self, new_char: char) {
        let index = self.byte_index();
        self.text.insert(index, new_char);
        self.move_cursor_right();
    }

    fn delete_char(&mut self) {
        if self.cursor == 0 {
            return;
        }

        let before = self.text.chars().take(self.cursor - 1);
        let after = self.text.chars().skip(self.cursor);
        self.text = before.chain(after).collect();
        self.move_cursor_left();
    }

    fn byte_index(&self) -> usize {
        self.text
            .char_indices()
            .map(|(i, _)| i)
            .nth(self.cursor)
            .unwrap_or(self.text.len())
    }
}

/// The session state.
pub struct App {
    pub(crate) mode: Mode,
    pub(crate) story_list: StoryListState,

    pub(crate) users: Vec<User>,
    pub(crate) stories: Vec<Story>,
    pub(crate) pages: Vec<Page>,
    pub(crate) current_user: Option<User>,
    pub(crate) current_story: Option<Story>,

    pub(crate) selected: usize,
    /// Prompt/completion pairs, flattened; always even-length.
    pub(crate) transcript: Vec<String>,
    pub(crate) chat_input: DraftInput,
    /// The message whose response is in flight; cleared on completion.
    pub(crate) pending_input: Option<String>,
    pub(crate) streaming_preview: String,
    pub(crate) is_busy: bool,
    pub(crate) status: Option<String>,

    should_quit: bool,
    pub(crate) tick: usize,
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

impl App {
    pub fn new() -> Self {
        Self {
            mode: Mode::UserSelect,
            story_list: StoryListState::Browsing,
            users: Vec::new(),
            stories: Vec::new(),
            pages: Vec::new(),
            current_user: None,
            current_story: None,
            selected: 0,
            transcript: Vec::new(),
            chat_input: DraftInput::default(),
            pending_input: None,
            streaming_preview: String::new(),
            is_busy: false,
            status: None,
            should_quit: false,
            tick: 0,
        }
    }

    /// Work to dispatch before the first frame.
    pub fn on_start(&self) -> Vec<Intent> {
        vec![Intent::LoadUsers]
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    /// Advance the spinner animation.
    pub fn tick(&mut self) {
        self.tick = self.tick.wrapping_add(1);
    }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<Intent> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Vec::new();
        }

        match self.mode {
            Mode::UserSelect => self.handle_user_select_key(key),
            Mode::StoryList => self.handle_story_list_key(key),
            Mode::StoryView => self.handle_story_view_key(key),
            Mode::Chat => self.handle_chat_key(key),
        }
    }

    fn handle_user_select_key(&mut self, key: KeyEvent) -> Vec<Intent> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.users.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(user) = self.users.get(self.selected).cloned() {
                    let user_id = user.id.clone();
                    self.current_user = Some(user);
                    self.mode = Mode::StoryList;
                    self.story_list = StoryListState::Browsing;
                    self.selected = 0;
                    return vec![Intent::LoadStories { user_id }];
                }
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_story_list_key(&mut self, key: KeyEvent) -> Vec<Intent> {
        if matches!(self.story_list, StoryListState::EnteringTitle(_)) {
            return self.handle_title_entry_key(key);
        }

        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = self.selected.saturating_sub(1);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.stories.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(story) = self.stories.get(self.selected).cloned() {
                    let story_id = story.id.clone();
                    self.current_story = Some(story);
                    self.mode = Mode::StoryView;
                    return vec![Intent::LoadPages { story_id }];
                }
            }
            KeyCode::Char('n') => {
                self.story_list = StoryListState::EnteringTitle(DraftInput::default());
                self.status = Some("Enter story title:".to_string());
            }
            KeyCode::Esc => {
                self.mode = Mode::UserSelect;
                self.selected = 0;
                self.current_user = None;
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_title_entry_key(&mut self, key: KeyEvent) -> Vec<Intent> {
        let StoryListState::EnteringTitle(draft) = &mut self.story_list else {
            return Vec::new();
        };

        match key.code {
            KeyCode::Esc => {
                self.story_list = StoryListState::Browsing;
                self.status = None;
            }
            KeyCode::Enter => {
                let title = draft.text().trim().to_string();
                if title.is_empty() {
                    return Vec::new();
                }
                self.story_list = StoryListState::Browsing;
                self.status = None;
                if let Some(user) = &self.current_user {
                    return vec![Intent::CreateStory {
                        user_id: user.id.clone(),
                        title,
                    }];
                }
            }
            KeyCode::Backspace => draft.delete_char(),
            KeyCode::Left => draft.move_cursor_left(),
            KeyCode::Right => draft.move_cursor_right(),
            KeyCode::Home => draft.reset_cursor(),
            KeyCode::End => draft.move_cursor_end(),
            KeyCode::Char(c) => draft.enter_char(c),
            _ => {}
        }
        Vec::new()
    }

    fn handle_story_view_key(&mut self, key: KeyEvent) -> Vec<Intent> {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Enter => {
                self.mode = Mode::Chat;
                self.streaming_preview.clear();
            }
            KeyCode::Esc => {
                self.mode = Mode::StoryList;
                self.selected = 0;
                self.current_story = None;
                self.pages.clear();
                self.transcript.clear();
            }
            _ => {}
        }
        Vec::new()
    }

    fn handle_chat_key(&mut self, key: KeyEvent) -> Vec<Intent> {
        // One in-flight message at a time; everything else waits.
        if self.is_busy {
            return Vec::new();
        }

        match key.code {
            KeyCode::Esc => {
                if self.chat_input.is_empty() {
                    self.mode = Mode::StoryView;
                } else {
                    self.chat_input.clear();
                }
            }
            KeyCode::Enter => {
                if !self.chat_input.is_empty() {
                    let message = self.chat_input.take_text();
                    self.pending_input = Some(message.clone());
                    self.streaming_preview.clear();
                    self.is_busy = true;
                    self.status = Some("Thinking...".to_string());
                    return vec![Intent::SendMessage {
                        message,
                        history: self.transcript.clone(),
                    }];
                }
            }
            KeyCode::Backspace => self.chat_input.delete_char(),
            KeyCode::Left => self.chat_input.move_cursor_left(),
            KeyCode::Right => self.chat_input.move_cursor_right(),
            KeyCode::Home => self.chat_input.reset_cursor(),
            KeyCode::End => self.chat_input.move_cursor_end(),
            KeyCode::Char(c) => self.chat_input.enter_char(c),
            _ => {}
        }
        Vec::new()
    }

    pub fn handle_event(&mut self, event: AppEvent) -> Vec<Intent> {
        match event {
            AppEvent::UsersLoaded(Ok(users)) => {
                self.status = Some(format!("Loaded {} users", users.len()));
                self.users = users;
                self.clamp_selection(self.users.len());
            }
            AppEvent::UsersLoaded(Err(err)) => {
                tracing::error!(%err, "failed to load users");
                self.status = Some(format!("Error loading users: {err}"));
            }

            AppEvent::StoriesLoaded { user_id, result } => {
                if self.current_user.as_ref().map(|u| u.id.as_str()) != Some(user_id.as_str()) {
                    tracing::debug!(%user_id, "ignoring stories for a no-longer-current user");
                    return Vec::new();
                }
                match result {
                    Ok(stories) => {
                        self.status = Some(format!("Loaded {} stories", stories.len()));
                        self.stories = stories;
                        self.selected = 0;
                    }
                    Err(err) => {
                        tracing::error!(%err, "failed to load stories");
                        self.status = Some(format!("Error loading stories: {err}"));
                    }
                }
            }

            AppEvent::PagesLoaded { story_id, result } => {
                if self.current_story.as_ref().map(|s| s.id.as_str()) != Some(story_id.as_str()) {
                    tracing::debug!(%story_id, "ignoring pages for a no-longer-current story");
                    return Vec::new();
                }
                match result {
                    Ok(pages) => {
                        self.status = Some(format!("Loaded {} pages", pages.len()));
                        self.transcript.clear();
                        for page in &pages {
                            self.transcript.push(page.prompt.clone());
                            self.transcript.push(page.completion.clone());
                        }
                        self.pages = pages;
                    }
                    Err(err) => {
                        tracing::error!(%err, "failed to load pages");
                        self.status = Some(format!("Error loading pages: {err}"));
                    }
                }
            }

            AppEvent::AiChunk(fragment) => {
                if self.is_busy {
                    self.streaming_preview.push_str(&fragment);
                }
            }

            AppEvent::AiDone(Ok(completion)) => {
                self.is_busy = false;
                self.streaming_preview.clear();
                self.status = Some("Response received".to_string());
                if let Some(prompt) = self.pending_input.take() {
                    self.transcript.push(prompt.clone());
                    self.transcript.push(completion.clone());
                    if let Some(story) = &self.current_story {
                        return vec![Intent::SavePage {
                            story_id: story.id.clone(),
                            prompt,
                            completion,
                        }];
                    }
                }
            }
            AppEvent::AiDone(Err(err)) => {
                tracing::error!(%err, "AI request failed");
                self.is_busy = false;
                self.streaming_preview.clear();
                self.pending_input = None;
                self.status = Some(format!("AI Error: {err}"));
            }

            AppEvent::StoryCreated(Ok(story)) => {
                self.status = Some(format!("Created story: {}", story.title));
                self.current_story = Some(story.clone());
                self.stories.insert(0, story);
                self.selected = 0;
            }
            AppEvent::StoryCreated(Err(err)) => {
                tracing::error!(%err, "failed to create story");
                self.status = Some(format!("Error creating story: {err}"));
            }

            AppEvent::PageSaved(Ok(())) => {
                tracing::info!("page saved");
            }
            AppEvent::PageSaved(Err(err)) => {
                tracing::error!(%err, "failed to save page");
            }
        }
        Vec::new()
    }

    fn clamp_selection(&mut self, len: usize) {
        if self.selected >= len {
            self.selected = len.saturating_sub(1);
        }
    }
}
