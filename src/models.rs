//! Entity types shared by the storage gateway, the seed importer and the
//! session state: users, their stories, and the prompt/completion pages that
//! make up a story.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// An application user with profile information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub email_verified: Option<i64>,
    pub image: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        let now = unix_now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: Some(name.into()),
            email: Some(email.into()),
            email_verified: None,
            image: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Display-friendly name, falling back to email or id when unset.
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.name.as_deref()
            && !name.is_empty()
        {
            return name;
        }
        if let Some(email) = self.email.as_deref()
            && !email.is_empty()
        {
            return email;
        }
        &self.id
    }

    pub fn display_email(&self) -> &str {
        self.email.as_deref().unwrap_or("")
    }
}

/// An interactive story belonging to a user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Story {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub summary: String,
    pub current_page: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Story {
    pub fn new(
        user_id: impl Into<String>,
        title: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        let now = unix_now();
        Self {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            summary: summary.into(),
            current_page: 1,
            created_at: now,
            updated_at: now,
        }
    }

    /// Page-count label for the story list view.
    pub fn page_count_display(&self) -> String {
        if self.current_page == 1 {
            "1 page".to_string()
        } else {
            format!("{} pages", self.current_page)
        }
    }
}

/// A single page of a story: one user prompt and the AI completion it drew.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Page {
    pub id: String,
    pub story_id: String,
    pub page_num: i64,
    pub prompt: String,
    pub completion: String,
    pub summary: String,
    pub image_path: Option<String>,
    pub audio_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Page {
    pub fn new(
        story_id: impl Into<String>,
        page_num: i64,
        prompt: impl Into<String>,
        completion: impl Into<String>,
    ) -> Self {
        let now = unix_now();
        Self {
            id: Uuid::new_v4().to_string(),
            story_id: story_id.into(),
            page_num,
            prompt: prompt.into(),
            completion: completion.into(),
            summary: String::new(),
            image_path: None,
            audio_path: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_name_then_email_then_id() {
        let user = User::new("Alice", "alice@example.com");
        assert_eq!(user.display_name(), "Alice");

        let mut user = User::new("", "alice@example.com");
        user.name = None;
        assert_eq!(user.display_name(), "alice@example.com");

        let mut user = User::new("", "");
        user.name = None;
        user.email = None;
        assert_eq!(user.display_name(), user.id);
    }

    #[test]
    fn display_name_skips_empty_strings() {
        let user = User::new("", "alice@example.com");
        assert_eq!(user.display_name(), "alice@example.com");
    }

    #[test]
    fn new_story_starts_at_page_one() {
        let story = Story::new("user-1", "Adventure", "");
        assert_eq!(story.current_page, 1);
        assert!(!story.id.is_empty());
        assert_eq!(story.page_count_display(), "1 page");
    }

    #[test]
    fn page_count_display_pluralizes() {
        let mut story = Story::new("user-1", "Adventure", "");
        story.current_page = 3;
        assert_eq!(story.page_count_display(), "3 pages");
    }

    #[test]
    fn new_page_has_empty_summary_and_generated_id() {
        let page = Page::new("story-1", 2, "once upon", "a time");
        assert!(!page.id.is_empty());
        assert_eq!(page.page_num, 2);
        assert_eq!(page.summary, "");
        assert!(page.image_path.is_none());
    }
}
