//! Seed-data import from JSON files.
//!
//! Seed data is optional: missing files are tolerated, entries that already
//! exist are skipped, and per-entry failures are logged without aborting the
//! rest of the import.

use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::db::Database;
use crate::models::{Page, Story, User};

pub struct SeedLoader {
    db: Database,
}

impl SeedLoader {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Load users.json, stories.json and pages.json from `dir`, in that
    /// order so foreign keys resolve.
    pub async fn load_from_directory(&self, dir: &Path) -> Result<()> {
        self.load_users(&dir.join("users.json"))
            .await
            .context("load users")?;
        self.load_stories(&dir.join("stories.json"))
            .await
            .context("load stories")?;
        self.load_pages(&dir.join("pages.json"))
            .await
            .context("load pages")?;

        tracing::info!("seed data loaded successfully");
        Ok(())
    }

    async fn load_users(&self, path: &Path) -> Result<()> {
        let Some(users) = read_entries::<User>(path)? else {
            return Ok(());
        };

        for user in users {
            if self.db.get_user(&user.id).await.is_ok() {
                tracing::debug!(id = %user.id, "user already exists, skipping");
                continue;
            }
            match self.db.create_user(&user).await {
                Ok(()) => tracing::info!(id = %user.id, name = user.display_name(), "created user"),
                Err(err) => tracing::error!(id = %user.id, %err, "failed to create user"),
            }
        }
        Ok(())
    }

    async fn load_stories(&self, path: &Path) -> Result<()> {
        let Some(stories) = read_entries::<Story>(path)? else {
            return Ok(());
        };

        for story in stories {
            if self.db.get_story(&story.id).await.is_ok() {
                tracing::debug!(id = %story.id, "story already exists, skipping");
                continue;
            }
            match self.db.create_story(&story).await {
                Ok(()) => tracing::info!(id = %story.id, title = %story.title, "created story"),
                Err(err) => tracing::error!(id = %story.id, %err, "failed to create story"),
            }
        }
        Ok(())
    }

    async fn load_pages(&self, path: &Path) -> Result<()> {
        let Some(pages) = read_entries::<Page>(path)? else {
            return Ok(());
        };

        for page in pages {
            if self.db.get_page(&page.id).await.is_ok() {
                tracing::debug!(id = %page.id, "page already exists, skipping");
                continue;
            }
            match self.db.create_page(&page).await {
                Ok(()) => tracing::info!(
                    id = %page.id,
                    story_id = %page.story_id,
                    page_num = page.page_num,
                    "created page"
                ),
                Err(err) => tracing::error!(id = %page.id, %err, "failed to create page"),
            }
        }
        Ok(())
    }
}

/// Read a JSON array of entries; a missing file yields `None`.
fn read_entries<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "seed file not found");
            return Ok(None);
        }
        Err(err) => return Err(err).context(format!("read {}", path.display())),
    };

    let entries = serde_json::from_slice(&data)
        .with_context(|| format!("parse JSON in {}", path.display()))?;
    Ok(Some(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_entries_tolerates_missing_file() {
        let result = read_entries::<User>(Path::new("/nonexistent/users.json")).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn read_entries_rejects_malformed_json() {
        let dir = std::env::temp_dir().join("primer-seed-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(read_entries::<User>(&path).is_err());
    }

    #[test]
    fn read_entries_parses_entity_arrays() {
        let dir = std::env::temp_dir().join("primer-seed-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("users.json");
        std::fs::write(
            &path,
            r#"[{"id":"u1","name":"Alice","email":"alice@example.com",
                 "email_verified":null,"image":null,"created_at":1,"updated_at":1}]"#,
        )
        .unwrap();

        let users = read_entries::<User>(&path).unwrap().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, "u1");
        assert_eq!(users[0].display_name(), "Alice");
    }
}
