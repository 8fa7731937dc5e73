//! Storage gateway: a thin PostgreSQL wrapper over the three entities.
//!
//! The pool is cheap to clone and shared by every dispatched command; all
//! operations are single round trips with no coordination of their own.

use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::models::{Page, Story, User};

/// Initial schema. Executed on startup; every statement is idempotent.
const MIGRATION_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT,
    email TEXT UNIQUE,
    email_verified BIGINT,
    image TEXT,
    created_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT),
    updated_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT)
);

CREATE TABLE IF NOT EXISTS stories (
    id TEXT PRIMARY KEY NOT NULL,
    user_id TEXT NOT NULL,
    title TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    current_page BIGINT NOT NULL DEFAULT 1,
    created_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT),
    updated_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT),
    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS pages (
    id TEXT PRIMARY KEY NOT NULL,
    story_id TEXT NOT NULL,
    page_num BIGINT NOT NULL,
    prompt TEXT NOT NULL,
    completion TEXT NOT NULL,
    summary TEXT NOT NULL DEFAULT '',
    image_path TEXT,
    audio_path TEXT,
    created_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT),
    updated_at BIGINT NOT NULL DEFAULT (EXTRACT(EPOCH FROM NOW())::BIGINT),
    FOREIGN KEY (story_id) REFERENCES stories(id) ON DELETE CASCADE,
    UNIQUE(story_id, page_num)
);

CREATE INDEX IF NOT EXISTS idx_stories_user_id ON stories(user_id);
CREATE INDEX IF NOT EXISTS idx_stories_user_created ON stories(user_id, created_at);
CREATE INDEX IF NOT EXISTS idx_pages_story_id ON pages(story_id);
CREATE INDEX IF NOT EXISTS idx_pages_story_page ON pages(story_id, page_num);
"#;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Shared handle to the connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect and verify the connection with a ping.
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&pool).await?;

        tracing::info!(max_connections = 5, "database connection established");
        Ok(Self { pool })
    }

    pub async fn migrate(&self) -> Result<(), DbError> {
        sqlx::raw_sql(MIGRATION_SQL).execute(&self.pool).await?;
        tracing::info!("database migrations completed");
        Ok(())
    }

    pub async fn list_users(&self) -> Result<Vec<User>, DbError> {
        let users = sqlx::query_as::<_, User>(
            "SELECT id, name, email, email_verified, image, created_at, updated_at \
             FROM users ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(users)
    }

    pub async fn get_user(&self, id: &str) -> Result<User, DbError> {
        sqlx::query_as::<_, User>(
            "SELECT id, name, email, email_verified, image, created_at, updated_at \
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound("user"))
    }

    pub async fn create_user(&self, user: &User) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO users (id, name, email, email_verified, image, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&user.id)
        .bind(&user.name)
        .bind(&user.email)
        .bind(user.email_verified)
        .bind(&user.image)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Stories for a user, newest first.
    pub async fn list_stories_by_user(&self, user_id: &str) -> Result<Vec<Story>, DbError> {
        let stories = sqlx::query_as::<_, Story>(
            "SELECT id, user_id, title, summary, current_page, created_at, updated_at \
             FROM stories WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(stories)
    }

    pub async fn get_story(&self, id: &str) -> Result<Story, DbError> {
        sqlx::query_as::<_, Story>(
            "SELECT id, user_id, title, summary, current_page, created_at, updated_at \
             FROM stories WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound("story"))
    }

    pub async fn create_story(&self, story: &Story) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO stories (id, user_id, title, summary, current_page, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(&story.id)
        .bind(&story.user_id)
        .bind(&story.title)
        .bind(&story.summary)
        .bind(story.current_page)
        .bind(story.created_at)
        .bind(story.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn increment_current_page(&self, story_id: &str) -> Result<(), DbError> {
        let result = sqlx::query(
            "UPDATE stories SET current_page = current_page + 1, updated_at = $2 WHERE id = $1",
        )
        .bind(story_id)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("story"));
        }
        Ok(())
    }

    /// Pages for a story, in page-number order.
    pub async fn list_pages_by_story(&self, story_id: &str) -> Result<Vec<Page>, DbError> {
        let pages = sqlx::query_as::<_, Page>(
            "SELECT id, story_id, page_num, prompt, completion, summary, image_path, audio_path, \
             created_at, updated_at \
             FROM pages WHERE story_id = $1 ORDER BY page_num ASC",
        )
        .bind(story_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }

    pub async fn get_page(&self, id: &str) -> Result<Page, DbError> {
        sqlx::query_as::<_, Page>(
            "SELECT id, story_id, page_num, prompt, completion, summary, image_path, audio_path, \
             created_at, updated_at \
             FROM pages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(DbError::NotFound("page"))
    }

    pub async fn create_page(&self, page: &Page) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO pages (id, story_id, page_num, prompt, completion, summary, image_path, \
             audio_path, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(&page.id)
        .bind(&page.story_id)
        .bind(page.page_num)
        .bind(&page.prompt)
        .bind(&page.completion)
        .bind(&page.summary)
        .bind(&page.image_path)
        .bind(&page.audio_path)
        .bind(page.created_at)
        .bind(page.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Next ordinal for a story: current max + 1, never reused.
    pub async fn next_page_num(&self, story_id: &str) -> Result<i64, DbError> {
        let next: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(page_num), 0) + 1 FROM pages WHERE story_id = $1")
                .bind(story_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(next)
    }
}
