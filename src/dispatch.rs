//! Command dispatcher: turns intents into spawned tasks.
//!
//! Tasks never touch the session state. Each one performs its I/O against
//! the storage or generation gateway and reports back with a single typed
//! event on the channel the event loop drains.

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

use crate::ai::{AiClient, StreamEvent};
use crate::app::{AppEvent, Intent};
use crate::db::{Database, DbError};
use crate::models::{Page, Story};

/// Failure modes of the three-step page save. Both writes are attempted
/// even when the first fails, so a partial save is distinguishable.
#[derive(Debug, Error)]
pub enum SavePageError {
    #[error("read next page number: {0}")]
    NextPageNum(#[source] DbError),
    #[error("insert page: {0}")]
    CreatePage(#[source] DbError),
    #[error("update story page count: {0}")]
    IncrementCount(#[source] DbError),
    #[error("insert page: {page}; update story page count: {count}")]
    Both { page: DbError, count: DbError },
}

pub struct Dispatcher {
    db: Database,
    ai: AiClient,
    tx: UnboundedSender<AppEvent>,
}

impl Dispatcher {
    pub fn new(db: Database, ai: AiClient, tx: UnboundedSender<AppEvent>) -> Self {
        Self { db, ai, tx }
    }

    pub fn run(&self, intent: Intent) {
        tracing::debug!(?intent, "dispatching");
        match intent {
            Intent::LoadUsers => {
                let db = self.db.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = db.list_users().await;
                    let _ = tx.send(AppEvent::UsersLoaded(result));
                });
            }

            Intent::LoadStories { user_id } => {
                let db = self.db.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = db.list_stories_by_user(&user_id).await;
                    let _ = tx.send(AppEvent::StoriesLoaded { user_id, result });
                });
            }

            Intent::LoadPages { story_id } => {
                let db = self.db.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = db.list_pages_by_story(&story_id).await;
                    let _ = tx.send(AppEvent::PagesLoaded { story_id, result });
                });
            }

            Intent::SendMessage { message, history } => {
                let ai = self.ai.clone();
                let tx = self.tx.clone();
                let chunk_tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = ai
                        .generate_stream(&message, &history, move |event| {
                            if let StreamEvent::TextDelta(fragment) = event {
                                let _ = chunk_tx.send(AppEvent::AiChunk(fragment));
                            }
                        })
                        .await;
                    let _ = tx.send(AppEvent::AiDone(result));
                });
            }

            Intent::CreateStory { user_id, title } => {
                let db = self.db.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let story = Story::new(user_id, title, "");
                    let result = db.create_story(&story).await.map(|()| story);
                    let _ = tx.send(AppEvent::StoryCreated(result));
                });
            }

            Intent::SavePage {
                story_id,
                prompt,
                completion,
            } => {
                let db = self.db.clone();
                let tx = self.tx.clone();
                tokio::spawn(async move {
                    let result = save_page(&db, &story_id, prompt, completion).await;
                    let _ = tx.send(AppEvent::PageSaved(result));
                });
            }
        }
    }
}

/// Persist one chat exchange: read the next ordinal, insert the page, bump
/// the story's page count. The count update runs even when the insert
/// fails so the two outcomes can be reported together.
async fn save_page(
    db: &Database,
    story_id: &str,
    prompt: String,
    completion: String,
) -> Result<(), SavePageError> {
    let page_num = db
        .next_page_num(story_id)
        .await
        .map_err(SavePageError::NextPageNum)?;

    let page = Page::new(story_id, page_num, prompt, completion);
    let created = db.create_page(&page).await;
    let incremented = db.increment_current_page(story_id).await;

    match (created, incremented) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(page), Ok(())) => Err(SavePageError::CreatePage(page)),
        (Ok(()), Err(count)) => Err(SavePageError::IncrementCount(count)),
        (Err(page), Err(count)) => Err(SavePageError::Both { page, count }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_page_error_reports_both_failures() {
        let err = SavePageError::Both {
            page: DbError::NotFound("story"),
            count: DbError::NotFound("story"),
        };
        let text = err.to_string();
        assert!(text.contains("insert page"));
        assert!(text.contains("update story page count"));
    }
}
