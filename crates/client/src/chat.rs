//! Team chat.
//!
//! History is the last hundred messages in chronological order. Author
//! names are not stored on the message rows; after each read the missing
//! names are filled in with one batched lookup against `users`.

use std::collections::HashMap;

use serde_json::json;

use skypanel_core::types::DbId;
use skypanel_core::CoreError;
use skypanel_events::{refetch, ChangeFeed, ChangeKind, EventFilter};
use skypanel_gateway::{DataGateway, Direction, Predicate, ReadQuery};
use tokio_util::sync::CancellationToken;

use crate::collections;
use crate::model::{parse_row, parse_rows, ChatMessage, User};

/// How much history one load pulls in.
const HISTORY_LIMIT: usize = 100;

pub struct ChatRoom<G> {
    gateway: std::sync::Arc<G>,
    viewer_id: DbId,
}

impl<G: DataGateway> ChatRoom<G> {
    pub fn new(gateway: std::sync::Arc<G>, viewer_id: DbId) -> Self {
        Self { gateway, viewer_id }
    }

    /// The most recent history, oldest first, with author names attached.
    pub async fn history(&self) -> Result<Vec<ChatMessage>, CoreError> {
        // Read newest-first with the limit, then flip, so the cap trims the
        // oldest messages rather than the newest.
        let rows = self
            .gateway
            .read(
                ReadQuery::from(collections::CHAT_MESSAGES)
                    .order_by("created_at", Direction::Desc)
                    .limit(HISTORY_LIMIT),
            )
            .await
            .map_err(CoreError::from)?;
        let mut messages: Vec<ChatMessage> = parse_rows(rows)?;
        messages.reverse();

        self.attach_authors(&mut messages).await?;
        Ok(messages)
    }

    /// Post a message.
    pub async fn send(&self, text: &str) -> Result<ChatMessage, CoreError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(CoreError::Validation("Message is empty".into()));
        }

        let row = self
            .gateway
            .insert(
                collections::CHAT_MESSAGES,
                json!({
                    "user_id": self.viewer_id,
                    "message": text,
                }),
            )
            .await
            .map_err(CoreError::from)?;
        parse_row(row)
    }

    /// Fill in `author_name` for every message that lacks one, with a
    /// single membership read over the distinct author ids.
    async fn attach_authors(&self, messages: &mut [ChatMessage]) -> Result<(), CoreError> {
        let mut ids: Vec<DbId> = messages
            .iter()
            .filter(|m| m.author_name.is_none())
            .map(|m| m.user_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.is_empty() {
            return Ok(());
        }

        let rows = self
            .gateway
            .read(ReadQuery::from(collections::USERS).filter(Predicate::In(
                "id".into(),
                ids.iter().map(|id| json!(id)).collect(),
            )))
            .await
            .map_err(CoreError::from)?;
        let users: Vec<User> = parse_rows(rows)?;
        let names: HashMap<DbId, String> =
            users.into_iter().map(|u| (u.id, u.full_name)).collect();

        for message in messages.iter_mut() {
            if message.author_name.is_none() {
                message.author_name = names.get(&message.user_id).cloned();
            }
        }
        Ok(())
    }

}

/// The change-feed filter for new messages.
pub fn message_filter() -> EventFilter {
    EventFilter::collection(collections::CHAT_MESSAGES).kind(ChangeKind::Insert)
}

/// Reload chat history whenever a new message lands.
pub fn watch<F, Fut>(
    feed: &ChangeFeed,
    cancel: CancellationToken,
    on_change: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn() -> Fut + Send + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let subscription = feed.subscribe(message_filter());
    refetch::spawn(subscription, cancel, on_change)
}
