//! Live window over the newest messages of one chat thread.

use crate::error::Result;
use crate::models::{messages_path, Message, CHATS};
use crate::session::Session;
use crate::store::{Direction, DocumentStore, Query, Snapshot, Subscription, Write};

/// How many of the newest messages the feed keeps in view.
pub const FEED_WINDOW: usize = 5;

pub struct MessageFeed {
    store: DocumentStore,
    sender_id: String,
    thread_id: Option<String>,
    subscription: Option<Subscription>,
    messages: Vec<Message>,
    draft: String,
}

impl MessageFeed {
    pub fn new(store: DocumentStore, session: &Session) -> Self {
        MessageFeed {
            store,
            sender_id: session.user_id.clone(),
            thread_id: None,
            subscription: None,
            messages: Vec::new(),
            draft: String::new(),
        }
    }

    pub fn window_query(thread_id: &str) -> Query {
        Query::new(messages_path(thread_id))
            .order_by("timeStamp", Direction::Descending)
            .limit(FEED_WINDOW)
    }

    /// Point the feed at `thread_id`, replacing any previous subscription.
    /// With no thread the feed stays empty and nothing is subscribed.
    pub async fn open(&mut self, thread_id: Option<&str>) -> Result<()> {
        self.close().await;
        let Some(thread_id) = thread_id.filter(|id| !id.is_empty()) else {
            return Ok(());
        };

        let mut subscription = self.store.subscribe(Self::window_query(thread_id)).await?;
        if let Some(snapshot) = subscription.latest() {
            self.apply(snapshot);
        }
        self.thread_id = Some(thread_id.to_string());
        self.subscription = Some(subscription);
        Ok(())
    }

    pub async fn close(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel().await;
        }
        self.thread_id = None;
        self.messages.clear();
    }

    /// Wait until the store pushes a fresher window. Never resolves while no
    /// thread is open; returns `None` if the subscription has ended.
    pub async fn changed(&mut self) -> Option<&[Message]> {
        let subscription = match self.subscription.as_mut() {
            Some(subscription) => subscription,
            None => return std::future::pending().await,
        };
        let snapshot = subscription.next().await?;
        self.apply(snapshot);
        Some(&self.messages)
    }

    fn apply(&mut self, snapshot: Snapshot) {
        let mut messages: Vec<Message> = snapshot
            .docs
            .iter()
            .filter_map(|doc| match Message::from_document(doc) {
                Ok(message) => Some(message),
                Err(e) => {
                    log::warn!("Skipping malformed message {}: {}", doc.id, e);
                    None
                }
            })
            .collect();
        messages.reverse();
        self.messages = messages;
    }

    pub fn thread_id(&self) -> Option<&str> {
        self.thread_id.as_deref()
    }

    /// Current window, oldest first.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.draft = text.into();
    }

    /// Append the draft to the open thread. Returns the new message id, or
    /// `None` when there is no thread or the draft is blank. The draft is
    /// cleared only once the store has acknowledged the write.
    pub async fn send(&mut self) -> Result<Option<String>> {
        let Some(thread_id) = self.thread_id.clone() else {
            return Ok(None);
        };
        if self.draft.trim().is_empty() {
            return Ok(None);
        }

        let text = self.draft.clone();
        let write = Write::new()
            .set("senderId", self.sender_id.as_str())
            .set("text", text.as_str())
            .server_timestamp("timeStamp");
        let id = self.store.add(&messages_path(&thread_id), write).await?;
        self.draft.clear();

        let preview = Write::new()
            .set("lastMessage", text)
            .server_timestamp("lastMessageTimeStamp");
        if let Err(e) = self.store.update(CHATS, &thread_id, preview).await {
            log::warn!("Could not update preview of thread {}: {}", thread_id, e);
        }
        Ok(Some(id))
    }

    pub async fn send_text(&mut self, text: impl Into<String>) -> Result<Option<String>> {
        self.set_draft(text);
        self.send().await
    }
}
