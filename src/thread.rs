//! Find or create the chat thread between a buyer and a seller.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Thread, CHATS};
use crate::store::{DocumentStore, Filter, Query, Write};

/// Everything a chat view needs to open the resolved thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatLink {
    pub seller_id: String,
    pub buyer_id: String,
    pub thread_id: String,
    pub buyer_name: String,
    pub created: bool,
}

/// Id for a new thread between two users; the same for either argument order.
/// The length prefix keeps ids containing the separator from colliding.
pub fn pair_key(a: &str, b: &str) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{}:{lo}|{hi}", lo.len())
}

pub struct ThreadResolver {
    store: DocumentStore,
}

impl ThreadResolver {
    pub fn new(store: DocumentStore) -> Self {
        ThreadResolver { store }
    }

    /// The store can only filter on one array membership, so fetch the
    /// buyer's threads and pick out the one shared with the seller here.
    /// Candidates come back in id order; the last match wins.
    pub async fn find(&self, seller_id: &str, buyer_id: &str) -> Result<Option<Thread>> {
        let query = Query::new(CHATS).filter(Filter::array_contains("users", buyer_id));
        let candidates = self.store.query(&query).await?;
        let mut found = None;
        for doc in &candidates {
            match Thread::from_document(doc) {
                Ok(thread) if thread.is_between(seller_id, buyer_id) => found = Some(thread),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping malformed thread {}: {}", doc.id, e),
            }
        }
        Ok(found)
    }

    /// Reuse the pair's thread or create it. Blank ids resolve to nothing.
    pub async fn resolve(
        &self,
        seller_id: &str,
        buyer_id: &str,
        buyer_name: &str,
    ) -> Result<Option<ChatLink>> {
        if seller_id.is_empty() || buyer_id.is_empty() {
            return Ok(None);
        }

        let link = |thread_id: String, created: bool| ChatLink {
            seller_id: seller_id.to_string(),
            buyer_id: buyer_id.to_string(),
            thread_id,
            buyer_name: buyer_name.to_string(),
            created,
        };

        if let Some(thread) = self.find(seller_id, buyer_id).await? {
            return Ok(Some(link(thread.id, false)));
        }

        // A racing resolver for the same pair lands on the same id, and only
        // one of the two creates succeeds.
        let thread_id = pair_key(seller_id, buyer_id);
        let write = Write::new()
            .set("users", vec![buyer_id, seller_id])
            .set("lastMessage", "")
            .set("lastMessageTimeStamp", Value::Null);
        let created = self.store.create_if_absent(CHATS, &thread_id, write).await?;
        if created {
            log::info!("Opened thread {} between {} and {}", thread_id, seller_id, buyer_id);
        } else {
            self.check_owner(&thread_id, seller_id, buyer_id).await?;
        }
        Ok(Some(link(thread_id, created)))
    }

    /// An existing document at the pair id must hold exactly this pair.
    async fn check_owner(&self, thread_id: &str, seller_id: &str, buyer_id: &str) -> Result<()> {
        let owned = match self.store.get(CHATS, thread_id).await? {
            Some(doc) => Thread::from_document(&doc)?.is_between(seller_id, buyer_id),
            None => false,
        };
        if owned {
            return Ok(());
        }
        log::error!(
            "Thread {} is not between {} and {}",
            thread_id,
            seller_id,
            buyer_id
        );
        Err(Error::ThreadMismatch {
            id: thread_id.to_string(),
            seller_id: seller_id.to_string(),
            buyer_id: buyer_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn thread_count(store: &DocumentStore) -> usize {
        store.query(&Query::new(CHATS)).await.unwrap().len()
    }

    #[test]
    fn test_pair_key_is_order_independent() {
        assert_eq!(pair_key("seller", "buyer"), pair_key("buyer", "seller"));
        assert_eq!(pair_key("a", "b"), "1:a|b");
    }

    #[test]
    fn test_pair_key_keeps_separators_apart() {
        assert_ne!(pair_key("c", "a_b"), pair_key("b_c", "a"));
        assert_ne!(pair_key("a|b", "c"), pair_key("a", "b|c"));
        assert_ne!(pair_key("1:a", "b"), pair_key("1:a|b", ""));
    }

    #[tokio::test]
    async fn test_pairs_with_overlapping_ids_get_their_own_threads() {
        let store = DocumentStore::in_memory();
        let resolver = ThreadResolver::new(store.clone());

        let first = resolver.resolve("c", "a_b", "Asha").await.unwrap().unwrap();
        let second = resolver.resolve("b_c", "a", "Arun").await.unwrap().unwrap();

        assert!(first.created);
        assert!(second.created);
        assert_ne!(first.thread_id, second.thread_id);

        let thread = resolver.find("b_c", "a").await.unwrap().unwrap();
        assert_eq!(thread.id, second.thread_id);
        assert!(thread.is_between("b_c", "a"));
        assert_eq!(thread_count(&store).await, 2);
    }

    #[tokio::test]
    async fn test_foreign_document_at_pair_id_is_rejected() {
        let store = DocumentStore::in_memory();
        store
            .set(
                CHATS,
                &pair_key("seller", "buyer"),
                Write::new().set("users", vec!["seller", "intruder"]),
            )
            .await
            .unwrap();

        let resolver = ThreadResolver::new(store.clone());
        let err = resolver.resolve("seller", "buyer", "Ravi").await.unwrap_err();
        assert!(matches!(err, Error::ThreadMismatch { .. }));
    }

    #[tokio::test]
    async fn test_find_keeps_last_matching_thread() {
        let store = DocumentStore::in_memory();
        for id in ["t1", "t2"] {
            store
                .set(CHATS, id, Write::new().set("users", vec!["buyer", "seller"]))
                .await
                .unwrap();
        }

        let resolver = ThreadResolver::new(store);
        let thread = resolver.find("seller", "buyer").await.unwrap().unwrap();
        assert_eq!(thread.id, "t2");
    }

    #[tokio::test]
    async fn test_resolve_twice_gives_one_thread() {
        let store = DocumentStore::in_memory();
        let resolver = ThreadResolver::new(store.clone());

        let first = resolver.resolve("seller", "buyer", "Ravi").await.unwrap().unwrap();
        let second = resolver.resolve("seller", "buyer", "Ravi").await.unwrap().unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.thread_id, second.thread_id);
        assert_eq!(thread_count(&store).await, 1);

        let thread = resolver.find("seller", "buyer").await.unwrap().unwrap();
        assert_eq!(thread.users, vec!["buyer", "seller"]);
        assert_eq!(thread.last_message, "");
        assert_eq!(thread.last_message_time_stamp, None);
    }

    #[tokio::test]
    async fn test_concurrent_resolution_creates_one_thread() {
        let store = DocumentStore::in_memory();
        let from_seller = ThreadResolver::new(store.clone());
        let from_buyer = ThreadResolver::new(store.clone());

        let (a, b) = tokio::join!(
            from_seller.resolve("seller", "buyer", "Ravi"),
            from_buyer.resolve("seller", "buyer", "Ravi"),
        );
        let (a, b) = (a.unwrap().unwrap(), b.unwrap().unwrap());

        assert_eq!(a.thread_id, b.thread_id);
        assert!(a.created ^ b.created);
        assert_eq!(thread_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_existing_thread_with_random_id_is_reused() {
        let store = DocumentStore::in_memory();
        let existing = store
            .add(
                CHATS,
                Write::new()
                    .set("users", vec!["buyer", "seller"])
                    .set("lastMessage", "see you at 7"),
            )
            .await
            .unwrap();

        let resolver = ThreadResolver::new(store.clone());
        let link = resolver.resolve("seller", "buyer", "Ravi").await.unwrap().unwrap();
        assert_eq!(link.thread_id, existing);
        assert!(!link.created);
        assert_eq!(thread_count(&store).await, 1);
    }

    #[tokio::test]
    async fn test_buyer_threads_with_other_sellers_are_skipped() {
        let store = DocumentStore::in_memory();
        store
            .add(CHATS, Write::new().set("users", vec!["buyer", "other-seller"]))
            .await
            .unwrap();

        let resolver = ThreadResolver::new(store.clone());
        let link = resolver.resolve("seller", "buyer", "Ravi").await.unwrap().unwrap();
        assert!(link.created);
        assert_eq!(link.thread_id, pair_key("seller", "buyer"));
        assert_eq!(thread_count(&store).await, 2);
    }

    #[tokio::test]
    async fn test_blank_ids_resolve_to_nothing() {
        let store = DocumentStore::in_memory();
        let resolver = ThreadResolver::new(store.clone());
        assert!(resolver.resolve("", "buyer", "Ravi").await.unwrap().is_none());
        assert!(resolver.resolve("seller", "", "Ravi").await.unwrap().is_none());
        assert_eq!(thread_count(&store).await, 0);
    }
}
