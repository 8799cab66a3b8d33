use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{Kitchen, KITCHENS};
use crate::store::{DocumentStore, Write};

/// The signed-in user, passed to whatever acts on their behalf.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub display_name: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Session {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}

/// A session whose user owns a kitchen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerContext {
    pub seller_id: String,
    pub kitchen_name: String,
}

impl SellerContext {
    /// Look up the kitchen owned by the session's user, if any.
    pub async fn load(store: &DocumentStore, session: &Session) -> Result<Option<Self>> {
        let Some(doc) = store.get(KITCHENS, &session.user_id).await? else {
            return Ok(None);
        };
        let kitchen = Kitchen::from_document(&doc)?;
        Ok(Some(SellerContext {
            seller_id: kitchen.id,
            kitchen_name: kitchen.kitchen_name,
        }))
    }
}

/// Create or rename the kitchen owned by the session's user.
pub async fn register_kitchen(
    store: &DocumentStore,
    session: &Session,
    kitchen_name: &str,
) -> Result<SellerContext> {
    store
        .set(
            KITCHENS,
            &session.user_id,
            Write::new().set("kitchenName", kitchen_name),
        )
        .await?;
    log::info!("User {} registered kitchen {:?}", session.user_id, kitchen_name);
    Ok(SellerContext {
        seller_id: session.user_id.clone(),
        kitchen_name: kitchen_name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_without_kitchen() {
        let store = DocumentStore::in_memory();
        let session = Session::new("buyer-1", "Ravi");
        assert!(SellerContext::load(&store, &session).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_register_then_load() {
        let store = DocumentStore::in_memory();
        let session = Session::new("seller-1", "Lakshmi");
        let registered = register_kitchen(&store, &session, "Amma's Kitchen").await.unwrap();

        let loaded = SellerContext::load(&store, &session).await.unwrap().unwrap();
        assert_eq!(loaded, registered);
        assert_eq!(loaded.kitchen_name, "Amma's Kitchen");
        assert_eq!(loaded.seller_id, "seller-1");
    }
}
