use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{CustomerDetails, LineItem, Order, OrderStatus, PaymentStatus, ORDERS};
use crate::store::{DocumentStore, Write};

/// What a buyer submits at checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrder {
    #[serde(rename = "kitchenId")]
    pub kitchen_id: String,
    #[serde(rename = "kitchenName")]
    pub kitchen_name: String,
    #[serde(rename = "buyerId")]
    pub buyer_id: String,
    #[serde(rename = "paymentMethod")]
    pub payment_method: String,
    #[serde(rename = "CustomerDetails")]
    pub customer: CustomerDetails,
    #[serde(rename = "ItemsDetails")]
    pub items: Vec<LineItem>,
}

/// Short human-readable reference printed on order cards.
fn order_ref_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ORD-{}", id[..8].to_ascii_uppercase())
}

pub struct OrderBook {
    store: DocumentStore,
}

impl OrderBook {
    pub fn new(store: DocumentStore) -> Self {
        OrderBook { store }
    }

    /// Record a new order as pending and unpaid.
    pub async fn place(&self, order: NewOrder) -> Result<String> {
        let write = Write::from_value(&order)?
            .set("orderRefId", order_ref_id())
            .set("OrderStatus", OrderStatus::Pending.as_str())
            .set("paymentStatus", PaymentStatus::Pending.as_str())
            .server_timestamp("createdAt");
        let id = self.store.add(ORDERS, write).await?;
        log::info!("Order {} placed with {} by {}", id, order.kitchen_name, order.buyer_id);
        Ok(id)
    }

    pub async fn confirm_payment(&self, order_id: &str) -> Result<()> {
        self.store
            .update(
                ORDERS,
                order_id,
                Write::new().set("paymentStatus", PaymentStatus::Done.as_str()),
            )
            .await
    }

    pub async fn get(&self, order_id: &str) -> Result<Option<Order>> {
        match self.store.get(ORDERS, order_id).await? {
            Some(doc) => Ok(Some(Order::from_document(&doc)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn sample() -> NewOrder {
        NewOrder {
            kitchen_id: "seller-1".into(),
            kitchen_name: "Amma's Kitchen".into(),
            buyer_id: "buyer-1".into(),
            payment_method: "COD".into(),
            customer: CustomerDetails {
                username: "Ravi".into(),
                address: "12 MG Road".into(),
                pin_code: "560001".into(),
            },
            items: vec![LineItem {
                item_name: "Masala Dosa".into(),
                quantity: 2,
                price: 60,
            }],
        }
    }

    #[tokio::test]
    async fn test_place_starts_pending_and_unpaid() {
        let book = OrderBook::new(DocumentStore::in_memory());
        let id = book.place(sample()).await.unwrap();

        let order = book.get(&id).await.unwrap().unwrap();
        assert_eq!(order.id, id);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_status, PaymentStatus::Pending);
        assert!(order.order_ref_id.starts_with("ORD-"));
        assert!(order.placed_at().is_some());
        assert_eq!(order.total(), Some(120));
    }

    #[tokio::test]
    async fn test_confirm_payment() {
        let book = OrderBook::new(DocumentStore::in_memory());
        let id = book.place(sample()).await.unwrap();
        book.confirm_payment(&id).await.unwrap();
        assert_eq!(
            book.get(&id).await.unwrap().unwrap().payment_status,
            PaymentStatus::Done
        );
    }

    #[tokio::test]
    async fn test_confirm_unknown_order() {
        let book = OrderBook::new(DocumentStore::in_memory());
        assert!(matches!(
            book.confirm_payment("ghost").await,
            Err(Error::NotFound { .. })
        ));
        assert!(book.get("ghost").await.unwrap().is_none());
    }
}
