//! Line protocol between the market server and its clients: one JSON value
//! per line in each direction.

use serde::{Deserialize, Serialize};

use crate::models::Message;
use crate::orders::NewOrder;
use crate::pager::OrderPageView;
use crate::thread::ChatLink;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClientRequest {
    Login { user_id: String, display_name: String },
    RegisterKitchen { kitchen_name: String },
    PlaceOrder(NewOrder),
    ConfirmPayment { order_id: String },
    OpenOrders { viewport_width: u32 },
    NextPage,
    PrevPage,
    SetOrderStatus { order_id: String, status: String },
    ResolveThread { seller_id: String, buyer_id: String, buyer_name: String },
    OpenThread { thread_id: Option<String> },
    SendMessage { text: String },
    CloseThread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ServerResponse {
    Prompt(String),
    Success(String),
    Error(String),
    /// The request was dropped; whatever was shown before still stands.
    Idle,
    OrderPlaced { order_id: String },
    Orders(OrderPageView),
    Thread(ChatLink),
    Messages { thread_id: String, messages: Vec<Message> },
    MessageSent { message_id: String },
}

pub fn encode<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut line = serde_json::to_string(value)?;
    line.push('\n');
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_and_struct_variants_on_the_wire() {
        assert_eq!(encode(&ClientRequest::NextPage).unwrap(), "\"NextPage\"\n");
        let open = serde_json::from_str::<ClientRequest>(r#"{"OpenThread":{"thread_id":null}}"#).unwrap();
        assert_eq!(open, ClientRequest::OpenThread { thread_id: None });
    }

    #[test]
    fn test_place_order_uses_document_field_names() {
        let line = r#"{"PlaceOrder":{"kitchenId":"s1","kitchenName":"Amma","buyerId":"b1",
            "paymentMethod":"UPI","CustomerDetails":{"username":"Ravi","address":"MG Road","pinCode":"560001"},
            "ItemsDetails":[{"itemName":"Idli","quantity":3,"price":15}]}}"#;
        match serde_json::from_str::<ClientRequest>(line).unwrap() {
            ClientRequest::PlaceOrder(order) => {
                assert_eq!(order.kitchen_name, "Amma");
                assert_eq!(order.items[0].quantity, 3);
            }
            other => panic!("unexpected request {other:?}"),
        }
    }
}
