use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::store::Document;

pub const CHATS: &str = "chats";
pub const ORDERS: &str = "order";
pub const KITCHENS: &str = "kitchens";

/// Message collection nested under a chat thread.
pub fn messages_path(thread_id: &str) -> String {
    format!("{CHATS}/{thread_id}/messages")
}

fn to_utc(micros: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "senderId")]
    pub sender_id: String,
    pub text: String,
    #[serde(rename = "timeStamp", default)]
    pub time_stamp: Option<i64>,
}

impl Message {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut message: Message = doc.decode()?;
        message.id = doc.id.clone();
        Ok(message)
    }

    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        self.time_stamp.and_then(to_utc)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thread {
    #[serde(default)]
    pub id: String,
    pub users: Vec<String>,
    #[serde(rename = "lastMessage", default)]
    pub last_message: String,
    #[serde(rename = "lastMessageTimeStamp", default)]
    pub last_message_time_stamp: Option<i64>,
}

impl Thread {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut thread: Thread = doc.decode()?;
        thread.id = doc.id.clone();
        Ok(thread)
    }

    /// True when the participant set is exactly `{a, b}`.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        self.users.iter().any(|u| u == a)
            && self.users.iter().any(|u| u == b)
            && self.users.iter().all(|u| u == a || u == b)
    }
}

/// Order lifecycle: Pending -> Process -> Dispatch -> Delivered, or Pending -> Rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Process,
    Dispatch,
    Delivered,
    Rejected,
}

impl OrderStatus {
    /// Position along the lifecycle; never decreases for a given order.
    pub fn ordinal(self) -> u8 {
        match self {
            OrderStatus::Pending => 0,
            OrderStatus::Process => 1,
            OrderStatus::Rejected => 1,
            OrderStatus::Dispatch => 2,
            OrderStatus::Delivered => 3,
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        matches!(
            (self, next),
            (OrderStatus::Pending, OrderStatus::Process)
                | (OrderStatus::Pending, OrderStatus::Rejected)
                | (OrderStatus::Process, OrderStatus::Dispatch)
                | (OrderStatus::Dispatch, OrderStatus::Delivered)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Process => "Process",
            OrderStatus::Dispatch => "Dispatch",
            OrderStatus::Delivered => "Delivered",
            OrderStatus::Rejected => "Rejected",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Pending" => Ok(OrderStatus::Pending),
            "Process" => Ok(OrderStatus::Process),
            "Dispatch" => Ok(OrderStatus::Dispatch),
            "Delivered" => Ok(OrderStatus::Delivered),
            "Rejected" => Ok(OrderStatus::Rejected),
            other => Err(Error::UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Done,
}

impl PaymentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Done => "Done",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub username: String,
    pub address: String,
    #[serde(rename = "pinCode")]
    pub pin_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "itemName")]
    pub item_name: String,
    pub quantity: u32,
    pub price: u64,
}

impl LineItem {
    /// `None` when the product does not fit in a `u64`.
    pub fn subtotal(&self) -> Option<u64> {
        self.price.checked_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "orderRefId")]
    pub order_ref_id: String,
    #[serde(rename = "kitchenId")]
    pub kitchen_id: String,
    #[serde(rename = "kitchenName")]
    pub kitchen_name: String,
    #[serde(rename = "buyerId")]
    pub buyer_id: String,
    #[serde(rename = "OrderStatus")]
    pub status: OrderStatus,
    #[serde(rename = "paymentStatus")]
    pub payment_status: PaymentStatus,
    #[serde(rename = "paymentMethod")]
    pub payment_method: String,
    #[serde(rename = "CustomerDetails")]
    pub customer: CustomerDetails,
    #[serde(rename = "ItemsDetails")]
    pub items: Vec<LineItem>,
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Order {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut order: Order = doc.decode()?;
        order.id = doc.id.clone();
        Ok(order)
    }

    /// Sum of the line subtotals, or `None` if any step overflows.
    pub fn total(&self) -> Option<u64> {
        self.items
            .iter()
            .try_fold(0u64, |acc, item| acc.checked_add(item.subtotal()?))
    }

    pub fn placed_at(&self) -> Option<DateTime<Utc>> {
        to_utc(self.created_at)
    }

    /// Status changes the seller is offered for this order.
    ///
    /// Once any order in the list has been accepted, every order shows the
    /// dispatch controls, so a still-pending order is offered `Dispatch` too.
    pub fn available_actions(&self, dispatch_controls: bool) -> Vec<OrderStatus> {
        if dispatch_controls || self.status == OrderStatus::Dispatch {
            if self.status == OrderStatus::Dispatch {
                vec![OrderStatus::Delivered]
            } else {
                vec![OrderStatus::Dispatch]
            }
        } else {
            vec![OrderStatus::Process, OrderStatus::Rejected]
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kitchen {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "kitchenName")]
    pub kitchen_name: String,
}

impl Kitchen {
    pub fn from_document(doc: &Document) -> Result<Self> {
        let mut kitchen: Kitchen = doc.decode()?;
        kitchen.id = doc.id.clone();
        Ok(kitchen)
    }
}
