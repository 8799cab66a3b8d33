//! Seller-side order feed: paid, undelivered orders, newest first, one page
//! at a time.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{Order, OrderStatus, PaymentStatus, ORDERS};
use crate::session::SellerContext;
use crate::store::{Cursor, Direction, DocumentStore, Filter, Query, Write};

/// Viewports narrower than this get one order per page.
pub const NARROW_VIEWPORT_PX: u32 = 768;
pub const NARROW_PAGE_SIZE: usize = 1;
pub const WIDE_PAGE_SIZE: usize = 5;

pub fn page_size_for_width(width_px: u32) -> usize {
    if width_px < NARROW_VIEWPORT_PX {
        NARROW_PAGE_SIZE
    } else {
        WIDE_PAGE_SIZE
    }
}

/// Which cursor `prev` resumes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BackPaging {
    /// Start after the cursor popped from the stack. This re-fetches the page
    /// that followed it, not the one before the current page.
    #[default]
    Replay,
    /// Start after the cursor that opened the previous page, restoring it.
    Restore,
}

impl FromStr for BackPaging {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "replay" => Ok(BackPaging::Replay),
            "restore" => Ok(BackPaging::Restore),
            other => Err(Error::UnknownBackPaging(other.to_string())),
        }
    }
}

/// Pushed by `next`: how the page being left was reached and where it ended.
#[derive(Debug, Clone)]
struct PageMark {
    start: Option<Cursor>,
    end: Cursor,
}

/// Snapshot of the pager for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPageView {
    pub orders: Vec<Order>,
    pub page_size: usize,
    pub has_more: bool,
    pub can_prev: bool,
    pub dispatch_controls: bool,
}

pub struct OrderPager {
    store: DocumentStore,
    seller: SellerContext,
    back_paging: BackPaging,
    page_size: usize,
    prev_stack: Vec<PageMark>,
    page_start: Option<Cursor>,
    last_visible: Option<Cursor>,
    has_more: bool,
    orders: Vec<Order>,
    dispatch_controls: bool,
}

struct Page {
    orders: Vec<Order>,
    tail: Option<Cursor>,
    len: usize,
}

impl OrderPager {
    pub fn new(store: DocumentStore, seller: SellerContext, back_paging: BackPaging) -> Self {
        OrderPager {
            store,
            seller,
            back_paging,
            page_size: WIDE_PAGE_SIZE,
            prev_stack: Vec::new(),
            page_start: None,
            last_visible: None,
            has_more: true,
            orders: Vec::new(),
            dispatch_controls: false,
        }
    }

    /// Applies from the next fetch on.
    pub fn set_viewport_width(&mut self, width_px: u32) {
        self.page_size = page_size_for_width(width_px);
    }

    pub fn base_query(&self) -> Query {
        Query::new(ORDERS)
            .filter(Filter::eq("paymentStatus", PaymentStatus::Done.as_str()))
            .filter(Filter::eq("kitchenName", self.seller.kitchen_name.as_str()))
            .filter(Filter::not_eq("OrderStatus", OrderStatus::Delivered.as_str()))
            .order_by("createdAt", Direction::Descending)
            .limit(self.page_size)
    }

    async fn fetch(&self, after: Option<&Cursor>) -> Result<Page> {
        let base = self.base_query();
        let query = match after {
            Some(cursor) => base.clone().start_after(cursor.clone()),
            None => base.clone(),
        };
        let docs = self.store.query(&query).await?;
        let tail = docs.last().map(|doc| base.cursor_for(doc));
        let orders = docs
            .iter()
            .filter_map(|doc| match Order::from_document(doc) {
                Ok(order) => Some(order),
                Err(e) => {
                    log::warn!("Skipping malformed order {}: {}", doc.id, e);
                    None
                }
            })
            .collect();
        Ok(Page {
            orders,
            tail,
            len: docs.len(),
        })
    }

    fn show(&mut self, page: Page, start: Option<Cursor>) {
        self.has_more = page.len == self.page_size;
        self.last_visible = page.tail;
        self.page_start = start;
        self.orders = page.orders;
    }

    /// Load the first page and forget any paging history.
    pub async fn init(&mut self) -> Result<()> {
        let page = self.fetch(None).await?;
        self.prev_stack.clear();
        self.show(page, None);
        log::debug!(
            "{}: first page, {} orders, has_more={}",
            self.seller.kitchen_name,
            self.orders.len(),
            self.has_more
        );
        Ok(())
    }

    /// Advance one page. Returns `false` without fetching when there is no
    /// further page.
    pub async fn next(&mut self) -> Result<bool> {
        if !self.can_next() {
            return Ok(false);
        }
        let Some(end) = self.last_visible.clone() else {
            return Ok(false);
        };
        let page = self.fetch(Some(&end)).await?;
        self.prev_stack.push(PageMark {
            start: self.page_start.take(),
            end: end.clone(),
        });
        self.show(page, Some(end));
        Ok(true)
    }

    /// Step back one page. Returns `false` without fetching when the stack
    /// is empty. See [`BackPaging`] for which page is shown.
    pub async fn prev(&mut self) -> Result<bool> {
        let Some(mark) = self.prev_stack.last().cloned() else {
            return Ok(false);
        };
        let start = match self.back_paging {
            BackPaging::Replay => Some(mark.end),
            BackPaging::Restore => mark.start,
        };
        let page = self.fetch(start.as_ref()).await?;
        self.prev_stack.pop();
        self.show(page, start);
        Ok(true)
    }

    /// Overwrite an order's status and reload from the first page. The prior
    /// status is not checked.
    pub async fn set_status(&mut self, order_id: &str, status: OrderStatus) -> Result<()> {
        self.store
            .update(ORDERS, order_id, Write::new().set("OrderStatus", status.as_str()))
            .await?;
        log::info!("Order {} set to {}", order_id, status);
        if status == OrderStatus::Process {
            self.dispatch_controls = true;
        }
        self.init().await
    }

    pub async fn set_status_str(&mut self, order_id: &str, status: &str) -> Result<()> {
        let status = status.parse()?;
        self.set_status(order_id, status).await
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn can_next(&self) -> bool {
        self.has_more && self.last_visible.is_some()
    }

    pub fn can_prev(&self) -> bool {
        !self.prev_stack.is_empty()
    }

    pub fn last_visible(&self) -> Option<&Cursor> {
        self.last_visible.as_ref()
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn dispatch_controls(&self) -> bool {
        self.dispatch_controls
    }

    pub fn seller(&self) -> &SellerContext {
        &self.seller
    }

    pub fn view(&self) -> OrderPageView {
        OrderPageView {
            orders: self.orders.clone(),
            page_size: self.page_size,
            has_more: self.has_more,
            can_prev: self.can_prev(),
            dispatch_controls: self.dispatch_controls,
        }
    }
}
