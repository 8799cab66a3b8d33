//! Order feed, chat threads and live message feeds for a home-kitchen food
//! marketplace, on top of a small document store with live queries.

pub mod config;
pub mod error;
pub mod feed;
pub mod models;
pub mod orders;
pub mod pager;
pub mod protocol;
pub mod server;
pub mod session;
pub mod store;
pub mod thread;

pub use error::{Error, Result};
