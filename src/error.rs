use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("malformed document: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("thread {id} does not belong to {seller_id} and {buyer_id}")]
    ThreadMismatch {
        id: String,
        seller_id: String,
        buyer_id: String,
    },

    #[error("unknown order status {0:?}")]
    UnknownStatus(String),

    #[error("unknown back-paging mode {0:?}")]
    UnknownBackPaging(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
