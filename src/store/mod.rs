//! Document store.
//!
//! # Data Flow
//! ```text
//! ledger / challenge / poller / sweeper
//!     → DocumentStoreExt (typed get/put/query over serde)
//!     → DocumentStore (JSON documents keyed by collection + id)
//!     → memory.rs (in-process map, optional write-through JSON snapshot)
//! ```
//!
//! # Design Decisions
//! - Point reads/writes, equality/inequality queries and an atomic batch are
//!   the whole contract; nothing above this layer assumes more
//! - Every single-document write is atomic on its own
//! - Conditional writes are `insert_if_absent` and batches carrying
//!   [`Write::Check`] preconditions; a failed precondition applies nothing

pub mod filter;
pub mod memory;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub use filter::{Filter, Op, Query};
pub use memory::MemoryStore;

/// Collection names.
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    pub const ACCOUNT_HANDLES: &str = "account_handles";
    pub const CAMPAIGNS: &str = "campaigns";
    pub const ACTIVE_CAMPAIGNS: &str = "active_campaigns";
    pub const CONTRIBUTIONS: &str = "contributions";
    pub const PROCESSED_EVENTS: &str = "processed_events";
    pub const DELIVERIES: &str = "deliveries";
    pub const EXPORT_CHALLENGES: &str = "export_challenges";
    pub const WITHDRAW_CHALLENGES: &str = "withdraw_challenges";
    pub const UPDATE_CHALLENGES: &str = "update_challenges";
}

/// Errors raised by the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document could not be converted to or from its typed form.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The snapshot file could not be read or written.
    #[error("persistence error: {0}")]
    Io(#[from] std::io::Error),

    /// A merge targeted a document or patch that is not a JSON object.
    #[error("document {collection}/{id} is not an object")]
    NotAnObject { collection: String, id: String },
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Precondition on one document, evaluated inside a batch.
#[derive(Debug, Clone)]
pub enum Expect {
    /// Nothing exists at the key.
    Absent,
    /// The document exists and satisfies the filter.
    Matches(Filter),
}

impl Expect {
    pub fn holds(&self, doc: Option<&Value>) -> bool {
        match (self, doc) {
            (Expect::Absent, doc) => doc.is_none(),
            (Expect::Matches(filter), Some(doc)) => filter.matches(doc),
            (Expect::Matches(_), None) => false,
        }
    }
}

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum Write {
    /// Abort the batch unless the document, as staged so far, meets `expect`.
    Check {
        collection: String,
        id: String,
        expect: Expect,
    },
    Put {
        collection: String,
        id: String,
        doc: Value,
    },
    Merge {
        collection: String,
        id: String,
        patch: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl Write {
    pub fn expect_absent(collection: &str, id: impl Into<String>) -> Self {
        Write::Check {
            collection: collection.to_string(),
            id: id.into(),
            expect: Expect::Absent,
        }
    }

    pub fn expect_field(
        collection: &str,
        id: impl Into<String>,
        field: &str,
        value: impl Into<Value>,
    ) -> Self {
        Write::Check {
            collection: collection.to_string(),
            id: id.into(),
            expect: Expect::Matches(Filter {
                field: field.to_string(),
                op: Op::Eq,
                value: value.into(),
            }),
        }
    }

    pub fn put(collection: &str, id: impl Into<String>, doc: Value) -> Self {
        Write::Put {
            collection: collection.to_string(),
            id: id.into(),
            doc,
        }
    }

    pub fn merge(collection: &str, id: impl Into<String>, patch: Value) -> Self {
        Write::Merge {
            collection: collection.to_string(),
            id: id.into(),
            patch,
        }
    }

    pub fn delete(collection: &str, id: impl Into<String>) -> Self {
        Write::Delete {
            collection: collection.to_string(),
            id: id.into(),
        }
    }
}

/// Keyed JSON document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read one document.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Create or replace one document.
    async fn put(&self, collection: &str, id: &str, doc: Value) -> StoreResult<()>;

    /// Write only if nothing exists at the key. Returns whether the write happened.
    async fn insert_if_absent(&self, collection: &str, id: &str, doc: Value) -> StoreResult<bool>;

    /// Shallow-merge top-level fields into an existing document. Returns false if absent.
    async fn merge(&self, collection: &str, id: &str, patch: Value) -> StoreResult<bool>;

    /// Remove one document. Returns whether it existed.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<bool>;

    /// Return `(id, document)` pairs matching every filter, in id order.
    async fn query(&self, collection: &str, query: &Query) -> StoreResult<Vec<(String, Value)>>;

    /// Apply all writes atomically. Returns false, with nothing applied, when a
    /// [`Write::Check`] does not hold.
    async fn batch(&self, writes: Vec<Write>) -> StoreResult<bool>;
}

/// Typed helpers over [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get_as<T>(&self, collection: &str, id: &str) -> StoreResult<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(collection, id).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    async fn put_as<T>(&self, collection: &str, id: &str, doc: &T) -> StoreResult<()>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(doc)?;
        self.put(collection, id, value).await
    }

    async fn query_as<T>(&self, collection: &str, query: &Query) -> StoreResult<Vec<T>>
    where
        T: DeserializeOwned + Send,
    {
        self.query(collection, query)
            .await?
            .into_iter()
            .map(|(_, value)| serde_json::from_value(value).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}
