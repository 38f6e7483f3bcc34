//! Store Collaborator
//!
//! The harness only needs two capabilities from a backing store:
//! - execute a query and return its rows
//! - execute a query and commit
//!
//! Every benchmark worker opens its own [`StoreConnection`]; connections are
//! never shared between workers.

pub mod error;
pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;

use crate::partition::Query;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Factory for dedicated connections
#[async_trait]
pub trait PartitionStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Open a new exclusive connection
    async fn connect(&self) -> Result<Box<dyn StoreConnection>, StoreError>;
}

/// One exclusive connection to the store
#[async_trait]
pub trait StoreConnection: Send {
    /// Execute and return all rows
    async fn fetch_all(&mut self, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Execute inside a transaction and commit; returns affected rows
    async fn execute(&mut self, query: &Query) -> Result<u64, StoreError>;

    /// Release the connection
    async fn close(self: Box<Self>) -> Result<(), StoreError>;
}

/// Column value as decoded from the store
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Text(s) => s.parse().ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Row(pub Vec<Value>);

impl Row {
    pub fn get(&self, idx: usize) -> Option<&Value> {
        self.0.get(idx)
    }

    /// Integer column, with a decode error naming the column otherwise
    pub fn int(&self, idx: usize) -> Result<i64, StoreError> {
        self.get(idx)
            .and_then(Value::as_i64)
            .ok_or_else(|| StoreError::Decode {
                column: idx,
                message: format!("expected integer, got {:?}", self.get(idx)),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
