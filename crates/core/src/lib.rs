//! `betterbatch-core` — shared data model and the store collaborator boundary.
//!
//! This crate contains **no retry or chunking logic**. It defines the request and
//! response shapes exchanged with a remote key-value store, the error model, and
//! the [`StoreClient`] trait every transport adapter implements.

pub mod client;
pub mod error;
pub mod output;
pub mod request;
pub mod table;

pub use client::StoreClient;
pub use error::{BatchError, BatchOperationKind, StoreError};
pub use output::{BatchGetOutput, BatchWriteOutput, QueryOutput, TableRows};
pub use request::{
    BatchGetRequest, BatchWriteRequest, KeyCondition, KeysAndAttributes, QueryRequest,
    RequestItems, SortKeyCondition, WriteRequest,
};
pub use table::{Item, TableName};
