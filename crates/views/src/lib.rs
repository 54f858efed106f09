//! # Views
//!
//! Views reads and increments a single page view counter kept in a DynamoDB
//! table. It backs two AWS Lambda functions, `views-get` and `views-post`,
//! which are thin wrappers around [`read`] and [`increment`].
//!
//! ## Concepts
//!
//! - **Counter record**: one item in the table, addressed by a [`CounterKey`]
//!   (`stat = "view-count"` in the deployed table), holding a numeric counter
//!   attribute ([`QUANTITY_ATTRIBUTE`]).
//! - **Store**: anything implementing [`CounterStore`]. The store must offer a
//!   point lookup and a native atomic add. [`DynamoStore`] talks to AWS,
//!   [`MemoryStore`] keeps items in process and is what the tests use.
//!
//! Increments never read-modify-write on the caller's side. Correctness under
//! concurrent invocations is entirely the store's atomic add.
//!
//! ## Error Handling
//!
//! Every fallible operation returns [`Error`], whose [`Error::kind`] names the
//! failure category reported back to the Lambda runtime.
use snafu::prelude::*;

pub mod config;
pub mod dynamodb;
pub mod invocation;
pub mod memory;
pub mod store;

pub use aws_sdk_dynamodb::types::AttributeValue;
pub use config::Config;
pub use dynamodb::DynamoStore;
pub use invocation::Deadline;
pub use memory::MemoryStore;
pub use store::{CounterKey, CounterStore, Item};

/// Partition key attribute of the counter table.
pub const STAT_ATTRIBUTE: &str = "stat";

/// Partition key value of the view counter record.
pub const VIEW_COUNT: &str = "view-count";

/// Attribute holding the counter value.
pub const QUANTITY_ATTRIBUTE: &str = "Quantity";

/// Top-level error enum that encompasses all errors.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid configuration: {msg}"))]
    Config { msg: String },

    #[snafu(display("Counter key name and value must be non-empty, got {name:?} = {value:?}"))]
    InvalidKey { name: String, value: String },

    #[snafu(display("Could not reach the store during {operation}: {source}"))]
    StoreUnavailable {
        operation: &'static str,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[snafu(display("Could not find a counter record for {key}"))]
    NotFound { key: CounterKey },

    #[snafu(display("Could not decode '{attribute}' of {key}: {reason}"))]
    Decode {
        key: CounterKey,
        attribute: String,
        reason: String,
    },

    #[snafu(display("Store call '{operation}' timed out after {budget:?}"))]
    Timeout {
        operation: &'static str,
        budget: std::time::Duration,
    },

    #[snafu(display("Store call '{operation}' cancelled, the invocation deadline has passed"))]
    Cancelled { operation: &'static str },
}

impl Error {
    /// Stable name of the failure category.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config { .. } => "ConfigError",
            Error::InvalidKey { .. } => "InvalidKey",
            Error::StoreUnavailable { .. } => "StoreUnavailable",
            Error::NotFound { .. } => "NotFound",
            Error::Decode { .. } => "DecodeError",
            Error::Timeout { .. } => "Timeout",
            Error::Cancelled { .. } => "Cancelled",
        }
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Reads the current value of the counter at `key`.
///
/// A missing record is an error, never an implicit zero.
pub async fn read(store: &impl CounterStore, key: &CounterKey, attribute: &str) -> Result<i64> {
    log::info!("reading {key} '{attribute}'");
    let item = store
        .get_item(key)
        .await?
        .context(NotFoundSnafu { key: key.clone() })?;
    let quantity = store::decode_quantity(&item, key, attribute)?;
    log::debug!("  {key} '{attribute}' is {quantity}");
    Ok(quantity)
}

/// Atomically adds `delta` to the counter at `key` and returns the new value.
///
/// This relies on the store's native atomic add, so concurrent callers never
/// lose updates. A missing record is created by the store with a value of
/// `delta`.
pub async fn increment(
    store: &impl CounterStore,
    key: &CounterKey,
    attribute: &str,
    delta: i64,
) -> Result<i64> {
    log::info!("adding {delta} to {key} '{attribute}'");
    let updated = store.add(key, attribute, delta).await?;
    let quantity = store::decode_quantity(&updated, key, attribute)?;
    log::info!("  {key} '{attribute}' is now {quantity}");
    Ok(quantity)
}
