//! The store capability the counter operations depend on.
use std::{collections::HashMap, future::Future};

use aws_sdk_dynamodb::types::AttributeValue;
use snafu::prelude::*;

use crate::{DecodeSnafu, Error, InvalidKeySnafu, Result};

/// Attributes of a single stored item.
pub type Item = HashMap<String, AttributeValue>;

/// Partition key of a counter record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CounterKey {
    name: String,
    value: String,
}

impl core::fmt::Display for CounterKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

impl CounterKey {
    /// Creates a key, rejecting an empty attribute name or value.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let value = value.into();
        ensure!(
            !name.is_empty() && !value.is_empty(),
            InvalidKeySnafu { name, value }
        );
        Ok(CounterKey { name, value })
    }

    /// The key of the deployed view counter, `stat = "view-count"`.
    pub fn view_count() -> Self {
        CounterKey {
            name: crate::STAT_ATTRIBUTE.to_owned(),
            value: crate::VIEW_COUNT.to_owned(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// The key as a store attribute.
    pub fn attribute_value(&self) -> AttributeValue {
        AttributeValue::S(self.value.clone())
    }
}

/// A key-value store able to hold counter records.
///
/// Implementations must provide a native atomic add. Callers never combine
/// [`CounterStore::get_item`] and a write to emulate one.
pub trait CounterStore: Send + Sync {
    /// Point lookup of the item at `key`.
    ///
    /// Resolves to `None` when no such item exists.
    fn get_item(&self, key: &CounterKey) -> impl Future<Output = Result<Option<Item>>> + Send;

    /// Atomically adds `delta` to the numeric `attribute` of the item at `key`.
    ///
    /// Resolves to the updated attributes, which must include `attribute`.
    fn add(
        &self,
        key: &CounterKey,
        attribute: &str,
        delta: i64,
    ) -> impl Future<Output = Result<Item>> + Send;
}

/// Short name of an attribute's type, for error messages.
pub(crate) fn type_name(value: &AttributeValue) -> &'static str {
    match value {
        AttributeValue::B(_) => "binary",
        AttributeValue::Bool(_) => "bool",
        AttributeValue::Bs(_) => "binary set",
        AttributeValue::L(_) => "list",
        AttributeValue::M(_) => "map",
        AttributeValue::N(_) => "number",
        AttributeValue::Ns(_) => "number set",
        AttributeValue::Null(_) => "null",
        AttributeValue::S(_) => "string",
        AttributeValue::Ss(_) => "string set",
        _ => "unknown",
    }
}

/// Decodes the integer counter held in `attribute` of `item`.
pub(crate) fn decode_quantity(item: &Item, key: &CounterKey, attribute: &str) -> Result<i64> {
    let decode_error = |reason: String| -> Error {
        DecodeSnafu {
            key: key.clone(),
            attribute,
            reason,
        }
        .build()
    };
    let value = item
        .get(attribute)
        .ok_or_else(|| decode_error("attribute is missing".to_owned()))?;
    let number = value
        .as_n()
        .map_err(|v| decode_error(format!("expected a number, found a {}", type_name(v))))?;
    number
        .parse::<i64>()
        .map_err(|e| decode_error(format!("'{number}' is not an integer: {e}")))
}
