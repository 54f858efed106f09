//! In-process counter store.
//!
//! [`MemoryStore`] follows DynamoDB's `ADD` semantics closely enough to stand
//! in for [`DynamoStore`](crate::DynamoStore) in tests:
//!
//! - adding to a missing item creates it, with the counter set to the delta
//! - adding to a missing attribute sets it to the delta
//! - adding to a non-number attribute is rejected
//!
//! Each add happens under a lock, so concurrent adds are serialized the same
//! way the real store serializes them.
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Duration,
};

use aws_sdk_dynamodb::types::AttributeValue;
use snafu::prelude::*;

use crate::{
    store::{self, CounterKey, CounterStore, Item},
    DecodeSnafu, Result,
};

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    items: Arc<Mutex<HashMap<CounterKey, Item>>>,
    latency: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every call by `latency` before touching the items.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Stores `attribute = value` on the item at `key`, creating the item if
    /// needed.
    pub fn put(&self, key: &CounterKey, attribute: &str, value: AttributeValue) {
        let mut items = self.lock();
        let item = items
            .entry(key.clone())
            .or_insert_with(|| Item::from([(key.name().to_owned(), key.attribute_value())]));
        item.insert(attribute.to_owned(), value);
    }

    /// Stores a numeric counter on the item at `key`.
    pub fn put_quantity(&self, key: &CounterKey, attribute: &str, quantity: i64) {
        self.put(key, attribute, AttributeValue::N(quantity.to_string()));
    }

    /// Returns a copy of the item at `key`.
    pub fn item(&self, key: &CounterKey) -> Option<Item> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CounterKey, Item>> {
        // Nothing panics between an add's checks and its single insert, so a
        // poisoned map is still consistent.
        self.items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn wait(&self) {
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            // Give other tasks a chance to interleave with this one.
            None => tokio::task::yield_now().await,
        }
    }
}

impl CounterStore for MemoryStore {
    async fn get_item(&self, key: &CounterKey) -> Result<Option<Item>> {
        self.wait().await;
        let item = self.item(key);
        log::trace!("memory get {key}: {item:?}");
        Ok(item)
    }

    async fn add(&self, key: &CounterKey, attribute: &str, delta: i64) -> Result<Item> {
        self.wait().await;
        let mut items = self.lock();
        let item = items
            .entry(key.clone())
            .or_insert_with(|| Item::from([(key.name().to_owned(), key.attribute_value())]));
        let current = match item.get(attribute) {
            None => 0,
            Some(AttributeValue::N(n)) => n.parse::<i64>().map_err(|e| {
                DecodeSnafu {
                    key: key.clone(),
                    attribute,
                    reason: format!("'{n}' is not an integer: {e}"),
                }
                .build()
            })?,
            Some(other) => {
                return DecodeSnafu {
                    key: key.clone(),
                    attribute,
                    reason: format!(
                        "the store cannot add to a {}",
                        store::type_name(other)
                    ),
                }
                .fail();
            }
        };
        let next = current.checked_add(delta).context(DecodeSnafu {
            key: key.clone(),
            attribute,
            reason: format!("adding {delta} to {current} overflows"),
        })?;
        let value = AttributeValue::N(next.to_string());
        item.insert(attribute.to_owned(), value.clone());
        log::trace!("memory add {delta} to {key} '{attribute}': {current} -> {next}");
        Ok(Item::from([(attribute.to_owned(), value)]))
    }
}
