//! AWS DynamoDB counter store.
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::{
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::update_item::UpdateItemError,
    types::{AttributeValue, ReturnValue},
};

use crate::{
    store::{CounterKey, CounterStore, Item},
    Config, Error, Result,
};

/// Update expression placeholders. The attribute name goes through
/// `ExpressionAttributeNames`, so reserved words like `Count` are accepted.
const ATTRIBUTE_PLACEHOLDER: &str = "#attr";
const DELTA_PLACEHOLDER: &str = ":delta";

/// Part of DynamoDB's message when `ADD` meets an attribute that isn't a number.
const OPERAND_TYPE_MISMATCH: &str = "incorrect data type";

/// A DynamoDB table holding counter records.
///
/// Construct one per process and share it by reference; the underlying
/// client pools its connections.
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: aws_sdk_dynamodb::Client,
    table_name: String,
    consistent_read: bool,
}

impl DynamoStore {
    pub fn new(client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        DynamoStore {
            client,
            table_name: table_name.into(),
            consistent_read: false,
        }
    }

    /// Creates a store from an already loaded AWS config.
    pub fn from_sdk_config(cfg: &SdkConfig, config: &Config) -> Self {
        Self::new(aws_sdk_dynamodb::Client::new(cfg), &config.table_name)
            .with_consistent_read(config.consistent_read)
    }

    /// Loads the AWS config from the environment and creates a store.
    pub async fn connect(config: &Config) -> Self {
        let cfg = aws_config::load_defaults(BehaviorVersion::latest()).await;
        log::debug!(
            "connecting to table '{}' in region {:?}",
            config.table_name,
            cfg.region()
        );
        Self::from_sdk_config(&cfg, config)
    }

    /// Whether point lookups are strongly consistent. Defaults to `false`.
    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

fn store_error<E, R>(operation: &'static str, err: SdkError<E, R>) -> Error
where
    E: std::error::Error + ProvideErrorMetadata + Send + Sync + 'static,
    R: core::fmt::Debug + Send + Sync + 'static,
{
    log::error!("{operation} failed: {}", DisplayErrorContext(&err));
    Error::StoreUnavailable {
        operation,
        source: Box::new(err),
    }
}

/// The store's reason for refusing an add because of the stored attribute's
/// type. Any other validation failure is a fault of the request or the table.
fn type_mismatch<R>(err: &SdkError<UpdateItemError, R>) -> Option<String> {
    err.as_service_error()
        .filter(|e| e.code() == Some("ValidationException"))
        .and_then(|e| e.message())
        .filter(|message| message.contains(OPERAND_TYPE_MISMATCH))
        .map(str::to_owned)
}

impl CounterStore for DynamoStore {
    async fn get_item(&self, key: &CounterKey) -> Result<Option<Item>> {
        log::trace!("GetItem {key} from '{}'", self.table_name);
        let out = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key(key.name(), key.attribute_value())
            .consistent_read(self.consistent_read)
            .send()
            .await
            .map_err(|e| store_error("GetItem", e))?;
        Ok(out.item)
    }

    async fn add(&self, key: &CounterKey, attribute: &str, delta: i64) -> Result<Item> {
        log::trace!("UpdateItem {key} in '{}'", self.table_name);
        let out = self
            .client
            .update_item()
            .table_name(&self.table_name)
            .key(key.name(), key.attribute_value())
            .update_expression(format!("ADD {ATTRIBUTE_PLACEHOLDER} {DELTA_PLACEHOLDER}"))
            .expression_attribute_names(ATTRIBUTE_PLACEHOLDER, attribute)
            .expression_attribute_values(DELTA_PLACEHOLDER, AttributeValue::N(delta.to_string()))
            .return_values(ReturnValue::UpdatedNew)
            .send()
            .await
            .map_err(|err| match type_mismatch(&err) {
                Some(reason) => Error::Decode {
                    key: key.clone(),
                    attribute: attribute.to_owned(),
                    reason,
                },
                None => store_error("UpdateItem", err),
            })?;
        Ok(out.attributes.unwrap_or_default())
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use aws_sdk_dynamodb::{
        error::ErrorMetadata,
        operation::{
            get_item::{GetItemError, GetItemOutput},
            update_item::{UpdateItemError, UpdateItemOutput},
        },
        types::{AttributeValue, ReturnValue},
    };
    use aws_smithy_mocks::{mock, mock_client, Rule};
    use pretty_assertions::assert_eq;

    use super::DynamoStore;
    use crate::{CounterKey, Error, QUANTITY_ATTRIBUTE};

    const TABLE: &str = "views-table";

    fn store(rule: &Rule) -> DynamoStore {
        let _ = env_logger::builder().is_test(true).try_init();
        DynamoStore::new(mock_client!(aws_sdk_dynamodb, [rule]), TABLE)
    }

    fn view_count_key() -> HashMap<String, AttributeValue> {
        let key = CounterKey::view_count();
        HashMap::from([(
            key.name().to_owned(),
            AttributeValue::S(key.value().to_owned()),
        )])
    }

    fn validation_error(message: &str) -> ErrorMetadata {
        ErrorMetadata::builder()
            .code("ValidationException")
            .message(message)
            .build()
    }

    #[tokio::test]
    async fn read_looks_up_the_counter_key() {
        let rule = mock!(aws_sdk_dynamodb::Client::get_item)
            .match_requests(|req| {
                req.table_name() == Some(TABLE)
                    && req.key() == Some(&view_count_key())
                    && req.consistent_read() == Some(true)
            })
            .then_output(|| {
                GetItemOutput::builder()
                    .item("stat", AttributeValue::S("view-count".to_owned()))
                    .item(QUANTITY_ATTRIBUTE, AttributeValue::N("5".to_owned()))
                    .build()
            });
        let store = store(&rule).with_consistent_read(true);
        assert_eq!(TABLE, store.table_name());

        let n = crate::read(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE)
            .await
            .unwrap();
        assert_eq!(5, n);
        assert_eq!(1, rule.num_calls());
    }

    #[tokio::test]
    async fn read_is_eventually_consistent_by_default() {
        let rule = mock!(aws_sdk_dynamodb::Client::get_item)
            .match_requests(|req| req.consistent_read() == Some(false))
            .then_output(|| GetItemOutput::builder().build());
        let store = store(&rule);

        let err = crate::read(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }), "{err}");
        assert_eq!(1, rule.num_calls());
    }

    #[tokio::test]
    async fn read_failure_is_store_unavailable() {
        let rule = mock!(aws_sdk_dynamodb::Client::get_item).then_error(|| {
            GetItemError::generic(validation_error(
                "The provided key element does not match the schema",
            ))
        });
        let store = store(&rule);

        let err = crate::read(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }), "{err}");
    }

    #[tokio::test]
    async fn increment_is_a_single_atomic_add() {
        let rule = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| {
                let names = req.expression_attribute_names().cloned().unwrap_or_default();
                let values = req.expression_attribute_values().cloned().unwrap_or_default();
                req.table_name() == Some(TABLE)
                    && req.key() == Some(&view_count_key())
                    && req.update_expression() == Some("ADD #attr :delta")
                    && names.get("#attr").map(String::as_str) == Some(QUANTITY_ATTRIBUTE)
                    && values.get(":delta") == Some(&AttributeValue::N("1".to_owned()))
                    && req.return_values() == Some(&ReturnValue::UpdatedNew)
                    // No condition, so DynamoDB creates a missing record.
                    && req.condition_expression().is_none()
            })
            .then_output(|| {
                UpdateItemOutput::builder()
                    .attributes(QUANTITY_ATTRIBUTE, AttributeValue::N("6".to_owned()))
                    .build()
            });
        let store = store(&rule);

        let n = crate::increment(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE, 1)
            .await
            .unwrap();
        assert_eq!(6, n);
        assert_eq!(1, rule.num_calls());
    }

    #[tokio::test]
    async fn increment_passes_negative_deltas_through() {
        let rule = mock!(aws_sdk_dynamodb::Client::update_item)
            .match_requests(|req| {
                req.expression_attribute_values()
                    .and_then(|values| values.get(":delta"))
                    == Some(&AttributeValue::N("-4".to_owned()))
            })
            .then_output(|| {
                UpdateItemOutput::builder()
                    .attributes(QUANTITY_ATTRIBUTE, AttributeValue::N("2".to_owned()))
                    .build()
            });
        let store = store(&rule);

        let n = crate::increment(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE, -4)
            .await
            .unwrap();
        assert_eq!(2, n);
    }

    #[tokio::test]
    async fn increment_without_returned_attributes_fails_to_decode() {
        let rule = mock!(aws_sdk_dynamodb::Client::update_item)
            .then_output(|| UpdateItemOutput::builder().build());
        let store = store(&rule);

        let err = crate::increment(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err}");
    }

    #[tokio::test]
    async fn adding_to_a_non_number_fails_to_decode() {
        let rule = mock!(aws_sdk_dynamodb::Client::update_item).then_error(|| {
            UpdateItemError::generic(validation_error(
                "An operand in the update expression has an incorrect data type",
            ))
        });
        let store = store(&rule);

        let err = crate::increment(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }), "{err}");
        assert_eq!("DecodeError", err.kind());
    }

    #[tokio::test]
    async fn other_validation_failures_are_store_unavailable() {
        let rule = mock!(aws_sdk_dynamodb::Client::update_item).then_error(|| {
            UpdateItemError::generic(validation_error(
                "The provided key element does not match the schema",
            ))
        });
        let store = store(&rule);

        let err = crate::increment(&store, &CounterKey::view_count(), QUANTITY_ATTRIBUTE, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StoreUnavailable { .. }), "{err}");
        assert_eq!("StoreUnavailable", err.kind());
    }
}
