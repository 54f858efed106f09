use lambda_runtime::LambdaEvent;
use views::{CounterKey, CounterStore, Deadline, QUANTITY_ATTRIBUTE};

/// Returns the current view count.
///
/// The event payload carries nothing we need, so any JSON is accepted.
pub(crate) async fn function_handler(
    store: &impl CounterStore,
    event: LambdaEvent<serde_json::Value>,
) -> Result<i64, views::Error> {
    let key = CounterKey::view_count();
    log::info!(
        "request {} reading {key} '{QUANTITY_ATTRIBUTE}'",
        event.context.request_id
    );
    Deadline::from_context(&event.context)
        .run("read", views::read(store, &key, QUANTITY_ATTRIBUTE))
        .await
}
