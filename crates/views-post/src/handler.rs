use lambda_runtime::LambdaEvent;
use views::{CounterKey, CounterStore, Deadline, QUANTITY_ATTRIBUTE};

/// Every invocation counts as one view.
const VIEW_DELTA: i64 = 1;

/// Records one view and returns the new view count.
pub(crate) async fn function_handler(
    store: &impl CounterStore,
    event: LambdaEvent<serde_json::Value>,
) -> Result<i64, views::Error> {
    let key = CounterKey::view_count();
    log::info!(
        "request {} updating {key} '{QUANTITY_ATTRIBUTE}'",
        event.context.request_id
    );
    let count = Deadline::from_context(&event.context)
        .run(
            "increment",
            views::increment(store, &key, QUANTITY_ATTRIBUTE, VIEW_DELTA),
        )
        .await?;
    log::info!("successfully updated the view count, new view count: {count}");
    Ok(count)
}
