use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use views::{Config, DynamoStore};

mod handler;
use handler::function_handler;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        // disable printing the name of the module in every log line.
        .with_target(false)
        // disabling time is handy because CloudWatch will add the ingestion time.
        .without_time()
        .init();

    let config = Config::from_env()?;
    let store = DynamoStore::connect(&config).await;
    log::info!("counting views in table '{}'", store.table_name());

    run(service_fn(|event: LambdaEvent<serde_json::Value>| {
        function_handler(&store, event)
    }))
    .await
}
