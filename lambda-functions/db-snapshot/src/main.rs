use db_snapshot::{BackupConfig, Request, SnapshotService};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};

async fn function_handler(_event: LambdaEvent<Request>) -> Result<bool, Error> {
    let config = BackupConfig::from_env()?;
    let service = SnapshotService::from_aws(config).await;

    Ok(service.run().await?)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .json()
        .init();

    run(service_fn(function_handler)).await
}
