use clap::Parser;
use hashcrack_broker::Broker;
use hashcrack_host::{consumer, server, sweeper, Cli, ManagerState};
use hashcrack_store::{InMemoryStore, MongoStore, Store};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let opts = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&opts.log_level)),
        )
        .init();

    let store = if opts.in_memory_store {
        warn!("using the in-memory store backend, state will not survive a restart");
        Store::InMemory(InMemoryStore::default())
    } else {
        Store::Mongo(MongoStore::connect(&opts.mongo_opts()).await?)
    };
    let broker = Broker::connect(&opts.broker_opts()).await?;

    let shutdown = CancellationToken::new();
    let state = ManagerState {
        store,
        broker: broker.clone(),
        opts,
        shutdown: shutdown.clone(),
    };

    let consumer_handle = consumer::start(state.clone());
    let sweeper_handle = sweeper::start(state.clone());

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("received interrupt, shutting down");
                shutdown.cancel();
            }
        }
    });

    server::serve(state).await?;

    // The listener has drained; stop the background tasks and the broker.
    shutdown.cancel();
    let _ = tokio::join!(consumer_handle, sweeper_handle);
    if let Err(err) = broker.close().await {
        warn!("error closing broker connection: {err}");
    }
    Ok(())
}
