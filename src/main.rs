//! OpenSASE Orders - Marketplace order lifecycle service

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use opensase_orders::config::AppConfig;
use opensase_orders::http::{router, AppState};
use opensase_orders::ledger::{PgCartStore, PgCatalog, PgOrderLedger};
use opensase_orders::notifications::{LogPushGateway, NatsPushGateway, NotificationDispatcher, PgRecipientDirectory, PushGateway};
use opensase_orders::services::{OrderCreationPipeline, StatusTransitionService};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();

    let config = AppConfig::from_env()?;
    let db = PgPoolOptions::new().max_connections(config.max_connections).connect(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let gateway: Arc<dyn PushGateway> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPushGateway::new(client, config.push_subject.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, push notifications will only be logged");
                Arc::new(LogPushGateway)
            }
        },
        None => Arc::new(LogPushGateway),
    };
    let dispatcher = NotificationDispatcher::new(Arc::new(PgRecipientDirectory::new(db.clone())), gateway).with_batch_size(config.push_batch_size);

    let ledger = Arc::new(PgOrderLedger::new(db.clone()));
    let creation = OrderCreationPipeline::new(ledger.clone(), Arc::new(PgCatalog::new(db.clone())), Arc::new(PgCartStore::new(db.clone())))
        .with_shipping_fee(config.shipping_fee);
    let transitions = StatusTransitionService::new(ledger.clone(), Arc::new(dispatcher));
    let state = AppState { creation: Arc::new(creation), transitions: Arc::new(transitions), ledger };

    let app = router(state);
    tracing::info!("🚀 OpenSASE Orders listening on 0.0.0.0:{}", config.port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?, app).await?;
    Ok(())
}
