use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use orderdesk::catalog::ProductStore;
use orderdesk::checkout::CheckoutService;
use orderdesk::config::Config;
use orderdesk::http::{self, AppState};
use orderdesk::order::OrderNumberGenerator;
use orderdesk::reconcile::{DeadLetterStore, ReconcileWorker};
use orderdesk::store::OrderStore;
use orderdesk::webhook::WebhookHandler;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(%e, "configuration error");
            std::process::exit(1);
        }
    };

    let orders = Arc::new(OrderStore::new());
    let products = Arc::new(ProductStore::new());
    let dead_letters = Arc::new(DeadLetterStore::new());

    let checkout = Arc::new(CheckoutService::new(
        orders.clone(),
        products,
        OrderNumberGenerator::new(config.order_prefix.clone()),
    ));
    let webhook = WebhookHandler::new(
        config.webhook_secret.clone(),
        checkout.clone(),
        dead_letters.clone(),
    )
    .with_tolerance_secs(config.signature_tolerance_secs);

    // Periodic reconciliation: replay dead-lettered payment confirmations.
    let worker = ReconcileWorker::new(dead_letters, webhook.clone());
    let interval_secs = config.reconcile_interval_secs;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            interval.tick().await;
            match worker.drain() {
                Ok(result) if result.claimed > 0 => {
                    info!(
                        claimed = result.claimed,
                        resolved = result.resolved,
                        released = result.released,
                        abandoned = result.abandoned,
                        "reconciliation drain"
                    );
                }
                Ok(_) => {}
                Err(e) => error!(%e, "reconciliation drain failed"),
            }
        }
    });

    let state = Arc::new(AppState {
        checkout,
        webhook,
        orders,
    });

    info!(addr = %config.addr, "orderdesk listening");
    if let Err(e) = http::serve(state, &config.addr).await {
        error!(%e, "server error");
        std::process::exit(1);
    }
}
