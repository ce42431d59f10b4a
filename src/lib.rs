pub mod adapters;
pub mod config;
pub mod domain;
pub mod infra;
pub mod services;

use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    infra::postgres::outbox_repo::PgOutboxLog,
    services::broker::BrokerProxy,
    std::{sync::Arc, time::Duration},
    tower::ServiceBuilder,
    tower_http::timeout::TimeoutLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub broker: Arc<BrokerProxy<PgOutboxLog>>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/outbox", get(adapters::admin::outbox_stats))
        .route("/outbox/events", post(adapters::admin::append_event))
        .route("/outbox/compact", post(adapters::admin::compact))
        .layer(
            ServiceBuilder::new()
                .layer(TimeoutLayer::new(Duration::from_secs(10)))
                .layer(DefaultBodyLimit::max(256 * 1024)),
        )
        .with_state(state)
}
