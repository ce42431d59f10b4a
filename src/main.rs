use {
    cdc_broker::{
        AppState,
        adapters::vulndb_client::HttpVulnDb,
        config::Config,
        infra::postgres::outbox_repo::PgOutboxLog,
        services::{broker::BrokerProxy, event_parser::EventParser},
    },
    sqlx::postgres::PgPoolOptions,
    std::{sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("invalid configuration");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .acquire_timeout(Duration::from_secs(3))
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("failed to run migrations");

    let vulndb = HttpVulnDb::new(&config.vulndb).expect("failed to build vulndb client");
    let parser = EventParser::new(Arc::new(vulndb));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (broker, dispatcher) = BrokerProxy::start(
        Arc::new(PgOutboxLog::new(pool)),
        parser,
        config.dispatch.clone(),
        shutdown_rx,
    );

    let app = cdc_broker::router(AppState {
        broker: Arc::new(broker),
    });

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .unwrap();
    tracing::info!("listening on {}", config.listen_addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .await
        .unwrap();

    if let Err(e) = dispatcher.await {
        tracing::error!(error = %e, "dispatcher task failed");
    }
}

/// Resolves on SIGINT or SIGTERM, after telling the dispatcher to stop.
async fn shutdown_signal(dispatcher: watch::Sender<bool>) {
    let interrupt = async {
        signal::ctrl_c().await.expect("failed to listen for SIGINT");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    let received = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };
    tracing::info!(signal = received, "shutting down");

    // The receiver is gone only if the dispatcher already exited.
    let _ = dispatcher.send(true);
}
