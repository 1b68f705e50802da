//! Orchestrator process entry point: runs the saga engine's message
//! bus consumer loops alongside a health/metrics HTTP server.

use std::sync::Arc;

use event_store::PostgresEventLog;
use messaging::{KafkaMessageBus, MessageBus};
use orchestrator::config::Config;
use saga::Orchestrator;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const REPLY_TOPICS: [&str; 4] = ["orders-reply", "stock-reply", "pay-reply", "deliv-reply"];

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

/// Spawns a background task that feeds every message on `topic` into
/// the orchestrator, via `handle`. Runs until the process exits.
fn spawn_consumer<F, Fut>(bus: Arc<KafkaMessageBus>, topic: String, group: String, handle: F) -> tokio::task::JoinHandle<()>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = saga::Result<()>> + Send,
{
    tokio::spawn(async move {
        let handle = Arc::new(handle);
        let handler: messaging::MessageHandler = {
            let handle = handle.clone();
            Arc::new(move |message: messaging::ConsumedMessage| {
                let handle = handle.clone();
                Box::pin(async move {
                    match handle(message.payload).await {
                        Ok(()) => true,
                        Err(err) => {
                            tracing::error!(error = %err, "failed to process saga message, leaving unacknowledged");
                            false
                        }
                    }
                })
            })
        };

        if let Err(err) = bus.consume(&[topic.as_str()], &group, handler).await {
            tracing::error!(%topic, error = %err, "consumer loop exited");
        }
    })
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(?config, "loaded configuration");

    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to saga event log database");

    let event_log = PostgresEventLog::new(pool);
    event_log.migrate().await.expect("saga event log migration failed");
    let event_log = Arc::new(event_log);

    let bus = Arc::new(
        KafkaMessageBus::builder(config.kafka_brokers.clone())
            .build()
            .expect("failed to build kafka message bus"),
    );

    let engine = Arc::new(Orchestrator::new(
        event_log.clone(),
        bus.clone(),
        config.ingress_topic.clone(),
        config.outcome_topic.clone(),
    ));

    let mut consumer_handles = Vec::new();

    {
        let engine = engine.clone();
        consumer_handles.push(spawn_consumer(
            bus.clone(),
            config.ingress_topic.clone(),
            format!("{}-ingress", config.consumer_group),
            move |payload| {
                let engine = engine.clone();
                async move { engine.handle_ingress(&payload).await.map(|_| ()) }
            },
        ));
    }

    for reply_topic in REPLY_TOPICS {
        let engine = engine.clone();
        consumer_handles.push(spawn_consumer(
            bus.clone(),
            reply_topic.to_string(),
            format!("{}-{}", config.consumer_group, reply_topic),
            move |payload| {
                let engine = engine.clone();
                async move { engine.handle_reply(reply_topic, &payload).await }
            },
        ));
    }

    let app = orchestrator::create_app(metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, "starting orchestrator HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("http server shut down, stopping saga consumers");
    for handle in consumer_handles {
        handle.abort();
    }
}
