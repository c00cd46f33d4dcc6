mod config;

use crate::config::ServiceConfig;
use chat_ingestion::{IngressWorker, IngressWorkerConfig};
use common::nats::NatsClient;
use common::telemetry::{TelemetryConfig, TelemetryProviders, init_telemetry, shutdown_telemetry};
use delivery_worker::{
    ApiKeySigner, DeliveryWorker, DeliveryWorkerConfig, RealtimeClientConfig,
    RealtimeDeliveryClient, RequestSigner, UnsignedSigner,
};
use runner::Runner;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let telemetry_providers: Option<TelemetryProviders> = match init_telemetry(&TelemetryConfig {
        service_name: config.otel_service_name.clone(),
        otel_endpoint: config.otel_endpoint.clone(),
        otel_enabled: config.otel_enabled,
        log_level: config.log_level.clone(),
    }) {
        Ok(providers) => providers,
        Err(e) => {
            eprintln!("Failed to initialize telemetry: {:#}", e);
            std::process::exit(1);
        }
    };

    info!(
        otel_enabled = config.otel_enabled,
        messages_topic = %config.messages_topic,
        ingress_stream = %config.ingress_stream,
        realtime_endpoint = %config.realtime_endpoint_url,
        "starting chat-relay"
    );

    let nats_client = match connect_nats(&config).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!(error = format!("{e:#}"), "failed to initialize NATS");
            std::process::exit(1);
        }
    };

    let ingress_worker = match IngressWorker::new(
        nats_client.create_consumer_client(),
        nats_client.create_publisher_client(),
        IngressWorkerConfig {
            ingress_stream: config.ingress_stream.clone(),
            consumer_name: config.ingress_consumer_name.clone(),
            messages_topic: config.messages_topic.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            nak_delay_secs: config.nak_delay_secs,
            default_model_interface: config.default_model_interface.clone(),
        },
    )
    .await
    {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = format!("{e:#}"), "failed to initialize ingress worker");
            std::process::exit(1);
        }
    };

    let delivery_worker = match build_delivery_worker(&config, &nats_client).await {
        Ok(worker) => worker,
        Err(e) => {
            error!(error = format!("{e:#}"), "failed to initialize delivery worker");
            std::process::exit(1);
        }
    };

    let result = Runner::new()
        .with_named_process("ingress_worker", |ctx| ingress_worker.run(ctx))
        .with_named_process("delivery_worker", |ctx| delivery_worker.run(ctx))
        .with_closer(move || async move {
            info!("running cleanup tasks");
            if let Ok(client) = Arc::try_unwrap(nats_client) {
                client.close().await;
            }
            shutdown_telemetry(telemetry_providers);
            Ok(())
        })
        .with_closer_timeout(Duration::from_secs(10))
        .run()
        .await;

    if let Err(e) = result {
        error!(error = format!("{e:#}"), "chat-relay exiting with error");
        std::process::exit(1);
    }

    info!("chat-relay stopped");
}

async fn connect_nats(config: &ServiceConfig) -> anyhow::Result<NatsClient> {
    let client = NatsClient::connect(
        &config.nats_url,
        Duration::from_secs(config.startup_timeout_secs),
    )
    .await?;

    client
        .ensure_stream(&config.ingress_stream, "Ingestion requests from the connection gateway")
        .await?;
    client
        .ensure_stream(&config.messages_topic, "Chat message envelopes, in and out")
        .await?;

    Ok(client)
}

async fn build_delivery_worker(
    config: &ServiceConfig,
    nats_client: &NatsClient,
) -> anyhow::Result<DeliveryWorker> {
    let signer: Arc<dyn RequestSigner> = match &config.realtime_api_key {
        Some(api_key) => Arc::new(ApiKeySigner::new(api_key.clone())),
        None => Arc::new(UnsignedSigner),
    };

    let delivery_client = RealtimeDeliveryClient::new(
        RealtimeClientConfig {
            endpoint_url: config.realtime_endpoint_url.clone(),
            default_region: config.default_region.clone(),
            timeout: Duration::from_secs(config.delivery_timeout_secs),
        },
        signer,
    )?;
    info!(region = %delivery_client.region(), "realtime delivery client ready");

    DeliveryWorker::new(
        nats_client.create_consumer_client(),
        Arc::new(delivery_client),
        DeliveryWorkerConfig {
            messages_topic: config.messages_topic.clone(),
            consumer_name: config.delivery_consumer_name.clone(),
            nats_batch_size: config.nats_batch_size,
            nats_batch_wait_secs: config.nats_batch_wait_secs,
            max_deliver: config.delivery_max_deliver,
            nak_delay_secs: config.nak_delay_secs,
            delivery_concurrency: config.delivery_concurrency,
            redeliver_failed_deliveries: config.redeliver_failed_deliveries,
        },
    )
    .await
}
