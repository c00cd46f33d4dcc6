use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use super::types::{PublishRequest, PublishResponse};
use super::{
    NatsPublishLoggingLayer, NatsPublishLoggingService, NatsPublishTracingLayer,
    NatsPublishTracingService, NatsTracingConfig,
};
use crate::nats::JetStreamPublisher;
use anyhow::Result;
use tower::{Service, ServiceBuilder};

/// Innermost service: hands the request to JetStream
#[derive(Clone)]
pub struct NatsPublishService {
    publisher: Arc<dyn JetStreamPublisher>,
}

impl NatsPublishService {
    pub fn new(publisher: Arc<dyn JetStreamPublisher>) -> Self {
        Self { publisher }
    }
}

impl Service<PublishRequest> for NatsPublishService {
    type Response = PublishResponse;
    type Error = anyhow::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: PublishRequest) -> Self::Future {
        let publisher = Arc::clone(&self.publisher);

        Box::pin(async move {
            publisher
                .publish_with_headers(req.subject.clone(), req.headers, req.payload)
                .await?;
            Ok(PublishResponse {
                subject: req.subject,
            })
        })
    }
}

/// Publisher stack used by every producer: Tracing -> Logging -> Publish
pub type TracedPublisher = NatsPublishTracingService<NatsPublishLoggingService<NatsPublishService>>;

/// Build the traced and logged publisher stack for one producer
pub fn build_traced_publisher(
    publisher: Arc<dyn JetStreamPublisher>,
    service_name: impl Into<String>,
) -> TracedPublisher {
    ServiceBuilder::new()
        .layer(NatsPublishTracingLayer::new(NatsTracingConfig::new(
            service_name,
        )))
        .layer(NatsPublishLoggingLayer::new())
        .service(NatsPublishService::new(publisher))
}
