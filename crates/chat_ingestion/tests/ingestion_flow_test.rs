use bytes::Bytes;
use chat_ingestion::{EnvelopeBuilder, IngestionRequest, IngestionService, NatsEnvelopeProducer};
use common::domain::DomainError;
use common::nats::MockJetStreamPublisher;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};

type Published = Arc<Mutex<Vec<(String, Bytes)>>>;

fn capturing_publisher() -> (MockJetStreamPublisher, Published) {
    let published: Published = Arc::new(Mutex::new(Vec::new()));
    let sink = published.clone();

    let mut jetstream = MockJetStreamPublisher::new();
    jetstream
        .expect_publish_with_headers()
        .returning(move |subject, _headers, payload| {
            sink.lock().unwrap().push((subject, payload));
            Ok(())
        });

    (jetstream, published)
}

fn service(jetstream: MockJetStreamPublisher) -> IngestionService {
    IngestionService::new(
        EnvelopeBuilder::default(),
        Arc::new(NatsEnvelopeProducer::new(
            Arc::new(jetstream),
            "chat_messages".to_string(),
        )),
    )
}

#[tokio::test]
async fn ingestion_request_is_published_as_flat_inbound_envelope() {
    let (jetstream, published) = capturing_publisher();

    let request: IngestionRequest = serde_json::from_value(json!({
        "connectionId": "c1",
        "userId": "u1",
        "body": "{\"action\":\"run\",\"data\":{\"x\":1}}"
    }))
    .unwrap();

    service(jetstream).ingest(request).await.unwrap();

    let published = published.lock().unwrap();
    assert_eq!(published.len(), 1);

    let (subject, payload) = &published[0];
    assert_eq!(subject, "chat_messages.in");

    let mut envelope: Value = serde_json::from_slice(payload).unwrap();
    let timestamp = envelope
        .as_object_mut()
        .and_then(|fields| fields.remove("timestamp"))
        .unwrap();

    assert!(timestamp.as_str().unwrap().parse::<u64>().is_ok());
    assert_eq!(
        envelope,
        json!({
            "action": "run",
            "modelInterface": "langchain",
            "direction": "IN",
            "connectionId": "c1",
            "userId": "u1",
            "data": {"x": 1}
        })
    );
}

#[tokio::test]
async fn missing_action_publishes_nothing() {
    let (jetstream, published) = capturing_publisher();

    let result = service(jetstream)
        .ingest(IngestionRequest {
            connection_id: "c1".to_string(),
            user_id: "u1".to_string(),
            body: "{\"modelInterface\":\"langchain\"}".to_string(),
        })
        .await;

    assert!(matches!(result, Err(DomainError::ValidationError(_))));
    assert!(published.lock().unwrap().is_empty());
}
