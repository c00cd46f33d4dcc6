use crate::domain::{DeliveryBatchService, QueueRecord, RecordError, TransportWrapper};
use common::nats::{BatchProcessor, ConsumeRequest, ProcessingResult, link_to_publisher};
use std::sync::Arc;
use tracing::{Span, debug, info_span, warn};

/// BatchProcessor running `chat_messages.out` batches through the delivery pipeline.
///
/// Each message is framed as a queue record keyed by its stream sequence and
/// delivered inside a span continuing the publisher's trace. Records the
/// pipeline leaves unacknowledged are nak'd so JetStream redelivers them.
pub fn create_delivery_processor(service: Arc<DeliveryBatchService>) -> BatchProcessor {
    Box::new(move |requests: Vec<ConsumeRequest>| {
        let service = Arc::clone(&service);

        Box::pin(async move {
            let mut records = Vec::with_capacity(requests.len());
            let mut positions = Vec::with_capacity(requests.len());
            let mut nak = Vec::new();

            for (idx, request) in requests.iter().enumerate() {
                match queue_record_from(request) {
                    Ok(record) => {
                        positions.push(idx);
                        records.push((record, delivery_span(request)));
                    }
                    Err(e) => {
                        warn!(error = %e, sequence = request.sequence, "undecodable delivery message");
                        nak.push((idx, Some(e.to_string())));
                    }
                }
            }

            let outcome = service.process_traced_batch(records).await;

            let mut ack = Vec::with_capacity(positions.len());
            for (position, idx) in positions.into_iter().enumerate() {
                match outcome.failure_at(position) {
                    Some(error) => nak.push((idx, Some(error.to_string()))),
                    None => ack.push(idx),
                }
            }

            debug!(acked = ack.len(), nakd = nak.len(), "delivery batch settled");
            Ok(ProcessingResult::new(ack, nak))
        })
    })
}

/// Span for delivering one consumed message, parented on its publisher
pub fn delivery_span(request: &ConsumeRequest) -> Span {
    let span = info_span!(
        target: "nats",
        "nats_deliver",
        otel.name = "nats_deliver",
        messaging.system = "nats",
        messaging.operation = "process",
        messaging.destination.name = %request.subject,
        messaging.message.id = request.sequence,
    );
    link_to_publisher(&span, request.headers.as_ref());
    span
}

/// Frame a consumed message as a queue record
pub fn queue_record_from(request: &ConsumeRequest) -> Result<QueueRecord, RecordError> {
    let message = std::str::from_utf8(&request.payload)
        .map_err(|e| RecordError::ParseError(format!("payload is not UTF-8: {e}")))?;

    QueueRecord::from_wrapper(request.sequence.to_string(), &TransportWrapper::new(message))
        .map_err(|e| RecordError::ParseError(e.to_string()))
}
