use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // NATS configuration
    /// NATS server URL
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,

    /// Stream carrying envelopes on `{topic}.in` and `{topic}.out`
    #[serde(default = "default_messages_topic")]
    pub messages_topic: String,

    /// Stream the connection gateway writes ingestion requests to
    #[serde(default = "default_ingress_stream")]
    pub ingress_stream: String,

    #[serde(default = "default_ingress_consumer_name")]
    pub ingress_consumer_name: String,

    #[serde(default = "default_delivery_consumer_name")]
    pub delivery_consumer_name: String,

    /// Batch size for consumers
    #[serde(default = "default_nats_batch_size")]
    pub nats_batch_size: usize,

    /// Max wait time for batches in seconds
    #[serde(default = "default_nats_batch_wait_secs")]
    pub nats_batch_wait_secs: u64,

    /// Seconds before a rejected message is redelivered
    #[serde(default = "default_nak_delay_secs")]
    pub nak_delay_secs: u64,

    // Ingestion
    /// modelInterface used when a client message carries none
    #[serde(default = "default_model_interface")]
    pub default_model_interface: String,

    // Delivery
    /// GraphQL endpoint pushing messages to client connections
    #[serde(default = "default_realtime_endpoint_url")]
    pub realtime_endpoint_url: String,

    /// API key sent as `x-api-key`; requests go unsigned when unset
    #[serde(default, skip_serializing)]
    pub realtime_api_key: Option<String>,

    /// Signing region when the endpoint host does not name one
    #[serde(default = "default_region")]
    pub default_region: String,

    #[serde(default = "default_delivery_timeout_secs")]
    pub delivery_timeout_secs: u64,

    /// Records of one batch delivered concurrently
    #[serde(default = "default_delivery_concurrency")]
    pub delivery_concurrency: usize,

    /// Deliveries of one outbound message before it is dropped, 0 for unlimited
    #[serde(default = "default_delivery_max_deliver")]
    pub delivery_max_deliver: i64,

    /// Leave records whose delivery failed unacknowledged
    #[serde(default)]
    pub redeliver_failed_deliveries: bool,

    // OpenTelemetry configuration
    /// OpenTelemetry OTLP endpoint (gRPC)
    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    /// Enable OpenTelemetry export
    #[serde(default)]
    pub otel_enabled: bool,

    /// Service name for OpenTelemetry resource
    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

// NATS defaults
fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_startup_timeout_secs() -> u64 {
    30
}

fn default_messages_topic() -> String {
    "chat_messages".to_string()
}

fn default_ingress_stream() -> String {
    "chat_ingress".to_string()
}

fn default_ingress_consumer_name() -> String {
    "chat-relay-ingress".to_string()
}

fn default_delivery_consumer_name() -> String {
    "chat-relay-delivery".to_string()
}

fn default_nats_batch_size() -> usize {
    10
}

fn default_nats_batch_wait_secs() -> u64 {
    5
}

fn default_nak_delay_secs() -> u64 {
    5
}

fn default_model_interface() -> String {
    "langchain".to_string()
}

// Delivery defaults
fn default_realtime_endpoint_url() -> String {
    "http://localhost:8080/graphql".to_string()
}

fn default_region() -> String {
    "eu-central-1".to_string()
}

fn default_delivery_timeout_secs() -> u64 {
    10
}

fn default_delivery_concurrency() -> usize {
    1
}

fn default_delivery_max_deliver() -> i64 {
    3
}

// OpenTelemetry defaults
fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "chat-relay".to_string()
}

impl fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceConfig")
            .field("log_level", &self.log_level)
            .field("nats_url", &self.nats_url)
            .field("startup_timeout_secs", &self.startup_timeout_secs)
            .field("messages_topic", &self.messages_topic)
            .field("ingress_stream", &self.ingress_stream)
            .field("ingress_consumer_name", &self.ingress_consumer_name)
            .field("delivery_consumer_name", &self.delivery_consumer_name)
            .field("nats_batch_size", &self.nats_batch_size)
            .field("nats_batch_wait_secs", &self.nats_batch_wait_secs)
            .field("nak_delay_secs", &self.nak_delay_secs)
            .field("default_model_interface", &self.default_model_interface)
            .field("realtime_endpoint_url", &self.realtime_endpoint_url)
            .field(
                "realtime_api_key",
                &self.realtime_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("default_region", &self.default_region)
            .field("delivery_timeout_secs", &self.delivery_timeout_secs)
            .field("delivery_concurrency", &self.delivery_concurrency)
            .field("delivery_max_deliver", &self.delivery_max_deliver)
            .field("redeliver_failed_deliveries", &self.redeliver_failed_deliveries)
            .field("otel_endpoint", &self.otel_endpoint)
            .field("otel_enabled", &self.otel_enabled)
            .field("otel_service_name", &self.otel_service_name)
            .finish()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("CHAT_RELAY"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // env is process-wide, tests touching it run one at a time
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "CHAT_RELAY_LOG_LEVEL",
        "CHAT_RELAY_REALTIME_API_KEY",
        "CHAT_RELAY_DELIVERY_CONCURRENCY",
        "CHAT_RELAY_REDELIVER_FAILED_DELIVERIES",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: callers hold TEST_LOCK
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let config = ServiceConfig::from_env().unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.messages_topic, "chat_messages");
        assert_eq!(config.ingress_stream, "chat_ingress");
        assert_eq!(config.default_model_interface, "langchain");
        assert_eq!(config.default_region, "eu-central-1");
        assert_eq!(config.delivery_concurrency, 1);
        assert_eq!(config.delivery_max_deliver, 3);
        assert_eq!(config.nak_delay_secs, 5);
        assert!(config.realtime_api_key.is_none());
        assert!(!config.redeliver_failed_deliveries);
        assert!(!config.otel_enabled);
    }

    #[test]
    fn test_custom_config() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("CHAT_RELAY_LOG_LEVEL", "debug");
            std::env::set_var("CHAT_RELAY_REALTIME_API_KEY", "da2-secret");
            std::env::set_var("CHAT_RELAY_DELIVERY_CONCURRENCY", "8");
            std::env::set_var("CHAT_RELAY_REDELIVER_FAILED_DELIVERIES", "true");
        }

        let config = ServiceConfig::from_env().unwrap();
        clear_env();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.realtime_api_key.as_deref(), Some("da2-secret"));
        assert_eq!(config.delivery_concurrency, 8);
        assert!(config.redeliver_failed_deliveries);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("CHAT_RELAY_REALTIME_API_KEY", "da2-secret");
        }

        let config = ServiceConfig::from_env().unwrap();
        clear_env();

        let rendered = format!("{config:?}");
        assert!(!rendered.contains("da2-secret"));
        assert!(rendered.contains("<redacted>"));
        assert!(rendered.contains("chat_messages"));
    }
}
