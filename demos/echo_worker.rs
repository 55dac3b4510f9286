//! Minimal worker: one peer endpoint, one user endpoint. Grounded on
//! `continuum-core/src/main.rs`'s `#[tokio::main]` + tracing-subscriber
//! bring-up.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use hub_worker::config::Config;
use hub_worker::db::open_gateway;
use hub_worker::registry::{PeerHandler, UserHandler};
use hub_worker::schema::{FieldKind, FieldSpec};
use hub_worker::telemetry::{init_subscriber, Telemetry};
use hub_worker::{Engine, RelayError};
use serde_json::Value;

struct Echo;

#[async_trait]
impl PeerHandler for Echo {
    async fn handle(&self, data: Value, _requesting_ms: &str) -> Result<Value, RelayError> {
        Ok(data)
    }
}

#[async_trait]
impl UserHandler for Echo {
    async fn handle(&self, data: Value, _user_id: &str) -> Result<Value, RelayError> {
        Ok(data)
    }
}

#[tokio::main]
async fn main() {
    let config = Config::from_env().expect("invalid configuration");
    init_subscriber(matches!(config.mode, hub_worker::config::Mode::Debug));

    let database = Arc::new(open_gateway(&config).expect("failed to open database"));
    let telemetry = Telemetry::new(if config.dsn.is_empty() { None } else { Some(config.dsn.clone()) });

    let mut engine = Engine::new("echo-worker", config.server_host.clone(), config.server_port, database, telemetry);

    engine.register_peer_endpoint(vec!["echo".to_string()], Arc::new(Echo));

    let schema = HashMap::from([("message".to_string(), FieldSpec::required(FieldKind::String))]);
    engine.register_user_endpoint(vec!["echo".to_string()], Arc::new(Echo), schema);

    engine.run().await;
}
