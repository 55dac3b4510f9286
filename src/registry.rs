//! Endpoint registry.
//!
//! Grounded on `ModuleRegistry` in `runtime/registry.rs`: same
//! `DashMap`-backed concurrent map shape, same register-then-route split.
//! The routing rule differs deliberately - `route_command` there does
//! longest-prefix matching over registered routes, but endpoint lookup
//! here wants exact ordered-path equality with no prefix fallback, so
//! lookups here are a direct key hit or nothing.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::errors::RelayError;
use crate::schema::Schema;
use crate::wire::EndpointPath;

/// A peer endpoint handler: receives the request payload and the name of
/// the requesting peer, returns the reply payload. Exceptions are caught
/// by the dispatcher, not here - any error becomes an empty-object reply.
#[async_trait]
pub trait PeerHandler: Send + Sync {
    async fn handle(&self, data: Value, requesting_ms: &str) -> Result<Value, RelayError>;
}

/// A user endpoint handler, identical calling convention to `PeerHandler`
/// but keyed by the requesting user's id and registered/validated in a
/// separate map from peer endpoints.
#[async_trait]
pub trait UserHandler: Send + Sync {
    async fn handle(&self, data: Value, user_id: &str) -> Result<Value, RelayError>;
}

struct UserEntry {
    handler: Arc<dyn UserHandler>,
    schema: Schema,
}

/// Path-keyed handler maps. Registration happens during setup, before
/// `Engine::run` starts the reader loop; after that point the maps are
/// read-only for the lifetime of the session.
#[derive(Default)]
pub struct EndpointRegistry {
    peer: DashMap<EndpointPath, Arc<dyn PeerHandler>>,
    user: DashMap<EndpointPath, UserEntry>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last write wins on a repeated path, matching the original
    /// decorator's plain dict assignment.
    pub fn register_peer(&self, path: EndpointPath, handler: Arc<dyn PeerHandler>) {
        self.peer.insert(path, handler);
    }

    pub fn register_user(&self, path: EndpointPath, handler: Arc<dyn UserHandler>, schema: Schema) {
        self.user.insert(path, UserEntry { handler, schema });
    }

    pub fn peer_handler(&self, path: &EndpointPath) -> Option<Arc<dyn PeerHandler>> {
        self.peer.get(path).map(|entry| entry.value().clone())
    }

    /// Returns the handler and its schema together so dispatch can
    /// validate before invoking without a second lookup.
    pub fn user_handler(&self, path: &EndpointPath) -> Option<(Arc<dyn UserHandler>, Schema)> {
        self.user.get(path).map(|entry| (entry.handler.clone(), entry.schema.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldKind, FieldSpec};
    use serde_json::json;
    use std::collections::HashMap;

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

    #[test]
    fn unregistered_path_misses() {
        let registry = EndpointRegistry::new();
        assert!(registry.peer_handler(&vec!["a".to_string()]).is_none());
    }

    #[test]
    fn registered_path_hits_exactly() {
        let registry = EndpointRegistry::new();
        registry.register_peer(vec!["a".to_string(), "b".to_string()], Arc::new(Echo));

        assert!(registry.peer_handler(&vec!["a".to_string(), "b".to_string()]).is_some());
        // No prefix fallback: "a" alone must not match "a/b".
        assert!(registry.peer_handler(&vec!["a".to_string()]).is_none());
    }

    #[test]
    fn last_registration_wins() {
        let registry = EndpointRegistry::new();
        let path = vec!["a".to_string()];
        registry.register_peer(path.clone(), Arc::new(Echo));
        registry.register_peer(path.clone(), Arc::new(Echo));
        assert!(registry.peer_handler(&path).is_some());
    }

    #[test]
    fn user_handler_carries_its_schema() {
        let registry = EndpointRegistry::new();
        let schema: Schema = HashMap::from([("x".to_string(), FieldSpec::required(FieldKind::String))]);
        registry.register_user(vec!["u".to_string()], Arc::new(Echo), schema);

        let (_, schema) = registry.user_handler(&vec!["u".to_string()]).unwrap();
        assert!(schema.contains_key("x"));
        let _ = json!({});
    }
}
