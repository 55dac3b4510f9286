//! Engine facade: the public surface a worker process builds against -
//! register endpoints, then `run()`.

use std::sync::Arc;

use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::correlation::CorrelationTable;
use crate::db::DatabaseGateway;
use crate::dispatcher::Dispatcher;
use crate::errors::RelayError;
use crate::registry::{EndpointRegistry, PeerHandler, UserHandler};
use crate::schema::Schema;
use crate::telemetry::Telemetry;
use crate::transport::Session;
use crate::wire::{EndpointPath, Frame};

pub struct Engine<D: DatabaseGateway> {
    worker_name: String,
    host: String,
    port: u16,
    registry: Arc<EndpointRegistry>,
    correlation: Arc<CorrelationTable>,
    database: Arc<D>,
    telemetry: Telemetry,
    session: Option<Arc<Session>>,
}

impl<D: DatabaseGateway + 'static> Engine<D> {
    pub fn new(worker_name: impl Into<String>, host: impl Into<String>, port: u16, database: Arc<D>, telemetry: Telemetry) -> Self {
        Self {
            worker_name: worker_name.into(),
            host: host.into(),
            port,
            registry: Arc::new(EndpointRegistry::new()),
            correlation: Arc::new(CorrelationTable::new()),
            database,
            telemetry,
            session: None,
        }
    }

    /// Registration must happen before `run()` starts the reader loop -
    /// registration is not safe concurrently with dispatch.
    pub fn register_peer_endpoint(&self, path: EndpointPath, handler: Arc<dyn PeerHandler>) {
        self.registry.register_peer(path, handler);
    }

    pub fn register_user_endpoint(&self, path: EndpointPath, handler: Arc<dyn UserHandler>, schema: Schema) {
        self.registry.register_user(path, handler, schema);
    }

    fn session(&self) -> Arc<Session> {
        self.session.clone().expect("run() must be called before issuing outbound calls")
    }

    /// Borrow the database gateway, mirroring the original's `get_wrapper()`.
    pub fn database(&self) -> Arc<D> {
        Arc::clone(&self.database)
    }

    /// Call a peer endpoint and wait for its reply, or time out after ten
    /// seconds.
    pub async fn call_peer(&self, peer_name: &str, path: EndpointPath, data: Value) -> Result<Value, RelayError> {
        let tag = Uuid::new_v4().to_string();
        let handle = self.correlation.call(tag.clone()).await;
        self.session().send(&Frame::peer_call(peer_name, path, data, &tag)).await?;
        handle.wait().await
    }

    /// Fire-and-forget push to a user.
    pub async fn push_to_user(&self, user_id: &str, data: Value) -> Result<(), RelayError> {
        self.session().send(&Frame::push_to_user(user_id, data)).await
    }

    /// Ask the broker to resolve a user id. Shares `call_peer`'s
    /// ten-second timeout - the original's analogous `get_user_data` has
    /// no timeout at all, a bug this engine does not reproduce.
    pub async fn lookup_user(&self, user_id: &str) -> Result<Value, RelayError> {
        let tag = Uuid::new_v4().to_string();
        let handle = self.correlation.call(tag.clone()).await;
        self.session().send(&Frame::lookup_user(user_id, &tag)).await?;
        handle.wait().await
    }

    /// Connect, register, and run the read-dispatch loop until the
    /// process is killed. Any socket error triggers a reconnect rather
    /// than returning.
    pub async fn run(&mut self) -> ! {
        let session = Session::connect(&self.host, self.port, &self.worker_name).await;
        self.session = Some(Arc::clone(&session));

        let mut reader = crate::frame_reader::FrameReader::new();
        let dispatcher = Dispatcher::new(
            Arc::clone(&session),
            Arc::clone(&self.registry),
            Arc::clone(&self.correlation),
            Arc::clone(&self.database),
            self.telemetry.clone(),
        );

        loop {
            match session.read_chunk().await {
                Ok(chunk) if chunk.is_empty() => {
                    warn!("broker closed the connection, reconnecting");
                    session.reconnect().await;
                }
                Ok(chunk) => match reader.feed(&chunk) {
                    Ok(frames) => {
                        for raw in frames {
                            dispatcher.handle_raw(raw);
                        }
                    }
                    Err(err) => {
                        warn!(%err, "frame extraction error, dropping buffered state");
                    }
                },
                Err(err) => {
                    warn!(%err, "read error, reconnecting");
                    session.reconnect().await;
                }
            }
        }
    }
}
