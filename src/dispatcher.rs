//! Inbound frame classification and routing.
//!
//! Ported from the original's `__exec`: one call per frame, run on its
//! own task, the same reader-loop-spawns-worker-per-frame shape
//! `handle_client` in `ipc/mod.rs` uses, there via `rayon::spawn` per
//! request rather than `tokio::spawn`. A handler panic or returned error
//! never reaches the caller - it becomes an empty-object reply, same as
//! the original's bare `except Exception: result = {}`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{error, warn};

use crate::correlation::CorrelationTable;
use crate::db::DatabaseGateway;
use crate::registry::EndpointRegistry;
use crate::schema::validate;
use crate::telemetry::Telemetry;
use crate::transport::Session;
use crate::wire::{Frame, FrameKind};

pub struct Dispatcher<D: DatabaseGateway> {
    session: Arc<Session>,
    registry: Arc<EndpointRegistry>,
    correlation: Arc<CorrelationTable>,
    database: Arc<D>,
    telemetry: Telemetry,
}

impl<D: DatabaseGateway + 'static> Dispatcher<D> {
    pub fn new(
        session: Arc<Session>,
        registry: Arc<EndpointRegistry>,
        correlation: Arc<CorrelationTable>,
        database: Arc<D>,
        telemetry: Telemetry,
    ) -> Arc<Self> {
        Arc::new(Self {
            session,
            registry,
            correlation,
            database,
            telemetry,
        })
    }

    /// Parse and route one raw frame. Malformed JSON and unroutable
    /// frames are logged and dropped - neither terminates the reader
    /// loop.
    pub fn handle_raw(self: &Arc<Self>, raw: Vec<u8>) {
        let dispatcher = Arc::clone(self);
        tokio::spawn(async move {
            let frame: Frame = match serde_json::from_slice(&raw) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(%err, "dropping malformed frame");
                    return;
                }
            };
            dispatcher.dispatch(frame).await;
        });
    }

    async fn dispatch(&self, frame: Frame) {
        let Some(data) = &frame.data else {
            warn!(?frame.tag, "dropping frame with no data object");
            return;
        };
        if !data.is_object() {
            warn!(?frame.tag, "dropping frame whose data field is not an object");
            return;
        }

        let awaiting = frame.tag.as_deref().is_some_and(|tag| self.correlation.is_awaiting(tag));

        match frame.classify(awaiting) {
            FrameKind::Reply => {
                if let (Some(tag), Some(data)) = (frame.tag.clone(), frame.data.clone()) {
                    self.correlation.deliver(&tag, data);
                }
            }
            FrameKind::PeerRequest => self.dispatch_peer(frame).await,
            FrameKind::UserRequest => self.dispatch_user(frame).await,
            FrameKind::Unroutable => {
                warn!(?frame.tag, "unroutable frame, dropping");
            }
        }
    }

    async fn dispatch_peer(&self, frame: Frame) {
        let Some(path) = frame.endpoint.clone() else { return };
        let Some(tag) = frame.tag.clone() else { return };
        let Some(requester) = frame.ms.clone() else { return };
        let data = frame.data.clone().unwrap_or(Value::Null);

        let Some(handler) = self.registry.peer_handler(&path) else {
            let _ = self.session.send(&Frame::peer_unknown_endpoint(&requester, &tag)).await;
            return;
        };

        self.database.session().await;
        let result = handler.handle(data, &requester).await;
        self.database.release_session().await;

        let reply_data = self.resolve_reply(result);
        let _ = self.session.send(&Frame::peer_reply(&requester, &tag, reply_data)).await;
    }

    async fn dispatch_user(&self, frame: Frame) {
        let Some(path) = frame.endpoint.clone() else { return };
        let Some(tag) = frame.tag.clone() else { return };
        let Some(user_id) = frame.user.clone() else { return };
        let data = frame.data.clone().unwrap_or(Value::Null);

        let Some((handler, schema)) = self.registry.user_handler(&path) else {
            let _ = self.session.send(&Frame::user_unknown_endpoint(&user_id, &tag)).await;
            return;
        };

        if let Err(err) = validate(&schema, &data) {
            warn!(%err, "rejecting user request: schema validation failed");
            let _ = self.session.send(&Frame::invalid_input_data(&tag)).await;
            return;
        }

        self.database.session().await;
        let result = handler.handle(data, &user_id).await;
        self.database.release_session().await;

        let reply_data = self.resolve_reply(result);
        let _ = self.session.send(&Frame::user_reply(&tag, reply_data)).await;
    }

    /// Exception -> `{}` reply policy: any handler error, a `null` return,
    /// and any other non-object return, all become an empty object rather
    /// than propagating or going out as literal `null`.
    fn resolve_reply(&self, result: Result<Value, crate::errors::RelayError>) -> Value {
        match result {
            Ok(Value::Null) => Value::Object(Default::default()),
            Ok(value) if value.is_object() => value,
            Ok(_) => {
                self.telemetry.capture_exception("illegal_return_type", &crate::errors::RelayError::IllegalReturnType);
                Value::Object(Default::default())
            }
            Err(err) => {
                error!(%err, "handler failed");
                self.telemetry.capture_exception("handler_failure", &err);
                Value::Object(Default::default())
            }
        }
    }
}
