//! Worker-side session engine for a hub-and-spoke messaging fabric.
//!
//! A worker process connects out to a central broker, registers itself
//! by name, and from then on the broker routes requests to it and
//! forwards its replies and outbound calls. This crate is the client
//! half: frame extraction over the raw byte stream, connect/register/
//! reconnect, endpoint registration, dispatch, and call correlation.

pub mod config;
pub mod correlation;
pub mod db;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod frame_reader;
pub mod registry;
pub mod schema;
pub mod telemetry;
pub mod transport;
pub mod wire;

pub use config::Config;
pub use engine::Engine;
pub use errors::{ConfigError, RelayError};
pub use registry::{PeerHandler, UserHandler};
pub use schema::{FieldKind, FieldSpec, Schema};
pub use wire::{EndpointPath, Frame};
