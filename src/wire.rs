//! On-wire frame envelope: one top-level JSON object per frame.
//!
//! The discriminator between control message / peer request / user
//! request / reply is purely structural, so this is deliberately one
//! flat struct rather than a tagged enum — mirrors the envelope shape of
//! `continuum-core`'s `JTAGRequest`/`Response` types, which likewise keep
//! every optional field behind `skip_serializing_if = "Option::is_none"`
//! rather than modelling the variants as a Rust enum at the wire layer.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An ordered sequence of path segments. Equality is elementwise.
pub type EndpointPath = Vec<String>;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Frame {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<EndpointPath>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ms: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl Frame {
    /// `{"action":"register","name":<worker-name>}` — sent once per
    /// connection, immediately after connect.
    pub fn register(worker_name: &str) -> Self {
        Self {
            action: Some("register".to_string()),
            name: Some(worker_name.to_string()),
            ..Default::default()
        }
    }

    /// `{"action":"user","data":{"user":<id>},"tag":<uuid>}` — a
    /// `lookup_user` request to the broker.
    pub fn lookup_user(user_id: &str, tag: &str) -> Self {
        let mut data = Map::new();
        data.insert("user".to_string(), Value::String(user_id.to_string()));
        Self {
            action: Some("user".to_string()),
            data: Some(Value::Object(data)),
            tag: Some(tag.to_string()),
            ..Default::default()
        }
    }

    /// `{"action":"address","user":<id>,"data":{...}}` — fire-and-forget
    /// push to a user.
    pub fn push_to_user(user_id: &str, data: Value) -> Self {
        Self {
            action: Some("address".to_string()),
            user: Some(user_id.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    /// `{"ms":<name>,"data":{...},"tag":<uuid>,"endpoint":[...]}` —
    /// outbound peer call.
    pub fn peer_call(peer_name: &str, path: EndpointPath, data: Value, tag: &str) -> Self {
        Self {
            ms: Some(peer_name.to_string()),
            data: Some(data),
            tag: Some(tag.to_string()),
            endpoint: Some(path),
            ..Default::default()
        }
    }

    /// `{"ms":<requester>,"endpoint":[],"tag":<tag>,"data":{...}}` — reply
    /// to a peer request.
    pub fn peer_reply(requesting_ms: &str, tag: &str, data: Value) -> Self {
        Self {
            ms: Some(requesting_ms.to_string()),
            endpoint: Some(Vec::new()),
            tag: Some(tag.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }

    /// `{"tag":<tag>,"ms":<requester>,"data":{"error":"unknown_endpoint"}}`
    /// — peer unknown-endpoint reply. Echoes `ms`, never `user` — a peer
    /// frame never carries a `user` field to echo in the first place.
    pub fn peer_unknown_endpoint(requesting_ms: &str, tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ms: Some(requesting_ms.to_string()),
            data: Some(error_payload("unknown_endpoint")),
            ..Default::default()
        }
    }

    /// `{"tag":<tag>,"user":<id>,"data":{"error":"unknown_endpoint"}}` —
    /// user unknown-endpoint reply.
    pub fn user_unknown_endpoint(user_id: &str, tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            user: Some(user_id.to_string()),
            data: Some(error_payload("unknown_endpoint")),
            ..Default::default()
        }
    }

    /// `{"tag":<tag>,"data":{"error":"invalid_input_data"}}` — schema
    /// rejection reply.
    pub fn invalid_input_data(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            data: Some(error_payload("invalid_input_data")),
            ..Default::default()
        }
    }

    /// `{"tag":<tag>,"data":{...}}` — reply to a user request.
    pub fn user_reply(tag: &str, data: Value) -> Self {
        Self {
            tag: Some(tag.to_string()),
            data: Some(data),
            ..Default::default()
        }
    }
}

fn error_payload(error: &str) -> Value {
    let mut m = Map::new();
    m.insert("error".to_string(), Value::String(error.to_string()));
    Value::Object(m)
}

/// The structural classification of an inbound frame. There is no type
/// tag on the wire — classification falls out entirely of which fields
/// are present.
#[derive(Debug, PartialEq, Eq)]
pub enum FrameKind {
    /// `tag` matches a pending outbound call that is still awaiting reply.
    Reply,
    /// `ms` present alongside `endpoint` — a peer-originated request.
    PeerRequest,
    /// `user` present alongside `endpoint` — a user-originated request.
    UserRequest,
    /// Neither `ms` nor `user`, and not a known awaiting tag: malformed.
    Unroutable,
}

impl Frame {
    /// Classify this frame given the set of tags the correlation table is
    /// currently awaiting. `ms` wins over `user` when both are present.
    pub fn classify(&self, tag_is_awaiting: bool) -> FrameKind {
        if tag_is_awaiting {
            return FrameKind::Reply;
        }
        if self.ms.is_some() && self.endpoint.is_some() {
            FrameKind::PeerRequest
        } else if self.user.is_some() && self.endpoint.is_some() {
            FrameKind::UserRequest
        } else {
            FrameKind::Unroutable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ms_wins_over_user_when_both_present() {
        let frame = Frame {
            ms: Some("auth".to_string()),
            user: Some("u1".to_string()),
            endpoint: Some(vec!["x".to_string()]),
            tag: Some("t".to_string()),
            data: Some(Value::Object(Map::new())),
            ..Default::default()
        };
        assert_eq!(frame.classify(false), FrameKind::PeerRequest);
    }

    #[test]
    fn reply_wins_when_tag_is_awaiting_even_with_endpoint() {
        let frame = Frame {
            ms: Some("auth".to_string()),
            endpoint: Some(vec!["x".to_string()]),
            tag: Some("t".to_string()),
            data: Some(Value::Object(Map::new())),
            ..Default::default()
        };
        assert_eq!(frame.classify(true), FrameKind::Reply);
    }

    #[test]
    fn neither_ms_nor_user_is_unroutable() {
        let frame = Frame {
            tag: Some("t".to_string()),
            data: Some(Value::Object(Map::new())),
            ..Default::default()
        };
        assert_eq!(frame.classify(false), FrameKind::Unroutable);
    }
}
