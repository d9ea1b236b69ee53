//! Chat envelopes (JSON).
//!
//! Outbound envelopes are built with `json!` from validated session state, so
//! building them cannot fail. Inbound bodies may hold a single object or an
//! array of objects; each element becomes one [`InboundEnvelope`].

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{HarnessError, Result};

/// Channel identifier. 1-indexed, both internally and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u32);

impl ChannelId {
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Shape of outbound chat messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageShape {
    /// `{type, text, timestamp}`
    #[default]
    Flat,
    /// `{type, user_id, payload: {text}, timestamp}`
    Nested,
}

/// Wall-clock Unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

pub fn join_json(user_name: &str, channel: ChannelId, timestamp_ms: u64) -> String {
    json!({
        "type": "join",
        "user_name": user_name,
        "channel_id": channel,
        "timestamp": timestamp_ms
    })
    .to_string()
}

pub fn message_json(shape: MessageShape, user_name: &str, text: &str, timestamp_ms: u64) -> String {
    match shape {
        MessageShape::Flat => json!({
            "type": "message",
            "text": text,
            "timestamp": timestamp_ms
        }),
        MessageShape::Nested => json!({
            "type": "message",
            "user_id": user_name,
            "payload": { "text": text },
            "timestamp": timestamp_ms
        }),
    }
    .to_string()
}

/// Inbound envelope (server -> client).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundEnvelope {
    /// Relayed chat line; `event` carries the text.
    User {
        #[serde(default = "unknown_user")]
        user_name: String,
        #[serde(default)]
        event: String,
    },
    /// Lifecycle notice (join / rejoin / leave).
    System {
        #[serde(default)]
        event: String,
        #[serde(default)]
        user_name: String,
        #[serde(default)]
        channel_id: Option<ChannelId>,
    },
    Error {
        #[serde(default = "unknown_error")]
        message: String,
    },
}

fn unknown_user() -> String {
    "?".into()
}

fn unknown_error() -> String {
    "Unknown error".into()
}

/// Decode one frame body into envelopes.
///
/// A body that is not JSON is a `FrameDecode` error (the caller discards the
/// frame). Inside valid JSON, elements that are not a known envelope are
/// skipped one by one so a single odd element does not hide its siblings.
pub fn decode_inbound(body: &[u8]) -> Result<Vec<InboundEnvelope>> {
    let root: Value = serde_json::from_slice(body)
        .map_err(|e| HarnessError::FrameDecode(format!("invalid envelope json: {e}")))?;

    let items = match root {
        Value::Array(items) => items,
        other => vec![other],
    };

    let mut out = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<InboundEnvelope>(item) {
            Ok(env) => out.push(env),
            Err(e) => tracing::debug!(error = %e, "skipping unrecognized envelope"),
        }
    }
    Ok(out)
}
